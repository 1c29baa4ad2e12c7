use super::{timestamp_col, to_millis, SimStore};
use crate::{
    error::SimResult,
    model::{InvestmentEvent, Transaction, TransactionKind},
    types::{GameDay, SlotId},
};
use rusqlite::{params, Row};

fn transaction_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        transaction_id: row.get(0)?,
        slot_id: row.get(1)?,
        client_id: row.get(2)?,
        kind: row.get(3)?,
        amount: row.get(4)?,
        game_day: row.get(5)?,
        created_at: timestamp_col(row, 6)?,
    })
}

impl SimStore {
    // ── Client transactions ───────────────────────────────────────

    pub fn insert_transaction(&self, tx: &Transaction) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO client_transaction (
                transaction_id, slot_id, client_id, kind, amount, game_day, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tx.transaction_id,
                tx.slot_id,
                tx.client_id,
                tx.kind,
                tx.amount,
                tx.game_day,
                to_millis(tx.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn transaction_exists(
        &self,
        client_id: &str,
        kind: TransactionKind,
        game_day: GameDay,
    ) -> SimResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM client_transaction
                WHERE client_id = ?1 AND kind = ?2 AND game_day = ?3
             )",
            params![client_id, kind, game_day],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// A client's transactions, oldest first.
    pub fn transactions_for_client(&self, client_id: &str) -> SimResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, slot_id, client_id, kind, amount, game_day, created_at
             FROM client_transaction WHERE client_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![client_id], transaction_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn transactions_for_slot(&self, slot_id: SlotId) -> SimResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, slot_id, client_id, kind, amount, game_day, created_at
             FROM client_transaction WHERE slot_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![slot_id], transaction_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Investment events ─────────────────────────────────────────

    pub fn insert_investment_event(&self, ev: &InvestmentEvent) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO investment_event (slot_id, kind, asset, amount, game_day, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ev.slot_id,
                ev.kind,
                ev.asset,
                ev.amount,
                ev.game_day,
                to_millis(ev.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn investment_events(&self, slot_id: SlotId) -> SimResult<Vec<InvestmentEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT slot_id, kind, asset, amount, game_day, created_at
             FROM investment_event WHERE slot_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![slot_id], |row| {
            Ok(InvestmentEvent {
                slot_id: row.get(0)?,
                kind: row.get(1)?,
                asset: row.get(2)?,
                amount: row.get(3)?,
                game_day: row.get(4)?,
                created_at: timestamp_col(row, 5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
