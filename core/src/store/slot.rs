use super::{decimal_col, opt_timestamp_col, SimStore};
use crate::{
    error::{SimError, SimResult},
    model::SlotState,
    types::SlotId,
};
use rusqlite::{params, OptionalExtension};

impl SimStore {
    // ── Slot state ────────────────────────────────────────────────

    pub fn load_slot_state(&self, slot_id: SlotId) -> SimResult<Option<SlotState>> {
        let state = self
            .conn
            .query_row(
                "SELECT slot_id, liquid_cash, invested_amount, asset_price, mortgage_rate,
                        game_day, next_dividend_day, next_growth_day, last_observed_at, version,
                        game_ms
                 FROM slot_state WHERE slot_id = ?1",
                params![slot_id],
                |row| {
                    Ok(SlotState {
                        slot_id: row.get(0)?,
                        liquid_cash: row.get(1)?,
                        invested_amount: row.get(2)?,
                        asset_price: row.get(3)?,
                        mortgage_rate: decimal_col(row, 4)?,
                        game_day: row.get(5)?,
                        next_dividend_day: row.get(6)?,
                        next_growth_day: row.get(7)?,
                        last_observed_at: opt_timestamp_col(row, 8)?,
                        version: row.get(9)?,
                        game_ms: row.get(10)?,
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    /// Insert or overwrite a slot's row unconditionally. Used by reset.
    pub fn replace_slot_state(&self, state: &SlotState) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO slot_state (
                slot_id, liquid_cash, invested_amount, asset_price, mortgage_rate,
                game_day, next_dividend_day, next_growth_day, last_observed_at, version, game_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(slot_id) DO UPDATE SET
                liquid_cash = excluded.liquid_cash,
                invested_amount = excluded.invested_amount,
                asset_price = excluded.asset_price,
                mortgage_rate = excluded.mortgage_rate,
                game_day = excluded.game_day,
                next_dividend_day = excluded.next_dividend_day,
                next_growth_day = excluded.next_growth_day,
                last_observed_at = excluded.last_observed_at,
                version = excluded.version,
                game_ms = excluded.game_ms",
            params![
                state.slot_id,
                state.liquid_cash,
                state.invested_amount,
                state.asset_price,
                state.mortgage_rate.to_string(),
                state.game_day,
                state.next_dividend_day,
                state.next_growth_day,
                state.last_observed_at.map(super::to_millis),
                state.version,
                state.game_ms,
            ],
        )?;
        Ok(())
    }

    /// Save a previously loaded state. Fails if anyone else saved the
    /// slot since it was loaded; bumps `state.version` on success.
    pub fn save_slot_state(&self, state: &mut SlotState) -> SimResult<()> {
        let updated = self.conn.execute(
            "UPDATE slot_state SET
                liquid_cash = ?1, invested_amount = ?2, asset_price = ?3, mortgage_rate = ?4,
                game_day = ?5, next_dividend_day = ?6, next_growth_day = ?7,
                last_observed_at = ?8, game_ms = ?11, version = version + 1
             WHERE slot_id = ?9 AND version = ?10",
            params![
                state.liquid_cash,
                state.invested_amount,
                state.asset_price,
                state.mortgage_rate.to_string(),
                state.game_day,
                state.next_dividend_day,
                state.next_growth_day,
                state.last_observed_at.map(super::to_millis),
                state.slot_id,
                state.version,
                state.game_ms,
            ],
        )?;
        if updated == 0 {
            return Err(SimError::ConcurrentModification { slot_id: state.slot_id });
        }
        state.version += 1;
        Ok(())
    }

    /// Delete everything that belongs to a slot except its state row.
    pub fn wipe_slot(&self, slot_id: SlotId) -> SimResult<()> {
        for sql in [
            "DELETE FROM event_log WHERE slot_id = ?1",
            "DELETE FROM investment_event WHERE slot_id = ?1",
            "DELETE FROM client_transaction WHERE slot_id = ?1",
            "DELETE FROM mortgage WHERE slot_id = ?1",
            "DELETE FROM job_assignment WHERE slot_id = ?1",
            "DELETE FROM property WHERE slot_id = ?1",
            "DELETE FROM client WHERE slot_id = ?1",
        ] {
            self.conn.execute(sql, params![slot_id])?;
        }
        Ok(())
    }
}
