use super::{decimal_col, timestamp_col, to_millis, SimStore};
use crate::{
    error::SimResult,
    model::{MortgagePosition, MortgageStatus, Property, RepaymentState},
    money::Money,
    types::SlotId,
};
use rusqlite::{params, OptionalExtension, Row};

const MORTGAGE_COLUMNS: &str = "mortgage_id, slot_id, client_id, property_id, property_price,
     down_payment, loan_amount, interest_rate, term_years, status, repayment_state,
     monthly_payment, next_payment_day, missed_payments, created_at, updated_at";

fn mortgage_row(row: &Row<'_>) -> rusqlite::Result<MortgagePosition> {
    Ok(MortgagePosition {
        mortgage_id: row.get(0)?,
        slot_id: row.get(1)?,
        client_id: row.get(2)?,
        property_id: row.get(3)?,
        property_price: row.get(4)?,
        down_payment: row.get(5)?,
        loan_amount: row.get(6)?,
        interest_rate: decimal_col(row, 7)?,
        term_years: row.get(8)?,
        status: row.get(9)?,
        repayment: row.get(10)?,
        monthly_payment: row.get(11)?,
        next_payment_day: row.get(12)?,
        missed_payments: row.get(13)?,
        created_at: timestamp_col(row, 14)?,
        updated_at: timestamp_col(row, 15)?,
    })
}

impl SimStore {
    // ── Property ──────────────────────────────────────────────────

    pub fn insert_property(&self, p: &Property) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO property (property_id, slot_id, name, price, status, owner_client_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![p.property_id, p.slot_id, p.name, p.price, p.status, p.owner_client_id],
        )?;
        Ok(())
    }

    pub fn property(&self, slot_id: SlotId, property_id: &str) -> SimResult<Option<Property>> {
        let property = self
            .conn
            .query_row(
                "SELECT property_id, slot_id, name, price, status, owner_client_id
                 FROM property WHERE slot_id = ?1 AND property_id = ?2",
                params![slot_id, property_id],
                |row| {
                    Ok(Property {
                        property_id: row.get(0)?,
                        slot_id: row.get(1)?,
                        name: row.get(2)?,
                        price: row.get(3)?,
                        status: row.get(4)?,
                        owner_client_id: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(property)
    }

    pub fn save_property(&self, p: &Property) -> SimResult<()> {
        self.conn.execute(
            "UPDATE property SET status = ?1, owner_client_id = ?2
             WHERE property_id = ?3 AND slot_id = ?4",
            params![p.status, p.owner_client_id, p.property_id, p.slot_id],
        )?;
        Ok(())
    }

    // ── Mortgage ──────────────────────────────────────────────────

    pub fn insert_mortgage(&self, m: &MortgagePosition) -> SimResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO mortgage ({MORTGAGE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                m.mortgage_id,
                m.slot_id,
                m.client_id,
                m.property_id,
                m.property_price,
                m.down_payment,
                m.loan_amount,
                m.interest_rate.to_string(),
                m.term_years,
                m.status,
                m.repayment,
                m.monthly_payment,
                m.next_payment_day,
                m.missed_payments,
                to_millis(m.created_at),
                to_millis(m.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn save_mortgage(&self, m: &MortgagePosition) -> SimResult<()> {
        self.conn.execute(
            "UPDATE mortgage SET
                status = ?1, repayment_state = ?2, monthly_payment = ?3,
                next_payment_day = ?4, missed_payments = ?5, updated_at = ?6
             WHERE mortgage_id = ?7 AND slot_id = ?8",
            params![
                m.status,
                m.repayment,
                m.monthly_payment,
                m.next_payment_day,
                m.missed_payments,
                to_millis(m.updated_at),
                m.mortgage_id,
                m.slot_id,
            ],
        )?;
        Ok(())
    }

    pub fn mortgage(&self, slot_id: SlotId, mortgage_id: &str) -> SimResult<Option<MortgagePosition>> {
        let m = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MORTGAGE_COLUMNS} FROM mortgage WHERE slot_id = ?1 AND mortgage_id = ?2"
                ),
                params![slot_id, mortgage_id],
                mortgage_row,
            )
            .optional()?;
        Ok(m)
    }

    pub fn mortgages_for_slot(&self, slot_id: SlotId) -> SimResult<Vec<MortgagePosition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MORTGAGE_COLUMNS} FROM mortgage WHERE slot_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map(params![slot_id], mortgage_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Sum of monthly payments on a client's accepted mortgages that
    /// are still being repaid.
    pub fn accepted_mortgage_payments(&self, client_id: &str) -> SimResult<Money> {
        let mut stmt = self.conn.prepare(
            "SELECT monthly_payment FROM mortgage
             WHERE client_id = ?1 AND status = ?2 AND monthly_payment IS NOT NULL
               AND (repayment_state IS NULL OR repayment_state IN (?3, ?4))",
        )?;
        let payments = stmt
            .query_map(
                params![
                    client_id,
                    MortgageStatus::Accepted,
                    RepaymentState::Current,
                    RepaymentState::Delinquent,
                ],
                |row| row.get::<_, Money>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(payments.into_iter().sum())
    }
}
