use super::{timestamp_col, to_millis, SimStore};
use crate::{
    error::{SimError, SimResult},
    model::{ClientAccount, JobAssignment},
    types::SlotId,
};
use rusqlite::{params, OptionalExtension, Row};

const CLIENT_COLUMNS: &str = "client_id, slot_id, name, checking_balance, daily_withdrawn,
     cached_monthly_income, cached_monthly_mandatory, cached_monthly_rent, created_at";

fn client_row(row: &Row<'_>) -> rusqlite::Result<ClientAccount> {
    Ok(ClientAccount {
        client_id: row.get(0)?,
        slot_id: row.get(1)?,
        name: row.get(2)?,
        checking_balance: row.get(3)?,
        daily_withdrawn: row.get(4)?,
        cached_monthly_income: row.get(5)?,
        cached_monthly_mandatory: row.get(6)?,
        cached_monthly_rent: row.get(7)?,
        created_at: timestamp_col(row, 8)?,
    })
}

fn assignment_row(row: &Row<'_>) -> rusqlite::Result<JobAssignment> {
    Ok(JobAssignment {
        assignment_id: row.get(0)?,
        slot_id: row.get(1)?,
        client_id: row.get(2)?,
        job_id: row.get(3)?,
        next_payday: row.get(4)?,
        is_primary: row.get::<_, i32>(5)? != 0,
        created_at: timestamp_col(row, 6)?,
    })
}

impl SimStore {
    // ── Client ────────────────────────────────────────────────────

    pub fn insert_client(&self, c: &ClientAccount) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO client (
                client_id, slot_id, name, checking_balance, daily_withdrawn,
                cached_monthly_income, cached_monthly_mandatory, cached_monthly_rent, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                c.client_id,
                c.slot_id,
                c.name,
                c.checking_balance,
                c.daily_withdrawn,
                c.cached_monthly_income,
                c.cached_monthly_mandatory,
                c.cached_monthly_rent,
                to_millis(c.created_at),
            ],
        )?;
        Ok(())
    }

    /// Write back every mutable field of a client.
    pub fn save_client(&self, c: &ClientAccount) -> SimResult<()> {
        self.conn.execute(
            "UPDATE client SET
                checking_balance = ?1, daily_withdrawn = ?2, cached_monthly_income = ?3,
                cached_monthly_mandatory = ?4, cached_monthly_rent = ?5
             WHERE client_id = ?6 AND slot_id = ?7",
            params![
                c.checking_balance,
                c.daily_withdrawn,
                c.cached_monthly_income,
                c.cached_monthly_mandatory,
                c.cached_monthly_rent,
                c.client_id,
                c.slot_id,
            ],
        )?;
        Ok(())
    }

    pub fn client(&self, slot_id: SlotId, client_id: &str) -> SimResult<Option<ClientAccount>> {
        let client = self
            .conn
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM client WHERE slot_id = ?1 AND client_id = ?2"),
                params![slot_id, client_id],
                client_row,
            )
            .optional()?;
        Ok(client)
    }

    pub fn require_client(&self, slot_id: SlotId, client_id: &str) -> SimResult<ClientAccount> {
        self.client(slot_id, client_id)?
            .ok_or_else(|| SimError::not_found("Client", client_id))
    }

    /// All clients of a slot, in creation order.
    pub fn clients_for_slot(&self, slot_id: SlotId) -> SimResult<Vec<ClientAccount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM client WHERE slot_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map(params![slot_id], client_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn client_count(&self, slot_id: SlotId) -> SimResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM client WHERE slot_id = ?1",
            params![slot_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Zero every client's daily withdrawal counter. Returns how many
    /// clients the slot has.
    pub fn reset_daily_withdrawn(&self, slot_id: SlotId) -> SimResult<usize> {
        let n = self.conn.execute(
            "UPDATE client SET daily_withdrawn = '0.00' WHERE slot_id = ?1",
            params![slot_id],
        )?;
        Ok(n)
    }

    // ── Job assignment ────────────────────────────────────────────

    pub fn insert_job_assignment(&self, a: &JobAssignment) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO job_assignment (
                assignment_id, slot_id, client_id, job_id, next_payday, is_primary, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                a.assignment_id,
                a.slot_id,
                a.client_id,
                a.job_id,
                a.next_payday,
                if a.is_primary { 1 } else { 0 },
                to_millis(a.created_at),
            ],
        )?;
        Ok(())
    }

    /// Assignments of a slot, in creation order.
    pub fn job_assignments_for_slot(&self, slot_id: SlotId) -> SimResult<Vec<JobAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT assignment_id, slot_id, client_id, job_id, next_payday, is_primary, created_at
             FROM job_assignment WHERE slot_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![slot_id], assignment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn job_assignments_for_client(&self, client_id: &str) -> SimResult<Vec<JobAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT assignment_id, slot_id, client_id, job_id, next_payday, is_primary, created_at
             FROM job_assignment WHERE client_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![client_id], assignment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn set_next_payday(&self, assignment_id: &str, next_payday: f64) -> SimResult<()> {
        self.conn.execute(
            "UPDATE job_assignment SET next_payday = ?1 WHERE assignment_id = ?2",
            params![next_payday, assignment_id],
        )?;
        Ok(())
    }

    /// Clear the primary flag on every assignment of a client.
    pub fn demote_primary_jobs(&self, client_id: &str) -> SimResult<usize> {
        let n = self.conn.execute(
            "UPDATE job_assignment SET is_primary = 0 WHERE client_id = ?1 AND is_primary = 1",
            params![client_id],
        )?;
        Ok(n)
    }
}
