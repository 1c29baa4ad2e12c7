//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Subsystems call store methods and never execute SQL directly.

use crate::{
    error::SimResult,
    event::EventLogEntry,
    types::SlotId,
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::{str::FromStr, time::Duration};

mod client;
mod ledger;
mod mortgage;
mod slot;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        // Competing writers on the same file wait for the slot lock.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_clients_and_jobs.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_ledger.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_property_and_mortgage.sql"))?;
        Ok(())
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before `f` reads anything, so two
    /// observers of the same slot can never both load the same prior
    /// state. Any error rolls back everything `f` wrote.
    /// Not re-entrant: `f` must not call `atomically` again.
    pub fn atomically<T>(&self, f: impl FnOnce() -> SimResult<T>) -> SimResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f()?;
        tx.commit()?;
        Ok(out)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry, created_at: DateTime<Utc>) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (slot_id, game_day, subsystem, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.slot_id,
                entry.game_day,
                entry.subsystem,
                entry.event_type,
                entry.payload,
                created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_slot(&self, slot_id: SlotId) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, slot_id, game_day, subsystem, event_type, payload
             FROM event_log WHERE slot_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![slot_id], event_log_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn event_log_row(row: &Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id: Some(row.get(0)?),
        slot_id: row.get(1)?,
        game_day: row.get(2)?,
        subsystem: row.get(3)?,
        event_type: row.get(4)?,
        payload: row.get(5)?,
    })
}

// ── Column helpers ─────────────────────────────────────────────────

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp {millis} out of range").into(),
        )
    })
}

fn opt_timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp_col(row, idx).map(Some),
        None => Ok(None),
    }
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
