//! The event stream: everything the day cascade did, in order.
//!
//! RULE: Subsystems report their effects ONLY by returning events.
//! The engine is the single writer of the event log.

use crate::{
    model::{InvestmentEventKind, MortgageStatus, TransactionKind},
    money::Money,
    types::{EntityId, GameDay, SlotId},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during simulation.
/// Variants may be added, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    SlotReset {
        slot_id: SlotId,
        starting_cash: Money,
    },
    DayStarted {
        day: GameDay,
    },
    DailyLimitsReset {
        day: GameDay,
        clients: usize,
    },

    // ── Investment events ──────────────────────────
    InvestmentPosted {
        day: GameDay,
        kind: InvestmentEventKind,
        amount: Money,
    },

    // ── Client ledger events ───────────────────────
    TransactionPosted {
        day: GameDay,
        client_id: EntityId,
        kind: TransactionKind,
        amount: Money,
    },

    // ── Mortgage events ────────────────────────────
    MortgageDecided {
        day: GameDay,
        mortgage_id: EntityId,
        status: MortgageStatus,
    },
}

impl SimEvent {
    /// Stable string name used for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SlotReset { .. } => "slot_reset",
            Self::DayStarted { .. } => "day_started",
            Self::DailyLimitsReset { .. } => "daily_limits_reset",
            Self::InvestmentPosted { .. } => "investment_posted",
            Self::TransactionPosted { .. } => "transaction_posted",
            Self::MortgageDecided { .. } => "mortgage_decided",
        }
    }
}

impl From<&crate::model::Transaction> for SimEvent {
    fn from(tx: &crate::model::Transaction) -> Self {
        Self::TransactionPosted {
            day: tx.game_day,
            client_id: tx.client_id.clone(),
            kind: tx.kind,
            amount: tx.amount,
        }
    }
}

impl From<&crate::model::InvestmentEvent> for SimEvent {
    fn from(ev: &crate::model::InvestmentEvent) -> Self {
        Self::InvestmentPosted {
            day: ev.game_day,
            kind: ev.kind,
            amount: ev.amount,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub slot_id: SlotId,
    pub game_day: GameDay,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
