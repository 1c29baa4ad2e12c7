use crate::{money::Money, types::SlotId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Money, available: Money },

    #[error("Cannot divest {requested}: only {invested} invested")]
    OverDivestment { requested: Money, invested: Money },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Mortgage '{mortgage_id}' already processed")]
    AlreadyProcessed { mortgage_id: String },

    #[error("Property '{property_id}' is no longer available")]
    Unavailable { property_id: String },

    #[error("Slot {slot_id} was modified concurrently")]
    ConcurrentModification { slot_id: SlotId },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
