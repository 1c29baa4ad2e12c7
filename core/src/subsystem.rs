//! Day subsystem trait.
//!
//! RULE: Every per-day effect implements DaySubsystem.
//! The engine calls on_day() on each registered subsystem
//! in registration order, once per whole game day crossed.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    model::SlotState,
    rng::SubsystemRng,
    store::SimStore,
    types::GameDay,
};
use chrono::{DateTime, Utc};

/// Everything a subsystem may touch while processing one day.
pub struct DayContext<'a> {
    pub store: &'a SimStore,
    pub config: &'a SimConfig,
    pub state: &'a mut SlotState,
    /// Real instant of the observation that triggered the catch-up.
    pub observed_at: DateTime<Utc>,
}

/// The contract every day subsystem must fulfill.
pub trait DaySubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per crossed day by the engine.
    ///
    /// - `day`: the whole game day being processed
    /// - `rng`: this subsystem's deterministic RNG for (slot, day)
    ///
    /// Returns the events describing what changed.
    fn on_day(
        &self,
        ctx: &mut DayContext<'_>,
        day: GameDay,
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>>;
}
