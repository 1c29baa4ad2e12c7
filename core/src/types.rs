//! Shared primitive types used across the entire simulation.

/// A save-game slot. Slots never share state.
pub type SlotId = i64;

/// A whole game day. Fractional progress lives on `SlotState::game_day`.
pub type GameDay = i64;

/// A stable, unique identifier for any entity in the simulation.
pub type EntityId = String;
