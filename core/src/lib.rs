//! Banking slot simulation core.
//!
//! Each slot is an independent save game whose clock is derived from
//! elapsed wall-clock time. Every read of a slot goes through
//! [`engine::SimEngine::advance`], which catches up on all whole days
//! crossed since the last observation before anything else happens.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod investment_subsystem;
pub mod model;
pub mod money;
pub mod mortgage_subsystem;
pub mod payroll_subsystem;
pub mod rent_subsystem;
pub mod rng;
pub mod spending_subsystem;
pub mod store;
pub mod subsystem;
pub mod types;
