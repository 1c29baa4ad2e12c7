//! Slot reset and slot isolation.

use banksim_core::{
    clock::{ManualClock, RealClock},
    engine::SimEngine,
    error::SimError,
    money::Money,
};
use chrono::{Duration, TimeZone, Utc};

fn build(seed: u64) -> (SimEngine, ManualClock) {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let engine = SimEngine::build_test(seed, clock.clone()).expect("build test engine");
    (engine, clock)
}

#[test]
fn reset_restores_the_starting_point_and_wipes_history() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Ada", Money::from_units(2_000)).unwrap();
    engine.invest(1, Money::from_units(20_000)).unwrap();
    engine.list_property(1, "Loft", Money::from_units(90_000)).unwrap();
    clock.advance(Duration::seconds(45 * 60 + 18));
    let busy = engine.current_state(1).unwrap();
    assert!(busy.game_day > 45.0);

    let state = engine.reset_slot(1).unwrap();

    assert_eq!(state.liquid_cash, Money::from_units(100_000));
    assert_eq!(state.invested_amount, Money::ZERO);
    assert_eq!(state.game_day, 0.0);
    assert_eq!(state.next_growth_day, 11);
    assert_eq!(state.next_dividend_day, 11);
    assert_eq!(state.last_observed_at, Some(clock.now()));

    assert!(engine.clients(1).unwrap().is_empty());
    assert!(engine.store().transactions_for_client(&client.client_id).unwrap().is_empty());
    assert!(engine.store().investment_events(1).unwrap().is_empty());
    let events: Vec<String> = engine
        .store()
        .events_for_slot(1)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(events, vec!["slot_reset".to_string()]);
}

#[test]
fn reset_leaves_other_slots_alone() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    engine.reset_slot(2).unwrap();
    engine.onboard_client(2, "Bo", Money::from_units(300)).unwrap();
    engine.invest(2, Money::from_units(1_000)).unwrap();
    clock.advance(Duration::minutes(2));

    engine.reset_slot(1).unwrap();

    let other = engine.current_state(2).unwrap();
    assert_eq!(other.invested_amount, Money::from_units(1_000));
    assert!((other.game_day - 2.0).abs() < 1e-9);
    assert_eq!(engine.clients(2).unwrap().len(), 1);
}

#[test]
fn stale_state_cannot_be_saved() {
    let (mut engine, _clock) = build(1);
    engine.reset_slot(1).unwrap();
    let mut stale = engine.store().load_slot_state(1).unwrap().unwrap();
    engine.invest(1, Money::from_units(10)).unwrap();

    stale.liquid_cash = Money::ZERO;
    let err = engine.store().save_slot_state(&mut stale).unwrap_err();
    assert!(matches!(err, SimError::ConcurrentModification { slot_id: 1 }), "{err}");
    assert_eq!(engine.current_state(1).unwrap().liquid_cash, Money::from_units(99_990));
}
