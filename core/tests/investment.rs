//! Index-fund position: year-end growth and dividends, invest/divest.

use banksim_core::{
    clock::ManualClock,
    engine::SimEngine,
    error::SimError,
    model::InvestmentEventKind,
    money::Money,
};
use chrono::{Duration, TimeZone, Utc};

fn build(seed: u64) -> (SimEngine, ManualClock) {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let engine = SimEngine::build_test(seed, clock.clone()).expect("build test engine");
    (engine, clock)
}

fn kinds(engine: &SimEngine, slot: i64) -> Vec<(InvestmentEventKind, Money, i64)> {
    engine
        .store()
        .investment_events(slot)
        .unwrap()
        .into_iter()
        .map(|e| (e.kind, e.amount, e.game_day))
        .collect()
}

#[test]
fn one_year_posts_exactly_one_growth_and_one_dividend() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    engine.invest(1, Money::from_units(10_000)).unwrap();

    clock.advance(Duration::minutes(12));
    let state = engine.current_state(1).unwrap();

    assert_eq!(
        kinds(&engine, 1),
        vec![
            (InvestmentEventKind::Invest, Money::from_units(10_000), 0),
            (InvestmentEventKind::Growth, Money::from_units(1_000), 11),
            (InvestmentEventKind::Dividend, Money::from_units(300), 11),
        ]
    );
    assert_eq!(state.invested_amount, Money::from_units(11_000));
    assert_eq!(state.liquid_cash, Money::from_units(90_300));
    assert_eq!(state.next_growth_day, 23);
    assert_eq!(state.next_dividend_day, 23);
}

#[test]
fn year_end_is_not_repeated_by_later_observations() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    engine.invest(1, Money::from_units(10_000)).unwrap();

    clock.advance(Duration::minutes(12));
    engine.current_state(1).unwrap();
    engine.current_state(1).unwrap();
    clock.advance(Duration::seconds(30));
    engine.current_state(1).unwrap();

    assert_eq!(kinds(&engine, 1).len(), 3);
}

#[test]
fn second_year_compounds_on_grown_position() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    engine.invest(1, Money::from_units(10_000)).unwrap();

    // Two years in one catch-up.
    clock.advance(Duration::minutes(24));
    let state = engine.current_state(1).unwrap();

    let events = kinds(&engine, 1);
    assert_eq!(events[3], (InvestmentEventKind::Growth, Money::from_units(1_100), 23));
    assert_eq!(events[4], (InvestmentEventKind::Dividend, Money::from_units(330), 23));
    assert_eq!(state.invested_amount, Money::from_units(12_100));
    assert_eq!(state.liquid_cash, Money::from_units(90_630));
    assert_eq!(state.next_growth_day, 35);
}

#[test]
fn over_investing_fails_and_changes_nothing() {
    let (mut engine, _clock) = build(1);
    engine.reset_slot(1).unwrap();

    let err = engine.invest(1, "100000.01".parse().unwrap()).unwrap_err();
    assert!(matches!(err, SimError::InsufficientFunds { .. }), "{err}");

    let state = engine.current_state(1).unwrap();
    assert_eq!(state.liquid_cash, Money::from_units(100_000));
    assert_eq!(state.invested_amount, Money::ZERO);
    assert!(kinds(&engine, 1).is_empty());
}

#[test]
fn divest_returns_cash_and_rejects_overdraw() {
    let (mut engine, _clock) = build(1);
    engine.reset_slot(1).unwrap();
    engine.invest(1, Money::from_units(5_000)).unwrap();

    let state = engine.divest(1, Money::from_units(2_000)).unwrap();
    assert_eq!(state.invested_amount, Money::from_units(3_000));
    assert_eq!(state.liquid_cash, Money::from_units(97_000));

    let err = engine.divest(1, Money::from_units(3_001)).unwrap_err();
    assert!(matches!(err, SimError::OverDivestment { .. }), "{err}");
    assert!(matches!(engine.divest(1, Money::ZERO), Err(SimError::Validation(_))));
}

#[test]
fn empty_fund_still_advances_year_markers() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();

    clock.advance(Duration::minutes(12));
    let state = engine.current_state(1).unwrap();

    assert!(kinds(&engine, 1).is_empty());
    assert_eq!(state.liquid_cash, Money::from_units(100_000));
    assert_eq!(state.next_growth_day, 23);
    assert_eq!(state.next_dividend_day, 23);
}

#[test]
fn failed_investment_rolls_back_its_catch_up() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    engine.invest(1, Money::from_units(10_000)).unwrap();
    let logged = engine.store().events_for_slot(1).unwrap().len();

    clock.advance(Duration::minutes(12));
    let err = engine.invest(1, Money::from_units(1_000_000)).unwrap_err();
    assert!(matches!(err, SimError::InsufficientFunds { .. }), "{err}");

    let stored = engine.store().load_slot_state(1).unwrap().unwrap();
    assert_eq!(stored.game_day, 0.0);
    assert_eq!(stored.game_ms, 0);
    assert_eq!(stored.invested_amount, Money::from_units(10_000));
    assert_eq!(engine.store().events_for_slot(1).unwrap().len(), logged);
    assert_eq!(kinds(&engine, 1).len(), 1);

    // The next successful read does the catch-up exactly once.
    let state = engine.current_state(1).unwrap();
    assert_eq!(state.current_day(), 12);
    assert_eq!(state.invested_amount, Money::from_units(11_000));
    assert_eq!(kinds(&engine, 1).len(), 3);
}
