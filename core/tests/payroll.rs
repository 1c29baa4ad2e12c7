//! Payroll: pay periods, catch-up granularity, and the explicit entry point.

use banksim_core::{
    clock::ManualClock,
    config::SimConfig,
    engine::SimEngine,
    model::{Transaction, TransactionKind},
    money::Money,
};
use chrono::{Duration, TimeZone, Utc};

/// Spending is switched off so balances only move through payroll.
fn build(seed: u64) -> (SimEngine, ManualClock) {
    let mut config = SimConfig::default_test();
    config.constants.spending_trigger_chance = 0.0;
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let engine = SimEngine::build_test_with(config, seed, clock.clone()).expect("build test engine");
    (engine, clock)
}

fn payroll_of(engine: &SimEngine, client_id: &str) -> Vec<Transaction> {
    engine
        .store()
        .transactions_for_client(client_id)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::PayrollDeposit)
        .collect()
}

#[test]
fn daily_cycle_pays_every_day_crossed() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Bea", Money::ZERO).unwrap();
    engine.assign_job(1, &client.client_id, "barista", true).unwrap();

    clock.advance(Duration::minutes(3));
    engine.current_state(1).unwrap();

    let paid = payroll_of(&engine, &client.client_id);
    assert_eq!(paid.iter().map(|t| t.game_day).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(paid.iter().all(|t| t.amount == Money::from_units(100)));
    let client = engine.client(1, &client.client_id).unwrap();
    assert_eq!(client.checking_balance, Money::from_units(300));
}

#[test]
fn longer_cycles_pay_once_per_period() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Eli", Money::ZERO).unwrap();
    engine.assign_job(1, &client.client_id, "engineer", true).unwrap();

    clock.advance(Duration::minutes(5));
    engine.current_state(1).unwrap();

    let paid = payroll_of(&engine, &client.client_id);
    assert_eq!(paid.iter().map(|t| t.game_day).collect::<Vec<_>>(), vec![2, 4]);
    let client = engine.client(1, &client.client_id).unwrap();
    assert_eq!(client.checking_balance, "1315.06".parse().unwrap());
}

#[test]
fn split_and_single_catch_up_pay_the_same() {
    let (mut a, clock_a) = build(1);
    let (mut b, clock_b) = build(1);
    for engine in [&mut a, &mut b] {
        engine.reset_slot(1).unwrap();
    }
    let ca = a.onboard_client(1, "Ivo", Money::ZERO).unwrap();
    let cb = b.onboard_client(1, "Ivo", Money::ZERO).unwrap();
    a.assign_job(1, &ca.client_id, "engineer", true).unwrap();
    b.assign_job(1, &cb.client_id, "engineer", true).unwrap();

    clock_a.advance(Duration::minutes(10));
    a.current_state(1).unwrap();
    for _ in 0..20 {
        clock_b.advance(Duration::seconds(30));
        b.current_state(1).unwrap();
    }

    let days = |e: &SimEngine, id: &str| -> Vec<i64> {
        payroll_of(e, id).iter().map(|t| t.game_day).collect()
    };
    assert_eq!(days(&a, &ca.client_id), days(&b, &cb.client_id));
    assert_eq!(days(&a, &ca.client_id), vec![2, 4, 6, 8, 10]);
}

#[test]
fn explicit_run_before_payday_pays_nothing() {
    let (mut engine, _clock) = build(1);
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Kai", Money::ZERO).unwrap();
    engine.assign_job(1, &client.client_id, "engineer", true).unwrap();

    assert!(engine.run_payroll(1, 1.0).unwrap().is_empty());

    let paid = engine.run_payroll(1, 2.0).unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].amount, "657.53".parse().unwrap());
    assert_eq!(paid[0].game_day, 2);

    // Next payday moved to day 4.
    assert!(engine.run_payroll(1, 3.0).unwrap().is_empty());
    let assignment = &engine.store().job_assignments_for_client(&client.client_id).unwrap()[0];
    assert_eq!(assignment.next_payday, 4.0);
}
