//! Rent: month-start charging, partial payments, no double charging.

use banksim_core::{
    clock::ManualClock,
    engine::SimEngine,
    model::{Transaction, TransactionKind},
    money::Money,
};
use chrono::{Duration, TimeZone, Utc};

fn build(seed: u64) -> (SimEngine, ManualClock) {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let engine = SimEngine::build_test(seed, clock.clone()).expect("build test engine");
    (engine, clock)
}

fn rent_rows(engine: &SimEngine, client_id: &str) -> Vec<Transaction> {
    engine
        .store()
        .transactions_for_client(client_id)
        .unwrap()
        .into_iter()
        .filter(|t| matches!(t.kind, TransactionKind::RentPayment | TransactionKind::PaymentFailed))
        .collect()
}

fn renter(engine: &mut SimEngine, balance: i64, rent: i64) -> String {
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Rae", Money::from_units(balance)).unwrap();
    engine.set_client_rent(1, &client.client_id, Money::from_units(rent)).unwrap();
    client.client_id
}

#[test]
fn rent_is_charged_only_on_month_start() {
    let (mut engine, clock) = build(1);
    let id = renter(&mut engine, 2_000, 1_500);

    clock.advance(Duration::minutes(29));
    engine.current_state(1).unwrap();
    assert!(rent_rows(&engine, &id).is_empty());

    clock.advance(Duration::minutes(1));
    engine.current_state(1).unwrap();
    let rows = rent_rows(&engine, &id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, TransactionKind::RentPayment);
    assert_eq!(rows[0].amount, Money::from_units(1_500));
    assert_eq!(rows[0].game_day, 30);
    assert_eq!(engine.client(1, &id).unwrap().checking_balance, Money::from_units(500));
}

#[test]
fn short_balance_pays_what_it_can() {
    let (mut engine, clock) = build(1);
    let id = renter(&mut engine, 400, 1_000);

    clock.advance(Duration::minutes(30));
    engine.current_state(1).unwrap();

    let rows = rent_rows(&engine, &id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, TransactionKind::PaymentFailed);
    assert_eq!(rows[0].amount, Money::from_units(400));
    assert_eq!(engine.client(1, &id).unwrap().checking_balance, Money::ZERO);
}

#[test]
fn explicit_charge_is_not_repeated_by_catch_up() {
    let (mut engine, clock) = build(1);
    let id = renter(&mut engine, 5_000, 1_000);

    assert!(engine.charge_rent(1, 12.0).unwrap().is_empty());
    assert_eq!(engine.charge_rent(1, 30.0).unwrap().len(), 1);
    assert!(engine.charge_rent(1, 30.5).unwrap().is_empty());

    clock.advance(Duration::minutes(31));
    engine.current_state(1).unwrap();

    assert_eq!(rent_rows(&engine, &id).len(), 1);
    assert_eq!(engine.client(1, &id).unwrap().checking_balance, Money::from_units(4_000));
}

#[test]
fn clients_without_rent_are_skipped() {
    let (mut engine, clock) = build(1);
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Sol", Money::from_units(900)).unwrap();

    clock.advance(Duration::minutes(60));
    engine.current_state(1).unwrap();

    assert!(rent_rows(&engine, &client.client_id).is_empty());
    assert_eq!(engine.client(1, &client.client_id).unwrap().checking_balance, Money::from_units(900));
}
