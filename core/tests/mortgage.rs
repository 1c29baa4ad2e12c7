//! Mortgages: application checks, the one-time decision, and repayment
//! state changes reported from outside the day cascade.

use banksim_core::{
    clock::ManualClock,
    engine::SimEngine,
    error::SimError,
    model::{MortgageStatus, PropertyStatus, RepaymentState, TransactionKind},
    money::Money,
    mortgage_subsystem::{MortgageApplication, RepaymentEvent},
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

fn build(seed: u64) -> (SimEngine, ManualClock) {
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let engine = SimEngine::build_test(seed, clock.clone()).expect("build test engine");
    (engine, clock)
}

/// A client with `balance` in checking and a 250000.00 listing.
fn buyer(engine: &mut SimEngine, balance: i64) -> (String, String) {
    engine.reset_slot(1).unwrap();
    let client = engine.onboard_client(1, "Noor", Money::from_units(balance)).unwrap();
    let property = engine.list_property(1, "12 Maple St", Money::from_units(250_000)).unwrap();
    (client.client_id, property.property_id)
}

fn application(client_id: &str, property_id: &str, down: i64, years: u32) -> MortgageApplication {
    MortgageApplication {
        client_id: client_id.to_string(),
        property_id: property_id.to_string(),
        down_payment: Money::from_units(down),
        term_years: years,
    }
}

#[test]
fn applications_are_validated() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);

    for years in [4, 31] {
        let err = engine.create_mortgage(1, &application(&client, &property, 50_000, years)).unwrap_err();
        assert!(matches!(err, SimError::Validation(_)), "{err}");
    }
    let err = engine.create_mortgage(1, &application(&client, &property, -1, 25)).unwrap_err();
    assert!(matches!(err, SimError::Validation(_)), "{err}");
    let err = engine.create_mortgage(1, &application(&client, &property, 250_001, 25)).unwrap_err();
    assert!(matches!(err, SimError::Validation(_)), "{err}");
    let err = engine.create_mortgage(1, &application(&client, "no-such-home", 50_000, 25)).unwrap_err();
    assert!(matches!(err, SimError::NotFound { kind: "Property", .. }), "{err}");

    assert!(engine.mortgages(1).unwrap().is_empty());
}

#[test]
fn application_snapshots_terms_and_waits_for_a_decision() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);

    let mortgage = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();

    assert_eq!(mortgage.status, MortgageStatus::Pending);
    assert_eq!(mortgage.loan_amount, Money::from_units(200_000));
    assert_eq!(mortgage.interest_rate, Decimal::new(5, 2));
    assert_eq!(mortgage.repayment, None);
    assert_eq!(engine.property(1, &property).unwrap().status, PropertyStatus::Available);
    assert_eq!(engine.client(1, &client).unwrap().checking_balance, Money::from_units(60_000));
}

#[test]
fn acceptance_takes_the_down_payment_and_transfers_the_property() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);
    let pending = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();

    let accepted = engine
        .update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Accepted)
        .unwrap();

    assert_eq!(accepted.status, MortgageStatus::Accepted);
    assert_eq!(accepted.repayment, Some(RepaymentState::Current));
    assert_eq!(accepted.monthly_payment, Some("666.67".parse().unwrap()));
    assert_eq!(accepted.next_payment_day, Some(1));

    let owner = engine.client(1, &client).unwrap();
    assert_eq!(owner.checking_balance, Money::from_units(10_000));
    assert_eq!(owner.cached_monthly_mandatory, "666.67".parse().unwrap());

    let home = engine.property(1, &property).unwrap();
    assert_eq!(home.status, PropertyStatus::Owned);
    assert_eq!(home.owner_client_id.as_deref(), Some(client.as_str()));

    let down: Vec<_> = engine
        .transactions(1, &client)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::MortgageDownPayment)
        .collect();
    assert_eq!(down.len(), 1);
    assert_eq!(down[0].amount, Money::from_units(50_000));
}

#[test]
fn a_mortgage_is_decided_only_once() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);
    let pending = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();

    let err = engine
        .update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Pending)
        .unwrap_err();
    assert!(matches!(err, SimError::Validation(_)), "{err}");

    engine.update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Accepted).unwrap();
    for status in [MortgageStatus::Accepted, MortgageStatus::Rejected] {
        let err = engine.update_mortgage_status(1, &pending.mortgage_id, status).unwrap_err();
        assert!(matches!(err, SimError::AlreadyProcessed { .. }), "{err}");
    }
    assert_eq!(engine.client(1, &client).unwrap().checking_balance, Money::from_units(10_000));
}

#[test]
fn rejection_removes_the_listing() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);
    let pending = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();

    let rejected = engine
        .update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Rejected)
        .unwrap();

    assert_eq!(rejected.status, MortgageStatus::Rejected);
    assert_eq!(rejected.repayment, None);
    assert_eq!(engine.property(1, &property).unwrap().status, PropertyStatus::Removed);
    assert_eq!(engine.client(1, &client).unwrap().checking_balance, Money::from_units(60_000));

    let err = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap_err();
    assert!(matches!(err, SimError::Unavailable { .. }), "{err}");
}

#[test]
fn short_down_payment_leaves_everything_pending() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 20_000);
    let pending = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();

    let err = engine
        .update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Accepted)
        .unwrap_err();
    assert!(matches!(err, SimError::InsufficientFunds { .. }), "{err}");

    assert_eq!(engine.mortgages(1).unwrap()[0].status, MortgageStatus::Pending);
    assert_eq!(engine.property(1, &property).unwrap().status, PropertyStatus::Available);
    assert_eq!(engine.client(1, &client).unwrap().checking_balance, Money::from_units(20_000));
}

#[test]
fn repayment_events_walk_the_state_machine() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);
    let pending = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();

    let err = engine.apply_repayment_event(1, &pending.mortgage_id, RepaymentEvent::Missed).unwrap_err();
    assert!(matches!(err, SimError::Validation(_)), "{err}");

    engine.update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Accepted).unwrap();
    let id = pending.mortgage_id.as_str();

    let m = engine.apply_repayment_event(1, id, RepaymentEvent::Missed).unwrap();
    assert_eq!((m.repayment, m.missed_payments), (Some(RepaymentState::Delinquent), 1));
    let m = engine.apply_repayment_event(1, id, RepaymentEvent::Missed).unwrap();
    assert_eq!((m.repayment, m.missed_payments), (Some(RepaymentState::Delinquent), 2));
    let m = engine.apply_repayment_event(1, id, RepaymentEvent::CaughtUp).unwrap();
    assert_eq!((m.repayment, m.missed_payments), (Some(RepaymentState::Current), 0));

    let err = engine.apply_repayment_event(1, id, RepaymentEvent::Repossess).unwrap_err();
    assert!(matches!(err, SimError::Validation(_)), "{err}");

    let m = engine.apply_repayment_event(1, id, RepaymentEvent::FinalPayment).unwrap();
    assert_eq!(m.repayment, Some(RepaymentState::PaidOff));
    assert_eq!(m.next_payment_day, None);
    assert_eq!(engine.client(1, &client).unwrap().cached_monthly_mandatory, Money::ZERO);

    let err = engine.apply_repayment_event(1, id, RepaymentEvent::Missed).unwrap_err();
    assert!(matches!(err, SimError::Validation(_)), "{err}");
}

#[test]
fn repossession_drops_the_payment_from_obligations() {
    let (mut engine, _clock) = build(1);
    let (client, property) = buyer(&mut engine, 60_000);
    engine.set_client_rent(1, &client, Money::from_units(800)).unwrap();
    let pending = engine.create_mortgage(1, &application(&client, &property, 50_000, 25)).unwrap();
    engine.update_mortgage_status(1, &pending.mortgage_id, MortgageStatus::Accepted).unwrap();
    assert_eq!(engine.client(1, &client).unwrap().cached_monthly_mandatory, "1466.67".parse().unwrap());

    let id = pending.mortgage_id.as_str();
    engine.apply_repayment_event(1, id, RepaymentEvent::Missed).unwrap();
    let m = engine.apply_repayment_event(1, id, RepaymentEvent::Repossess).unwrap();

    assert_eq!(m.repayment, Some(RepaymentState::Repossessed));
    assert_eq!(engine.client(1, &client).unwrap().cached_monthly_mandatory, Money::from_units(800));
}
