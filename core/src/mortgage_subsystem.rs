//! Mortgage lifecycle: applications, decisions, and the repayment
//! sub-state of accepted loans.
//!
//! An application snapshots the slot's mortgage rate and sits PENDING
//! until it is decided exactly once. Acceptance takes the down payment
//! from the client's checking account, transfers the property, and
//! adds the monthly payment to the client's mandatory obligations.
//!
//! Nothing here runs on the day cascade. No engine decides when a
//! payment is due or missed; collaborators report repayment events
//! through `apply_repayment_event`.

use crate::{
    config::SimConfig,
    error::{SimError, SimResult},
    model::{
        ClientAccount, MortgagePosition, MortgageStatus, PropertyStatus, RepaymentState,
        SlotState, Transaction, TransactionKind,
    },
    money::Money,
    store::SimStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened to an accepted mortgage's repayments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentEvent {
    Missed,
    CaughtUp,
    Repossess,
    FinalPayment,
}

/// The repayment state machine. Terminal states accept nothing.
pub fn next_repayment_state(
    current: RepaymentState,
    event: RepaymentEvent,
) -> SimResult<RepaymentState> {
    use RepaymentEvent as E;
    use RepaymentState as S;
    match (current, event) {
        (S::Current, E::Missed) | (S::Delinquent, E::Missed) => Ok(S::Delinquent),
        (S::Delinquent, E::CaughtUp) => Ok(S::Current),
        (S::Delinquent, E::Repossess) => Ok(S::Repossessed),
        (S::Current, E::FinalPayment) => Ok(S::PaidOff),
        (state, event) => Err(SimError::validation(format!(
            "repayment event {event:?} is not allowed while {state}"
        ))),
    }
}

/// Level monthly payment: the loan spread evenly over the term.
pub fn monthly_payment(loan: Money, term_years: u32) -> Money {
    loan.split(i64::from(term_years) * 12)
}

/// Recompute and store a client's mandatory monthly obligations:
/// rent plus every mortgage still being repaid.
pub fn refresh_mandatory_obligations(
    store: &SimStore,
    client: &mut ClientAccount,
) -> SimResult<Money> {
    let mortgages = store.accepted_mortgage_payments(&client.client_id)?;
    client.cached_monthly_mandatory = client.cached_monthly_rent + mortgages;
    store.save_client(client)?;
    Ok(client.cached_monthly_mandatory)
}

/// A client's request to finance a listed property.
#[derive(Debug, Clone)]
pub struct MortgageApplication {
    pub client_id: String,
    pub property_id: String,
    pub down_payment: Money,
    pub term_years: u32,
}

pub fn create_mortgage(
    store: &SimStore,
    config: &SimConfig,
    state: &SlotState,
    application: &MortgageApplication,
    at: DateTime<Utc>,
) -> SimResult<MortgagePosition> {
    let (down_payment, term_years) = (application.down_payment, application.term_years);
    let c = &config.constants;
    if term_years < c.min_term_years || term_years > c.max_term_years {
        return Err(SimError::validation(format!(
            "term must be between {} and {} years",
            c.min_term_years, c.max_term_years
        )));
    }
    if down_payment.is_negative() {
        return Err(SimError::validation("down payment cannot be negative"));
    }

    let client = store.require_client(state.slot_id, &application.client_id)?;
    let property = store
        .property(state.slot_id, &application.property_id)?
        .ok_or_else(|| SimError::not_found("Property", &application.property_id))?;
    if property.status != PropertyStatus::Available {
        return Err(SimError::Unavailable { property_id: property.property_id });
    }
    if down_payment > property.price {
        return Err(SimError::validation("down payment cannot exceed the property price"));
    }

    let mortgage = MortgagePosition {
        mortgage_id: uuid::Uuid::new_v4().to_string(),
        slot_id: state.slot_id,
        client_id: client.client_id,
        property_id: property.property_id,
        property_price: property.price,
        down_payment,
        loan_amount: property.price - down_payment,
        interest_rate: state.mortgage_rate,
        term_years,
        status: MortgageStatus::Pending,
        repayment: None,
        monthly_payment: None,
        next_payment_day: None,
        missed_payments: 0,
        created_at: at,
        updated_at: at,
    };
    store.insert_mortgage(&mortgage)?;
    Ok(mortgage)
}

/// Decide a pending mortgage. Returns the decided mortgage and the
/// down-payment transaction, if one was taken.
pub fn update_status(
    store: &SimStore,
    config: &SimConfig,
    state: &SlotState,
    mortgage_id: &str,
    status: MortgageStatus,
    at: DateTime<Utc>,
) -> SimResult<(MortgagePosition, Option<Transaction>)> {
    let mut mortgage = store
        .mortgage(state.slot_id, mortgage_id)?
        .ok_or_else(|| SimError::not_found("Mortgage", mortgage_id))?;
    if mortgage.status != MortgageStatus::Pending {
        return Err(SimError::AlreadyProcessed { mortgage_id: mortgage.mortgage_id });
    }
    let mut property = store
        .property(state.slot_id, &mortgage.property_id)?
        .ok_or_else(|| SimError::not_found("Property", &mortgage.property_id))?;

    let mut down_payment_tx = None;
    match status {
        MortgageStatus::Accepted => {
            if property.status != PropertyStatus::Available {
                return Err(SimError::Unavailable { property_id: property.property_id });
            }
            let mut client = store.require_client(state.slot_id, &mortgage.client_id)?;
            let day = state.current_day();

            if mortgage.down_payment.is_positive() {
                if mortgage.down_payment > client.checking_balance {
                    return Err(SimError::InsufficientFunds {
                        needed: mortgage.down_payment,
                        available: client.checking_balance,
                    });
                }
                client.checking_balance = client.checking_balance - mortgage.down_payment;
                store.save_client(&client)?;
                let tx = Transaction::new(
                    &client,
                    TransactionKind::MortgageDownPayment,
                    mortgage.down_payment,
                    day,
                    at,
                );
                store.insert_transaction(&tx)?;
                down_payment_tx = Some(tx);
            }

            property.status = PropertyStatus::Owned;
            property.owner_client_id = Some(client.client_id.clone());
            store.save_property(&property)?;

            mortgage.monthly_payment = Some(monthly_payment(mortgage.loan_amount, mortgage.term_years));
            mortgage.next_payment_day = Some(day + config.constants.repayment_period_days);
            mortgage.repayment = Some(RepaymentState::Current);
            mortgage.status = MortgageStatus::Accepted;
            mortgage.updated_at = at;
            store.save_mortgage(&mortgage)?;

            refresh_mandatory_obligations(store, &mut client)?;
        }
        MortgageStatus::Rejected => {
            if property.status == PropertyStatus::Available {
                property.status = PropertyStatus::Removed;
                store.save_property(&property)?;
            }
            mortgage.status = MortgageStatus::Rejected;
            mortgage.updated_at = at;
            store.save_mortgage(&mortgage)?;
        }
        MortgageStatus::Pending => {
            return Err(SimError::validation("a mortgage can only be accepted or rejected"));
        }
    }

    log::info!(
        "slot={} mortgage {} {} (loan {}, {} years)",
        state.slot_id,
        mortgage.mortgage_id,
        mortgage.status,
        mortgage.loan_amount,
        mortgage.term_years
    );
    Ok((mortgage, down_payment_tx))
}

pub fn apply_repayment_event(
    store: &SimStore,
    state: &SlotState,
    mortgage_id: &str,
    event: RepaymentEvent,
    at: DateTime<Utc>,
) -> SimResult<MortgagePosition> {
    let mut mortgage = store
        .mortgage(state.slot_id, mortgage_id)?
        .ok_or_else(|| SimError::not_found("Mortgage", mortgage_id))?;
    let current = match (mortgage.status, mortgage.repayment) {
        (MortgageStatus::Accepted, Some(current)) => current,
        _ => {
            return Err(SimError::validation(format!(
                "mortgage '{mortgage_id}' is not being repaid"
            )))
        }
    };

    let next = next_repayment_state(current, event)?;
    match event {
        RepaymentEvent::Missed => mortgage.missed_payments += 1,
        RepaymentEvent::CaughtUp => mortgage.missed_payments = 0,
        RepaymentEvent::Repossess | RepaymentEvent::FinalPayment => {
            mortgage.next_payment_day = None;
        }
    }
    mortgage.repayment = Some(next);
    mortgage.updated_at = at;
    store.save_mortgage(&mortgage)?;

    if matches!(next, RepaymentState::Repossessed | RepaymentState::PaidOff) {
        let mut client = store.require_client(state.slot_id, &mortgage.client_id)?;
        refresh_mandatory_obligations(store, &mut client)?;
    }
    log::debug!("slot={} mortgage {mortgage_id}: {current} -> {next}", state.slot_id);
    Ok(mortgage)
}
