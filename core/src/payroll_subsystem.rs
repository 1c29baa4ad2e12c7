//! Payroll subsystem: pays every job assignment that has come due.
//!
//! One pay period is `annual_salary * pay_cycle_days / payroll_days_basis`.
//! An assignment is paid at most once per call; during catch-up the
//! advancer calls once per boundary, so a long absence pays every
//! period that fell inside it.
//!
//! Execution: second in the day cascade.

use crate::{
    config::{JobConfig, SimConfig},
    error::SimResult,
    event::SimEvent,
    model::{Transaction, TransactionKind},
    money::Money,
    rng::SubsystemRng,
    store::SimStore,
    subsystem::{DayContext, DaySubsystem},
    types::{GameDay, SlotId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub struct PayrollSubsystem;

/// Gross pay for one cycle of `job`.
pub fn period_pay(job: &JobConfig, days_basis: i64) -> Money {
    let gross = job.annual_salary.amount() * Decimal::from(job.pay_cycle_days);
    Money::round(gross / Decimal::from(days_basis))
}

/// Credit every assignment whose `next_payday` is at or before `game_day`.
pub fn run_payroll(
    store: &SimStore,
    config: &SimConfig,
    slot_id: SlotId,
    game_day: f64,
    at: DateTime<Utc>,
) -> SimResult<Vec<Transaction>> {
    let day = game_day.floor() as GameDay;
    let mut paid = Vec::new();

    for assignment in store.job_assignments_for_slot(slot_id)? {
        if assignment.next_payday > game_day {
            continue;
        }
        let Some(job) = config.job(&assignment.job_id) else {
            log::warn!(
                "slot={slot_id} assignment {} references unknown job '{}'",
                assignment.assignment_id,
                assignment.job_id
            );
            continue;
        };

        let pay = period_pay(job, config.constants.payroll_days_basis);
        let mut client = store.require_client(slot_id, &assignment.client_id)?;
        client.checking_balance += pay;
        store.save_client(&client)?;

        let tx = Transaction::new(&client, TransactionKind::PayrollDeposit, pay, day, at);
        store.insert_transaction(&tx)?;
        store.set_next_payday(&assignment.assignment_id, game_day + job.pay_cycle_days as f64)?;

        log::debug!("day={day} payroll: {} paid {pay} ({})", client.client_id, job.title);
        paid.push(tx);
    }
    Ok(paid)
}

impl DaySubsystem for PayrollSubsystem {
    fn name(&self) -> &'static str {
        "payroll"
    }

    fn on_day(
        &self,
        ctx: &mut DayContext<'_>,
        day: GameDay,
        _rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let paid = run_payroll(ctx.store, ctx.config, ctx.state.slot_id, day as f64, ctx.observed_at)?;
        Ok(paid.iter().map(SimEvent::from).collect())
    }
}
