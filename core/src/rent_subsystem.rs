//! Rent subsystem: debits each renter on the first day of a rent month.
//!
//! A renter short of funds pays what they have and the debit is
//! recorded as PAYMENT_FAILED. Balances never go negative.
//!
//! Execution: third in the day cascade.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    model::{Transaction, TransactionKind},
    rng::SubsystemRng,
    store::SimStore,
    subsystem::{DayContext, DaySubsystem},
    types::{GameDay, SlotId},
};
use chrono::{DateTime, Utc};

pub struct RentSubsystem;

/// 1-based day within the rent month.
pub fn day_of_month(day: GameDay, cycle_days: i64) -> i64 {
    day.rem_euclid(cycle_days) + 1
}

pub fn charge_rent(
    store: &SimStore,
    config: &SimConfig,
    slot_id: SlotId,
    game_day: f64,
    at: DateTime<Utc>,
) -> SimResult<Vec<Transaction>> {
    let day = game_day.floor() as GameDay;
    if day_of_month(day, config.constants.rent_cycle_days) != 1 {
        return Ok(Vec::new());
    }

    let mut charged = Vec::new();
    for mut client in store.clients_for_slot(slot_id)? {
        let rent = client.cached_monthly_rent;
        if !rent.is_positive() {
            continue;
        }
        if store.transaction_exists(&client.client_id, TransactionKind::RentPayment, day)?
            || store.transaction_exists(&client.client_id, TransactionKind::PaymentFailed, day)?
        {
            continue;
        }

        let paid = rent.min(client.checking_balance);
        client.checking_balance = client.checking_balance - paid;
        store.save_client(&client)?;

        let kind = if paid >= rent {
            TransactionKind::RentPayment
        } else {
            log::debug!("day={day} rent: {} short, paid {paid} of {rent}", client.client_id);
            TransactionKind::PaymentFailed
        };
        let tx = Transaction::new(&client, kind, paid, day, at);
        store.insert_transaction(&tx)?;
        charged.push(tx);
    }
    Ok(charged)
}

impl DaySubsystem for RentSubsystem {
    fn name(&self) -> &'static str {
        "rent"
    }

    fn on_day(
        &self,
        ctx: &mut DayContext<'_>,
        day: GameDay,
        _rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let charged = charge_rent(ctx.store, ctx.config, ctx.state.slot_id, day as f64, ctx.observed_at)?;
        Ok(charged.iter().map(SimEvent::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_month_starts_every_cycle() {
        assert_eq!(day_of_month(0, 30), 1);
        assert_eq!(day_of_month(29, 30), 30);
        assert_eq!(day_of_month(30, 30), 1);
        assert_eq!(day_of_month(61, 30), 2);
    }
}
