//! Spending subsystem: randomized discretionary spending per client.
//!
//! Spending is driven by disposable income (monthly income less
//! mandatory obligations). Each active category independently fires
//! on a given day with `spending_trigger_chance`; one game day is one
//! month, so a fired category spends its monthly share in one go.
//!
//! A client is charged at most once per day: if any SPENDING row
//! already exists for (client, day), nothing happens and no randomness
//! is consumed.
//!
//! Execution: last in the day cascade, clients in creation order. Each
//! client draws from its own stream seeded by (slot, day, creation
//! index), so changing one client's finances never moves another
//! client's rolls.

use crate::{
    config::{SimConfig, SpendingCategoryConfig},
    error::{SimError, SimResult},
    event::SimEvent,
    model::{ClientAccount, Transaction, TransactionKind},
    money::Money,
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    store::SimStore,
    subsystem::{DayContext, DaySubsystem},
    types::{GameDay, SlotId},
};
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::FromPrimitive, Decimal};

pub struct SpendingSubsystem {
    rng_bank: RngBank,
}

impl SpendingSubsystem {
    pub fn new(master_seed: u64) -> Self {
        Self { rng_bank: RngBank::new(master_seed) }
    }
}

/// The client's position in creation order within the slot.
pub fn client_index(store: &SimStore, slot_id: SlotId, client_id: &str) -> SimResult<usize> {
    store
        .clients_for_slot(slot_id)?
        .iter()
        .position(|c| c.client_id == client_id)
        .ok_or_else(|| SimError::not_found("Client", client_id))
}

/// Spending stream for one client on one day.
pub fn client_rng(bank: &RngBank, slot_id: SlotId, day: GameDay, client_index: usize) -> SubsystemRng {
    bank.for_client_day(SubsystemSlot::Spending, slot_id, day, client_index)
}

/// The client's cached monthly income, filling the cache from their
/// primary jobs when it has never been set.
pub fn resolve_monthly_income(
    store: &SimStore,
    config: &SimConfig,
    client: &mut ClientAccount,
) -> SimResult<Money> {
    if let Some(income) = client.cached_monthly_income {
        return Ok(income);
    }
    let income: Money = store
        .job_assignments_for_client(&client.client_id)?
        .iter()
        .filter(|a| a.is_primary)
        .filter_map(|a| config.job(&a.job_id))
        .map(|job| job.annual_salary.split(config.constants.days_per_year))
        .sum();
    client.cached_monthly_income = Some(income);
    store.save_client(client)?;
    Ok(income)
}

/// Income left once mandatory obligations are met. Never negative.
pub fn disposable_income(monthly_income: Money, mandatory: Money) -> Money {
    monthly_income.saturating_sub(mandatory)
}

/// Roll one category. Returns the share of disposable income to spend,
/// or `None` if the category does not fire today.
fn roll_category(
    category: &SpendingCategoryConfig,
    trigger_chance: f64,
    rng: &mut SubsystemRng,
) -> Option<f64> {
    if !rng.chance(trigger_chance) {
        return None;
    }
    let mut pct = rng.uniform(category.min_pct_income, category.max_pct_income);
    if category.variability > 0.0 {
        pct *= 1.0 + rng.uniform(-category.variability, category.variability);
    }
    Some(pct.max(0.0))
}

pub fn generate_spending(
    store: &SimStore,
    config: &SimConfig,
    slot_id: SlotId,
    client_id: &str,
    day: GameDay,
    rng: &mut SubsystemRng,
    at: DateTime<Utc>,
) -> SimResult<Vec<Transaction>> {
    let mut client = store.require_client(slot_id, client_id)?;
    if store.transaction_exists(client_id, TransactionKind::Spending, day)? {
        return Ok(Vec::new());
    }

    let income = resolve_monthly_income(store, config, &mut client)?;
    let disposable = disposable_income(income, client.cached_monthly_mandatory);
    if !disposable.is_positive() {
        return Ok(Vec::new());
    }

    let mut spent = Vec::new();
    for category in config.active_spending_categories() {
        let Some(pct) = roll_category(category, config.constants.spending_trigger_chance, rng)
        else {
            continue;
        };
        let target = disposable.amount() * Decimal::from_f64(pct).unwrap_or(Decimal::ZERO);
        let amount = Money::round(target.min(client.checking_balance.amount()));
        if !amount.is_positive() {
            continue;
        }

        client.checking_balance = client.checking_balance - amount;
        store.save_client(&client)?;
        let tx = Transaction::new(&client, TransactionKind::Spending, amount, day, at);
        store.insert_transaction(&tx)?;
        log::debug!("day={day} spending: {} spent {amount} on {}", client.client_id, category.name);
        spent.push(tx);
    }
    Ok(spent)
}

impl DaySubsystem for SpendingSubsystem {
    fn name(&self) -> &'static str {
        "spending"
    }

    fn on_day(
        &self,
        ctx: &mut DayContext<'_>,
        day: GameDay,
        _rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let slot_id = ctx.state.slot_id;
        let mut events = Vec::new();
        for (index, client) in ctx.store.clients_for_slot(slot_id)?.into_iter().enumerate() {
            let mut rng = client_rng(&self.rng_bank, slot_id, day, index);
            let spent = generate_spending(
                ctx.store,
                ctx.config,
                slot_id,
                &client.client_id,
                day,
                &mut rng,
                ctx.observed_at,
            )?;
            events.extend(spent.iter().map(SimEvent::from));
        }
        Ok(events)
    }
}
