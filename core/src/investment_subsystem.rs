//! Investment subsystem: the slot's index-fund position.
//!
//! Growth and dividends are annual. Each is guarded by its own marker
//! day on the slot (`next_growth_day`, `next_dividend_day`), so a year
//! end is applied at most once however often the slot is observed.
//! Both are computed on the invested amount as it stood when the year
//! closed; growth is posted first.
//!
//! Execution: first in the day cascade, on every boundary `d` with
//!   `(d + 1) % days_per_year == 0`.

use crate::{
    config::SimConstants,
    error::{SimError, SimResult},
    event::SimEvent,
    model::{InvestmentEvent, InvestmentEventKind, SlotState},
    money::Money,
    rng::SubsystemRng,
    subsystem::{DayContext, DaySubsystem},
    types::GameDay,
};
use chrono::{DateTime, Utc};

pub struct InvestmentSubsystem;

/// True when `day` is the last day of a simulated year.
pub fn is_year_end(day: GameDay, days_per_year: i64) -> bool {
    (day + 1) % days_per_year == 0
}

fn event(
    state: &SlotState,
    constants: &SimConstants,
    kind: InvestmentEventKind,
    amount: Money,
    day: GameDay,
    at: DateTime<Utc>,
) -> InvestmentEvent {
    InvestmentEvent {
        slot_id: state.slot_id,
        kind,
        asset: constants.investment_asset.clone(),
        amount,
        game_day: day,
        created_at: at,
    }
}

/// Compound one year of growth into the invested amount.
/// Always moves the growth marker one year past `day`.
pub fn process_growth(
    state: &mut SlotState,
    constants: &SimConstants,
    day: GameDay,
    at: DateTime<Utc>,
) -> Option<InvestmentEvent> {
    state.next_growth_day = day + constants.days_per_year;
    if !state.invested_amount.is_positive() {
        return None;
    }
    let growth = state.invested_amount.apply_rate(constants.annual_growth_rate);
    state.invested_amount += growth;
    Some(event(state, constants, InvestmentEventKind::Growth, growth, day, at))
}

/// Pay one year of dividends into liquid cash.
/// Always moves the dividend marker one year past `day`.
pub fn process_dividend(
    state: &mut SlotState,
    constants: &SimConstants,
    day: GameDay,
    at: DateTime<Utc>,
) -> Option<InvestmentEvent> {
    let basis = state.invested_amount;
    pay_dividend(state, constants, basis, day, at)
}

fn pay_dividend(
    state: &mut SlotState,
    constants: &SimConstants,
    basis: Money,
    day: GameDay,
    at: DateTime<Utc>,
) -> Option<InvestmentEvent> {
    state.next_dividend_day = day + constants.days_per_year;
    if !basis.is_positive() {
        return None;
    }
    let dividend = basis.apply_rate(constants.annual_dividend_rate);
    state.liquid_cash += dividend;
    Some(event(state, constants, InvestmentEventKind::Dividend, dividend, day, at))
}

/// Apply whatever year-end effects are still due on `day`.
pub fn close_year(
    state: &mut SlotState,
    constants: &SimConstants,
    day: GameDay,
    at: DateTime<Utc>,
) -> Vec<InvestmentEvent> {
    if !is_year_end(day, constants.days_per_year) {
        return Vec::new();
    }
    let basis = state.invested_amount;
    let mut posted = Vec::new();
    if day >= state.next_growth_day {
        posted.extend(process_growth(state, constants, day, at));
    }
    if day >= state.next_dividend_day {
        posted.extend(pay_dividend(state, constants, basis, day, at));
    }
    posted
}

/// Move cash into the fund.
pub fn invest(
    state: &mut SlotState,
    constants: &SimConstants,
    amount: Money,
    at: DateTime<Utc>,
) -> SimResult<InvestmentEvent> {
    if !amount.is_positive() {
        return Err(SimError::validation("investment amount must be positive"));
    }
    if amount > state.liquid_cash {
        return Err(SimError::InsufficientFunds {
            needed: amount,
            available: state.liquid_cash,
        });
    }
    state.liquid_cash = state.liquid_cash - amount;
    state.invested_amount += amount;
    let day = state.current_day();
    Ok(event(state, constants, InvestmentEventKind::Invest, amount, day, at))
}

/// Move money out of the fund back into cash.
pub fn divest(
    state: &mut SlotState,
    constants: &SimConstants,
    amount: Money,
    at: DateTime<Utc>,
) -> SimResult<InvestmentEvent> {
    if !amount.is_positive() {
        return Err(SimError::validation("divestment amount must be positive"));
    }
    if amount > state.invested_amount {
        return Err(SimError::OverDivestment {
            requested: amount,
            invested: state.invested_amount,
        });
    }
    state.invested_amount = state.invested_amount - amount;
    state.liquid_cash += amount;
    let day = state.current_day();
    Ok(event(state, constants, InvestmentEventKind::Divest, amount, day, at))
}

impl DaySubsystem for InvestmentSubsystem {
    fn name(&self) -> &'static str {
        "investment"
    }

    fn on_day(
        &self,
        ctx: &mut DayContext<'_>,
        day: GameDay,
        _rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let posted = close_year(ctx.state, &ctx.config.constants, day, ctx.observed_at);
        let mut events = Vec::with_capacity(posted.len());
        for ev in &posted {
            ctx.store.insert_investment_event(ev)?;
            log::debug!("day={day} investment: {} {}", ev.kind, ev.amount);
            events.push(SimEvent::from(ev));
        }
        Ok(events)
    }
}
