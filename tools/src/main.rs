//! sim-runner: headless driver for the banking slot simulation.
//!
//! Seeds one slot with a few clients, then walks a simulated clock
//! forward one game day at a time and prints where the slot ended up.
//!
//! Usage:
//!   sim-runner --seed 12345 --days 36 --db run.db --data-dir ./data

use anyhow::{Context, Result};
use banksim_core::{
    clock::{ManualClock, RealClock},
    config::SimConfig,
    engine::SimEngine,
    model::{MortgageStatus, TransactionKind},
    money::Money,
    mortgage_subsystem::MortgageApplication,
    store::SimStore,
    types::SlotId,
};
use chrono::{TimeZone, Utc};
use std::{collections::BTreeMap, env};

const DEMO_SLOT: SlotId = 1;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let days = parse_arg(&args, "--days", 36i64);
    let db = str_arg(&args, "--db", ":memory:");
    let data_dir = str_arg(&args, "--data-dir", "./data");

    println!("Banking slot simulation: sim-runner");
    println!("  seed:      {seed}");
    println!("  days:      {days}");
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let config = SimConfig::load(data_dir)
        .with_context(|| format!("loading configuration from {data_dir}"))?;
    let store = if db == ":memory:" {
        SimStore::in_memory()?
    } else {
        SimStore::open(db)?
    };
    store.migrate()?;

    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .context("invalid start date")?;
    let clock = ManualClock::starting_at(start);
    let mut engine = SimEngine::build(config, store, seed, Box::new(clock.clone()));

    seed_demo_slot(&mut engine)?;

    let one_day = engine.game_clock().real_duration_of(1.0);
    for _ in 0..days {
        clock.advance(one_day);
        let advanced = engine.advance_with_events(DEMO_SLOT, clock.now())?;
        log::debug!(
            "day {:.0}: {} events, cash {}",
            advanced.state.game_day,
            advanced.events.len(),
            advanced.state.liquid_cash
        );
    }

    print_summary(&mut engine, days)?;
    Ok(())
}

fn seed_demo_slot(engine: &mut SimEngine) -> Result<()> {
    engine.reset_slot(DEMO_SLOT)?;
    engine.invest(DEMO_SLOT, Money::from_units(10_000))?;

    let ada = engine.onboard_client(DEMO_SLOT, "Ada Ferreira", Money::from_units(2_500))?;
    engine.assign_job(DEMO_SLOT, &ada.client_id, "engineer", true)?;
    engine.set_client_rent(DEMO_SLOT, &ada.client_id, Money::from_units(1_800))?;

    let bo = engine.onboard_client(DEMO_SLOT, "Bo Lindqvist", Money::from_units(400))?;
    engine.assign_job(DEMO_SLOT, &bo.client_id, "barista", true)?;
    engine.set_client_rent(DEMO_SLOT, &bo.client_id, Money::from_units(1_100))?;

    let cy = engine.onboard_client(DEMO_SLOT, "Cy Okafor", Money::from_units(60_000))?;
    engine.assign_job(DEMO_SLOT, &cy.client_id, "nurse", true)?;
    let home = engine.list_property(DEMO_SLOT, "12 Harbor Lane", Money::from_units(250_000))?;
    let mortgage = engine.create_mortgage(
        DEMO_SLOT,
        &MortgageApplication {
            client_id: cy.client_id.clone(),
            property_id: home.property_id,
            down_payment: Money::from_units(50_000),
            term_years: 25,
        },
    )?;
    engine.update_mortgage_status(DEMO_SLOT, &mortgage.mortgage_id, MortgageStatus::Accepted)?;
    Ok(())
}

fn print_summary(engine: &mut SimEngine, days: i64) -> Result<()> {
    let state = engine.current_state(DEMO_SLOT)?;
    let clients = engine.clients(DEMO_SLOT)?;

    let mut by_kind: BTreeMap<&'static str, (usize, Money)> = BTreeMap::new();
    for tx in engine.store().transactions_for_slot(DEMO_SLOT)? {
        let entry = by_kind.entry(tx.kind.as_str()).or_default();
        entry.0 += 1;
        entry.1 += tx.amount;
    }
    let events = engine.store().events_for_slot(DEMO_SLOT)?.len();

    println!("=== SLOT SUMMARY ===");
    println!("  slot:           {DEMO_SLOT}");
    println!("  days run:       {days}");
    println!("  game day:       {:.2}", state.game_day);
    println!("  liquid cash:    {}", state.liquid_cash);
    println!("  invested:       {}", state.invested_amount);
    println!("  total assets:   {}", state.total_assets());
    println!("  next growth:    day {}", state.next_growth_day);
    println!("  next dividend:  day {}", state.next_dividend_day);
    println!("  events logged:  {events}");
    println!();

    println!("=== CLIENTS ===");
    for c in &clients {
        println!(
            "  {:<16} balance {:>12}  mandatory {:>10}",
            c.name, c.checking_balance, c.cached_monthly_mandatory
        );
    }
    println!();

    println!("=== LEDGER ===");
    for (kind, (count, total)) in &by_kind {
        println!("  {kind:<22} {count:>5} txns  {total:>12}");
    }
    let failed = by_kind
        .get(TransactionKind::PaymentFailed.as_str())
        .map_or(0, |(n, _)| *n);
    if failed > 0 {
        println!();
        println!("  {failed} rent payment(s) failed for lack of funds");
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}
