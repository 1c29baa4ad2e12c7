//! The simulation engine: lazy, pull-based advancement of slots.
//!
//! EXECUTION ORDER per crossed day (fixed, never reordered):
//!   1. Investment  (year-end growth, then dividend)
//!   2. Payroll
//!   3. Rent
//!   4. Spending    (clients in creation order)
//!
//! RULES:
//!   - Every public operation first catches the slot up to "now".
//!   - Every public operation is one immediate SQLite transaction:
//!     catch-up, mutation and event log commit or roll back together.
//!   - Days are processed strictly ascending, each exactly once.
//!   - All randomness flows through the RngBank, keyed by (slot, day).
//!   - All state changes are recorded in the event log.

use crate::{
    clock::{GameClock, ManualClock, RealClock},
    config::SimConfig,
    error::{SimError, SimResult},
    event::{EventLogEntry, SimEvent},
    investment_subsystem::{self, InvestmentSubsystem},
    model::{
        ActivitySeries, ClientAccount, ClientBalance, InvestmentEvent, JobAssignment, MortgagePosition,
        MortgageStatus, Property, PropertyStatus, SlotState, SlotSummary, Transaction,
        TransactionKind,
    },
    money::Money,
    mortgage_subsystem::{self, MortgageApplication, RepaymentEvent},
    payroll_subsystem::{self, PayrollSubsystem},
    rent_subsystem::{self, RentSubsystem},
    rng::{RngBank, SubsystemSlot},
    spending_subsystem::{self, SpendingSubsystem},
    store::SimStore,
    subsystem::{DayContext, DaySubsystem},
    types::{GameDay, SlotId},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const ENGINE: &str = "engine";

/// A slot after catch-up, plus everything the catch-up did.
#[derive(Debug, Clone)]
pub struct Advanced {
    pub state:  SlotState,
    pub events: Vec<SimEvent>,
}

pub struct SimEngine {
    config:     SimConfig,
    store:      SimStore,
    rng_bank:   RngBank,
    game_clock: GameClock,
    clock:      Box<dyn RealClock>,
    subsystems: Vec<(SubsystemSlot, Box<dyn DaySubsystem>)>,
}

impl SimEngine {
    pub fn new(config: SimConfig, store: SimStore, seed: u64, clock: Box<dyn RealClock>) -> Self {
        Self {
            game_clock: GameClock::new(config.constants.real_ms_per_game_day),
            rng_bank:   RngBank::new(seed),
            subsystems: Vec::new(),
            config,
            store,
            clock,
        }
    }

    /// Build a fully wired engine with all day subsystems registered.
    pub fn build(config: SimConfig, store: SimStore, seed: u64, clock: Box<dyn RealClock>) -> Self {
        let mut engine = SimEngine::new(config, store, seed, clock);
        engine.register(SubsystemSlot::Investment, Box::new(InvestmentSubsystem));
        engine.register(SubsystemSlot::Payroll, Box::new(PayrollSubsystem));
        engine.register(SubsystemSlot::Rent, Box::new(RentSubsystem));
        engine.register(SubsystemSlot::Spending, Box::new(SpendingSubsystem::new(seed)));
        engine
    }

    /// Fully wired engine over a migrated in-memory store and the test
    /// config, driven by `clock`.
    pub fn build_test(seed: u64, clock: ManualClock) -> SimResult<Self> {
        Self::build_test_with(SimConfig::default_test(), seed, clock)
    }

    pub fn build_test_with(config: SimConfig, seed: u64, clock: ManualClock) -> SimResult<Self> {
        let store = SimStore::in_memory()?;
        store.migrate()?;
        Ok(Self::build(config, store, seed, Box::new(clock)))
    }

    /// Register a day subsystem. Call in the documented execution order.
    pub fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn DaySubsystem>) {
        self.subsystems.push((slot, subsystem));
    }

    pub fn store(&self) -> &SimStore {
        &self.store
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn game_clock(&self) -> GameClock {
        self.game_clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Advancement ───────────────────────────────────────────────

    /// Catch the slot up to `now`. Creates the slot if it does not exist.
    pub fn advance(&mut self, slot_id: SlotId, now: DateTime<Utc>) -> SimResult<SlotState> {
        self.advance_with_events(slot_id, now).map(|a| a.state)
    }

    pub fn advance_with_events(&mut self, slot_id: SlotId, now: DateTime<Utc>) -> SimResult<Advanced> {
        self.store.atomically(|| self.advance_locked(slot_id, now))
    }

    /// The slot as of the injected clock's "now".
    pub fn current_state(&mut self, slot_id: SlotId) -> SimResult<SlotState> {
        let now = self.now();
        self.advance(slot_id, now)
    }

    /// Wipe the slot and start it over from the configured starting point.
    pub fn reset_slot(&mut self, slot_id: SlotId) -> SimResult<SlotState> {
        let now = self.now();
        self.store.atomically(|| self.reset_locked(slot_id, now))
    }

    fn reset_locked(&self, slot_id: SlotId, now: DateTime<Utc>) -> SimResult<SlotState> {
        let c = &self.config.constants;
        let previous_version = self.store.load_slot_state(slot_id)?.map(|s| s.version);

        let state = SlotState {
            slot_id,
            liquid_cash:       c.starting_cash,
            invested_amount:   Money::ZERO,
            asset_price:       c.initial_asset_price,
            mortgage_rate:     c.initial_mortgage_rate,
            game_day:          0.0,
            next_dividend_day: c.days_per_year - 1,
            next_growth_day:   c.days_per_year - 1,
            last_observed_at:  Some(now),
            version:           previous_version.map_or(0, |v| v + 1),
            game_ms:           0,
        };
        self.store.replace_slot_state(&state)?;
        self.store.wipe_slot(slot_id)?;

        let reset = SimEvent::SlotReset { slot_id, starting_cash: state.liquid_cash };
        self.log_events(slot_id, 0, ENGINE, std::slice::from_ref(&reset), now)?;
        log::info!("slot={slot_id} reset with {} starting cash", state.liquid_cash);
        Ok(state)
    }

    fn advance_locked(&self, slot_id: SlotId, now: DateTime<Utc>) -> SimResult<Advanced> {
        let mut events = Vec::new();
        let mut state = match self.store.load_slot_state(slot_id)? {
            Some(state) => state,
            None => {
                events.push(SimEvent::SlotReset {
                    slot_id,
                    starting_cash: self.config.constants.starting_cash,
                });
                self.reset_locked(slot_id, now)?
            }
        };

        let step = self.game_clock.advance(state.game_ms, state.last_observed_at, now);
        if step.clamped {
            log::warn!(
                "slot={slot_id} observed at {now}, before last observation {}; clock held",
                step.observed_at
            );
        }

        for day in step.boundaries() {
            events.extend(self.process_day(&mut state, day, step.observed_at)?);
        }

        if step.crossed_any() {
            let day = step.current_whole_day();
            let clients = self.store.reset_daily_withdrawn(slot_id)?;
            let reset = SimEvent::DailyLimitsReset { day, clients };
            self.log_events(slot_id, day, ENGINE, std::slice::from_ref(&reset), step.observed_at)?;
            events.push(reset);
        }

        state.game_ms = step.new_game_ms;
        state.game_day = step.new_game_day();
        state.last_observed_at = Some(step.observed_at);
        self.store.save_slot_state(&mut state)?;
        Ok(Advanced { state, events })
    }

    /// Run every registered subsystem for one whole day.
    fn process_day(
        &self,
        state: &mut SlotState,
        day: GameDay,
        observed_at: DateTime<Utc>,
    ) -> SimResult<Vec<SimEvent>> {
        let slot_id = state.slot_id;
        let started = SimEvent::DayStarted { day };
        self.log_events(slot_id, day, ENGINE, std::slice::from_ref(&started), observed_at)?;
        let mut day_events = vec![started];

        for (slot, subsystem) in &self.subsystems {
            let mut rng = self.rng_bank.for_day(*slot, slot_id, day);
            let mut ctx = DayContext {
                store: &self.store,
                config: &self.config,
                state: &mut *state,
                observed_at,
            };
            let new_events = subsystem.on_day(&mut ctx, day, &mut rng)?;
            self.log_events(slot_id, day, subsystem.name(), &new_events, observed_at)?;
            day_events.extend(new_events);
        }

        log::debug!("slot={slot_id} day={day} processed ({} events)", day_events.len() - 1);
        Ok(day_events)
    }

    fn log_events(
        &self,
        slot_id: SlotId,
        day: GameDay,
        subsystem: &str,
        events: &[SimEvent],
        at: DateTime<Utc>,
    ) -> SimResult<()> {
        for event in events {
            let entry = EventLogEntry {
                id:         None,
                slot_id,
                game_day:   day,
                subsystem:  subsystem.to_string(),
                event_type: event.type_name().to_string(),
                payload:    serde_json::to_string(event)?,
            };
            self.store.append_event(&entry, at)?;
        }
        Ok(())
    }

    fn log_transactions(&self, subsystem: &str, txs: &[Transaction], at: DateTime<Utc>) -> SimResult<()> {
        for tx in txs {
            self.log_events(tx.slot_id, tx.game_day, subsystem, &[SimEvent::from(tx)], at)?;
        }
        Ok(())
    }

    // ── Investment ────────────────────────────────────────────────

    pub fn invest(&mut self, slot_id: SlotId, amount: Money) -> SimResult<SlotState> {
        let now = self.now();
        self.store.atomically(|| {
            let mut state = self.advance_locked(slot_id, now)?.state;
            let ev = investment_subsystem::invest(&mut state, &self.config.constants, amount, now)?;
            self.record_investment(&mut state, &ev, now)?;
            Ok(state)
        })
    }

    pub fn divest(&mut self, slot_id: SlotId, amount: Money) -> SimResult<SlotState> {
        let now = self.now();
        self.store.atomically(|| {
            let mut state = self.advance_locked(slot_id, now)?.state;
            let ev = investment_subsystem::divest(&mut state, &self.config.constants, amount, now)?;
            self.record_investment(&mut state, &ev, now)?;
            Ok(state)
        })
    }

    fn record_investment(
        &self,
        state: &mut SlotState,
        ev: &InvestmentEvent,
        now: DateTime<Utc>,
    ) -> SimResult<()> {
        self.store.insert_investment_event(ev)?;
        self.store.save_slot_state(state)?;
        self.log_events(state.slot_id, ev.game_day, "investment", &[SimEvent::from(ev)], now)
    }

    // ── Day cascade entry points ──────────────────────────────────

    /// Pay every assignment due at `game_day`.
    pub fn run_payroll(&mut self, slot_id: SlotId, game_day: f64) -> SimResult<Vec<Transaction>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            let paid = payroll_subsystem::run_payroll(&self.store, &self.config, slot_id, game_day, now)?;
            self.log_transactions("payroll", &paid, now)?;
            Ok(paid)
        })
    }

    /// Charge rent if `game_day` starts a rent month.
    pub fn charge_rent(&mut self, slot_id: SlotId, game_day: f64) -> SimResult<Vec<Transaction>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            let charged = rent_subsystem::charge_rent(&self.store, &self.config, slot_id, game_day, now)?;
            self.log_transactions("rent", &charged, now)?;
            Ok(charged)
        })
    }

    /// Generate one client's discretionary spending for `day`, drawing
    /// from the same per-client stream the day cascade uses.
    pub fn generate_spending(
        &mut self,
        slot_id: SlotId,
        client_id: &str,
        day: GameDay,
    ) -> SimResult<Vec<Transaction>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            let index = spending_subsystem::client_index(&self.store, slot_id, client_id)?;
            let mut rng = spending_subsystem::client_rng(&self.rng_bank, slot_id, day, index);
            let spent = spending_subsystem::generate_spending(
                &self.store,
                &self.config,
                slot_id,
                client_id,
                day,
                &mut rng,
                now,
            )?;
            self.log_transactions("spending", &spent, now)?;
            Ok(spent)
        })
    }

    // ── Mortgages ─────────────────────────────────────────────────

    pub fn create_mortgage(
        &mut self,
        slot_id: SlotId,
        application: &MortgageApplication,
    ) -> SimResult<MortgagePosition> {
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            mortgage_subsystem::create_mortgage(&self.store, &self.config, &state, application, now)
        })
    }

    pub fn update_mortgage_status(
        &mut self,
        slot_id: SlotId,
        mortgage_id: &str,
        status: MortgageStatus,
    ) -> SimResult<MortgagePosition> {
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            let (mortgage, down_payment) = mortgage_subsystem::update_status(
                &self.store,
                &self.config,
                &state,
                mortgage_id,
                status,
                now,
            )?;
            let day = state.current_day();
            self.log_transactions("mortgage", down_payment.as_slice(), now)?;
            let decided = SimEvent::MortgageDecided {
                day,
                mortgage_id: mortgage.mortgage_id.clone(),
                status: mortgage.status,
            };
            self.log_events(slot_id, day, "mortgage", &[decided], now)?;
            Ok(mortgage)
        })
    }

    pub fn apply_repayment_event(
        &mut self,
        slot_id: SlotId,
        mortgage_id: &str,
        event: RepaymentEvent,
    ) -> SimResult<MortgagePosition> {
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            mortgage_subsystem::apply_repayment_event(&self.store, &state, mortgage_id, event, now)
        })
    }

    pub fn mortgages(&mut self, slot_id: SlotId) -> SimResult<Vec<MortgagePosition>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            self.store.mortgages_for_slot(slot_id)
        })
    }

    // ── Clients ───────────────────────────────────────────────────

    /// Open a checking account, optionally funded with a first deposit.
    pub fn onboard_client(
        &mut self,
        slot_id: SlotId,
        name: &str,
        opening_deposit: Money,
    ) -> SimResult<ClientAccount> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SimError::validation("client name required"));
        }
        if opening_deposit.is_negative() {
            return Err(SimError::validation("opening deposit cannot be negative"));
        }
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            let client = ClientAccount {
                client_id:                uuid::Uuid::new_v4().to_string(),
                slot_id,
                name:                     name.to_string(),
                checking_balance:         opening_deposit,
                daily_withdrawn:          Money::ZERO,
                cached_monthly_income:    None,
                cached_monthly_mandatory: Money::ZERO,
                cached_monthly_rent:      Money::ZERO,
                created_at:               now,
            };
            self.store.insert_client(&client)?;
            if opening_deposit.is_positive() {
                let tx = Transaction::new(
                    &client,
                    TransactionKind::Deposit,
                    opening_deposit,
                    state.current_day(),
                    now,
                );
                self.store.insert_transaction(&tx)?;
                self.log_transactions("clients", &[tx], now)?;
            }
            log::debug!("slot={slot_id} onboarded client {} ({name})", client.client_id);
            Ok(client)
        })
    }

    pub fn clients(&mut self, slot_id: SlotId) -> SimResult<Vec<ClientAccount>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            self.store.clients_for_slot(slot_id)
        })
    }

    pub fn client(&mut self, slot_id: SlotId, client_id: &str) -> SimResult<ClientAccount> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            self.store.require_client(slot_id, client_id)
        })
    }

    pub fn deposit(&mut self, slot_id: SlotId, client_id: &str, amount: Money) -> SimResult<ClientAccount> {
        if !amount.is_positive() {
            return Err(SimError::validation("deposit amount must be positive"));
        }
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            let mut client = self.store.require_client(slot_id, client_id)?;
            client.checking_balance += amount;
            self.store.save_client(&client)?;
            let tx = Transaction::new(&client, TransactionKind::Deposit, amount, state.current_day(), now);
            self.store.insert_transaction(&tx)?;
            self.log_transactions("clients", &[tx], now)?;
            Ok(client)
        })
    }

    /// Withdraw cash, bounded by the balance and the daily limit.
    pub fn withdraw(&mut self, slot_id: SlotId, client_id: &str, amount: Money) -> SimResult<ClientAccount> {
        if !amount.is_positive() {
            return Err(SimError::validation("withdrawal amount must be positive"));
        }
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            let mut client = self.store.require_client(slot_id, client_id)?;
            if amount > client.checking_balance {
                return Err(SimError::InsufficientFunds {
                    needed: amount,
                    available: client.checking_balance,
                });
            }
            let limit = self.config.constants.daily_withdrawal_limit;
            if client.daily_withdrawn + amount > limit {
                return Err(SimError::validation(format!(
                    "daily withdrawal limit of {limit} exceeded ({} already withdrawn today)",
                    client.daily_withdrawn
                )));
            }
            client.checking_balance = client.checking_balance - amount;
            client.daily_withdrawn += amount;
            self.store.save_client(&client)?;
            let tx = Transaction::new(&client, TransactionKind::Withdrawal, amount, state.current_day(), now);
            self.store.insert_transaction(&tx)?;
            self.log_transactions("clients", &[tx], now)?;
            Ok(client)
        })
    }

    /// Put a client on a job. A primary job demotes the client's other
    /// primaries and becomes their cached monthly income.
    pub fn assign_job(
        &mut self,
        slot_id: SlotId,
        client_id: &str,
        job_id: &str,
        primary: bool,
    ) -> SimResult<JobAssignment> {
        let job = self
            .config
            .job(job_id)
            .ok_or_else(|| SimError::not_found("Job", job_id))?
            .clone();
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            let mut client = self.store.require_client(slot_id, client_id)?;
            if primary {
                self.store.demote_primary_jobs(client_id)?;
            }
            let assignment = JobAssignment {
                assignment_id: uuid::Uuid::new_v4().to_string(),
                slot_id,
                client_id:     client.client_id.clone(),
                job_id:        job.job_id.clone(),
                next_payday:   state.game_day + job.pay_cycle_days as f64,
                is_primary:    primary,
                created_at:    now,
            };
            self.store.insert_job_assignment(&assignment)?;
            if primary {
                client.cached_monthly_income = Some(job.annual_salary.split(12));
                self.store.save_client(&client)?;
            }
            log::debug!("slot={slot_id} client {client_id} hired as {}", job.title);
            Ok(assignment)
        })
    }

    /// Set what a client pays in rent each rent month.
    pub fn set_client_rent(
        &mut self,
        slot_id: SlotId,
        client_id: &str,
        monthly_rent: Money,
    ) -> SimResult<ClientAccount> {
        if monthly_rent.is_negative() {
            return Err(SimError::validation("rent cannot be negative"));
        }
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            let mut client = self.store.require_client(slot_id, client_id)?;
            client.cached_monthly_rent = monthly_rent;
            mortgage_subsystem::refresh_mandatory_obligations(&self.store, &mut client)?;
            Ok(client)
        })
    }

    pub fn transactions(&mut self, slot_id: SlotId, client_id: &str) -> SimResult<Vec<Transaction>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            self.store.require_client(slot_id, client_id)?;
            self.store.transactions_for_client(client_id)
        })
    }

    // ── Property market ───────────────────────────────────────────

    pub fn list_property(&mut self, slot_id: SlotId, name: &str, price: Money) -> SimResult<Property> {
        if name.trim().is_empty() {
            return Err(SimError::validation("property name required"));
        }
        if !price.is_positive() {
            return Err(SimError::validation("property price must be positive"));
        }
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            let property = Property {
                property_id:     uuid::Uuid::new_v4().to_string(),
                slot_id,
                name:            name.trim().to_string(),
                price,
                status:          PropertyStatus::Available,
                owner_client_id: None,
            };
            self.store.insert_property(&property)?;
            Ok(property)
        })
    }

    pub fn property(&mut self, slot_id: SlotId, property_id: &str) -> SimResult<Property> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            self.store
                .property(slot_id, property_id)?
                .ok_or_else(|| SimError::not_found("Property", property_id))
        })
    }

    // ── Read models ───────────────────────────────────────────────

    /// Advance each slot and summarize it.
    pub fn slot_summaries(&mut self, slot_ids: &[SlotId]) -> SimResult<Vec<SlotSummary>> {
        let now = self.now();
        self.store.atomically(|| {
            let mut summaries = Vec::with_capacity(slot_ids.len());
            for &slot_id in slot_ids {
                let state = self.advance_locked(slot_id, now)?.state;
                let client_count = self.store.client_count(slot_id)?;
                summaries.push(SlotSummary {
                    slot_id,
                    client_count,
                    game_day: state.game_day,
                    liquid_cash: state.liquid_cash,
                    has_data: state.game_day > 0.0 || client_count > 0,
                });
            }
            Ok(summaries)
        })
    }

    /// Running totals of money into and out of client accounts, one
    /// point per whole day from day 0 through today.
    pub fn activity_series(&mut self, slot_id: SlotId) -> SimResult<ActivitySeries> {
        let now = self.now();
        self.store.atomically(|| {
            let state = self.advance_locked(slot_id, now)?.state;
            let mut credits: BTreeMap<GameDay, Money> = BTreeMap::new();
            let mut debits: BTreeMap<GameDay, Money> = BTreeMap::new();
            for tx in self.store.transactions_for_slot(slot_id)? {
                let side = if tx.kind.is_credit() { &mut credits } else { &mut debits };
                *side.entry(tx.game_day).or_default() += tx.amount;
            }

            let mut series = ActivitySeries::default();
            let (mut deposited, mut withdrawn) = (Money::ZERO, Money::ZERO);
            for day in 0..=state.current_day() {
                deposited += credits.get(&day).copied().unwrap_or_default();
                withdrawn += debits.get(&day).copied().unwrap_or_default();
                series.days.push(day);
                series.cumulative_deposits.push(deposited);
                series.cumulative_withdrawals.push(withdrawn);
            }
            Ok(series)
        })
    }

    /// Every client's checking balance, ordered by name.
    pub fn client_distribution(&mut self, slot_id: SlotId) -> SimResult<Vec<ClientBalance>> {
        let now = self.now();
        self.store.atomically(|| {
            self.advance_locked(slot_id, now)?;
            let mut items: Vec<ClientBalance> = self
                .store
                .clients_for_slot(slot_id)?
                .into_iter()
                .map(|c| ClientBalance { client_id: c.client_id, name: c.name, balance: c.checking_balance })
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(items)
        })
    }
}
