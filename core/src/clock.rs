//! Game clock: converts elapsed real time into fractional game days.
//!
//! There is no background ticker. A slot's clock only moves when
//! something observes the slot, so the conversion has to be exact
//! across arbitrarily long absences: every whole day crossed since the
//! last observation is reported, in ascending order, exactly once.

use crate::types::GameDay;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::{
    ops::RangeInclusive,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

/// Source of "now". Injected so tests never depend on the wall clock.
pub trait RealClock: Send {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl RealClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self { millis: Arc::new(AtomicI64::new(at.timestamp_millis())) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl RealClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

/// Result of observing a slot at a given instant.
///
/// Elapsed game time is carried as whole real milliseconds so that
/// boundaries do not depend on how the elapsed time was split.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAdvance {
    pub previous_game_ms: i64,
    pub new_game_ms: i64,
    pub elapsed_ms: i64,
    /// The timestamp the slot should remember. Never earlier than the
    /// previous observation.
    pub observed_at: DateTime<Utc>,
    /// True when `now` was earlier than the last observation.
    pub clamped: bool,
    real_ms_per_game_day: i64,
}

impl DayAdvance {
    pub fn previous_whole_day(&self) -> GameDay {
        self.previous_game_ms.div_euclid(self.real_ms_per_game_day)
    }

    pub fn current_whole_day(&self) -> GameDay {
        self.new_game_ms.div_euclid(self.real_ms_per_game_day)
    }

    /// Fractional game day after the observation.
    pub fn new_game_day(&self) -> f64 {
        self.new_game_ms as f64 / self.real_ms_per_game_day as f64
    }

    /// Whole days crossed, ascending. Empty when none were crossed.
    pub fn boundaries(&self) -> RangeInclusive<GameDay> {
        (self.previous_whole_day() + 1)..=self.current_whole_day()
    }

    pub fn crossed_any(&self) -> bool {
        self.current_whole_day() > self.previous_whole_day()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    real_ms_per_game_day: i64,
}

impl GameClock {
    pub fn new(real_ms_per_game_day: i64) -> Self {
        assert!(real_ms_per_game_day > 0, "real_ms_per_game_day must be > 0");
        Self { real_ms_per_game_day }
    }

    pub fn real_ms_per_game_day(&self) -> i64 {
        self.real_ms_per_game_day
    }

    /// Pure: compute where the slot's clock lands when observed at `now`.
    /// `game_ms` is the slot's total elapsed game time in real ms.
    /// A slot that was never observed gains no time.
    pub fn advance(
        &self,
        game_ms: i64,
        last_observed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DayAdvance {
        let last = last_observed_at.unwrap_or(now);
        let raw_ms = (now - last).num_milliseconds();
        let clamped = raw_ms < 0;
        let elapsed_ms = raw_ms.max(0);

        DayAdvance {
            previous_game_ms: game_ms,
            new_game_ms: game_ms.saturating_add(elapsed_ms),
            elapsed_ms,
            observed_at: if clamped { last } else { now },
            clamped,
            real_ms_per_game_day: self.real_ms_per_game_day,
        }
    }

    /// Real time needed to move forward `days` game days.
    pub fn real_duration_of(&self, days: f64) -> Duration {
        Duration::milliseconds((days * self.real_ms_per_game_day as f64).round() as i64)
    }
}
