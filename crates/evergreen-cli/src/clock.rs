//! Tokio-backed clock driver.
//!
//! The core only flips cadence flags; the session loop reads them to decide
//! which interval to poll.

use std::cell::Cell;
use std::time::Duration;

use evergreen_core::{Cadence, Clock};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Shortest and longest period the driver will schedule, whatever the speed.
const MIN_PERIOD: Duration = Duration::from_millis(1);
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct TokioClock {
    second: Cell<bool>,
    minute: Cell<bool>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, cadence: Cadence) -> &Cell<bool> {
        match cadence {
            Cadence::EverySecond => &self.second,
            Cadence::EveryMinute => &self.minute,
        }
    }
}

impl Clock for TokioClock {
    fn arm(&self, cadence: Cadence) {
        self.slot(cadence).set(true);
    }

    fn disarm(&self, cadence: Cadence) {
        self.slot(cadence).set(false);
    }

    fn is_armed(&self, cadence: Cadence) -> bool {
        self.slot(cadence).get()
    }
}

/// Real-time length of one simulated `cadence` tick at `speed`x.
pub fn period(cadence: Cadence, speed: f64) -> Duration {
    let secs = match cadence {
        Cadence::EverySecond => 1.0,
        Cadence::EveryMinute => 60.0,
    };
    Duration::try_from_secs_f64(secs / speed)
        .unwrap_or(MAX_PERIOD)
        .clamp(MIN_PERIOD, MAX_PERIOD)
}

/// Interval whose first tick is one full period away.
pub fn ticker(cadence: Cadence, speed: f64) -> Interval {
    let period = period(cadence, speed);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
