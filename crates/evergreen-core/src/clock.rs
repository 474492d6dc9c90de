//! Clock abstraction.
//!
//! The core never creates its own timers. Tick-driven components arm and
//! disarm a cadence on an injected [`Clock`]; the driver that owns the real
//! timers calls `tick()` / `tick_minute()` while the cadence is armed.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    EverySecond,
    EveryMinute,
}

/// Registration surface of an external periodic driver.
///
/// `arm` and `disarm` are idempotent.
pub trait Clock {
    fn arm(&self, cadence: Cadence);
    fn disarm(&self, cadence: Cadence);
    fn is_armed(&self, cadence: Cadence) -> bool;
}

/// In-memory clock that only records what is armed.
///
/// Tests drive the engines by calling `tick()` directly.
#[derive(Debug, Default)]
pub struct ManualClock {
    second: Cell<bool>,
    minute: Cell<bool>,
    arm_calls: Cell<u32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `arm` actually changed state.
    pub fn arm_calls(&self) -> u32 {
        self.arm_calls.get()
    }

    fn slot(&self, cadence: Cadence) -> &Cell<bool> {
        match cadence {
            Cadence::EverySecond => &self.second,
            Cadence::EveryMinute => &self.minute,
        }
    }
}

impl Clock for ManualClock {
    fn arm(&self, cadence: Cadence) {
        let slot = self.slot(cadence);
        if !slot.get() {
            slot.set(true);
            self.arm_calls.set(self.arm_calls.get() + 1);
        }
    }

    fn disarm(&self, cadence: Cadence) {
        self.slot(cadence).set(false);
    }

    fn is_armed(&self, cadence: Cadence) -> bool {
        self.slot(cadence).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_is_idempotent() {
        let clock = ManualClock::new();
        clock.arm(Cadence::EverySecond);
        clock.arm(Cadence::EverySecond);
        assert!(clock.is_armed(Cadence::EverySecond));
        assert!(!clock.is_armed(Cadence::EveryMinute));
        assert_eq!(clock.arm_calls(), 1);
    }

    #[test]
    fn disarm_is_idempotent() {
        let clock = ManualClock::new();
        clock.disarm(Cadence::EveryMinute);
        clock.arm(Cadence::EveryMinute);
        clock.disarm(Cadence::EveryMinute);
        clock.disarm(Cadence::EveryMinute);
        assert!(!clock.is_armed(Cadence::EveryMinute));
    }
}
