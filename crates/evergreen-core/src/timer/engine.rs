//! Pomodoro cycle engine.
//!
//! A countdown state machine over a [`PomodoroPlan`]. It does not use
//! internal threads or timers - an external driver calls `tick()` once per
//! simulated second while the engine's cadence is armed.
//!
//! ## State Transitions
//!
//! ```text
//! Work -> Break -> Work -> ... -> Done
//! ```
//!
//! `Done` is terminal until `reset`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = PomodoroEngine::new(&settings, LapBudget::Hours(1.0))?;
//! engine.attach_clock(clock);
//! engine.start();
//! // Once per second, from the clock driver:
//! engine.tick();
//! ```

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::plan::{format_clock, BlockKind, LapBudget, PomodoroPlan, PomodoroState};
use crate::clock::{Cadence, Clock};
use crate::error::ValidationError;
use crate::events::{Event, EventBus};
use crate::storage::PomodoroSettings;

/// Display string carried by the done notification.
pub const DONE_DISPLAY: &str = "Done!";

/// Serializable view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSnapshot {
    pub state: PomodoroState,
    pub running: bool,
    pub display: String,
    pub time_left_secs: u64,
    pub current_block_index: usize,
    pub total_blocks: usize,
    pub laps_completed: u32,
    pub total_laps: u32,
    pub laps_remaining: u32,
}

pub struct PomodoroEngine {
    budget: LapBudget,
    plan: PomodoroPlan,
    state: PomodoroState,
    current_block_index: usize,
    /// Remaining seconds in the current block.
    time_left: u64,
    laps_completed: u32,
    running: bool,
    display: String,
    bus: EventBus,
    clock: Option<Rc<dyn Clock>>,
}

impl PomodoroEngine {
    /// Build the plan for `budget` and apply block 0.
    ///
    /// Starts in `Work`, not running.
    pub fn new(settings: &PomodoroSettings, budget: LapBudget) -> Result<Self, ValidationError> {
        let plan = PomodoroPlan::build(
            budget,
            settings.work_duration_secs,
            settings.break_duration_secs,
        )?;
        tracing::info!(
            total_laps = plan.total_laps,
            blocks = plan.blocks.len(),
            "pomodoro plan built"
        );
        let mut engine = Self {
            budget,
            plan,
            state: PomodoroState::Work,
            current_block_index: 0,
            time_left: 0,
            laps_completed: 0,
            running: false,
            display: String::new(),
            bus: EventBus::new(),
            clock: None,
        };
        engine.apply_current_block();
        Ok(engine)
    }

    /// Register with the driver that will call `tick()`.
    pub fn attach_clock(&mut self, clock: Rc<dyn Clock>) {
        if self.running {
            clock.arm(Cadence::EverySecond);
        }
        self.clock = Some(clock);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> PomodoroState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn time_left(&self) -> u64 {
        self.time_left
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn current_block_index(&self) -> usize {
        self.current_block_index
    }

    pub fn laps_completed(&self) -> u32 {
        self.laps_completed
    }

    pub fn total_laps(&self) -> u32 {
        self.plan.total_laps
    }

    pub fn laps_remaining(&self) -> u32 {
        self.plan.total_laps.saturating_sub(self.laps_completed)
    }

    pub fn plan(&self) -> &PomodoroPlan {
        &self.plan
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn snapshot(&self) -> PomodoroSnapshot {
        PomodoroSnapshot {
            state: self.state,
            running: self.running,
            display: self.display.clone(),
            time_left_secs: self.time_left,
            current_block_index: self.current_block_index,
            total_blocks: self.plan.blocks.len(),
            laps_completed: self.laps_completed,
            total_laps: self.plan.total_laps,
            laps_remaining: self.laps_remaining(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// No-op if already running or `Done`.
    pub fn start(&mut self) {
        if self.running || self.state == PomodoroState::Done {
            return;
        }
        self.running = true;
        if let Some(clock) = &self.clock {
            clock.arm(Cadence::EverySecond);
        }
        tracing::debug!(block = self.current_block_index, "pomodoro started");
    }

    /// No-op if not running.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(clock) = &self.clock {
            clock.disarm(Cadence::EverySecond);
        }
        tracing::debug!(block = self.current_block_index, "pomodoro stopped");
    }

    /// Stop and rewind to block 0, optionally re-sizing the plan from a new
    /// study-hour budget. Leaves the engine stopped.
    pub fn reset(&mut self, new_study_hours: Option<f64>) -> Result<(), ValidationError> {
        let budget = new_study_hours.map_or(self.budget, LapBudget::Hours);
        self.reset_to(budget)
    }

    /// Like [`reset`](Self::reset) but accepts any budget, including an
    /// explicit lap count.
    pub fn reset_to(&mut self, budget: LapBudget) -> Result<(), ValidationError> {
        // Validate before touching any state.
        let plan = PomodoroPlan::build(
            budget,
            self.plan.work_duration_secs,
            self.plan.break_duration_secs,
        )?;
        self.stop();
        self.budget = budget;
        self.plan = plan;
        self.laps_completed = 0;
        self.current_block_index = 0;
        self.apply_current_block();
        tracing::info!(total_laps = self.plan.total_laps, "pomodoro reset");
        Ok(())
    }

    /// Advance the countdown by one second.
    ///
    /// A block of `d` seconds is exhausted by exactly `d` ticks; the tick
    /// that exhausts it also performs the block transition.
    pub fn tick(&mut self) {
        if self.state == PomodoroState::Done {
            return;
        }

        if self.laps_completed >= self.plan.total_laps {
            self.finish();
            return;
        }

        if self.time_left > 0 {
            self.time_left -= 1;
            self.display = format_clock(self.time_left);
            if self.time_left > 0 {
                self.notify_update();
                return;
            }
        }

        self.handle_block_end();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn handle_block_end(&mut self) {
        let ended = self.plan.blocks.get(self.current_block_index).map(|b| b.kind);
        if ended == Some(BlockKind::Work) {
            self.laps_completed += 1;
            tracing::debug!(
                laps_completed = self.laps_completed,
                total_laps = self.plan.total_laps,
                "lap complete"
            );
            self.bus.publish(Event::LapComplete { laps: 1 });
            if self.laps_completed >= self.plan.total_laps {
                self.finish();
                return;
            }
        }

        self.current_block_index += 1;
        if self.current_block_index >= self.plan.blocks.len() {
            self.finish();
            return;
        }
        self.apply_current_block();
        self.notify_update();
    }

    fn apply_current_block(&mut self) {
        match self.plan.blocks.get(self.current_block_index) {
            Some(block) => {
                self.state = block.kind.into();
                self.time_left = block.duration_secs;
                self.display = format_clock(self.time_left);
                tracing::debug!(
                    index = self.current_block_index,
                    kind = ?block.kind,
                    duration_secs = block.duration_secs,
                    "block applied"
                );
            }
            None => {
                // Plans always have 2 * total_laps >= 2 blocks.
                tracing::warn!(
                    target: "evergreen::invariant",
                    index = self.current_block_index,
                    blocks = self.plan.blocks.len(),
                    "block index out of range; forcing done"
                );
                self.state = PomodoroState::Done;
                self.time_left = 0;
                self.display = format_clock(0);
            }
        }
    }

    fn finish(&mut self) {
        self.state = PomodoroState::Done;
        self.time_left = 0;
        self.display = format_clock(0);
        self.stop();
        tracing::info!(laps_completed = self.laps_completed, "pomodoro done");
        self.bus.publish(Event::PomodoroTick {
            display: DONE_DISPLAY.to_string(),
            kind: PomodoroState::Done,
            laps_remaining: 0,
        });
        self.bus.publish(Event::PomodoroDone {
            laps_completed: self.laps_completed,
        });
    }

    fn notify_update(&self) {
        self.bus.publish(Event::PomodoroTick {
            display: self.display.clone(),
            kind: self.state,
            laps_remaining: self.laps_remaining(),
        });
    }
}

impl std::fmt::Debug for PomodoroEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PomodoroEngine")
            .field("state", &self.state)
            .field("running", &self.running)
            .field("current_block_index", &self.current_block_index)
            .field("time_left", &self.time_left)
            .field("laps_completed", &self.laps_completed)
            .field("total_laps", &self.plan.total_laps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventKind;
    use std::cell::RefCell;

    fn settings(work: u64, brk: u64) -> PomodoroSettings {
        PomodoroSettings {
            work_duration_secs: work,
            break_duration_secs: brk,
        }
    }

    fn record(engine: &PomodoroEngine) -> (Rc<RefCell<Vec<Event>>>, Rc<impl Fn(&Event)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let listener = Rc::new(move |e: &Event| sink.borrow_mut().push(e.clone()));
        engine.bus().subscribe_all(&listener);
        (log, listener)
    }

    fn count(log: &RefCell<Vec<Event>>, kind: EventKind) -> usize {
        use crate::bus::Topic;
        log.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn fresh_engine_starts_in_work() {
        let engine = PomodoroEngine::new(&settings(1500, 300), LapBudget::Hours(1.0)).unwrap();
        assert_eq!(engine.state(), PomodoroState::Work);
        assert_eq!(engine.current_block_index(), 0);
        assert_eq!(engine.time_left(), 1500);
        assert_eq!(engine.display(), "25:00");
        assert_eq!(engine.total_laps(), 2);
        assert!(!engine.is_running());
    }

    #[test]
    fn work_duration_ticks_complete_one_lap() {
        let mut engine = PomodoroEngine::new(&settings(1500, 300), LapBudget::Hours(1.0)).unwrap();
        let (log, _listener) = record(&engine);

        for _ in 0..1499 {
            engine.tick();
        }
        assert_eq!(engine.state(), PomodoroState::Work);
        assert_eq!(engine.display(), "00:01");
        assert_eq!(count(&log, EventKind::LapComplete), 0);

        engine.tick();
        assert_eq!(engine.state(), PomodoroState::Break);
        assert_eq!(engine.laps_completed(), 1);
        assert_eq!(engine.time_left(), 300);
        assert_eq!(engine.current_block_index(), 1);
        assert_eq!(count(&log, EventKind::LapComplete), 1);
    }

    #[test]
    fn per_second_update_carries_display_and_laps() {
        let mut engine = PomodoroEngine::new(&settings(90, 30), LapBudget::Laps(3)).unwrap();
        let (log, _listener) = record(&engine);
        engine.tick();
        assert_eq!(
            log.borrow().last(),
            Some(&Event::PomodoroTick {
                display: "01:29".into(),
                kind: PomodoroState::Work,
                laps_remaining: 3,
            })
        );
    }

    #[test]
    fn runs_to_done_exactly_once() {
        let mut engine = PomodoroEngine::new(&settings(3, 2), LapBudget::Laps(2)).unwrap();
        let (log, _listener) = record(&engine);

        // Work(3) + Break(2) + Work(3); the final break is never entered.
        for _ in 0..8 {
            engine.tick();
        }
        assert_eq!(engine.state(), PomodoroState::Done);
        assert_eq!(engine.laps_completed(), 2);
        assert_eq!(count(&log, EventKind::LapComplete), 2);
        assert_eq!(count(&log, EventKind::PomodoroDone), 1);
        assert!(log
            .borrow()
            .contains(&Event::PomodoroDone { laps_completed: 2 }));
        assert!(log.borrow().contains(&Event::PomodoroTick {
            display: DONE_DISPLAY.into(),
            kind: PomodoroState::Done,
            laps_remaining: 0,
        }));

        let before = log.borrow().len();
        for _ in 0..10 {
            engine.tick();
        }
        assert_eq!(log.borrow().len(), before);
        assert_eq!(engine.state(), PomodoroState::Done);
    }

    #[test]
    fn start_and_stop_arm_the_clock() {
        let clock = Rc::new(ManualClock::new());
        let mut engine = PomodoroEngine::new(&settings(60, 30), LapBudget::Laps(1)).unwrap();
        engine.attach_clock(clock.clone());

        engine.start();
        engine.start();
        assert!(engine.is_running());
        assert!(clock.is_armed(Cadence::EverySecond));
        assert_eq!(clock.arm_calls(), 1);

        engine.stop();
        engine.stop();
        assert!(!engine.is_running());
        assert!(!clock.is_armed(Cadence::EverySecond));
    }

    #[test]
    fn start_is_noop_when_done() {
        let clock = Rc::new(ManualClock::new());
        let mut engine = PomodoroEngine::new(&settings(1, 1), LapBudget::Laps(1)).unwrap();
        engine.attach_clock(clock.clone());
        engine.start();
        engine.tick();
        assert_eq!(engine.state(), PomodoroState::Done);
        assert!(!engine.is_running());
        assert!(!clock.is_armed(Cadence::EverySecond));

        engine.start();
        assert!(!engine.is_running());
    }

    #[test]
    fn reset_rewinds_and_resizes() {
        let mut engine = PomodoroEngine::new(&settings(1500, 300), LapBudget::Hours(1.0)).unwrap();
        engine.start();
        for _ in 0..2000 {
            engine.tick();
        }
        assert_eq!(engine.laps_completed(), 1);

        engine.reset(Some(3.0)).unwrap();
        assert_eq!(engine.state(), PomodoroState::Work);
        assert_eq!(engine.current_block_index(), 0);
        assert_eq!(engine.laps_completed(), 0);
        assert_eq!(engine.total_laps(), 6);
        assert_eq!(engine.plan().blocks.len(), 12);
        assert_eq!(engine.time_left(), 1500);
        assert!(!engine.is_running());
    }

    #[test]
    fn reset_without_hours_keeps_lap_override() {
        let mut engine = PomodoroEngine::new(&settings(10, 5), LapBudget::Laps(4)).unwrap();
        engine.tick();
        engine.reset(None).unwrap();
        assert_eq!(engine.total_laps(), 4);
        assert_eq!(engine.time_left(), 10);
    }

    #[test]
    fn invalid_reset_leaves_state_untouched() {
        let mut engine = PomodoroEngine::new(&settings(10, 5), LapBudget::Laps(2)).unwrap();
        engine.start();
        engine.tick();
        assert!(engine.reset(Some(-1.0)).is_err());
        assert!(engine.is_running());
        assert_eq!(engine.time_left(), 9);
        assert_eq!(engine.total_laps(), 2);
    }

    #[test]
    fn reset_revives_done_engine() {
        let mut engine = PomodoroEngine::new(&settings(1, 1), LapBudget::Laps(1)).unwrap();
        engine.tick();
        assert_eq!(engine.state(), PomodoroState::Done);
        engine.reset(None).unwrap();
        assert_eq!(engine.state(), PomodoroState::Work);
        engine.start();
        assert!(engine.is_running());
    }

    #[test]
    fn snapshot_reflects_progress() {
        let mut engine = PomodoroEngine::new(&settings(60, 30), LapBudget::Laps(2)).unwrap();
        for _ in 0..61 {
            engine.tick();
        }
        let snap = engine.snapshot();
        assert_eq!(snap.state, PomodoroState::Break);
        assert_eq!(snap.time_left_secs, 29);
        assert_eq!(snap.display, "00:29");
        assert_eq!(snap.laps_completed, 1);
        assert_eq!(snap.laps_remaining, 1);
        assert_eq!(snap.total_blocks, 4);
    }
}
