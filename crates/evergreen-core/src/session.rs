//! Study session.
//!
//! Owns one of each engine and wires them together: task completions and
//! Pomodoro laps feed the growth engine and the achievement tracker, and
//! recording hours re-sizes the Pomodoro plan and the growth target. Each
//! finished lap scores its share of the planned hours.
//! A presentation layer only has to drive the two clock cadences and
//! forward user commands.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use crate::achievements::AchievementTracker;
use crate::bus::{Listener, SubscriptionId};
use crate::clock::{Cadence, Clock};
use crate::error::{PersistenceError, ValidationError};
use crate::events::{Event, EventBus};
use crate::growth::{advance_event, GrowthEngine, GrowthObserver};
use crate::ledger::{self, PendingSave, StudyLedger};
use crate::storage::{Config, LedgerStore, PlanBudget, PomodoroSettings, ThresholdStrategy};
use crate::task::{Priority, Task, TaskStore};
use crate::timer::{plan::validate_budget_hours, LapBudget, PomodoroEngine, PomodoroPlan};

/// Budget a session plans with before the first `plan` call.
pub const INITIAL_BUDGET_HOURS: f64 = 1.0;

pub struct StudySession {
    ledger: StudyLedger,
    tasks: TaskStore,
    pomodoro: PomodoroEngine,
    growth: Rc<RefCell<GrowthEngine>>,
    // Buses hold listeners weakly; these keep the adapters alive.
    observer: Rc<GrowthObserver>,
    achievements: Rc<AchievementTracker>,
    clock: Rc<dyn Clock>,
    settings: PomodoroSettings,
    budget: PlanBudget,
    threshold: ThresholdStrategy,
}

impl StudySession {
    /// Build a session from configuration. Stored ledger data is loaded.
    pub fn new(
        config: &Config,
        store: Arc<dyn LedgerStore>,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;

        let ledger = StudyLedger::open(store);
        let tasks = TaskStore::new(config.tasks.ordering);
        let mut pomodoro =
            PomodoroEngine::new(&config.pomodoro, LapBudget::Hours(INITIAL_BUDGET_HOURS))?;
        pomodoro.attach_clock(Rc::clone(&clock));

        let growth = Rc::new(RefCell::new(config.growth.build_engine()?));
        let observer = Rc::new(GrowthObserver::new(Rc::clone(&growth)));
        observer.set_lap_budget(INITIAL_BUDGET_HOURS, pomodoro.total_laps());
        observer.bind_to(tasks.bus());
        observer.bind_to(pomodoro.bus());

        let achievements = Rc::new(AchievementTracker::default());
        achievements.bind_to(tasks.bus());

        tracing::debug!(
            total_hours = ledger.total_hours(),
            budget = ?config.session.budget,
            threshold = ?config.growth.threshold,
            "study session created"
        );

        Ok(Self {
            ledger,
            tasks,
            pomodoro,
            growth,
            observer,
            achievements,
            clock,
            settings: config.pomodoro,
            budget: config.session.budget,
            threshold: config.growth.threshold,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn ledger(&self) -> &StudyLedger {
        &self.ledger
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn pomodoro(&self) -> &PomodoroEngine {
        &self.pomodoro
    }

    pub fn growth(&self) -> Ref<'_, GrowthEngine> {
        self.growth.borrow()
    }

    pub fn growth_bus(&self) -> Rc<EventBus> {
        self.growth.borrow().bus_handle()
    }

    pub fn achievements(&self) -> &AchievementTracker {
        &self.achievements
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    /// Bind `listener` to every bus the session owns.
    pub fn subscribe_all<L>(&self, listener: &Rc<L>) -> Vec<SubscriptionId>
    where
        L: Listener<Event> + 'static,
    {
        let growth_bus = self.growth_bus();
        vec![
            self.tasks.bus().subscribe_all(listener),
            self.pomodoro.bus().subscribe_all(listener),
            self.ledger.bus().subscribe_all(listener),
            growth_bus.subscribe_all(listener),
            self.achievements.bus().subscribe_all(listener),
        ]
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Record `hours` for `date` and re-plan from them.
    ///
    /// The Pomodoro restarts stopped at block 0 and the minute counter is
    /// cleared. `laps` overrides the computed lap count. Nothing changes if
    /// any input is rejected.
    pub fn plan(
        &mut self,
        date: &str,
        hours: f64,
        laps: Option<u32>,
    ) -> Result<PendingSave, ValidationError> {
        let date = ledger::parse_date(date)?;
        ledger::validate_hours(hours)?;

        let key = date.format(ledger::DATE_FORMAT).to_string();
        let budget_hours = match self.budget {
            PlanBudget::Day => hours,
            PlanBudget::Cumulative => {
                self.ledger.total_hours() - self.ledger.hours_on(&key).unwrap_or(0.0) + hours
            }
        };
        validate_budget_hours(budget_hours)?;
        let lap_budget = laps.map_or(LapBudget::Hours(budget_hours), LapBudget::Laps);
        PomodoroPlan::build(
            lap_budget,
            self.settings.work_duration_secs,
            self.settings.break_duration_secs,
        )?;

        // Inputs are valid; nothing below can fail.
        let pending = self.ledger.set_hours_on(date, hours)?;
        self.stop();
        self.pomodoro.reset_to(lap_budget)?;
        self.observer
            .set_lap_budget(budget_hours, self.pomodoro.total_laps());
        if self.threshold == ThresholdStrategy::TargetHours {
            // Publishes on the growth bus, so no engine borrow may be live.
            let advanced = self.growth.borrow_mut().retarget(budget_hours)?;
            if let Some(stage) = advanced {
                self.growth_bus().publish(advance_event(stage));
            }
        }
        self.ledger.reset_minutes();

        tracing::info!(
            date = %key,
            hours,
            budget_hours,
            total_laps = self.pomodoro.total_laps(),
            "study session planned"
        );
        Ok(pending)
    }

    /// Start the Pomodoro and the minute counter.
    pub fn start(&mut self) {
        self.pomodoro.start();
        if self.pomodoro.is_running() {
            self.clock.arm(Cadence::EveryMinute);
        }
    }

    pub fn stop(&mut self) {
        self.pomodoro.stop();
        self.clock.disarm(Cadence::EveryMinute);
    }

    /// Driver callback for the `EverySecond` cadence.
    pub fn on_second(&mut self) {
        self.pomodoro.tick();
        if !self.pomodoro.is_running() {
            self.clock.disarm(Cadence::EveryMinute);
        }
    }

    /// Driver callback for the `EveryMinute` cadence.
    pub fn on_minute(&mut self) {
        self.ledger.tick_minute();
    }

    pub fn add_task(&mut self, title: &str, priority: Priority) -> Result<Task, ValidationError> {
        self.tasks.add(title, priority)
    }

    /// Complete a task and flag it in the ledger.
    ///
    /// Returns `Ok(false)` if it was already completed.
    pub fn complete_task(&mut self, id: &str) -> Result<bool, ValidationError> {
        let newly = self.tasks.complete(id)?;
        if newly {
            // Detached; failures are logged by the writer.
            drop(self.ledger.complete_task_flag(id));
        }
        Ok(newly)
    }

    pub fn delete_task(&mut self, id: &str) -> Option<Task> {
        self.tasks.delete(id)
    }

    pub fn reset_tasks(&mut self) -> usize {
        self.tasks.reset_all()
    }

    /// Persist the ledger before the presentation layer exits.
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        self.ledger.flush()
    }
}

impl std::fmt::Debug for StudySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudySession")
            .field("ledger", &self.ledger)
            .field("tasks", &self.tasks)
            .field("pomodoro", &self.pomodoro)
            .field("growth", &self.growth)
            .field("observer", &self.observer)
            .field("achievements", &self.achievements)
            .field("budget", &self.budget)
            .field("threshold", &self.threshold)
            .finish()
    }
}
