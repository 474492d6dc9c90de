//! Growth scoring engine.
//!
//! Converts progress signals (hours studied, laps completed, tasks completed)
//! into a weighted cumulative score, and the score into a discrete growth
//! stage. Stages only move forward.
//!
//! Two threshold strategies exist:
//!
//! - a fixed number of points per stage, and
//! - a threshold derived from a target study-hour budget, so that studying
//!   exactly the planned hours reaches the final stage.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::bus::Listener;
use crate::error::ValidationError;
use crate::events::{Event, EventBus, EventKind};

/// Number of visual growth milestones.
pub const TOTAL_STAGES: usize = 11;

/// Lower bound for a derived threshold.
pub const MIN_POINTS_PER_STAGE: f64 = 1.0;

pub const DEFAULT_POINTS_PER_STAGE: f64 = 10.0;

/// Points awarded per unit of each signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthWeights {
    pub hours: f64,
    pub laps: f64,
    pub tasks: f64,
}

impl GrowthWeights {
    /// Tasks weigh most.
    pub const STANDARD: GrowthWeights = GrowthWeights {
        hours: 2.0,
        laps: 1.0,
        tasks: 3.0,
    };

    /// Hours dominate; laps and tasks are small nudges.
    pub const GENTLE: GrowthWeights = GrowthWeights {
        hours: 2.0,
        laps: 0.5,
        tasks: 1.0,
    };

    /// Every weight must be finite and non-negative, so the score never falls.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let weights = [
            ("hours", self.hours),
            ("laps", self.laps),
            ("tasks", self.tasks),
        ];
        for (signal, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidWeight {
                    signal: signal.into(),
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn points(&self, hours: f64, laps: u32, tasks: u32) -> f64 {
        hours * self.hours + f64::from(laps) * self.laps + f64::from(tasks) * self.tasks
    }
}

impl Default for GrowthWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Image identifier for a stage: stage 0 is `1.png`.
pub fn stage_asset(stage: usize) -> String {
    format!("{}.png", stage + 1)
}

#[derive(Debug)]
pub struct GrowthEngine {
    weights: GrowthWeights,
    score: f64,
    current_stage: usize,
    points_per_stage: f64,
    bus: Rc<EventBus>,
}

impl GrowthEngine {
    /// Engine with the default fixed threshold.
    pub fn new(weights: GrowthWeights) -> Self {
        Self {
            weights,
            score: 0.0,
            current_stage: 0,
            points_per_stage: DEFAULT_POINTS_PER_STAGE,
            bus: Rc::new(EventBus::new()),
        }
    }

    /// Engine with a fixed points-per-stage threshold.
    pub fn with_points_per_stage(
        weights: GrowthWeights,
        points_per_stage: f64,
    ) -> Result<Self, ValidationError> {
        weights.validate()?;
        if !points_per_stage.is_finite() || points_per_stage <= 0.0 {
            return Err(ValidationError::InvalidThreshold {
                value: points_per_stage,
            });
        }
        let mut engine = Self::new(weights);
        engine.points_per_stage = points_per_stage;
        Ok(engine)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    pub fn total_stages(&self) -> usize {
        TOTAL_STAGES
    }

    pub fn points_per_stage(&self) -> f64 {
        self.points_per_stage
    }

    pub fn weights(&self) -> GrowthWeights {
        self.weights
    }

    pub fn is_fully_grown(&self) -> bool {
        self.current_stage == TOTAL_STAGES - 1
    }

    /// Fraction of the way from the current stage to the next, `0.0..=1.0`.
    pub fn progress_to_next(&self) -> f64 {
        if self.is_fully_grown() {
            return 1.0;
        }
        let base = self.current_stage as f64 * self.points_per_stage;
        ((self.score - base) / self.points_per_stage).clamp(0.0, 1.0)
    }

    pub fn current_asset(&self) -> String {
        stage_asset(self.current_stage)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Shared handle to the bus, for publishing without holding a borrow of
    /// the engine.
    pub fn bus_handle(&self) -> Rc<EventBus> {
        Rc::clone(&self.bus)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Add weighted points and publish `StageAdvanced` if the stage moved.
    pub fn update(&mut self, hours: f64, laps: u32, tasks: u32) -> Option<usize> {
        let advanced = self.record(hours, laps, tasks);
        if let Some(stage) = advanced {
            self.bus.publish(advance_event(stage));
        }
        advanced
    }

    /// Derive the threshold from a study-hour target so the final stage is
    /// reached when exactly that many hours have been scored.
    ///
    /// The accumulated score is kept.
    pub fn set_target(&mut self, study_hours: f64) -> Result<Option<usize>, ValidationError> {
        let advanced = self.retarget(study_hours)?;
        if let Some(stage) = advanced {
            self.bus.publish(advance_event(stage));
        }
        Ok(advanced)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// `set_target` without publishing.
    pub(crate) fn retarget(&mut self, study_hours: f64) -> Result<Option<usize>, ValidationError> {
        if !study_hours.is_finite() || study_hours < 0.0 {
            return Err(ValidationError::InvalidHours {
                hours: study_hours,
                message: "target must be a non-negative number".into(),
            });
        }
        let derived = (study_hours * self.weights.hours) / (TOTAL_STAGES - 1) as f64;
        self.points_per_stage = derived.max(MIN_POINTS_PER_STAGE);
        tracing::debug!(
            study_hours,
            points_per_stage = self.points_per_stage,
            "growth target set"
        );
        Ok(self.recompute_stage())
    }

    fn record(&mut self, hours: f64, laps: u32, tasks: u32) -> Option<usize> {
        let hours = if hours.is_finite() && hours >= 0.0 {
            hours
        } else {
            tracing::warn!(
                target: "evergreen::invariant",
                hours,
                "negative or non-finite hours signal clamped to 0"
            );
            0.0
        };
        let points = self.weights.points(hours, laps, tasks);
        if !points.is_finite() || points < 0.0 {
            tracing::warn!(
                target: "evergreen::invariant",
                points,
                "negative or non-finite points ignored"
            );
            return None;
        }
        self.score += points;
        tracing::debug!(score = self.score, hours, laps, tasks, "growth score updated");
        self.recompute_stage()
    }

    fn recompute_stage(&mut self) -> Option<usize> {
        let max = TOTAL_STAGES - 1;
        let raw = (self.score / self.points_per_stage).floor();
        if !raw.is_finite() || raw < 0.0 {
            tracing::warn!(
                target: "evergreen::invariant",
                score = self.score,
                points_per_stage = self.points_per_stage,
                "stage computation out of range; keeping current stage"
            );
            return None;
        }
        let stage = (raw as usize).min(max);
        if stage <= self.current_stage {
            return None;
        }
        self.current_stage = stage;
        tracing::info!(stage, asset = %stage_asset(stage), "growth stage advanced");
        Some(stage)
    }
}

impl Default for GrowthEngine {
    fn default() -> Self {
        Self::new(GrowthWeights::default())
    }
}

pub(crate) fn advance_event(stage: usize) -> Event {
    Event::StageAdvanced {
        stage,
        asset: stage_asset(stage),
    }
}

/// Translates bus events into growth signals.
///
/// Each completed lap also scores its share of the planned study hours, so
/// finishing the plan scores exactly the planned hours. Unknown event kinds
/// are ignored.
#[derive(Debug)]
pub struct GrowthObserver {
    engine: Rc<RefCell<GrowthEngine>>,
    hours_per_lap: Cell<f64>,
}

impl GrowthObserver {
    pub fn new(engine: Rc<RefCell<GrowthEngine>>) -> Self {
        Self {
            engine,
            hours_per_lap: Cell::new(0.0),
        }
    }

    /// Hours scored for every completed lap.
    pub fn hours_per_lap(&self) -> f64 {
        self.hours_per_lap.get()
    }

    /// Spread `budget_hours` evenly over `total_laps`.
    pub fn set_lap_budget(&self, budget_hours: f64, total_laps: u32) {
        let per_lap = if total_laps == 0 || !budget_hours.is_finite() || budget_hours < 0.0 {
            0.0
        } else {
            budget_hours / f64::from(total_laps)
        };
        self.hours_per_lap.set(per_lap);
    }

    /// Bind to every event kind this observer scores.
    pub fn bind_to(self: &Rc<Self>, bus: &EventBus) {
        bus.subscribe(EventKind::TaskCompleted, self);
        bus.subscribe(EventKind::LapComplete, self);
        bus.subscribe(EventKind::PomodoroDone, self);
    }

    pub fn engine(&self) -> &Rc<RefCell<GrowthEngine>> {
        &self.engine
    }
}

impl Listener<Event> for GrowthObserver {
    fn on_event(&self, event: &Event) {
        let (hours, laps, tasks) = match event {
            Event::TaskCompleted { .. } => (0.0, 0, 1),
            Event::LapComplete { laps } => {
                (self.hours_per_lap.get() * f64::from(*laps), *laps, 0)
            }
            Event::PomodoroDone { laps_completed } => (0.0, *laps_completed, 0),
            _ => return,
        };

        // Publish after releasing the borrow so stage listeners can read the engine.
        let (advanced, bus) = match self.engine.try_borrow_mut() {
            Ok(mut engine) => (engine.record(hours, laps, tasks), engine.bus_handle()),
            Err(_) => {
                tracing::warn!(
                    target: "evergreen::invariant",
                    "growth engine already borrowed; signal dropped"
                );
                return;
            }
        };
        if let Some(stage) = advanced {
            bus.publish(advance_event(stage));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Task};

    fn task() -> Task {
        Task {
            id: "t1".into(),
            title: "Read".into(),
            priority: Priority::Medium,
            completed: true,
        }
    }

    #[test]
    fn fixed_threshold_advances_by_floor() {
        let mut engine = GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, 5.0).unwrap();
        assert_eq!(engine.update(0.0, 4, 0), None);
        assert_eq!(engine.current_stage(), 0);
        assert_eq!(engine.update(0.0, 0, 1), Some(1));
        assert_eq!(engine.score(), 7.0);
        assert_eq!(engine.update(2.0, 0, 0), Some(2));
        assert_eq!(engine.current_asset(), "3.png");
    }

    #[test]
    fn target_hours_threshold() {
        let mut engine = GrowthEngine::new(GrowthWeights::STANDARD);
        engine.set_target(10.0).unwrap();
        assert_eq!(engine.points_per_stage(), 2.0);

        // 21 points -> floor(21 / 2) = 10, the final stage.
        engine.update(0.0, 0, 7);
        assert_eq!(engine.score(), 21.0);
        assert_eq!(engine.current_stage(), 10);
        assert!(engine.is_fully_grown());
    }

    #[test]
    fn studying_the_target_reaches_the_final_stage() {
        let mut engine = GrowthEngine::new(GrowthWeights::GENTLE);
        engine.set_target(5.0).unwrap();
        engine.update(4.5, 0, 0);
        assert_eq!(engine.current_stage(), 9);
        engine.update(0.5, 0, 0);
        assert_eq!(engine.current_stage(), 10);
    }

    #[test]
    fn derived_threshold_has_floor() {
        let mut engine = GrowthEngine::default();
        engine.set_target(1.0).unwrap();
        assert_eq!(engine.points_per_stage(), MIN_POINTS_PER_STAGE);
        engine.set_target(0.0).unwrap();
        assert_eq!(engine.points_per_stage(), MIN_POINTS_PER_STAGE);
        assert!(engine.set_target(-3.0).is_err());
        assert!(engine.set_target(f64::INFINITY).is_err());
    }

    #[test]
    fn set_target_keeps_score() {
        let mut engine = GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, 100.0).unwrap();
        engine.update(0.0, 6, 0);
        assert_eq!(engine.current_stage(), 0);

        // Lowering the threshold advances with the existing score.
        assert_eq!(engine.set_target(10.0), Ok(Some(3)));
        assert_eq!(engine.score(), 6.0);
    }

    #[test]
    fn stage_never_regresses() {
        let mut engine = GrowthEngine::new(GrowthWeights::STANDARD);
        engine.set_target(10.0).unwrap();
        engine.update(0.0, 0, 2);
        assert_eq!(engine.current_stage(), 3);

        engine.set_target(1000.0).unwrap();
        assert_eq!(engine.current_stage(), 3);
        engine.update(0.0, 1, 0);
        assert_eq!(engine.current_stage(), 3);
    }

    #[test]
    fn negative_hours_are_clamped() {
        let mut engine = GrowthEngine::default();
        engine.update(-5.0, 0, 0);
        engine.update(f64::NAN, 0, 0);
        assert_eq!(engine.score(), 0.0);
    }

    #[test]
    fn weights_must_be_non_negative() {
        assert_eq!(GrowthWeights::STANDARD.validate(), Ok(()));
        let negative = GrowthWeights {
            laps: -5.0,
            ..GrowthWeights::STANDARD
        };
        assert_eq!(
            negative.validate(),
            Err(ValidationError::InvalidWeight {
                signal: "laps".into(),
                value: -5.0,
            })
        );
        assert!(GrowthEngine::with_points_per_stage(negative, 5.0).is_err());

        // Built directly, the engine still refuses to lower the score.
        let mut engine = GrowthEngine::new(negative);
        engine.update(0.0, 2, 0);
        assert_eq!(engine.score(), 0.0);
        assert_eq!(engine.current_stage(), 0);
    }

    #[test]
    fn rejects_bad_fixed_threshold() {
        assert!(GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, 0.0).is_err());
        assert!(GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, f64::NAN).is_err());
    }

    #[test]
    fn progress_to_next_is_fractional() {
        let mut engine = GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, 4.0).unwrap();
        engine.update(0.0, 5, 0);
        assert_eq!(engine.current_stage(), 1);
        assert_eq!(engine.progress_to_next(), 0.25);
    }

    #[test]
    fn observer_maps_events_to_signals() {
        let engine = Rc::new(RefCell::new(
            GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, 1.0).unwrap(),
        ));
        let observer = GrowthObserver::new(Rc::clone(&engine));

        observer.on_event(&Event::TaskCompleted { task: task() });
        assert_eq!(engine.borrow().score(), 3.0);
        observer.on_event(&Event::LapComplete { laps: 1 });
        assert_eq!(engine.borrow().score(), 4.0);
        observer.on_event(&Event::PomodoroDone { laps_completed: 3 });
        assert_eq!(engine.borrow().score(), 7.0);

        // Not scored.
        observer.on_event(&Event::TasksReset { removed: 2 });
        observer.on_event(&Event::StageAdvanced {
            stage: 9,
            asset: "10.png".into(),
        });
        assert_eq!(engine.borrow().score(), 7.0);
    }

    #[test]
    fn observer_scores_each_laps_share_of_the_plan() {
        let weights = GrowthWeights {
            laps: 0.0,
            ..GrowthWeights::STANDARD
        };
        let engine = Rc::new(RefCell::new(GrowthEngine::new(weights)));
        engine.borrow_mut().set_target(5.0).unwrap();
        let observer = GrowthObserver::new(Rc::clone(&engine));
        observer.set_lap_budget(5.0, 4);
        assert_eq!(observer.hours_per_lap(), 1.25);

        for _ in 0..3 {
            observer.on_event(&Event::LapComplete { laps: 1 });
        }
        assert_eq!(engine.borrow().current_stage(), 7);
        observer.on_event(&Event::LapComplete { laps: 1 });
        assert_eq!(engine.borrow().score(), 10.0);
        assert!(engine.borrow().is_fully_grown());

        // The done bonus counts laps, not hours.
        observer.on_event(&Event::PomodoroDone { laps_completed: 4 });
        assert_eq!(engine.borrow().score(), 10.0);

        observer.set_lap_budget(1.0, 0);
        assert_eq!(observer.hours_per_lap(), 0.0);
    }

    #[test]
    fn observer_publishes_stage_after_releasing_engine() {
        let engine = Rc::new(RefCell::new(
            GrowthEngine::with_points_per_stage(GrowthWeights::STANDARD, 3.0).unwrap(),
        ));
        let observer = Rc::new(GrowthObserver::new(Rc::clone(&engine)));
        let source = EventBus::new();
        observer.bind_to(&source);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let reader = {
            let engine = Rc::clone(&engine);
            let seen = Rc::clone(&seen);
            Rc::new(move |e: &Event| {
                if let Event::StageAdvanced { stage, .. } = e {
                    // Reading the engine here must not panic.
                    seen.borrow_mut().push((*stage, engine.borrow().current_stage()));
                }
            })
        };
        engine.borrow().bus().subscribe(EventKind::StageAdvanced, &reader);

        source.publish(Event::TaskCompleted { task: task() });
        assert_eq!(*seen.borrow(), vec![(1, 1)]);
    }
}
