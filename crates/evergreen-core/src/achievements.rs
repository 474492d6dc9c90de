//! Task-completion milestones.

use std::cell::Cell;
use std::rc::Rc;

use crate::bus::Listener;
use crate::events::{Event, EventBus, EventKind};

pub const DEFAULT_MILESTONES: [u32; 2] = [5, 10];

/// Counts completed tasks and publishes `AchievementUnlocked` the first time
/// the count reaches each milestone.
#[derive(Debug)]
pub struct AchievementTracker {
    milestones: Vec<u32>,
    completed: Cell<u32>,
    bus: EventBus,
}

impl AchievementTracker {
    pub fn new(milestones: impl IntoIterator<Item = u32>) -> Self {
        let mut milestones: Vec<u32> = milestones.into_iter().filter(|m| *m > 0).collect();
        milestones.sort_unstable();
        milestones.dedup();
        Self {
            milestones,
            completed: Cell::new(0),
            bus: EventBus::new(),
        }
    }

    pub fn bind_to(self: &Rc<Self>, bus: &EventBus) {
        bus.subscribe(EventKind::TaskCompleted, self);
    }

    pub fn completed_tasks(&self) -> u32 {
        self.completed.get()
    }

    /// Milestones reached so far.
    pub fn unlocked(&self) -> Vec<u32> {
        let count = self.completed.get();
        self.milestones.iter().copied().filter(|m| *m <= count).collect()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl Default for AchievementTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MILESTONES)
    }
}

impl Listener<Event> for AchievementTracker {
    fn on_event(&self, event: &Event) {
        if !matches!(event, Event::TaskCompleted { .. }) {
            return;
        }
        let count = self.completed.get() + 1;
        self.completed.set(count);
        // The count only grows, so each milestone fires once.
        if self.milestones.contains(&count) {
            tracing::info!(tasks_completed = count, "achievement unlocked");
            self.bus.publish(Event::AchievementUnlocked {
                tasks_completed: count,
            });
        }
    }
}
