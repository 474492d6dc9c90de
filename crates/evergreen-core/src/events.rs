use serde::{Deserialize, Serialize};

use crate::bus::{NotificationBus, Topic};
use crate::ledger::LedgerData;
use crate::task::Task;
use crate::timer::PomodoroState;

/// Every state change in the core produces an Event.
/// The presentation layer subscribes to the buses that carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TaskAdded {
        task: Task,
    },
    TaskCompleted {
        task: Task,
    },
    TaskRemoved {
        task: Task,
    },
    TasksReset {
        removed: usize,
    },
    /// A WORK block ran out. `laps` is always 1.
    LapComplete {
        laps: u32,
    },
    /// Per-second display update from the pomodoro engine.
    PomodoroTick {
        display: String,
        kind: PomodoroState,
        laps_remaining: u32,
    },
    PomodoroDone {
        laps_completed: u32,
    },
    /// Full ledger snapshot after a mutation.
    DataUpdated {
        data: LedgerData,
    },
    StageAdvanced {
        stage: usize,
        asset: String,
    },
    AchievementUnlocked {
        tasks_completed: u32,
    },
}

/// Discriminant of [`Event`], used to bind listeners to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskAdded,
    TaskCompleted,
    TaskRemoved,
    TasksReset,
    LapComplete,
    PomodoroTick,
    PomodoroDone,
    DataUpdated,
    StageAdvanced,
    AchievementUnlocked,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskAdded => "task_added",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskRemoved => "task_removed",
            EventKind::TasksReset => "tasks_reset",
            EventKind::LapComplete => "lap_complete",
            EventKind::PomodoroTick => "pomodoro_tick",
            EventKind::PomodoroDone => "pomodoro_done",
            EventKind::DataUpdated => "data_updated",
            EventKind::StageAdvanced => "stage_advanced",
            EventKind::AchievementUnlocked => "achievement_unlocked",
        }
    }
}

impl Topic for Event {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Event::TaskAdded { .. } => EventKind::TaskAdded,
            Event::TaskCompleted { .. } => EventKind::TaskCompleted,
            Event::TaskRemoved { .. } => EventKind::TaskRemoved,
            Event::TasksReset { .. } => EventKind::TasksReset,
            Event::LapComplete { .. } => EventKind::LapComplete,
            Event::PomodoroTick { .. } => EventKind::PomodoroTick,
            Event::PomodoroDone { .. } => EventKind::PomodoroDone,
            Event::DataUpdated { .. } => EventKind::DataUpdated,
            Event::StageAdvanced { .. } => EventKind::StageAdvanced,
            Event::AchievementUnlocked { .. } => EventKind::AchievementUnlocked,
        }
    }
}

/// The bus type every component in this crate publishes on.
pub type EventBus = NotificationBus<Event>;
