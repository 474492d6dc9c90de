//! Task store.
//!
//! An ordered collection of title/priority/completion records. Every
//! mutation publishes on the store's bus before returning.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::events::{Event, EventBus};

/// Task priority. Orders `Low < Medium < High`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ValidationError::InvalidPriority { value: s.to_string() }),
        }
    }
}

/// How `list()` orders tasks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrdering {
    /// Oldest first.
    Insertion,
    /// Highest priority first; ties keep insertion order.
    PriorityDescending,
}

impl Default for TaskOrdering {
    fn default() -> Self {
        TaskOrdering::PriorityDescending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub completed: bool,
}

#[derive(Debug)]
pub struct TaskStore {
    /// Insertion order.
    tasks: Vec<Task>,
    ordering: TaskOrdering,
    bus: EventBus,
}

impl TaskStore {
    pub fn new(ordering: TaskOrdering) -> Self {
        Self {
            tasks: Vec::new(),
            ordering,
            bus: EventBus::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn ordering(&self) -> TaskOrdering {
        self.ordering
    }

    pub fn set_ordering(&mut self, ordering: TaskOrdering) {
        self.ordering = ordering;
    }

    /// Create a task. The title is trimmed and must not be empty.
    pub fn add(&mut self, title: &str, priority: Priority) -> Result<Task, ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            priority,
            completed: false,
        };
        self.tasks.push(task.clone());
        tracing::debug!(id = %task.id, priority = %task.priority, "task added");
        self.bus.publish(Event::TaskAdded { task: task.clone() });
        Ok(task)
    }

    /// Mark a task completed.
    ///
    /// Returns `Ok(false)` without publishing if it was already completed.
    pub fn complete(&mut self, id: &str) -> Result<bool, ValidationError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ValidationError::UnknownTask { id: id.to_string() })?;
        if task.completed {
            return Ok(false);
        }
        task.completed = true;
        let task = task.clone();
        tracing::debug!(id = %task.id, "task completed");
        self.bus.publish(Event::TaskCompleted { task });
        Ok(true)
    }

    /// Remove a task whether or not it is completed.
    pub fn delete(&mut self, id: &str) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(pos);
        tracing::debug!(id = %task.id, "task removed");
        self.bus.publish(Event::TaskRemoved { task: task.clone() });
        Some(task)
    }

    /// Clear the store. Returns how many tasks were removed.
    pub fn reset_all(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        tracing::debug!(removed, "tasks reset");
        self.bus.publish(Event::TasksReset { removed });
        removed
    }

    /// Snapshot in the configured order.
    pub fn list(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        if self.ordering == TaskOrdering::PriorityDescending {
            // Stable sort keeps insertion order among equal priorities.
            tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(TaskOrdering::default())
    }
}
