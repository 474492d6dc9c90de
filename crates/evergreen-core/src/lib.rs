//! # Evergreen Core Library
//!
//! This library provides the core logic for Evergreen, a study tracker that
//! grows a plant as the user studies. Presentation layers (the bundled CLI)
//! own the real timers and the terminal; everything stateful lives here.
//!
//! ## Architecture
//!
//! - **Notification Bus**: Synchronous, weakly-bound publish/subscribe used by
//!   every component to broadcast its changes
//! - **Pomodoro Engine**: A tick-driven WORK/BREAK state machine sized from a
//!   study-hour budget
//! - **Growth Engine**: Weighted scoring of hours, laps and tasks into one of
//!   eleven monotonic growth stages
//! - **Study Ledger**: Per-date study hours with background JSON persistence
//! - **Storage**: Ledger stores and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`StudySession`]: Wires every engine together for a presentation layer
//! - [`PomodoroEngine`]: Pomodoro cycle state machine
//! - [`GrowthEngine`]: Growth score and stage
//! - [`StudyLedger`]: Study hours and elapsed minutes
//! - [`Config`]: Application configuration management

pub mod achievements;
pub mod bus;
pub mod clock;
pub mod error;
pub mod events;
pub mod growth;
pub mod ledger;
pub mod session;
pub mod storage;
pub mod task;
pub mod timer;

pub use achievements::AchievementTracker;
pub use bus::{Listener, NotificationBus, SubscriptionId, Topic};
pub use clock::{Cadence, Clock, ManualClock};
pub use error::{ConfigError, CoreError, PersistenceError, ValidationError};
pub use events::{Event, EventBus, EventKind};
pub use growth::{GrowthEngine, GrowthObserver, GrowthWeights, TOTAL_STAGES};
pub use ledger::{LedgerData, PendingSave, StudyLedger};
pub use session::StudySession;
pub use storage::{Config, JsonFileStore, LedgerStore, MemoryStore};
pub use task::{Priority, Task, TaskOrdering, TaskStore};
pub use timer::{LapBudget, PomodoroEngine, PomodoroPlan, PomodoroSnapshot, PomodoroState};
