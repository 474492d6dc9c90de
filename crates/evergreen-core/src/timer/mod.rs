mod engine;
pub(crate) mod plan;

pub use engine::{PomodoroEngine, PomodoroSnapshot, DONE_DISPLAY};
pub use plan::{
    format_clock, laps_for_hours, Block, BlockKind, LapBudget, PomodoroPlan, PomodoroState,
    MAX_BUDGET_HOURS, MAX_LAPS,
};
