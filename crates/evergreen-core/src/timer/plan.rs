use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Largest study-hour budget a plan accepts.
pub const MAX_BUDGET_HOURS: f64 = 10_000.0;

/// Largest lap count a plan holds, whether derived or explicit.
pub const MAX_LAPS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Work,
    Break,
}

/// Finite state of the pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PomodoroState {
    Work,
    Break,
    Done,
}

impl From<BlockKind> for PomodoroState {
    fn from(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Work => PomodoroState::Work,
            BlockKind::Break => PomodoroState::Break,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub duration_secs: u64,
}

/// How the lap count of a plan is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapBudget {
    /// Fit as many laps as possible into this many study hours.
    Hours(f64),
    /// Use exactly this many laps.
    Laps(u32),
}

/// Alternating WORK/BREAK blocks for a fixed number of laps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroPlan {
    pub work_duration_secs: u64,
    pub break_duration_secs: u64,
    pub total_laps: u32,
    pub blocks: Vec<Block>,
}

impl PomodoroPlan {
    pub fn build(
        budget: LapBudget,
        work_duration_secs: u64,
        break_duration_secs: u64,
    ) -> Result<Self, ValidationError> {
        validate_duration("work_duration_secs", work_duration_secs)?;
        validate_duration("break_duration_secs", break_duration_secs)?;

        let total_laps = match budget {
            LapBudget::Hours(hours) => {
                validate_budget_hours(hours)?;
                laps_for_hours(hours, work_duration_secs, break_duration_secs)
            }
            LapBudget::Laps(0) => return Err(ValidationError::InvalidLapCount),
            LapBudget::Laps(laps) => laps,
        };
        if total_laps > MAX_LAPS {
            return Err(ValidationError::InvalidLapCount);
        }

        let blocks = (0..total_laps)
            .flat_map(|_| {
                [
                    Block {
                        kind: BlockKind::Work,
                        duration_secs: work_duration_secs,
                    },
                    Block {
                        kind: BlockKind::Break,
                        duration_secs: break_duration_secs,
                    },
                ]
            })
            .collect();

        Ok(Self {
            work_duration_secs,
            break_duration_secs,
            total_laps,
            blocks,
        })
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.blocks.iter().map(|b| b.duration_secs).sum()
    }

    pub fn work_duration_total_secs(&self) -> u64 {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Work)
            .map(|b| b.duration_secs)
            .sum()
    }
}

/// `max(1, floor(hours * 3600 / (work + break)))`.
///
/// Inputs are assumed validated.
pub fn laps_for_hours(study_hours: f64, work_duration_secs: u64, break_duration_secs: u64) -> u32 {
    let cycle = work_duration_secs.saturating_add(break_duration_secs).max(1);
    let study_secs = (study_hours * 3600.0).floor().max(0.0) as u64;
    let laps = (study_secs / cycle).max(1);
    u32::try_from(laps).unwrap_or(u32::MAX)
}

/// Render seconds as zero-padded `MM:SS`.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub(crate) fn validate_budget_hours(hours: f64) -> Result<(), ValidationError> {
    if !hours.is_finite() {
        return Err(ValidationError::InvalidHours {
            hours,
            message: "must be a finite number".into(),
        });
    }
    if hours <= 0.0 {
        return Err(ValidationError::InvalidHours {
            hours,
            message: "study budget must be greater than zero".into(),
        });
    }
    if hours > MAX_BUDGET_HOURS {
        return Err(ValidationError::InvalidHours {
            hours,
            message: format!("study budget must not exceed {MAX_BUDGET_HOURS} hours"),
        });
    }
    Ok(())
}

fn validate_duration(field: &str, secs: u64) -> Result<(), ValidationError> {
    if secs == 0 {
        return Err(ValidationError::InvalidDuration {
            field: field.into(),
            value: secs,
        });
    }
    Ok(())
}
