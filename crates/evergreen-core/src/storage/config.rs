//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Pomodoro block durations
//! - Growth weights and threshold strategy
//! - Task list ordering
//! - Which hours feed the Pomodoro budget
//! - An optional ledger file override
//!
//! Configuration is stored at `~/.config/evergreen/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::growth::{GrowthEngine, GrowthWeights, DEFAULT_POINTS_PER_STAGE};
use crate::task::TaskOrdering;

/// Block durations for the Pomodoro engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    #[serde(default = "default_work_duration")]
    pub work_duration_secs: u64,
    #[serde(default = "default_break_duration")]
    pub break_duration_secs: u64,
}

/// How the growth engine derives points per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// Use `fixed_points_per_stage` throughout.
    Fixed,
    /// Re-derive from the planned study hours on every plan.
    TargetHours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSettings {
    #[serde(default = "default_hours_weight")]
    pub hours_weight: f64,
    #[serde(default = "default_laps_weight")]
    pub laps_weight: f64,
    #[serde(default = "default_tasks_weight")]
    pub tasks_weight: f64,
    #[serde(default = "default_threshold")]
    pub threshold: ThresholdStrategy,
    #[serde(default = "default_fixed_points_per_stage")]
    pub fixed_points_per_stage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    #[serde(default)]
    pub ordering: TaskOrdering,
}

/// Which hours a new plan is sized from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanBudget {
    /// The hours just recorded for the date.
    #[default]
    Day,
    /// The ledger's running total.
    Cumulative,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub budget: PlanBudget,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Ledger JSON path. Defaults to `<data_dir>/evergreen_data.json`.
    #[serde(default)]
    pub data_file: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/evergreen/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pomodoro: PomodoroSettings,
    #[serde(default)]
    pub growth: GrowthSettings,
    #[serde(default)]
    pub tasks: TaskSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

fn default_work_duration() -> u64 {
    1500
}
fn default_break_duration() -> u64 {
    300
}
fn default_hours_weight() -> f64 {
    GrowthWeights::STANDARD.hours
}
fn default_laps_weight() -> f64 {
    GrowthWeights::STANDARD.laps
}
fn default_tasks_weight() -> f64 {
    GrowthWeights::STANDARD.tasks
}
fn default_threshold() -> ThresholdStrategy {
    ThresholdStrategy::TargetHours
}
fn default_fixed_points_per_stage() -> f64 {
    DEFAULT_POINTS_PER_STAGE
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration_secs: default_work_duration(),
            break_duration_secs: default_break_duration(),
        }
    }
}

impl Default for GrowthSettings {
    fn default() -> Self {
        Self {
            hours_weight: default_hours_weight(),
            laps_weight: default_laps_weight(),
            tasks_weight: default_tasks_weight(),
            threshold: default_threshold(),
            fixed_points_per_stage: default_fixed_points_per_stage(),
        }
    }
}

impl GrowthSettings {
    pub fn weights(&self) -> GrowthWeights {
        GrowthWeights {
            hours: self.hours_weight,
            laps: self.laps_weight,
            tasks: self.tasks_weight,
        }
    }

    /// A fresh engine using these weights and threshold.
    ///
    /// Under `TargetHours` the threshold stays at the default until the
    /// first `set_target`.
    pub fn build_engine(&self) -> Result<GrowthEngine, ValidationError> {
        self.weights().validate()?;
        match self.threshold {
            ThresholdStrategy::Fixed => {
                GrowthEngine::with_points_per_stage(self.weights(), self.fixed_points_per_stage)
            }
            ThresholdStrategy::TargetHours => Ok(GrowthEngine::new(self.weights())),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    /// Replace a leaf, coercing `value` to the type already stored there.
    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
            ),
            serde_json::Value::Number(n) if n.is_u64() => {
                let n = value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                serde_json::Value::Number(n.into())
            }
            serde_json::Value::Number(_) => value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?,
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                return Err(invalid("cannot replace a whole section".into()));
            }
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    fn collect_keys(prefix: &str, value: &serde_json::Value, keys: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (name, child) in map {
                    let path = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    Self::collect_keys(&path, child, keys);
                }
            }
            _ => keys.push(prefix.to_string()),
        }
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/evergreen"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) | serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Call `save` to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        *self = updated;
        Ok(())
    }

    /// Every settable dot-path key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            Self::collect_keys("", &json, &mut keys);
        }
        keys.sort();
        keys
    }

    /// Values the engines would reject.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("pomodoro.work_duration_secs", self.pomodoro.work_duration_secs),
            ("pomodoro.break_duration_secs", self.pomodoro.break_duration_secs),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidDuration {
                    field: field.into(),
                    value,
                });
            }
        }
        let pps = self.growth.fixed_points_per_stage;
        if !pps.is_finite() || pps <= 0.0 {
            return Err(ValidationError::InvalidThreshold { value: pps });
        }
        self.growth.build_engine().map(|_| ())
    }

    /// Ledger file path, honouring the `storage.data_file` override.
    pub fn data_file(&self) -> Option<PathBuf> {
        self.storage.data_file.as_ref().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.pomodoro.work_duration_secs, 1500);
        assert_eq!(parsed.growth.threshold, ThresholdStrategy::TargetHours);
        assert_eq!(parsed.session.budget, PlanBudget::Day);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [pomodoro]
            work_duration_secs = 60

            [tasks]
            ordering = "insertion"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pomodoro.work_duration_secs, 60);
        assert_eq!(cfg.pomodoro.break_duration_secs, 300);
        assert_eq!(cfg.tasks.ordering, TaskOrdering::Insertion);
        assert_eq!(cfg.growth.weights(), GrowthWeights::STANDARD);
    }

    #[test]
    fn get_reads_dot_paths() {
        let cfg = Config::default();
        assert_eq!(cfg.get("pomodoro.break_duration_secs").as_deref(), Some("300"));
        assert_eq!(cfg.get("growth.threshold").as_deref(), Some("target_hours"));
        assert_eq!(cfg.get("growth"), None);
        assert_eq!(cfg.get("nope.nothing"), None);
        assert_eq!(cfg.get(""), None);
    }

    #[test]
    fn set_checks_type_against_existing_value() {
        let mut cfg = Config::default();
        cfg.set("pomodoro.work_duration_secs", "600").unwrap();
        assert_eq!(cfg.pomodoro.work_duration_secs, 600);

        cfg.set("growth.laps_weight", "0.5").unwrap();
        assert_eq!(cfg.growth.laps_weight, 0.5);

        cfg.set("growth.threshold", "fixed").unwrap();
        assert_eq!(cfg.growth.threshold, ThresholdStrategy::Fixed);

        assert!(matches!(
            cfg.set("pomodoro.work_duration_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("growth.threshold", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("pomodoro.lunch_secs", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("growth", "1"), Err(ConfigError::InvalidValue { .. })));
        assert_eq!(cfg.pomodoro.work_duration_secs, 600);
    }

    #[test]
    fn set_rejects_values_engines_would_refuse() {
        let mut cfg = Config::default();
        assert!(cfg.set("pomodoro.break_duration_secs", "0").is_err());
        assert!(cfg.set("growth.fixed_points_per_stage", "-2").is_err());
        for key in ["growth.hours_weight", "growth.laps_weight", "growth.tasks_weight"] {
            let err = cfg.set(key, "-5").unwrap_err();
            assert!(err.to_string().contains("weight"), "{key}: {err}");
        }
        assert_eq!(cfg, Config::default());

        // Zero switches a signal off.
        cfg.set("growth.laps_weight", "0").unwrap();
        assert_eq!(cfg.growth.weights().laps, 0.0);
    }

    #[test]
    fn set_optional_data_file() {
        let mut cfg = Config::default();
        cfg.set("storage.data_file", "/tmp/ledger.json").unwrap();
        assert_eq!(cfg.data_file(), Some(PathBuf::from("/tmp/ledger.json")));
    }

    #[test]
    fn keys_lists_every_leaf() {
        let keys = Config::default().keys();
        assert!(keys.contains(&"pomodoro.work_duration_secs".to_string()));
        assert!(keys.contains(&"growth.fixed_points_per_stage".to_string()));
        assert!(keys.contains(&"session.budget".to_string()));
        assert!(keys.contains(&"storage.data_file".to_string()));
        assert!(!keys.contains(&"growth".to_string()));
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("session.budget", "cumulative").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().session.budget, PlanBudget::Cumulative);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pomodoro = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn build_engine_follows_threshold() {
        let mut settings = GrowthSettings::default();
        assert_eq!(settings.build_engine().unwrap().points_per_stage(), DEFAULT_POINTS_PER_STAGE);
        settings.threshold = ThresholdStrategy::Fixed;
        settings.fixed_points_per_stage = 4.0;
        assert_eq!(settings.build_engine().unwrap().points_per_stage(), 4.0);
    }
}
