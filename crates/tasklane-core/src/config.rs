//! ProcessorConfig - 実行時パラメータ
//!
//! 読み込み順: デフォルト値 → JSON ファイル（任意）→ `TASKLANE_*` 環境変数。
//! 最後に `validate()` を通ったものだけを Processor に渡す。
//! 時間系のフィールドは JSON 上では秒（小数可）で表す。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Priority;
use crate::queue::{LaneCapacities, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Sizing input for the Normal lane (`max(1, max_workers / 2)` workers).
    pub max_workers: usize,
    pub queue_capacities: LaneCapacities,

    #[serde(rename = "scheduler_interval_secs", with = "secs")]
    pub scheduler_interval: Duration,
    #[serde(rename = "monitor_interval_secs", with = "secs")]
    pub monitor_interval: Duration,
    /// How long an idle worker waits on its lane before re-checking shutdown.
    #[serde(rename = "pop_wait_secs", with = "secs")]
    pub pop_wait: Duration,
    /// Grace added to `timeout_seconds` before the monitor calls a task stuck.
    #[serde(rename = "stuck_buffer_secs", with = "secs")]
    pub stuck_buffer: Duration,
    #[serde(rename = "task_retention_secs", with = "secs")]
    pub task_retention: Duration,
    #[serde(rename = "log_retention_secs", with = "secs")]
    pub log_retention: Duration,

    pub default_timeout_seconds: u64,
    pub default_max_retries: u32,

    #[serde(rename = "retry_base_delay_secs", with = "secs")]
    pub retry_base_delay: Duration,
    #[serde(rename = "retry_max_delay_secs", with = "secs")]
    pub retry_max_delay: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            queue_capacities: LaneCapacities::default(),
            scheduler_interval: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(60),
            pop_wait: Duration::from_secs(1),
            stuck_buffer: Duration::from_secs(60),
            task_retention: Duration::from_secs(24 * 60 * 60),
            log_retention: Duration::from_secs(7 * 24 * 60 * 60),
            default_timeout_seconds: 300,
            default_max_retries: 3,
            retry_base_delay: Duration::from_secs(5),
            retry_max_delay: Duration::from_secs(300),
        }
    }
}

impl ProcessorConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `TASKLANE_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = parse_env::<usize>(&lookup, "TASKLANE_MAX_WORKERS")? {
            self.max_workers = v;
        }
        if let Some(v) = parse_env::<f64>(&lookup, "TASKLANE_SCHEDULER_INTERVAL_SECS")? {
            self.scheduler_interval = secs_to_duration("TASKLANE_SCHEDULER_INTERVAL_SECS", v)?;
        }
        if let Some(v) = parse_env::<f64>(&lookup, "TASKLANE_MONITOR_INTERVAL_SECS")? {
            self.monitor_interval = secs_to_duration("TASKLANE_MONITOR_INTERVAL_SECS", v)?;
        }
        if let Some(v) = parse_env::<f64>(&lookup, "TASKLANE_STUCK_BUFFER_SECS")? {
            self.stuck_buffer = secs_to_duration("TASKLANE_STUCK_BUFFER_SECS", v)?;
        }
        if let Some(v) = parse_env::<u64>(&lookup, "TASKLANE_TASK_RETENTION_HOURS")? {
            self.task_retention = scaled_secs("TASKLANE_TASK_RETENTION_HOURS", v, 60 * 60)?;
        }
        if let Some(v) = parse_env::<u64>(&lookup, "TASKLANE_LOG_RETENTION_DAYS")? {
            self.log_retention = scaled_secs("TASKLANE_LOG_RETENTION_DAYS", v, 24 * 60 * 60)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.scheduler_interval.is_zero() || self.monitor_interval.is_zero() {
            return Err(ConfigError::Invalid("loop intervals must be non-zero".into()));
        }
        if self.pop_wait.is_zero() {
            return Err(ConfigError::Invalid("pop_wait must be non-zero".into()));
        }
        if self.default_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "default_timeout_seconds must be greater than zero".into(),
            ));
        }
        if let Some(p) = Priority::ALL
            .into_iter()
            .find(|&p| self.queue_capacities.for_priority(p) == 0)
        {
            return Err(ConfigError::Invalid(format!("{p} lane capacity must be non-zero")));
        }
        Ok(())
    }

    /// Dedicated workers for one priority class.
    pub fn workers_for(&self, priority: Priority) -> usize {
        match priority {
            Priority::Urgent => 2,
            Priority::Critical => 2,
            Priority::High => 3,
            Priority::Normal => (self.max_workers / 2).max(1),
            Priority::Low => 1,
        }
    }

    pub fn total_workers(&self) -> usize {
        Priority::ALL.into_iter().map(|p| self.workers_for(p)).sum()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
    }
}

fn scaled_secs(key: &'static str, value: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidEnv {
            key,
            value: value.to_string(),
        })
}

fn secs_to_duration(key: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidEnv {
        key,
        value: secs.to_string(),
    })
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
