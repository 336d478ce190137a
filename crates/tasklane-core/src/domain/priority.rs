//! Priority classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Priority class of a task. Each class has its own queue lane and its own
/// dedicated workers, so a flood in one class cannot starve another.
///
/// `Ord` follows dispatch preference: `Urgent < Critical < ... < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    /// All classes, highest first.
    pub const ALL: [Priority; 5] = [
        Priority::Urgent,
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Position of this class in [`Priority::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "urgent" => Ok(Priority::Urgent),
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(ValidationError::UnknownPriority(s.to_string())),
        }
    }
}
