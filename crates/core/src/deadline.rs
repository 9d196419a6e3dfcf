//! Deadline urgency for tasks.
//!
//! Classification is a pure function of the task's window and an explicit
//! evaluation instant, so a live countdown can call it once per tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoarseStatus {
    #[default]
    Pending,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Completed,
    Overdue,
    Critical,
    Warning,
    Ok,
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyTier::Completed => write!(f, "completed"),
            UrgencyTier::Overdue => write!(f, "overdue"),
            UrgencyTier::Critical => write!(f, "critical"),
            UrgencyTier::Warning => write!(f, "warning"),
            UrgencyTier::Ok => write!(f, "ok"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeadlineError {
    #[error("Invalid deadline thresholds: critical={critical}, warning={warning}")]
    InvalidPolicy { critical: f64, warning: f64 },
}

/// Fractions of the window left at which a task turns critical or warning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadlinePolicy {
    critical_fraction: f64,
    warning_fraction: f64,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        DeadlinePolicy {
            critical_fraction: 0.05,
            warning_fraction: 0.30,
        }
    }
}

impl DeadlinePolicy {
    /// Requires `0 < critical < warning < 1`.
    pub fn new(critical_fraction: f64, warning_fraction: f64) -> Result<Self, DeadlineError> {
        let valid = critical_fraction > 0.0
            && critical_fraction < warning_fraction
            && warning_fraction < 1.0;
        if !valid {
            return Err(DeadlineError::InvalidPolicy {
                critical: critical_fraction,
                warning: warning_fraction,
            });
        }
        Ok(DeadlinePolicy {
            critical_fraction,
            warning_fraction,
        })
    }

    pub fn critical_fraction(&self) -> f64 {
        self.critical_fraction
    }

    pub fn warning_fraction(&self) -> f64 {
        self.warning_fraction
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineWindow {
    pub created_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
}

impl DeadlineWindow {
    pub fn new(created_at: DateTime<Utc>, due_at: Option<DateTime<Utc>>) -> Self {
        DeadlineWindow { created_at, due_at }
    }

    /// Share of the window still ahead of `now`, when it is well defined.
    ///
    /// `None` without a due date or when the due date does not come after
    /// the creation time.
    pub fn remaining_fraction(&self, now: DateTime<Utc>) -> Option<f64> {
        let due_at = self.due_at?;
        let total = (due_at - self.created_at).num_milliseconds();
        if total <= 0 {
            return None;
        }
        let remaining = (due_at - now).num_milliseconds();
        Some(remaining as f64 / total as f64)
    }
}

/// Time left until the due date, split for display.
///
/// The components are magnitudes; only `total_seconds` is negative once the
/// task is past due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub total_seconds: i64,
}

impl Remaining {
    pub fn from_total_seconds(total_seconds: i64) -> Self {
        let magnitude = total_seconds.saturating_abs();
        Remaining {
            days: magnitude / SECONDS_PER_DAY,
            hours: (magnitude % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
            minutes: (magnitude % SECONDS_PER_HOUR) / 60,
            seconds: magnitude % 60,
            total_seconds,
        }
    }

    pub fn is_past_due(&self) -> bool {
        self.total_seconds < 0
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_past_due() {
            write!(f, "overdue by ")?;
            if self.days > 0 {
                write!(f, "{}d ", self.days)?;
            }
            return write!(f, "{:02}h {:02}m", self.hours, self.minutes);
        }
        if self.days > 0 {
            write!(f, "{}d ", self.days)?;
        }
        write!(f, "{:02}h {:02}m {:02}s", self.hours, self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineStatus {
    pub tier: UrgencyTier,
    pub remaining: Option<Remaining>,
    pub formatted: String,
}

/// Everything the classifier needs about a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskClock {
    pub window: DeadlineWindow,
    pub completed: bool,
    pub status: CoarseStatus,
}

pub fn classify(task: &TaskClock, now: DateTime<Utc>, policy: &DeadlinePolicy) -> DeadlineStatus {
    let remaining = task
        .window
        .due_at
        .map(|due_at| {
            // Floor so that any instant past due reads as negative.
            let millis = (due_at - now).num_milliseconds();
            Remaining::from_total_seconds(millis.div_euclid(1000))
        });

    if task.completed {
        return DeadlineStatus {
            tier: UrgencyTier::Completed,
            remaining,
            formatted: "completed".to_string(),
        };
    }

    // Without a due date the badge follows the coarse status.
    let Some(due_at) = task.window.due_at else {
        let tier = match task.status {
            CoarseStatus::InProgress => UrgencyTier::Warning,
            CoarseStatus::Pending => UrgencyTier::Ok,
        };
        return DeadlineStatus {
            tier,
            remaining: None,
            formatted: "no deadline".to_string(),
        };
    };

    let tier = countdown_tier(&task.window, due_at, now, policy);
    let formatted = remaining.map(|r| r.to_string()).unwrap_or_default();
    DeadlineStatus {
        tier,
        remaining,
        formatted,
    }
}

fn countdown_tier(
    window: &DeadlineWindow,
    due_at: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &DeadlinePolicy,
) -> UrgencyTier {
    if (due_at - now).num_milliseconds() < 0 {
        return UrgencyTier::Overdue;
    }

    match window.remaining_fraction(now) {
        // Empty or inverted window.
        None => UrgencyTier::Critical,
        Some(f) if f <= policy.critical_fraction => UrgencyTier::Critical,
        Some(f) if f <= policy.warning_fraction => UrgencyTier::Warning,
        Some(_) => UrgencyTier::Ok,
    }
}
