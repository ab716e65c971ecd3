use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a task.
///
/// ```text
/// PENDING -> STARTED -> SUCCESS | FAILURE | RETRY
/// RETRY   -> STARTED
/// PENDING | STARTED | RETRY -> REVOKED
/// ```
///
/// SUCCESS, FAILURE and REVOKED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Started,
        TaskStatus::Retry,
        TaskStatus::Success,
        TaskStatus::Failure,
        TaskStatus::Revoked,
    ];

    pub const TERMINAL: [TaskStatus; 3] =
        [TaskStatus::Success, TaskStatus::Failure, TaskStatus::Revoked];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Revoked => "REVOKED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Revoked
        )
    }

    /// Whether a worker may claim a task in this status.
    pub fn is_claimable(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Retry)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Started)
                | (Pending, Revoked)
                | (Started, Success)
                | (Started, Failure)
                | (Started, Retry)
                | (Started, Revoked)
                | (Retry, Started)
                | (Retry, Revoked)
        )
    }

    /// Human-readable progress line returned to pollers.
    pub fn progress_message(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Task is waiting in the queue",
            TaskStatus::Started => "Task is running",
            TaskStatus::Retry => "Task is waiting to be retried",
            TaskStatus::Success => "Task completed successfully",
            TaskStatus::Failure => "Task failed",
            TaskStatus::Revoked => "Task was revoked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

/// The computations known to the numeric engine.
///
/// Only `Volatility` is executed asynchronously through the task queue; the
/// other names exist so records and statistics can be filtered by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Mean,
    Variance,
    Correlation,
    Fibonacci,
    Factorial,
    MaxDrawdown,
    TimeWeightedReturn,
    Volatility,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Algorithm::Mean,
        Algorithm::Variance,
        Algorithm::Correlation,
        Algorithm::Fibonacci,
        Algorithm::Factorial,
        Algorithm::MaxDrawdown,
        Algorithm::TimeWeightedReturn,
        Algorithm::Volatility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Mean => "mean",
            Algorithm::Variance => "variance",
            Algorithm::Correlation => "correlation",
            Algorithm::Fibonacci => "fibonacci",
            Algorithm::Factorial => "factorial",
            Algorithm::MaxDrawdown => "max-drawdown",
            Algorithm::TimeWeightedReturn => "time-weighted-return",
            Algorithm::Volatility => "volatility",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| CoreError::UnknownAlgorithm(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_admit_no_transition() {
        for from in TaskStatus::TERMINAL {
            for to in TaskStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn retry_only_returns_to_started_or_revoked() {
        let allowed: Vec<_> = TaskStatus::ALL
            .into_iter()
            .filter(|next| TaskStatus::Retry.can_transition_to(*next))
            .collect();
        assert_eq!(allowed, vec![TaskStatus::Started, TaskStatus::Revoked]);
    }

    #[test]
    fn pending_cannot_skip_to_a_result() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Success));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Failure));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Retry));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("success".parse::<TaskStatus>().unwrap(), TaskStatus::Success);
        assert_eq!(" Retry ".parse::<TaskStatus>().unwrap(), TaskStatus::Retry);
        assert!("DONE".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&TaskStatus::Revoked).unwrap();
        assert_eq!(json, "\"REVOKED\"");
    }

    #[test]
    fn algorithm_accepts_snake_and_kebab_names() {
        assert_eq!("max_drawdown".parse::<Algorithm>().unwrap(), Algorithm::MaxDrawdown);
        assert_eq!("time-weighted-return".parse::<Algorithm>().unwrap(), Algorithm::TimeWeightedReturn);
        assert_eq!(
            serde_json::to_string(&Algorithm::MaxDrawdown).unwrap(),
            "\"max-drawdown\""
        );
    }
}
