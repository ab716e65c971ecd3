use crate::enums::Algorithm;
use crate::task::TaskRecord;
use serde::Serialize;

/// Rollup of all tasks of one algorithm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmStat {
    pub algorithm: Algorithm,
    pub total_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub avg_execution_time: f64,
}

/// Global rollup across every matching task.
///
/// `failure_count` includes revoked tasks and `running_count` includes tasks
/// waiting for a retry, so the four counts always add up to `total_count`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub total_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub pending_count: u64,
    pub running_count: u64,
    pub success_rate: f64,
    pub avg_execution_time: f64,
    pub min_execution_time: f64,
    pub max_execution_time: f64,
    pub algorithm_stats: Vec<AlgorithmStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_tasks: u64,
    pub success_rate: f64,
    pub avg_execution_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub statistics: TaskStatistics,
    pub recent_tasks: Vec<TaskRecord>,
    pub summary: DashboardSummary,
}
