use core_types::{
    Algorithm, AlgorithmStat, Dashboard, DashboardSummary, TaskRecord, TaskStatistics, TaskStatus,
};
use std::collections::BTreeMap;

/// Running totals for one bucket of tasks.
#[derive(Debug, Default)]
struct Rollup {
    total: u64,
    success: u64,
    failure: u64,
    pending: u64,
    running: u64,
    timed: u64,
    time_sum: f64,
    time_min: Option<f64>,
    time_max: Option<f64>,
}

impl Rollup {
    fn add(&mut self, task: &TaskRecord) {
        self.total += 1;
        match task.status {
            TaskStatus::Success => self.success += 1,
            TaskStatus::Failure | TaskStatus::Revoked => self.failure += 1,
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Started | TaskStatus::Retry => self.running += 1,
        }

        // Only finished work says anything about execution time.
        if !task.status.is_terminal() {
            return;
        }
        if let Some(seconds) = task.execution_time.filter(|s| s.is_finite() && *s >= 0.0) {
            self.timed += 1;
            self.time_sum += seconds;
            self.time_min = Some(self.time_min.map_or(seconds, |m| m.min(seconds)));
            self.time_max = Some(self.time_max.map_or(seconds, |m| m.max(seconds)));
        }
    }

    /// Share of finished tasks that succeeded; unfinished tasks do not count.
    fn success_rate(&self) -> f64 {
        let finished = self.success + self.failure;
        if finished == 0 {
            0.0
        } else {
            self.success as f64 / finished as f64
        }
    }

    fn avg_execution_time(&self) -> f64 {
        if self.timed == 0 {
            0.0
        } else {
            self.time_sum / self.timed as f64
        }
    }
}

/// Aggregates a snapshot of task records into global and per-algorithm rollups.
///
/// The function is pure; callers decide which records make up the snapshot.
pub fn compute_statistics(records: &[TaskRecord]) -> TaskStatistics {
    let mut global = Rollup::default();
    let mut per_algorithm: BTreeMap<&'static str, (Algorithm, Rollup)> = BTreeMap::new();

    for task in records {
        global.add(task);
        per_algorithm
            .entry(task.algorithm.as_str())
            .or_insert_with(|| (task.algorithm, Rollup::default()))
            .1
            .add(task);
    }

    let algorithm_stats = per_algorithm
        .into_values()
        .map(|(algorithm, rollup)| AlgorithmStat {
            algorithm,
            total_count: rollup.total,
            success_count: rollup.success,
            failure_count: rollup.failure,
            success_rate: rollup.success_rate(),
            avg_execution_time: rollup.avg_execution_time(),
        })
        .collect();

    TaskStatistics {
        total_count: global.total,
        success_count: global.success,
        failure_count: global.failure,
        pending_count: global.pending,
        running_count: global.running,
        success_rate: global.success_rate(),
        avg_execution_time: global.avg_execution_time(),
        min_execution_time: global.time_min.unwrap_or(0.0),
        max_execution_time: global.time_max.unwrap_or(0.0),
        algorithm_stats,
    }
}

/// Combines unfiltered statistics with the most recent tasks.
pub fn compose_dashboard(statistics: TaskStatistics, recent_tasks: Vec<TaskRecord>) -> Dashboard {
    let summary = DashboardSummary {
        total_tasks: statistics.total_count,
        success_rate: statistics.success_rate,
        avg_execution_time: statistics.avg_execution_time,
    };
    Dashboard {
        statistics,
        recent_tasks,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use core_types::{NewTask, NormalizedDataset, TaskPayload, TaskResult, VolatilityBatchResult};

    fn task(id: i64, algorithm: Algorithm) -> TaskRecord {
        let payload = TaskPayload::Volatility {
            datasets: vec![NormalizedDataset {
                index: 0,
                returns: vec![0.01, 0.02],
                trading_days_per_year: 252.0,
            }],
        };
        let mut new = NewTask::volatility(payload, Utc::now());
        new.algorithm = algorithm;
        TaskRecord::from_new(id, new)
    }

    fn finished(id: i64, algorithm: Algorithm, status: TaskStatus, seconds: i64) -> TaskRecord {
        let mut record = task(id, algorithm);
        let start = Utc::now();
        record.start("w", start).unwrap();
        let end = start + Duration::seconds(seconds);
        match status {
            TaskStatus::Success => record
                .succeed(
                    TaskResult::Volatility(VolatilityBatchResult {
                        results: vec![],
                        total_count: 0,
                        success_count: 0,
                        failed_count: 0,
                        execution_time: 0.0,
                        errors: None,
                    }),
                    end,
                )
                .unwrap(),
            TaskStatus::Failure => record.fail("boom", end).unwrap(),
            TaskStatus::Revoked => record.revoke(end).unwrap(),
            TaskStatus::Retry => record.requeue(end).unwrap(),
            TaskStatus::Started => {}
            TaskStatus::Pending => unreachable!("pending tasks are built with `task`"),
        }
        record
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_execution_time, 0.0);
        assert_eq!(stats.min_execution_time, 0.0);
        assert_eq!(stats.max_execution_time, 0.0);
        assert!(stats.algorithm_stats.is_empty());
    }

    #[test]
    fn counts_partition_the_total() {
        let records = vec![
            finished(1, Algorithm::Volatility, TaskStatus::Success, 2),
            finished(2, Algorithm::Volatility, TaskStatus::Success, 4),
            finished(3, Algorithm::Volatility, TaskStatus::Failure, 6),
            finished(4, Algorithm::Mean, TaskStatus::Revoked, 1),
            finished(5, Algorithm::Volatility, TaskStatus::Started, 0),
            finished(6, Algorithm::Volatility, TaskStatus::Retry, 3),
            task(7, Algorithm::Volatility),
        ];
        let stats = compute_statistics(&records);

        assert_eq!(stats.total_count, 7);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 2);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.running_count, 2);
        assert_eq!(
            stats.success_count + stats.failure_count + stats.pending_count + stats.running_count,
            stats.total_count
        );
        let per_algorithm: u64 = stats.algorithm_stats.iter().map(|a| a.total_count).sum();
        assert_eq!(per_algorithm, stats.total_count);
    }

    #[test]
    fn execution_time_ignores_non_terminal_tasks() {
        let records = vec![
            finished(1, Algorithm::Volatility, TaskStatus::Success, 2),
            finished(2, Algorithm::Volatility, TaskStatus::Failure, 6),
            // Retry has an execution time from its first attempt but is not finished.
            finished(3, Algorithm::Volatility, TaskStatus::Retry, 100),
        ];
        let stats = compute_statistics(&records);
        assert_eq!(stats.avg_execution_time, 4.0);
        assert_eq!(stats.min_execution_time, 2.0);
        assert_eq!(stats.max_execution_time, 6.0);
    }

    #[test]
    fn success_rate_ignores_unfinished_tasks() {
        let records = vec![
            finished(1, Algorithm::Volatility, TaskStatus::Success, 1),
            task(2, Algorithm::Volatility),
            finished(3, Algorithm::Volatility, TaskStatus::Success, 1),
            finished(4, Algorithm::Volatility, TaskStatus::Revoked, 1),
            finished(5, Algorithm::Volatility, TaskStatus::Retry, 1),
            finished(6, Algorithm::Mean, TaskStatus::Started, 0),
        ];
        let stats = compute_statistics(&records);
        assert_eq!(stats.total_count, 6);
        assert_eq!(stats.success_rate, 2.0 / 3.0);

        let mean = &stats.algorithm_stats[0];
        assert_eq!(mean.algorithm, Algorithm::Mean);
        assert_eq!(mean.success_rate, 0.0);
        let volatility = &stats.algorithm_stats[1];
        assert_eq!(volatility.success_rate, 2.0 / 3.0);
    }

    #[test]
    fn only_pending_work_has_a_zero_rate() {
        let stats = compute_statistics(&[task(1, Algorithm::Volatility)]);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn algorithm_stats_are_sorted_by_name() {
        let records = vec![
            finished(1, Algorithm::Volatility, TaskStatus::Success, 1),
            finished(2, Algorithm::Mean, TaskStatus::Failure, 1),
            finished(3, Algorithm::Correlation, TaskStatus::Success, 3),
        ];
        let stats = compute_statistics(&records);
        let names: Vec<_> = stats.algorithm_stats.iter().map(|a| a.algorithm.as_str()).collect();
        assert_eq!(names, vec!["correlation", "mean", "volatility"]);

        let volatility = &stats.algorithm_stats[2];
        assert_eq!(volatility.success_rate, 1.0);
        assert_eq!(volatility.avg_execution_time, 1.0);
    }

    #[test]
    fn dashboard_summary_mirrors_statistics() {
        let records = vec![
            finished(1, Algorithm::Volatility, TaskStatus::Success, 2),
            finished(2, Algorithm::Volatility, TaskStatus::Failure, 4),
        ];
        let dashboard = compose_dashboard(compute_statistics(&records), records.clone());
        assert_eq!(dashboard.summary.total_tasks, 2);
        assert_eq!(dashboard.summary.success_rate, 0.5);
        assert_eq!(dashboard.summary.avg_execution_time, 3.0);
        assert_eq!(dashboard.recent_tasks.len(), 2);
    }
}
