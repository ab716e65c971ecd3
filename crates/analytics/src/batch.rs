use crate::engine::VolatilityModel;
use core_types::{DatasetFailure, NormalizedDataset, VolatilityBatchResult, VolatilityItem};
use std::time::Instant;

/// Runs the volatility model over every dataset of a batch.
///
/// Datasets are computed independently: a failing dataset is reported in
/// `errors` and never prevents the others from producing a result.
pub fn run_batch(model: &dyn VolatilityModel, datasets: &[NormalizedDataset]) -> VolatilityBatchResult {
    let started = Instant::now();
    let outcomes = datasets.iter().map(|dataset| compute(model, dataset)).collect();
    assemble(outcomes, started)
}

/// Like `run_batch`, but checks `stop` before each dataset and abandons the
/// batch with `None` once it returns true. The dataset in progress always
/// runs to completion.
pub fn run_batch_until(
    model: &dyn VolatilityModel,
    datasets: &[NormalizedDataset],
    stop: impl Fn() -> bool,
) -> Option<VolatilityBatchResult> {
    let started = Instant::now();
    let mut outcomes = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        if stop() {
            tracing::debug!(done = outcomes.len(), total = datasets.len(), "Batch abandoned.");
            return None;
        }
        outcomes.push(compute(model, dataset));
    }
    Some(assemble(outcomes, started))
}

fn compute(model: &dyn VolatilityModel, dataset: &NormalizedDataset) -> Result<VolatilityItem, DatasetFailure> {
    match model.annualized_volatility(&dataset.returns, dataset.trading_days_per_year) {
        Ok(volatility) if volatility.is_finite() => Ok(VolatilityItem {
            index: dataset.index,
            volatility,
            data_points: dataset.returns.len(),
            trading_days_per_year: dataset.trading_days_per_year,
        }),
        Ok(volatility) => Err(DatasetFailure {
            index: dataset.index,
            error: format!("volatility is not a finite number ({})", volatility),
        }),
        Err(e) => {
            tracing::debug!(index = dataset.index, error = %e, "Dataset computation failed.");
            Err(DatasetFailure {
                index: dataset.index,
                error: e.to_string(),
            })
        }
    }
}

fn assemble(outcomes: Vec<Result<VolatilityItem, DatasetFailure>>, started: Instant) -> VolatilityBatchResult {
    let total_count = outcomes.len();
    let mut results = Vec::with_capacity(total_count);
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(item) => results.push(item),
            Err(failure) => errors.push(failure),
        }
    }

    VolatilityBatchResult {
        total_count,
        success_count: results.len(),
        failed_count: errors.len(),
        results,
        execution_time: started.elapsed().as_secs_f64(),
        errors: if errors.is_empty() { None } else { Some(errors) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AnalyticsEngine;

    fn dataset(index: usize, returns: Vec<f64>) -> NormalizedDataset {
        NormalizedDataset {
            index,
            returns,
            trading_days_per_year: 252.0,
        }
    }

    #[test]
    fn every_dataset_is_accounted_for() {
        let engine = AnalyticsEngine::new();
        let batch = vec![
            dataset(0, vec![0.01, -0.02, 0.015, 0.005]),
            dataset(1, vec![1e20, -1e20, 1e20]),
            dataset(2, vec![0.02, 0.01]),
        ];

        let result = run_batch(&engine, &batch);
        assert_eq!(result.total_count, 3);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.results[0].index, 0);
        assert_eq!(result.results[0].data_points, 4);
        assert_eq!(result.results[1].index, 2);

        let errors = result.errors.expect("one dataset failed");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 1);
    }

    #[test]
    fn stopped_batch_is_abandoned_between_datasets() {
        use std::cell::Cell;

        let engine = AnalyticsEngine::new();
        let batch = vec![
            dataset(0, vec![0.01, 0.02]),
            dataset(1, vec![0.03, 0.01]),
            dataset(2, vec![0.02, 0.05]),
        ];
        let checks = Cell::new(0);
        let outcome = run_batch_until(&engine, &batch, || {
            checks.set(checks.get() + 1);
            checks.get() > 2
        });
        assert!(outcome.is_none());
        assert_eq!(checks.get(), 3);

        let full = run_batch_until(&engine, &batch, || false).expect("never stopped");
        assert_eq!(full.success_count, 3);
    }

    #[test]
    fn clean_batch_reports_no_errors() {
        let engine = AnalyticsEngine::new();
        let result = run_batch(&engine, &[dataset(0, vec![0.01, 0.03])]);
        assert!(result.errors.is_none());
        assert_eq!(result.failed_count, 0);
        assert!(result.execution_time >= 0.0);
    }
}
