use configuration::TaskSettings;
use core_types::{DatasetIssue, NormalizedDataset, VolatilityDataset, VolatilityRequest};

/// Minimum length of a returns series.
pub const MIN_RETURNS: usize = 2;

/// Checks a submitted batch and resolves every dataset into a returns series.
///
/// Validation is all-or-nothing: any issue rejects the whole batch, and every
/// issue found is reported, not just the first.
#[derive(Debug, Clone)]
pub struct DatasetValidator {
    max_datasets: usize,
    default_trading_days_per_year: f64,
}

impl DatasetValidator {
    pub fn new(settings: &TaskSettings) -> Self {
        Self {
            max_datasets: settings.max_datasets,
            default_trading_days_per_year: settings.default_trading_days_per_year,
        }
    }

    pub fn validate(
        &self,
        request: &VolatilityRequest,
    ) -> Result<Vec<NormalizedDataset>, Vec<DatasetIssue>> {
        let mut issues = Vec::new();

        if request.datasets.is_empty() {
            issues.push(DatasetIssue::batch("at least one dataset is required"));
        }
        if request.datasets.len() > self.max_datasets {
            issues.push(DatasetIssue::batch(format!(
                "at most {} datasets are accepted per request, got {}",
                self.max_datasets,
                request.datasets.len()
            )));
        }
        if let Some(days) = request.default_trading_days_per_year {
            if !is_positive(days) {
                issues.push(DatasetIssue::batch(
                    "default_trading_days_per_year must be a positive number",
                ));
            }
        }
        let fallback_days = request
            .default_trading_days_per_year
            .unwrap_or(self.default_trading_days_per_year);

        let mut accepted = Vec::with_capacity(request.datasets.len());
        for (index, dataset) in request.datasets.iter().enumerate() {
            let returns = resolve_returns(dataset);
            let days = dataset.trading_days_per_year.unwrap_or(fallback_days);

            if let Err(message) = &returns {
                issues.push(DatasetIssue::at(index, message.clone()));
            }
            if dataset.trading_days_per_year.is_some() && !is_positive(days) {
                issues.push(DatasetIssue::at(
                    index,
                    "trading_days_per_year must be a positive number",
                ));
            }
            if let Ok(returns) = returns {
                accepted.push(NormalizedDataset {
                    index,
                    returns,
                    trading_days_per_year: days,
                });
            }
        }

        if issues.is_empty() {
            Ok(accepted)
        } else {
            Err(issues)
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn ensure_finite(field: &str, series: &[f64]) -> Result<(), String> {
    match series.iter().position(|v| !v.is_finite()) {
        Some(position) => Err(format!("{field}[{position}] is not a finite number")),
        None => Ok(()),
    }
}

/// Simple returns `v[i] / v[i-1] - 1` of a value series.
fn returns_from_values(field: &str, values: &[f64]) -> Result<Vec<f64>, String> {
    values
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            if pair[0] == 0.0 {
                return Err(format!("{field}[{i}] is zero; the following return is undefined"));
            }
            let r = pair[1] / pair[0] - 1.0;
            if r.is_finite() {
                Ok(r)
            } else {
                Err(format!("return from {field}[{i}] to {field}[{}] overflows", i + 1))
            }
        })
        .collect()
}

/// Picks the series a dataset carries, in order of preference: `returns`,
/// then `values` (optionally paired with `x_values`), then `x_values` alone.
fn resolve_returns(dataset: &VolatilityDataset) -> Result<Vec<f64>, String> {
    let returns = if let Some(returns) = &dataset.returns {
        ensure_finite("returns", returns)?;
        returns.clone()
    } else if let Some(values) = &dataset.values {
        if let Some(x_values) = &dataset.x_values {
            if x_values.len() != values.len() {
                return Err(format!(
                    "x_values and values must have the same length ({} != {})",
                    x_values.len(),
                    values.len()
                ));
            }
            ensure_finite("x_values", x_values)?;
        }
        ensure_finite("values", values)?;
        returns_from_values("values", values)?
    } else if let Some(x_values) = &dataset.x_values {
        ensure_finite("x_values", x_values)?;
        returns_from_values("x_values", x_values)?
    } else {
        return Err("one of returns, values or x_values is required".to_string());
    };

    if returns.len() < MIN_RETURNS {
        return Err(format!(
            "at least {MIN_RETURNS} returns are required, got {}",
            returns.len()
        ));
    }
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> DatasetValidator {
        DatasetValidator::new(&TaskSettings {
            max_datasets: 3,
            ..TaskSettings::default()
        })
    }

    fn request(datasets: Vec<VolatilityDataset>) -> VolatilityRequest {
        VolatilityRequest {
            datasets,
            default_trading_days_per_year: None,
        }
    }

    #[test]
    fn returns_are_taken_as_is() {
        let accepted = validator()
            .validate(&request(vec![VolatilityDataset::from_returns(vec![
                0.01, -0.02, 0.015, 0.005,
            ])]))
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].returns, vec![0.01, -0.02, 0.015, 0.005]);
        assert_eq!(accepted[0].trading_days_per_year, 252.0);
    }

    #[test]
    fn values_are_converted_to_simple_returns() {
        let accepted = validator()
            .validate(&request(vec![VolatilityDataset::from_values(vec![100.0, 110.0, 99.0])]))
            .unwrap();
        let returns = &accepted[0].returns;
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn returns_take_precedence_over_values() {
        let dataset = VolatilityDataset {
            returns: Some(vec![0.1, 0.2]),
            values: Some(vec![1.0]),
            ..VolatilityDataset::default()
        };
        let accepted = validator().validate(&request(vec![dataset])).unwrap();
        assert_eq!(accepted[0].returns, vec![0.1, 0.2]);
    }

    #[test]
    fn x_values_alone_are_a_value_series() {
        let dataset = VolatilityDataset {
            x_values: Some(vec![1.0, 2.0, 4.0]),
            ..VolatilityDataset::default()
        };
        let accepted = validator().validate(&request(vec![dataset])).unwrap();
        assert_eq!(accepted[0].returns, vec![1.0, 1.0]);
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        let dataset = VolatilityDataset {
            x_values: Some(vec![1.0, 2.0]),
            values: Some(vec![1.0, 2.0, 3.0]),
            ..VolatilityDataset::default()
        };
        let issues = validator().validate(&request(vec![dataset])).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("same length"));
    }

    #[test]
    fn trading_days_fall_back_in_order() {
        let mut req = request(vec![
            VolatilityDataset::from_returns(vec![0.1, 0.2]).with_trading_days(365.0),
            VolatilityDataset::from_returns(vec![0.1, 0.2]),
        ]);
        req.default_trading_days_per_year = Some(260.0);
        let accepted = validator().validate(&req).unwrap();
        assert_eq!(accepted[0].trading_days_per_year, 365.0);
        assert_eq!(accepted[1].trading_days_per_year, 260.0);
    }

    #[test]
    fn every_bad_dataset_is_itemized() {
        let issues = validator()
            .validate(&request(vec![
                VolatilityDataset::from_returns(vec![0.1, 0.2]),
                VolatilityDataset::from_values(vec![5.0]),
                VolatilityDataset::from_returns(vec![0.1, f64::NAN]).with_trading_days(-1.0),
            ]))
            .unwrap_err();
        let indexes: Vec<_> = issues.iter().map(|issue| issue.index).collect();
        assert_eq!(indexes, vec![Some(1), Some(2), Some(2)]);
    }

    #[test]
    fn zero_value_cannot_start_a_return() {
        let issues = validator()
            .validate(&request(vec![VolatilityDataset::from_values(vec![1.0, 0.0, 2.0])]))
            .unwrap_err();
        assert!(issues[0].message.contains("values[1] is zero"));
    }

    #[test]
    fn empty_or_oversized_batches_are_batch_issues() {
        let issues = validator().validate(&request(vec![])).unwrap_err();
        assert_eq!(issues, vec![DatasetIssue::batch("at least one dataset is required")]);

        let too_many = vec![VolatilityDataset::from_returns(vec![0.1, 0.2]); 4];
        let issues = validator().validate(&request(too_many)).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].index.is_none());
    }

    #[test]
    fn bad_request_default_is_rejected() {
        let mut req = request(vec![VolatilityDataset::from_returns(vec![0.1, 0.2])]);
        req.default_trading_days_per_year = Some(0.0);
        let issues = validator().validate(&req).unwrap_err();
        assert!(issues[0].index.is_none());
    }
}
