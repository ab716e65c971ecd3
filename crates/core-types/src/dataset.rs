use serde::{Deserialize, Serialize};

/// One dataset as submitted by a client.
///
/// Exactly which field carries the series is up to the client: a returns
/// series, a value series to be converted into returns, or values paired with
/// their x coordinates. The validator resolves every shape into a
/// `NormalizedDataset` before anything is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolatilityDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_days_per_year: Option<f64>,
}

impl VolatilityDataset {
    pub fn from_returns(returns: Vec<f64>) -> Self {
        Self {
            returns: Some(returns),
            ..Self::default()
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values: Some(values),
            ..Self::default()
        }
    }

    pub fn with_trading_days(mut self, days: f64) -> Self {
        self.trading_days_per_year = Some(days);
        self
    }
}

/// Body of both the synchronous and the asynchronous volatility endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRequest {
    pub datasets: Vec<VolatilityDataset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_trading_days_per_year: Option<f64>,
}

/// A dataset after validation: always a returns series plus the annualization
/// factor that applies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDataset {
    /// Position of the dataset in the submitted batch.
    pub index: usize,
    pub returns: Vec<f64>,
    pub trading_days_per_year: f64,
}

/// The work carried by a task, one variant per asynchronously executed algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum TaskPayload {
    Volatility { datasets: Vec<NormalizedDataset> },
}

impl TaskPayload {
    pub fn dataset_count(&self) -> usize {
        match self {
            TaskPayload::Volatility { datasets } => datasets.len(),
        }
    }
}

/// One reason a submitted batch was rejected.
///
/// `index` points at the offending dataset; it is `None` for problems with
/// the batch as a whole (empty, too large).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetIssue {
    pub index: Option<usize>,
    pub message: String,
}

impl DatasetIssue {
    pub fn at(index: usize, message: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            message: message.into(),
        }
    }

    pub fn batch(message: impl Into<String>) -> Self {
        Self {
            index: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DatasetIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "dataset {}: {}", index, self.message),
            None => write!(f, "batch: {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_missing_optional_fields() {
        let request: VolatilityRequest =
            serde_json::from_str(r#"{"datasets":[{"returns":[0.01,0.02]},{"values":[1,2,3]}]}"#)
                .unwrap();
        assert_eq!(request.datasets.len(), 2);
        assert_eq!(request.datasets[0].returns, Some(vec![0.01, 0.02]));
        assert_eq!(request.datasets[1].values, Some(vec![1.0, 2.0, 3.0]));
        assert!(request.default_trading_days_per_year.is_none());
    }

    #[test]
    fn payload_is_tagged_by_algorithm() {
        let payload = TaskPayload::Volatility {
            datasets: vec![NormalizedDataset {
                index: 0,
                returns: vec![0.1, 0.2],
                trading_days_per_year: 252.0,
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["algorithm"], "volatility");
        assert_eq!(json["datasets"][0]["index"], 0);
        let back: TaskPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.dataset_count(), 1);
    }
}
