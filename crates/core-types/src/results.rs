use serde::{Deserialize, Serialize};

/// Volatility computed for one dataset of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityItem {
    pub index: usize,
    pub volatility: f64,
    /// Number of returns the volatility was computed over.
    pub data_points: usize,
    pub trading_days_per_year: f64,
}

/// A dataset whose computation failed inside an otherwise successful batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityBatchResult {
    pub results: Vec<VolatilityItem>,
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Wall time of the whole batch, in seconds.
    pub execution_time: f64,
    /// `None` when every dataset succeeded.
    pub errors: Option<Vec<DatasetFailure>>,
}

/// The result stored on a successful task.
///
/// Serialized untagged so clients see the algorithm's own result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskResult {
    Volatility(VolatilityBatchResult),
}

impl From<VolatilityBatchResult> for TaskResult {
    fn from(result: VolatilityBatchResult) -> Self {
        TaskResult::Volatility(result)
    }
}
