use crate::error::AnalyticsError;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// The numeric engine as seen by the task workers.
///
/// Implementations must be pure: the same inputs always produce the same
/// output, and no state is shared between calls.
pub trait VolatilityModel: Send + Sync {
    /// Annualized volatility of a returns series.
    fn annualized_volatility(
        &self,
        returns: &[f64],
        trading_days_per_year: f64,
    ) -> Result<f64, AnalyticsError>;
}

/// A stateless calculator for the statistical primitives behind volatility.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arithmetic mean of a series.
    pub fn mean(&self, values: &[f64]) -> Result<f64, AnalyticsError> {
        let decimals = to_decimals(values)?;
        to_f64(decimal_mean(&decimals)?)
    }

    /// Sample variance (n - 1 denominator) of a series.
    pub fn sample_variance(&self, values: &[f64]) -> Result<f64, AnalyticsError> {
        let decimals = to_decimals(values)?;
        to_f64(decimal_sample_variance(&decimals)?)
    }
}

impl VolatilityModel for AnalyticsEngine {
    /// Sample standard deviation of the returns, scaled by the square root of
    /// the number of trading periods per year.
    fn annualized_volatility(
        &self,
        returns: &[f64],
        trading_days_per_year: f64,
    ) -> Result<f64, AnalyticsError> {
        if !(trading_days_per_year.is_finite() && trading_days_per_year > 0.0) {
            return Err(AnalyticsError::Calculation(format!(
                "trading_days_per_year must be positive, got {}",
                trading_days_per_year
            )));
        }

        let decimals = to_decimals(returns)?;
        let variance = decimal_sample_variance(&decimals)?;

        let std_dev = variance.sqrt().ok_or_else(|| {
            AnalyticsError::Calculation("Failed to calculate square root for variance".to_string())
        })?;
        let annualization = to_decimal(trading_days_per_year)?
            .sqrt()
            .ok_or_else(|| {
                AnalyticsError::Calculation("Failed to calculate annualization factor".to_string())
            })?;

        let volatility = std_dev
            .checked_mul(annualization)
            .ok_or_else(|| overflow("annualized volatility"))?;
        to_f64(volatility)
    }
}

fn overflow(metric: &str) -> AnalyticsError {
    AnalyticsError::Calculation(format!("arithmetic overflow while computing {}", metric))
}

fn to_decimal(value: f64) -> Result<Decimal, AnalyticsError> {
    if !value.is_finite() {
        return Err(AnalyticsError::Unrepresentable(value));
    }
    Decimal::from_f64(value).ok_or(AnalyticsError::Unrepresentable(value))
}

fn to_decimals(values: &[f64]) -> Result<Vec<Decimal>, AnalyticsError> {
    values.iter().map(|v| to_decimal(*v)).collect()
}

fn to_f64(value: Decimal) -> Result<f64, AnalyticsError> {
    value
        .to_f64()
        .ok_or_else(|| AnalyticsError::Calculation(format!("{} does not fit in f64", value)))
}

fn decimal_mean(values: &[Decimal]) -> Result<Decimal, AnalyticsError> {
    if values.is_empty() {
        return Err(AnalyticsError::NotEnoughData(
            "mean requires at least one value".to_string(),
        ));
    }
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
        .ok_or_else(|| overflow("mean"))?;
    sum.checked_div(Decimal::from(values.len()))
        .ok_or_else(|| AnalyticsError::DivisionByZero("mean".to_string()))
}

fn decimal_sample_variance(values: &[Decimal]) -> Result<Decimal, AnalyticsError> {
    if values.len() < 2 {
        return Err(AnalyticsError::NotEnoughData(format!(
            "variance requires at least 2 values, got {}",
            values.len()
        )));
    }
    let mean = decimal_mean(values)?;
    let squared_deviations = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| {
            let deviation = v.checked_sub(mean)?;
            acc.checked_add(deviation.checked_mul(deviation)?)
        })
        .ok_or_else(|| overflow("variance"))?;

    squared_deviations
        .checked_div(Decimal::from(values.len() - 1))
        .ok_or_else(|| AnalyticsError::DivisionByZero("variance".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn volatility_of_reference_series() {
        let engine = AnalyticsEngine::new();
        let returns = [0.01, -0.02, 0.015, 0.005];
        let vol = engine.annualized_volatility(&returns, 252.0).unwrap();

        let expected = (0.000725_f64 / 3.0).sqrt() * 252_f64.sqrt();
        assert!(approx(vol, expected), "got {vol}, expected {expected}");
        assert!(vol > 0.0);
    }

    #[test]
    fn flat_series_has_zero_volatility() {
        let engine = AnalyticsEngine::new();
        let vol = engine.annualized_volatility(&[0.25, 0.25, 0.25], 252.0).unwrap();
        assert_eq!(vol, 0.0);
    }

    #[test]
    fn single_return_is_not_enough() {
        let engine = AnalyticsEngine::new();
        let err = engine.annualized_volatility(&[0.01], 252.0).unwrap_err();
        assert!(matches!(err, AnalyticsError::NotEnoughData(_)));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let engine = AnalyticsEngine::new();
        let err = engine
            .annualized_volatility(&[0.01, f64::INFINITY], 252.0)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Unrepresentable(_)));
    }

    #[test]
    fn overflowing_input_is_a_calculation_error() {
        let engine = AnalyticsEngine::new();
        let err = engine
            .annualized_volatility(&[1e20, -1e20, 1e20], 252.0)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Calculation(_)));
    }

    #[test]
    fn mean_and_variance_helpers() {
        let engine = AnalyticsEngine::new();
        assert!(approx(engine.mean(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5));
        assert!(approx(engine.sample_variance(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 5.0 / 3.0));
        assert!(engine.mean(&[]).is_err());
    }
}
