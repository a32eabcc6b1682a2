//! Rolling-origin backtest of both forecasters.
//!
//! Each step refits on every real observation revealed so far and predicts the
//! next day only, so errors never compound. A failed step yields `None`, never
//! zero.

use crate::errors::{ForecastError, Result};
use crate::forecast::{fit_regression, forecast_seasonal, predict_next};
use crate::forest::ForestConfig;
use crate::series::TimeSeries;
use tracing::{debug, warn};

pub const DEFAULT_BACKTEST_WINDOW: usize = 14;
pub const MIN_BACKTEST_WINDOW: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccuracyMetrics {
    pub mape: Option<f64>,
    pub rmse: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub k: usize,
    pub actual: TimeSeries,
    pub regression: Vec<Option<f64>>,
    pub seasonal: Vec<Option<f64>>,
    pub regression_metrics: AccuracyMetrics,
    pub seasonal_metrics: AccuracyMetrics,
}

/// Window actually used: at most a quarter of the history, but never below
/// seven days unless `k` itself is smaller.
pub fn effective_window(len: usize, k: usize) -> usize {
    k.min(MIN_BACKTEST_WINDOW.max(len / 4))
}

pub fn backtest(y: &TimeSeries, k: usize) -> Result<BacktestResult> {
    let k = effective_window(y.len(), k);
    if k >= y.len() {
        return Err(ForecastError::InsufficientData {
            required: k + 1,
            actual: y.len(),
        });
    }
    let split = y.len() - k;
    debug!(k, train = split, "starting backtest");

    let (regression, seasonal) = rayon::join(
        || regression_steps(y, split),
        || seasonal_steps(y, split),
    );

    let actual = y.tail(k);
    let regression_metrics = accuracy(actual.values(), &regression);
    let seasonal_metrics = accuracy(actual.values(), &seasonal);

    Ok(BacktestResult {
        k,
        actual,
        regression,
        seasonal,
        regression_metrics,
        seasonal_metrics,
    })
}

fn regression_steps(y: &TimeSeries, split: usize) -> Vec<Option<f64>> {
    let k = y.len() - split;
    let mut preds = Vec::with_capacity(k);

    for step in 0..k {
        let history = y.prefix(split + step);
        let outcome = fit_regression(&history, ForestConfig::backtest())
            .and_then(|forest| predict_next(&forest, &history));
        match outcome {
            Ok(point) => preds.push(Some(point.value)),
            Err(err @ ForecastError::InsufficientData { .. }) => {
                warn!(step, %err, "regression backtest abandoned");
                preds.resize(k, None);
                break;
            }
            Err(err) => {
                warn!(step, %err, "regression backtest step failed");
                preds.push(None);
            }
        }
    }

    preds
}

fn seasonal_steps(y: &TimeSeries, split: usize) -> Vec<Option<f64>> {
    (split..y.len())
        .map(|end| {
            let history = y.prefix(end);
            match forecast_seasonal(&history, 1) {
                Ok(result) => result.points.first().map(|p| p.value),
                Err(err) => {
                    warn!(step = end - split, %err, "seasonal backtest step failed");
                    None
                }
            }
        })
        .collect()
}

/// MAPE (as a fraction) and RMSE over the steps that have a prediction.
pub fn accuracy(actual: &[f64], predicted: &[Option<f64>]) -> AccuracyMetrics {
    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted)
        .filter_map(|(a, p)| p.map(|p| (*a, p)))
        .collect();
    if pairs.is_empty() {
        return AccuracyMetrics::default();
    }

    let n = pairs.len() as f64;
    let mape = pairs
        .iter()
        .map(|(a, p)| (a - p).abs() / a.abs().max(f64::EPSILON))
        .sum::<f64>()
        / n;
    let rmse = (pairs.iter().map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n).sqrt();

    AccuracyMetrics {
        mape: Some(mape),
        rmse: Some(rmse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn traffic(len: usize) -> TimeSeries {
        let values = (0..len)
            .map(|t| 200.0 + 2.0 * t as f64 + [0.0, 30.0, 40.0, 35.0, 20.0, -50.0, -60.0][t % 7])
            .collect();
        TimeSeries::daily(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(), values).unwrap()
    }

    #[test]
    fn window_is_capped_at_a_quarter_with_floor() {
        assert_eq!(effective_window(40, 14), 10);
        assert_eq!(effective_window(100, 14), 14);
        assert_eq!(effective_window(20, 14), 7);
        assert_eq!(effective_window(40, 5), 5);
    }

    #[test]
    fn backtest_shapes_match_window() {
        let y = traffic(40);
        let result = backtest(&y, 7).unwrap();
        assert_eq!(result.k, 7);
        assert_eq!(result.actual.len(), 7);
        assert_eq!(result.regression.len(), 7);
        assert_eq!(result.seasonal.len(), 7);
        assert_eq!(result.actual.dates(), &y.dates()[33..]);
        assert!(result.regression.iter().all(Option::is_some));
        assert!(result.regression_metrics.rmse.is_some());
        assert!(result.seasonal_metrics.mape.is_some());
    }

    #[test]
    fn window_is_clamped_before_splitting() {
        let y = traffic(40);
        let result = backtest(&y, 14).unwrap();
        assert_eq!(result.k, 10);
        assert_eq!(result.actual.values(), &y.values()[30..]);
    }

    #[test]
    fn predictions_are_non_negative() {
        let y = traffic(36);
        let result = backtest(&y, 7).unwrap();
        for pred in result.regression.iter().chain(&result.seasonal).flatten() {
            assert!(*pred >= 0.0);
        }
    }

    #[test]
    fn failed_method_reports_undefined_metrics() {
        // 13 training days cannot produce ten feature rows.
        let y = traffic(20);
        let result = backtest(&y, 7).unwrap();
        assert_eq!(result.regression, vec![None; 7]);
        assert_eq!(result.regression_metrics, AccuracyMetrics::default());
        assert!(result.regression_metrics.mape.is_none());
        assert!(result.seasonal.iter().all(Option::is_some));
    }

    #[test]
    fn seasonal_failures_on_every_step_leave_metrics_undefined() {
        // Prefixes of 7..=13 days are all below the seasonal minimum of 10.
        let y = traffic(14);
        let result = backtest(&y, 7).unwrap();
        assert_eq!(result.k, 7);
        assert_eq!(result.seasonal, vec![None; 7]);
        assert_eq!(result.seasonal_metrics, AccuracyMetrics::default());
        assert_eq!(result.regression_metrics, AccuracyMetrics::default());
    }

    #[test]
    fn series_shorter_than_window_is_rejected() {
        let y = traffic(5);
        assert_eq!(
            backtest(&y, 14),
            Err(ForecastError::InsufficientData { required: 8, actual: 5 })
        );
    }

    #[test]
    fn accuracy_skips_undefined_steps() {
        let metrics = accuracy(&[100.0, 200.0, 50.0], &[Some(110.0), None, Some(40.0)]);
        assert!((metrics.mape.unwrap() - 0.15).abs() < 1e-12);
        assert!((metrics.rmse.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn accuracy_guards_zero_actuals() {
        let metrics = accuracy(&[0.0], &[Some(1.0)]);
        assert!(metrics.mape.unwrap() > 1e10);
        assert_eq!(metrics.rmse, Some(1.0));
    }

    #[test]
    fn accuracy_without_predictions_is_undefined() {
        let metrics = accuracy(&[1.0, 2.0], &[None, None]);
        assert_eq!(metrics.mape, None);
        assert_eq!(metrics.rmse, None);
    }
}
