use crate::backtest::{AccuracyMetrics, BacktestResult};
use crate::forecast::{CombinedForecast, ForecastResult};
use crate::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPayload {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryPayload {
    pub dates: Vec<String>,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPayload {
    pub rf: SeriesPayload,
    pub sx: SeriesPayload,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricsPayload {
    #[serde(rename = "MAPE")]
    pub mape: Option<f64>,
    #[serde(rename = "RMSE")]
    pub rmse: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BacktestMetricsPayload {
    #[serde(rename = "RandomForest")]
    pub random_forest: MetricsPayload,
    #[serde(rename = "SARIMAX")]
    pub sarimax: MetricsPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestPayload {
    pub k: usize,
    pub dates: Vec<String>,
    pub y_true: Vec<i64>,
    pub rf_pred: Vec<Option<f64>>,
    pub sx_pred: Vec<Option<f64>>,
    pub metrics: BacktestMetricsPayload,
}

/// Everything served for one site, and the shape stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteSnapshot {
    pub site: String,
    pub history: HistoryPayload,
    pub forecast: ForecastPayload,
    pub backtest: BacktestPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SiteOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainAllResponse {
    pub status: String,
    pub trained: usize,
}

#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    pub site: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl From<&ForecastResult> for SeriesPayload {
    fn from(result: &ForecastResult) -> Self {
        Self {
            dates: result.points.iter().map(|p| date_key(p.date)).collect(),
            values: result.points.iter().map(|p| round2(p.value)).collect(),
        }
    }
}

impl From<&CombinedForecast> for ForecastPayload {
    fn from(forecast: &CombinedForecast) -> Self {
        Self {
            rf: (&forecast.regression).into(),
            sx: (&forecast.seasonal).into(),
        }
    }
}

impl From<&TimeSeries> for HistoryPayload {
    fn from(series: &TimeSeries) -> Self {
        Self {
            dates: series.dates().iter().copied().map(date_key).collect(),
            values: series.values().iter().map(|v| *v as i64).collect(),
        }
    }
}

impl From<AccuracyMetrics> for MetricsPayload {
    fn from(metrics: AccuracyMetrics) -> Self {
        Self {
            mape: metrics.mape,
            rmse: metrics.rmse,
        }
    }
}

impl From<&BacktestResult> for BacktestPayload {
    fn from(result: &BacktestResult) -> Self {
        let history = HistoryPayload::from(&result.actual);
        Self {
            k: result.k,
            dates: history.dates,
            y_true: history.values,
            rf_pred: result.regression.iter().map(|p| p.map(round2)).collect(),
            sx_pred: result.seasonal.iter().map(|p| p.map(round2)).collect(),
            metrics: BacktestMetricsPayload {
                random_forest: result.regression_metrics.into(),
                sarimax: result.seasonal_metrics.into(),
            },
        }
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{ForecastMethod, ForecastPoint};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    #[test]
    fn undefined_values_serialize_as_null() {
        let actual = TimeSeries::daily(day(1), vec![10.9, 20.0]).unwrap();
        let result = BacktestResult {
            k: 2,
            actual,
            regression: vec![Some(11.256), None],
            seasonal: vec![None, None],
            regression_metrics: AccuracyMetrics {
                mape: Some(0.1),
                rmse: Some(1.0),
            },
            seasonal_metrics: AccuracyMetrics::default(),
        };

        let json = serde_json::to_value(BacktestPayload::from(&result)).unwrap();
        assert_eq!(json["k"], 2);
        assert_eq!(json["dates"][0], "2024-02-01");
        assert_eq!(json["y_true"], serde_json::json!([10, 20]));
        assert_eq!(json["rf_pred"], serde_json::json!([11.26, null]));
        assert_eq!(json["sx_pred"], serde_json::json!([null, null]));
        assert_eq!(json["metrics"]["SARIMAX"]["MAPE"], serde_json::Value::Null);
        assert!(json["metrics"]["SARIMAX"].get("RMSE").is_some());
        assert_eq!(json["metrics"]["RandomForest"]["RMSE"], 1.0);
    }

    #[test]
    fn forecast_values_round_to_cents() {
        let result = ForecastResult {
            method: ForecastMethod::Regression,
            points: vec![ForecastPoint {
                date: day(3),
                value: 12.3456,
            }],
        };
        let payload = SeriesPayload::from(&result);
        assert_eq!(payload.dates, vec!["2024-02-03".to_string()]);
        assert_eq!(payload.values, vec![12.35]);
    }
}
