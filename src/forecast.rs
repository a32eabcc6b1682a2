//! Multi-step forecasts from the regression ensemble and the seasonal model.

use crate::errors::{ForecastError, Result};
use crate::features::{FeatureTable, MIN_TRAINING_ROWS};
use crate::forest::{ForestConfig, RandomForest};
use crate::sarima::{Sarima, SarimaSpec};
use crate::series::TimeSeries;
use chrono::{Duration, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastMethod {
    Regression,
    Seasonal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One method's forecast: consecutive days after the last observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub method: ForecastMethod,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedForecast {
    pub regression: ForecastResult,
    pub seasonal: ForecastResult,
}

/// Recursive forecast: each prediction is appended to the series before the
/// next day's features are built.
pub fn forecast_rf(y: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
    let forest = fit_regression(y, ForestConfig::forecast())?;

    let mut extended = y.clone();
    let mut points = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let point = predict_next(&forest, &extended)?;
        extended = extended.with_appended(point.date, point.value)?;
        points.push(point);
    }

    Ok(ForecastResult {
        method: ForecastMethod::Regression,
        points,
    })
}

pub fn forecast_seasonal(y: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
    let model = Sarima::fit(SarimaSpec::WEEKLY, y.values())?;
    let values = model.forecast(horizon)?;
    let start = y
        .last_date()
        .ok_or_else(|| ForecastError::InvalidInput("empty series".to_string()))?;

    let points = values
        .into_iter()
        .enumerate()
        .map(|(step, value)| ForecastPoint {
            date: start + Duration::days(step as i64 + 1),
            value: clamp_count(value),
        })
        .collect();

    Ok(ForecastResult {
        method: ForecastMethod::Seasonal,
        points,
    })
}

pub fn forecast_both(y: &TimeSeries, horizon: usize) -> Result<CombinedForecast> {
    Ok(CombinedForecast {
        regression: forecast_rf(y, horizon)?,
        seasonal: forecast_seasonal(y, horizon)?,
    })
}

pub(crate) fn fit_regression(y: &TimeSeries, config: ForestConfig) -> Result<RandomForest> {
    let table = FeatureTable::build(y);
    table.require_training_rows()?;
    RandomForest::fit(&table.features(), &table.targets(), config)
}

/// Clamped prediction for the day after the last observation of `y`, scored
/// on the most recent row of the feature table rebuilt from `y`.
pub(crate) fn predict_next(forest: &RandomForest, y: &TimeSeries) -> Result<ForecastPoint> {
    let table = FeatureTable::build(y);
    let latest = table
        .rows()
        .last()
        .ok_or(ForecastError::InsufficientData {
            required: MIN_TRAINING_ROWS,
            actual: 0,
        })?;

    Ok(ForecastPoint {
        date: latest.date + Duration::days(1),
        value: clamp_count(forest.predict(&latest.features)),
    })
}

pub(crate) fn clamp_count(value: f64) -> f64 {
    value.max(0.0)
}
