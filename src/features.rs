//! Supervised feature table built from a daily series.
//!
//! Every row carries lagged values, trailing means over strictly past values
//! and the calendar weekday, aligned with the observed value for that day.

use crate::errors::{ForecastError, Result};
use crate::series::TimeSeries;
use chrono::{Datelike, NaiveDate};

pub const LAGS: [usize; 5] = [1, 2, 3, 7, 14];
pub const ROLLING_WINDOWS: [usize; 2] = [7, 14];
pub const FEATURE_COUNT: usize = LAGS.len() + ROLLING_WINDOWS.len() + 1;

/// Rows required before the regression model may be fitted.
pub const MIN_TRAINING_ROWS: usize = 10;

pub type FeatureVector = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub target: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Rows lacking any lag (the first `max(LAGS)` days) are dropped.
    pub fn build(series: &TimeSeries) -> Self {
        let values = series.values();
        let rows = series
            .dates()
            .iter()
            .enumerate()
            .filter_map(|(t, date)| {
                features_at(values, t, *date).map(|features| FeatureRow {
                    date: *date,
                    features,
                    target: values[t],
                })
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn require_training_rows(&self) -> Result<()> {
        if self.rows.len() < MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientData {
                required: MIN_TRAINING_ROWS,
                actual: self.rows.len(),
            });
        }
        Ok(())
    }

    pub fn features(&self) -> Vec<FeatureVector> {
        self.rows.iter().map(|row| row.features).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.target).collect()
    }
}

fn features_at(values: &[f64], t: usize, date: NaiveDate) -> Option<FeatureVector> {
    let mut out = [0.0; FEATURE_COUNT];
    let mut slot = 0;

    for lag in LAGS {
        out[slot] = values[t.checked_sub(lag)?];
        slot += 1;
    }
    for window in ROLLING_WINDOWS {
        out[slot] = trailing_mean(&values[t.saturating_sub(window)..t])?;
        slot += 1;
    }
    out[slot] = f64::from(date.weekday().num_days_from_monday());

    Some(out)
}

fn trailing_mean(past: &[f64]) -> Option<f64> {
    if past.is_empty() {
        return None;
    }
    Some(past.iter().sum::<f64>() / past.len() as f64)
}
