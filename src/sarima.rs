//! Seasonal ARIMA fitted by conditional sum of squares.
//!
//! The autoregressive and moving-average operators are expanded into plain lag
//! polynomials, e.g. `(1 - φB)(1 - ΦB^s) = 1 - φB - ΦB^s + φΦB^(s+1)`, so the
//! same recursion serves fitting on the differenced series and forecasting on
//! the original scale. Coefficients are left unconstrained: no stationarity or
//! invertibility is imposed.

use crate::errors::{ForecastError, Result};
use crate::optimize::{nelder_mead, NelderMeadConfig};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaSpec {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaSpec {
    /// (1,1,1)(1,0,1)[7]: weekly seasonality for daily traffic.
    pub const WEEKLY: SarimaSpec = SarimaSpec {
        p: 1,
        d: 1,
        q: 1,
        seasonal_p: 1,
        seasonal_d: 0,
        seasonal_q: 1,
        period: 7,
    };

    fn num_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    fn differencing_loss(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    fn max_lag(&self) -> usize {
        (self.p + self.seasonal_p * self.period).max(self.q + self.seasonal_q * self.period)
    }

    /// Shortest series that leaves at least one residual after differencing.
    pub fn min_observations(&self) -> usize {
        self.differencing_loss() + self.max_lag() + 1
    }
}

#[derive(Debug, Clone)]
pub struct Sarima {
    spec: SarimaSpec,
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    history: Vec<f64>,
    /// Innovations aligned with `history`; zero where not estimable.
    residuals: Vec<f64>,
}

impl Sarima {
    pub fn fit(spec: SarimaSpec, values: &[f64]) -> Result<Self> {
        let required = spec.min_observations();
        if values.len() < required {
            return Err(ForecastError::ModelFitFailure(format!(
                "seasonal model needs at least {required} observations, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "series contains non-finite values".to_string(),
            ));
        }

        let diff_poly = differencing_polynomial(&spec);
        let differenced = apply_polynomial(&diff_poly, values);
        let scale = (differenced.iter().map(|w| w * w).sum::<f64>() / differenced.len() as f64).sqrt();

        let params = if scale > 0.0 {
            let scaled: Vec<f64> = differenced.iter().map(|w| w / scale).collect();
            let initial = vec![0.1; spec.num_params()];
            let config = NelderMeadConfig {
                max_iter: 2000,
                initial_step: 1.0,
                ..NelderMeadConfig::default()
            };
            let result = nelder_mead(
                |params| {
                    let (ar, ma) = operators(&spec, params);
                    let (css, count) = conditional_sum_of_squares(&ar, &ma, &scaled).1;
                    let mse = css / count as f64;
                    if mse.is_finite() { mse } else { f64::MAX }
                },
                &initial,
                &config,
            );
            debug!(
                iterations = result.iterations,
                converged = result.converged,
                objective = result.optimal_value,
                "fitted seasonal model"
            );
            if !result.optimal_value.is_finite() || result.optimal_value == f64::MAX {
                return Err(ForecastError::ModelFitFailure(
                    "conditional sum of squares did not reach a finite value".to_string(),
                ));
            }
            result.optimal_point
        } else {
            vec![0.0; spec.num_params()]
        };

        if params.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "non-finite seasonal coefficients".to_string(),
            ));
        }

        let (ar_poly, ma_poly) = operators(&spec, &params);
        let (innovations, _) = conditional_sum_of_squares(&ar_poly, &ma_poly, &differenced);
        let loss = spec.differencing_loss();
        let mut residuals = vec![0.0; values.len()];
        residuals[loss..].copy_from_slice(&innovations);

        let (ar, rest) = params.split_at(spec.p);
        let (ma, rest) = rest.split_at(spec.q);
        let (seasonal_ar, seasonal_ma) = rest.split_at(spec.seasonal_p);

        Ok(Self {
            spec,
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            seasonal_ar: seasonal_ar.to_vec(),
            seasonal_ma: seasonal_ma.to_vec(),
            history: values.to_vec(),
            residuals,
        })
    }

    /// Multi-step forecast with future innovations set to zero.
    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let params = self.params();
        let (ar, ma) = operators(&self.spec, &params);
        let full_ar = multiply(&ar, &differencing_polynomial(&self.spec));

        let mut y = self.history.clone();
        let mut e = self.residuals.clone();
        for _ in 0..horizon {
            let t = y.len();
            let mut next = 0.0;
            for (k, coef) in full_ar.iter().enumerate().skip(1) {
                if let Some(idx) = t.checked_sub(k) {
                    next -= coef * y[idx];
                }
            }
            for (k, coef) in ma.iter().enumerate().skip(1) {
                if let Some(idx) = t.checked_sub(k) {
                    next += coef * e[idx];
                }
            }
            y.push(next);
            e.push(0.0);
        }

        let out = y.split_off(self.history.len());
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "seasonal forecast diverged".to_string(),
            ));
        }
        Ok(out)
    }

    fn params(&self) -> Vec<f64> {
        [
            self.ar.as_slice(),
            self.ma.as_slice(),
            self.seasonal_ar.as_slice(),
            self.seasonal_ma.as_slice(),
        ]
        .concat()
    }
}

/// Expanded AR and MA operators for a flat `[φ.., θ.., Φ.., Θ..]` vector.
fn operators(spec: &SarimaSpec, params: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let (ar, rest) = params.split_at(spec.p);
    let (ma, rest) = rest.split_at(spec.q);
    let (sar, sma) = rest.split_at(spec.seasonal_p);

    let ar_poly = multiply(&lag_polynomial(ar, 1, -1.0), &lag_polynomial(sar, spec.period, -1.0));
    let ma_poly = multiply(&lag_polynomial(ma, 1, 1.0), &lag_polynomial(sma, spec.period, 1.0));
    (ar_poly, ma_poly)
}

/// `1 + sign * Σ c_i B^(i * spacing)`.
fn lag_polynomial(coeffs: &[f64], spacing: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * spacing + 1];
    poly[0] = 1.0;
    for (i, c) in coeffs.iter().enumerate() {
        poly[(i + 1) * spacing] = sign * c;
    }
    poly
}

fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `(1 - B)^d (1 - B^s)^D`.
fn differencing_polynomial(spec: &SarimaSpec) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..spec.d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    for _ in 0..spec.seasonal_d {
        poly = multiply(&poly, &lag_polynomial(&[1.0], spec.period, -1.0));
    }
    poly
}

fn apply_polynomial(poly: &[f64], values: &[f64]) -> Vec<f64> {
    let lag = poly.len() - 1;
    (lag..values.len())
        .map(|t| poly.iter().enumerate().map(|(k, c)| c * values[t - k]).sum())
        .collect()
}

/// Innovations of `ar(B) w = ma(B) e`, conditioned on zero pre-sample shocks.
/// Returns the innovations (same length as `w`) and `(css, terms)`.
fn conditional_sum_of_squares(ar: &[f64], ma: &[f64], w: &[f64]) -> (Vec<f64>, (f64, usize)) {
    let start = ar.len() - 1;
    let mut e = vec![0.0; w.len()];
    let mut css = 0.0;
    for t in start..w.len() {
        let mut value = w[t];
        for (k, coef) in ar.iter().enumerate().skip(1) {
            value += coef * w[t - k];
        }
        for (k, coef) in ma.iter().enumerate().skip(1) {
            if let Some(idx) = t.checked_sub(k) {
                value -= coef * e[idx];
            }
        }
        e[t] = value;
        css += value * value;
    }
    (e, (css, w.len().saturating_sub(start).max(1)))
}
