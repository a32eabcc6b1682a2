//! Nelder-Mead simplex minimisation.

use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

/// Minimises `objective` starting from `initial`.
///
/// The objective should return `f64::MAX` (not NaN) for points it cannot score so
/// that ordering of the simplex stays total.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: objective(initial),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(initial.to_vec());
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if (values[worst] - values[best]).abs() < config.tolerance {
            converged = true;
            break;
        }

        let centroid = centroid_without(&simplex, worst);
        let spread = simplex
            .iter()
            .map(|v| distance(v, &centroid))
            .fold(0.0, f64::max);
        if spread < config.tolerance {
            converged = true;
            break;
        }

        let reflected = towards(&centroid, &simplex[worst], -config.alpha);
        let reflected_value = objective(&reflected);

        if reflected_value < values[best] {
            let expanded = towards(&centroid, &reflected, config.gamma);
            let expanded_value = objective(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (contracted, limit) = if reflected_value < values[worst] {
            (towards(&centroid, &reflected, config.rho), reflected_value)
        } else {
            (towards(&centroid, &simplex[worst], config.rho), values[worst])
        };
        let contracted_value = objective(&contracted);
        if contracted_value < limit {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i == best {
                continue;
            }
            simplex[i] = towards(&anchor, &simplex[i], config.sigma);
            values[i] = objective(&simplex[i]);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    NelderMeadResult {
        optimal_point: simplex[best].clone(),
        optimal_value: values[best],
        iterations,
        converged,
    }
}

/// `origin + scale * (point - origin)`.
fn towards(origin: &[f64], point: &[f64], scale: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point)
        .map(|(o, p)| o + scale * (p - o))
        .collect()
}

fn centroid_without(simplex: &[Vec<f64>], skip: usize) -> Vec<f64> {
    let dims = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut centroid = vec![0.0; dims];
    for (i, vertex) in simplex.iter().enumerate() {
        if i == skip {
            continue;
        }
        for (c, v) in centroid.iter_mut().zip(vertex) {
            *c += v;
        }
    }
    centroid.iter_mut().for_each(|c| *c /= count);
    centroid
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_quadratic_minimum() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] + 3.0).powi(2),
            &[0.0, 0.0],
            &NelderMeadConfig::default(),
        );
        assert!(result.converged);
        assert!((result.optimal_point[0] - 2.0).abs() < 1e-3);
        assert!((result.optimal_point[1] + 3.0).abs() < 1e-3);
    }

    #[test]
    fn empty_point_evaluates_once() {
        let result = nelder_mead(|_| 3.5, &[], &NelderMeadConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.optimal_value, 3.5);
        assert!(result.optimal_point.is_empty());
    }
}
