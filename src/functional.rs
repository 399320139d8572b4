//! Functionals
//!
//! Identification functions act as generalised residuals. For a prediction `z`
//! of the functional `T` and an observation `y`, the strict identification
//! function `V(y, z)` has expectation zero exactly when `z = T(F)`.
//!
//! | functional | `V(y, z)`                        |
//! | ---------- | -------------------------------- |
//! | mean       | `z - y`                          |
//! | median     | `1{z >= y} - 1/2`                |
//! | expectile  | `2 * |1{z >= y} - level| * (z - y)` |
//! | quantile   | `1{z >= y} - level`              |
use crate::data::validate_same_length;
use crate::errors::DiagnosticsError;
use crate::utils::{items_to_strings, validate_float_parameter, weighted_quantile_bounds};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum FunctionalKind {
    Mean,
    Median,
    Expectile,
    Quantile,
}

impl FromStr for FunctionalKind {
    type Err = DiagnosticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(FunctionalKind::Mean),
            "median" => Ok(FunctionalKind::Median),
            "expectile" => Ok(FunctionalKind::Expectile),
            "quantile" => Ok(FunctionalKind::Quantile),
            _ => Err(DiagnosticsError::ParseString(
                s.to_string(),
                "functional".to_string(),
                items_to_strings(vec!["mean", "median", "expectile", "quantile"]),
            )),
        }
    }
}

impl fmt::Display for FunctionalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FunctionalKind::Mean => "mean",
            FunctionalKind::Median => "median",
            FunctionalKind::Expectile => "expectile",
            FunctionalKind::Quantile => "quantile",
        };
        write!(f, "{}", s)
    }
}

/// A target functional together with its level.
///
/// The level is only meaningful for expectiles and quantiles, for the mean
/// and the median it is stored as 0.5.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Functional {
    pub kind: FunctionalKind,
    pub level: f64,
}

impl Default for Functional {
    fn default() -> Self {
        Functional::mean()
    }
}

impl Functional {
    /// Create a functional, validating the level only where it is used.
    ///
    /// * `kind` - The kind of functional.
    /// * `level` - Level of the expectile or quantile, `0 <= level <= 1`.
    pub fn new(kind: FunctionalKind, level: f64) -> Result<Self, DiagnosticsError> {
        match kind {
            FunctionalKind::Mean | FunctionalKind::Median => Ok(Functional { kind, level: 0.5 }),
            FunctionalKind::Expectile | FunctionalKind::Quantile => {
                validate_float_parameter(level, 0.0, 1.0, "level")?;
                Ok(Functional { kind, level })
            }
        }
    }

    /// Parse the kind from its name, e.g. `"quantile"`.
    pub fn from_name(name: &str, level: f64) -> Result<Self, DiagnosticsError> {
        Functional::new(FunctionalKind::from_str(name)?, level)
    }

    pub fn mean() -> Self {
        Functional {
            kind: FunctionalKind::Mean,
            level: 0.5,
        }
    }

    pub fn median() -> Self {
        Functional {
            kind: FunctionalKind::Median,
            level: 0.5,
        }
    }

    pub fn expectile(level: f64) -> Result<Self, DiagnosticsError> {
        Functional::new(FunctionalKind::Expectile, level)
    }

    pub fn quantile(level: f64) -> Result<Self, DiagnosticsError> {
        Functional::new(FunctionalKind::Quantile, level)
    }

    /// Value of the identification function for observation `y` and prediction `z`.
    #[inline]
    pub fn identification(&self, y: f64, z: f64) -> f64 {
        let ge = if z >= y { 1.0 } else { 0.0 };
        match self.kind {
            FunctionalKind::Mean => z - y,
            FunctionalKind::Median => ge - 0.5,
            FunctionalKind::Expectile => 2.0 * (ge - self.level).abs() * (z - y),
            FunctionalKind::Quantile => ge - self.level,
        }
    }

    /// The value `z` that zeros the weighted sum of identification values
    /// `sum_i w_i V(y_i, z)` over a sample, or comes as close as possible
    /// for the step shaped identification functions of quantiles.
    ///
    /// * `y` - Observations, they do not need to be sorted.
    /// * `sample_weight` - Positive weights.
    pub fn estimate(&self, y: &[f64], sample_weight: &[f64]) -> f64 {
        if y.is_empty() {
            return f64::NAN;
        }
        if self.kind == FunctionalKind::Mean {
            return weighted_mean(y, sample_weight);
        }
        let (v, w) = sorted_with_weights(y, sample_weight);
        self.estimate_sorted(&v, &w)
    }

    /// Same as [`Functional::estimate`] for observations `v` already sorted
    /// in increasing order.
    pub fn estimate_sorted(&self, v: &[f64], sample_weight: &[f64]) -> f64 {
        if v.is_empty() {
            return f64::NAN;
        }
        match self.kind {
            FunctionalKind::Mean => weighted_mean(v, sample_weight),
            FunctionalKind::Expectile => sorted_weighted_expectile(v, sample_weight, self.level),
            _ => {
                let (lower, upper) = weighted_quantile_bounds(v, sample_weight, self.level);
                0.5 * (lower + upper)
            }
        }
    }

    /// Human readable label of the target, conditioned on `given`,
    /// e.g. `0.3-quantile(Y|X)`.
    pub fn target_label(&self, given: &str) -> String {
        match self.kind {
            FunctionalKind::Mean => format!("E(Y|{})", given),
            FunctionalKind::Median => format!("median(Y|{})", given),
            FunctionalKind::Expectile => format!("{}-expectile(Y|{})", self.level, given),
            FunctionalKind::Quantile => format!("{}-quantile(Y|{})", self.level, given),
        }
    }
}

impl fmt::Display for Functional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FunctionalKind::Mean | FunctionalKind::Median => write!(f, "{}", self.kind),
            _ => write!(f, "{}({})", self.kind, self.level),
        }
    }
}

/// Identification function value of a single observation.
///
/// * `y` - Observed value.
/// * `pred` - Predicted value of the functional.
/// * `kind` - The functional.
/// * `level` - Level of expectile or quantile, neglected for mean and median.
pub fn identification_value(y: f64, pred: f64, kind: FunctionalKind, level: f64) -> Result<f64, DiagnosticsError> {
    Ok(Functional::new(kind, level)?.identification(y, pred))
}

/// Canonical identification function evaluated elementwise.
///
/// * `y_obs` - Observed values of the response.
/// * `y_pred` - Predicted values of the functional.
/// * `functional` - The functional induced by the identification function.
pub fn identification_function(
    y_obs: &[f64],
    y_pred: &[f64],
    functional: &Functional,
) -> Result<Vec<f64>, DiagnosticsError> {
    validate_same_length("y_obs", y_obs.len(), "y_pred", y_pred.len())?;
    Ok(y_obs
        .iter()
        .zip(y_pred)
        .map(|(y, z)| functional.identification(*y, *z))
        .collect())
}

fn weighted_mean(y: &[f64], sample_weight: &[f64]) -> f64 {
    let mut ytot = 0.0;
    let mut wtot = 0.0;
    for (y_, w_) in y.iter().zip(sample_weight) {
        ytot += y_ * w_;
        wtot += w_;
    }
    ytot / wtot
}

fn sorted_with_weights(y: &[f64], sample_weight: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut idx: Vec<usize> = (0..y.len()).collect();
    idx.sort_by(|a, b| y[*a].partial_cmp(&y[*b]).unwrap_or(Ordering::Equal));
    idx.iter().map(|i| (y[*i], sample_weight[*i])).unzip()
}

/// Weighted expectile of a sorted sample.
///
/// The weighted identification sum is piecewise linear and increasing in `z`,
/// so the root is found by checking every interval `[v_k, v_{k+1})` for the
/// closed form solution with the left part `v_0..=v_k` weighted by
/// `1 - level` and the right part by `level`.
fn sorted_weighted_expectile(v: &[f64], w: &[f64], level: f64) -> f64 {
    let n = v.len();
    if level <= 0.0 {
        return v[0];
    }
    if level >= 1.0 || v[0] == v[n - 1] {
        return v[n - 1];
    }
    let a_total: f64 = v.iter().zip(w).map(|(v_, w_)| v_ * w_).sum();
    let w_total: f64 = w.iter().sum();
    let mut a_left = 0.0;
    let mut w_left = 0.0;
    let mut z = v[0];
    for k in 0..n {
        a_left += v[k] * w[k];
        w_left += w[k];
        if k < n - 1 && v[k] == v[k + 1] {
            continue;
        }
        let num = (1.0 - level) * a_left + level * (a_total - a_left);
        let den = (1.0 - level) * w_left + level * (w_total - w_left);
        z = num / den;
        let upper = if k == n - 1 { v[k] } else { v[k + 1] };
        let tol = 1e-12 * (1.0 + v[k].abs().max(upper.abs()));
        if z >= v[k] - tol && z <= upper + tol {
            return z.clamp(v[k], upper);
        }
    }
    z.clamp(v[0], v[n - 1])
}
