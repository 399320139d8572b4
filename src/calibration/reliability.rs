//! Reliability
//!
//! Reliability curves estimate the auto-calibration of a model: the
//! isotonic regression of the observations on the predictions, evaluated at
//! the step thresholds. A well calibrated model lies on the diagonal, or on
//! the zero line for the bias variant. Uncertainty is quantified with paired
//! bootstrap resamples.
use crate::calibration::bias::validate_confidence_level;
use crate::calibration::isotonic::{IsotonicModel, IsotonicRegression};
use crate::data::{validate_same_length, Predictions};
use crate::errors::DiagnosticsError;
use crate::functional::Functional;
use crate::sampler::{take, BootstrapSampler};
use crate::utils::{items_to_strings, linear_percentile, total_cmp_nan_last, validate_weights};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;

/// What to show on the y-axis.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DiagramType {
    /// The estimated functional `g(x)`.
    #[default]
    Reliability,
    /// The bias `x - g(x)`.
    Bias,
}

impl FromStr for DiagramType {
    type Err = DiagnosticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reliability" => Ok(DiagramType::Reliability),
            "bias" => Ok(DiagramType::Bias),
            _ => Err(DiagnosticsError::ParseString(
                s.to_string(),
                "DiagramType".to_string(),
                items_to_strings(vec!["reliability", "bias"]),
            )),
        }
    }
}

/// Settings of the reliability curves.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReliabilityConfig {
    pub functional: Functional,
    /// Number of bootstrap resamples, no uncertainty band if `None`.
    pub n_bootstrap: Option<usize>,
    pub confidence_level: f64,
    pub diagram_type: DiagramType,
    /// Seed of the first resample, resample `b` uses `seed + b`.
    pub seed: u64,
    /// Number of threads for the resamples, all available if `None`.
    pub num_threads: Option<usize>,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        ReliabilityConfig {
            functional: Functional::mean(),
            n_bootstrap: None,
            confidence_level: 0.9,
            diagram_type: DiagramType::Reliability,
            seed: 0,
            num_threads: None,
        }
    }
}

impl ReliabilityConfig {
    /// Set the functional.
    pub fn set_functional(mut self, functional: Functional) -> Self {
        self.functional = functional;
        self
    }

    /// Set the number of bootstrap resamples.
    /// * `n_bootstrap` - `None` disables the bootstrap.
    pub fn set_n_bootstrap(mut self, n_bootstrap: Option<usize>) -> Self {
        self.n_bootstrap = n_bootstrap;
        self
    }

    /// Set the confidence level of the bootstrap band.
    pub fn set_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn set_diagram_type(mut self, diagram_type: DiagramType) -> Self {
        self.diagram_type = diagram_type;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Axis labels and title, e.g. for the mean:
    /// `prediction for E(Y|X)` and `estimated E(Y|prediction)`.
    pub fn labels(&self, model_name: &str) -> (String, String, String) {
        let xlabel = format!("prediction for {}", self.functional.target_label("X"));
        let target = self.functional.target_label("prediction");
        let (ylabel, mut title) = match self.diagram_type {
            DiagramType::Reliability => (format!("estimated {}", target), String::from("Reliability Diagram")),
            DiagramType::Bias => (
                format!("prediction - estimated {}", target),
                String::from("Bias Reliability Diagram"),
            ),
        };
        if !model_name.is_empty() {
            title.push(' ');
            title.push_str(model_name);
        }
        (xlabel, ylabel, title)
    }
}

/// Reliability curve of one model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReliabilityCurve {
    pub model_name: String,
    /// Step thresholds of the isotonic fit.
    pub x: Vec<f64>,
    /// `g(x)` or `x - g(x)`, depending on the diagram type.
    pub y: Vec<f64>,
    /// Bootstrap band, present if resamples were requested.
    pub lower: Option<Vec<f64>>,
    pub upper: Option<Vec<f64>>,
    pub xlabel: String,
    pub ylabel: String,
    pub title: String,
    /// The underlying isotonic fit.
    pub model: IsotonicModel,
}

impl ReliabilityCurve {
    /// Dump the curve as a json object
    pub fn json_dump(&self) -> Result<String, DiagnosticsError> {
        match serde_json::to_string(self) {
            Ok(s) => Ok(s),
            Err(e) => Err(DiagnosticsError::UnableToWrite(e.to_string())),
        }
    }
}

/// Reliability curves of one or several models.
///
/// * `y_obs` - Observed values of the response.
/// * `predictions` - Predictions of one or several models.
/// * `weights` - Optional case weights.
/// * `config` - Functional, diagram type and bootstrap settings.
pub fn reliability_curves(
    y_obs: &[f64],
    predictions: &Predictions,
    weights: Option<&[f64]>,
    config: &ReliabilityConfig,
) -> Result<Vec<ReliabilityCurve>, DiagnosticsError> {
    validate_same_length("y_obs", y_obs.len(), "y_pred", predictions.rows())?;
    if let Some(w) = weights {
        validate_weights(w, y_obs.len())?;
    }
    validate_confidence_level(config.confidence_level)?;

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads.unwrap_or(0))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            return Err(DiagnosticsError::InvalidParameter(
                "num_threads".to_string(),
                "a buildable thread pool".to_string(),
                e.to_string(),
            ))
        }
    };

    let iso = IsotonicRegression::new(config.functional);
    predictions
        .iter()
        .map(|(name, y_pred)| -> Result<ReliabilityCurve, DiagnosticsError> {
            let model = iso.fit(y_pred, y_obs, weights)?;
            let band = match config.n_bootstrap {
                Some(n_bootstrap) => {
                    let start = Instant::now();
                    let band = pool.install(|| {
                        bootstrap_band(&iso, &model, y_obs, y_pred, weights, n_bootstrap, config)
                    });
                    debug!(
                        "Bootstrap of {} resamples for model '{}' took {:?}",
                        n_bootstrap,
                        name,
                        start.elapsed()
                    );
                    Some(band)
                }
                None => None,
            };
            let x = model.thresholds.clone();
            let (y, lower, upper) = match config.diagram_type {
                DiagramType::Reliability => (model.values.clone(), band.as_ref().map(|b| b.0.clone()), band.map(|b| b.1)),
                DiagramType::Bias => {
                    let minus = |v: &[f64]| x.iter().zip(v).map(|(x_, v_)| x_ - v_).collect::<Vec<f64>>();
                    (
                        minus(&model.values),
                        band.as_ref().map(|b| minus(&b.0)),
                        band.as_ref().map(|b| minus(&b.1)),
                    )
                }
            };
            let (xlabel, ylabel, title) = config.labels(name);
            Ok(ReliabilityCurve {
                model_name: name.to_string(),
                x,
                y,
                lower,
                upper,
                xlabel,
                ylabel,
                title,
                model,
            })
        })
        .collect()
}

/// Basic bootstrap interval of the fitted values at the thresholds of
/// `model`, made monotone by running maxima of both bounds.
fn bootstrap_band(
    iso: &IsotonicRegression,
    model: &IsotonicModel,
    y_obs: &[f64],
    y_pred: &[f64],
    weights: Option<&[f64]>,
    n_bootstrap: usize,
    config: &ReliabilityConfig,
) -> (Vec<f64>, Vec<f64>) {
    let index: Vec<usize> = (0..y_obs.len()).collect();
    let resamples: Vec<Vec<f64>> = (0..n_bootstrap)
        .into_par_iter()
        .filter_map(|b| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(b as u64));
            let rows = BootstrapSampler.sample(&mut rng, &index);
            let w = weights.map(|w| take(w, &rows));
            // A resample might only draw zero weights.
            match iso.fit(&take(y_pred, &rows), &take(y_obs, &rows), w.as_deref()) {
                Ok(m) => Some(m.predict(&model.thresholds)),
                Err(_) => None,
            }
        })
        .collect();
    if resamples.len() < n_bootstrap {
        warn!(
            "{} of {} bootstrap resamples could not be fitted.",
            n_bootstrap - resamples.len(),
            n_bootstrap
        );
    }

    let alpha = 1.0 - config.confidence_level;
    let mut lower = Vec::with_capacity(model.len());
    let mut upper = Vec::with_capacity(model.len());
    for (j, theta) in model.values.iter().enumerate() {
        let mut dist: Vec<f64> = resamples.iter().map(|r| r[j]).filter(|v| !v.is_nan()).collect();
        dist.sort_unstable_by(total_cmp_nan_last);
        let lo = linear_percentile(&dist, alpha / 2.0);
        let hi = linear_percentile(&dist, 1.0 - alpha / 2.0);
        lower.push(2.0 * theta - hi);
        upper.push(2.0 * theta - lo);
    }
    running_max(&mut lower);
    running_max(&mut upper);
    (lower, upper)
}

fn running_max(v: &mut [f64]) {
    for i in 1..v.len() {
        if v[i] < v[i - 1] {
            v[i] = v[i - 1];
        }
    }
}
