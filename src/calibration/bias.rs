//! Bias
//!
//! Aggregation of the generalised bias, i.e. the values of the canonical
//! identification function, per group. A model is conditionally calibrated
//! if the bias is around zero in every group, this is assessed with the mean,
//! its standard error and the p-value of a two-sided t-test per group.
use crate::binning::{bin_feature, BinKey, BinMethod};
use crate::calibration::isotonic::IsotonicRegression;
use crate::data::{validate_same_length, ColumnKind, Feature, FeatureValues, Predictions};
use crate::errors::DiagnosticsError;
use crate::functional::{identification_function, Functional};
use crate::utils::{validate_float_parameter, validate_weights};
use log::warn;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Statistics of the identification function values of one group.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GroupStatistics {
    /// Weighted mean.
    pub mean: f64,
    /// Number of rows.
    pub count: usize,
    /// Sum of the case weights.
    pub weight_sum: f64,
    /// Sample standard deviation, undefined for a single row.
    pub stddev: Option<f64>,
    /// Standard error of the mean.
    pub stderr: Option<f64>,
    /// p-value of the two-sided t-test of a zero mean.
    pub p_value: Option<f64>,
}

impl GroupStatistics {
    /// Statistics of a single group of values.
    pub fn from_values(values: &[f64], weights: Option<&[f64]>) -> Self {
        let assignment = vec![Some(0); values.len()];
        match aggregate(values, weights, &assignment, 1).pop().flatten() {
            Some(s) => s,
            None => GroupStatistics {
                mean: f64::NAN,
                count: 0,
                weight_sum: 0.0,
                stddev: None,
                stderr: None,
                p_value: None,
            },
        }
    }

    /// A degenerate group has no standard error or p-value.
    pub fn is_degenerate(&self) -> bool {
        self.p_value.is_none()
    }

    /// Confidence interval of the mean, `mean ± stderr * t`, with `t` the
    /// `1 - (1 - confidence_level) / 2` quantile of the t-distribution with
    /// `max(count - 1, 1)` degrees of freedom.
    ///
    /// * `confidence_level` - Value within `0 <= confidence_level < 1`.
    pub fn confidence_interval(&self, confidence_level: f64) -> Result<Option<(f64, f64)>, DiagnosticsError> {
        validate_confidence_level(confidence_level)?;
        let stderr = match self.stderr {
            Some(s) => s,
            None => return Ok(None),
        };
        let df = (self.count.saturating_sub(1)).max(1) as f64;
        let factor = match StudentsT::new(0.0, 1.0, df) {
            Ok(t) => t.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0),
            Err(_) => return Ok(None),
        };
        Ok(Some((self.mean - stderr * factor, self.mean + stderr * factor)))
    }
}

pub(crate) fn validate_confidence_level(confidence_level: f64) -> Result<(), DiagnosticsError> {
    validate_float_parameter(confidence_level, 0.0, 1.0, "confidence_level")?;
    if confidence_level == 1.0 {
        return Err(DiagnosticsError::InvalidParameter(
            "confidence_level".to_string(),
            "a value within 0 <= confidence_level < 1".to_string(),
            confidence_level.to_string(),
        ));
    }
    Ok(())
}

/// Two-sided p-value of the t-statistic `mean / stderr`.
fn t_test_p_value(mean: f64, stderr: f64, count: usize) -> Option<f64> {
    if count < 2 || stderr <= 0.0 || !stderr.is_finite() || !mean.is_finite() {
        return None;
    }
    let t = StudentsT::new(0.0, 1.0, (count - 1) as f64).ok()?;
    Some(2.0 * t.cdf(-(mean / stderr).abs()))
}

/// Aggregate values per group.
///
/// Rows with zero weight are not part of any group. The weighted variance
/// is `sum w (v - mean)^2 / weight_sum * count / (count - 1)`, which does not
/// depend on the scale of the weights, and the standard error is
/// `stddev / sqrt(count)`. Without weights these are the usual sample
/// standard deviation and standard error.
///
/// * `values` - Values to aggregate, e.g. identification function values.
/// * `weights` - Optional case weights.
/// * `assignment` - Group of every value, `None` excludes the value.
/// * `n_groups` - Number of groups, all ids in `assignment` are smaller.
///
/// Returns the statistics for every group id, `None` for empty groups.
pub fn aggregate(
    values: &[f64],
    weights: Option<&[f64]>,
    assignment: &[Option<usize>],
    n_groups: usize,
) -> Vec<Option<GroupStatistics>> {
    let weight = |i: usize| weights.map_or(1.0, |w| w[i]);

    let mut count = vec![0usize; n_groups];
    let mut sum_w = vec![0.0; n_groups];
    let mut sum_wv = vec![0.0; n_groups];
    for (i, g) in assignment.iter().enumerate() {
        if let Some(g) = g {
            if weight(i) == 0.0 {
                continue;
            }
            count[*g] += 1;
            sum_w[*g] += weight(i);
            sum_wv[*g] += weight(i) * values[i];
        }
    }
    let mean: Vec<f64> = sum_wv.iter().zip(&sum_w).map(|(s, w)| s / w).collect();

    let mut sum_sq = vec![0.0; n_groups];
    for (i, g) in assignment.iter().enumerate() {
        if let Some(g) = g {
            if weight(i) == 0.0 {
                continue;
            }
            let d = values[i] - mean[*g];
            sum_sq[*g] += weight(i) * d * d;
        }
    }

    (0..n_groups)
        .map(|g| {
            if count[g] == 0 {
                return None;
            }
            let (stddev, stderr) = if count[g] >= 2 && sum_w[g] > 0.0 {
                let n = count[g] as f64;
                let stddev = (sum_sq[g] / sum_w[g] * n / (n - 1.0)).sqrt();
                (Some(stddev), Some(stddev / n.sqrt()))
            } else {
                (None, None)
            };
            let p_value = stderr.and_then(|s| t_test_p_value(mean[g], s, count[g]));
            Some(GroupStatistics {
                mean: mean[g],
                count: count[g],
                weight_sum: sum_w[g],
                stddev,
                stderr,
                p_value,
            })
        })
        .collect()
}

/// Settings of the bias computation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BiasConfig {
    pub functional: Functional,
    pub n_bins: usize,
    pub bin_method: BinMethod,
}

impl Default for BiasConfig {
    fn default() -> Self {
        BiasConfig {
            functional: Functional::mean(),
            n_bins: 10,
            bin_method: BinMethod::Quantile,
        }
    }
}

impl BiasConfig {
    /// Set the functional.
    /// * `functional` - The functional induced by the identification function.
    pub fn set_functional(mut self, functional: Functional) -> Self {
        self.functional = functional;
        self
    }

    /// Set the number of bins.
    /// * `n_bins` - The number of bins for numerical features and the maximal number of (most
    ///   frequent) categories shown for categorical features.
    pub fn set_n_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = n_bins;
        self
    }

    /// Set the method to find bin edges of numerical features.
    pub fn set_bin_method(mut self, bin_method: BinMethod) -> Self {
        self.bin_method = bin_method;
        self
    }
}

/// One row of a bias table.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BiasRow {
    /// Name of the model, empty for a single unnamed model.
    pub model: String,
    /// Bin id and key, `None` if the rows are only grouped by model.
    pub bin: Option<(usize, BinKey)>,
    /// Mean feature value in a numeric bin.
    pub feature_value: Option<f64>,
    pub stats: GroupStatistics,
}

/// Generalised bias per model and feature group.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BiasTable {
    pub functional: Functional,
    pub feature_name: Option<String>,
    pub feature_kind: Option<ColumnKind>,
    pub rows: Vec<BiasRow>,
}

impl BiasTable {
    /// Rows of one model.
    pub fn model_rows<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a BiasRow> + 'a {
        self.rows.iter().filter(move |r| r.model == model)
    }

    /// Whether some row has no standard error.
    pub fn has_degenerate_groups(&self) -> bool {
        self.rows.iter().any(|r| r.stats.stderr.is_none())
    }

    /// Dump the table as a json object
    pub fn json_dump(&self) -> Result<String, DiagnosticsError> {
        match serde_json::to_string(self) {
            Ok(s) => Ok(s),
            Err(e) => Err(DiagnosticsError::UnableToWrite(e.to_string())),
        }
    }
}

/// Compute the generalised bias conditional on a feature.
///
/// For the mean functional the generalised bias is the negative residual
/// `y_pred - y_obs`. Numerical features are binned, categorical and string
/// features are reduced to their most frequent values, null values form a
/// group of their own which is always last. Without a feature, every model
/// is one group.
///
/// * `y_obs` - Observed values of the response.
/// * `predictions` - Predictions of one or several models.
/// * `feature` - Optional feature column to condition on.
/// * `weights` - Optional case weights.
/// * `config` - Functional and binning settings.
pub fn compute_bias(
    y_obs: &[f64],
    predictions: &Predictions,
    feature: Option<&Feature>,
    weights: Option<&[f64]>,
    config: &BiasConfig,
) -> Result<BiasTable, DiagnosticsError> {
    validate_same_length("y_obs", y_obs.len(), "y_pred", predictions.rows())?;
    if let Some(w) = weights {
        validate_weights(w, y_obs.len())?;
    }

    let binned = match feature {
        Some(f) => {
            validate_same_length("y_obs", y_obs.len(), "feature", f.len())?;
            Some(bin_feature(f, config.n_bins, config.bin_method)?)
        }
        None => None,
    };

    // Representative value of numeric bins, the mean feature value in the bin.
    let feature_values: Option<Vec<Option<f64>>> = match (feature, &binned) {
        (Some(f), Some(b)) => match f.values {
            FeatureValues::Numeric(v) => {
                let means = aggregate(v, None, &b.assignment, b.n_bins());
                Some(
                    b.bins
                        .iter()
                        .map(|bin| if bin.is_null() { None } else { means[bin.id].as_ref().map(|s| s.mean) })
                        .collect(),
                )
            }
            _ => None,
        },
        _ => None,
    };

    let mut rows = Vec::new();
    for (model, y_pred) in predictions.iter() {
        let bias = identification_function(y_obs, y_pred, &config.functional)?;
        match &binned {
            Some(b) => {
                let stats = aggregate(&bias, weights, &b.assignment, b.n_bins());
                for (bin, s) in b.bins.iter().zip(stats) {
                    if let Some(s) = s {
                        rows.push(BiasRow {
                            model: model.to_string(),
                            bin: Some((bin.id, bin.key.clone())),
                            feature_value: feature_values.as_ref().and_then(|fv| fv[bin.id]),
                            stats: s,
                        });
                    }
                }
            }
            None => {
                if !bias.is_empty() {
                    rows.push(BiasRow {
                        model: model.to_string(),
                        bin: None,
                        feature_value: None,
                        stats: GroupStatistics::from_values(&bias, weights),
                    });
                }
            }
        }
    }

    let table = BiasTable {
        functional: config.functional,
        feature_name: feature.map(|f| f.name.clone()),
        feature_kind: feature.map(|f| f.kind()),
        rows,
    };
    if table.has_degenerate_groups() {
        warn!("Some groups have a single observation, their standard error and p-value are null.");
    }
    if table.rows.iter().any(|r| r.stats.stderr == Some(0.0)) {
        warn!("Some groups have zero variance, their p-value is null.");
    }
    Ok(table)
}

/// Bias of a single step of an isotonic fit.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StepBias {
    pub threshold: f64,
    pub fitted_value: f64,
    pub stats: GroupStatistics,
}

/// Bias of the predictions grouped by the steps of the isotonic regression
/// of `y_obs` on `y_pred`, i.e. grouped by the estimated auto-calibration
/// blocks.
///
/// * `y_obs` - Observed values of the response.
/// * `y_pred` - Predicted values.
/// * `weights` - Optional case weights.
/// * `functional` - The functional.
pub fn compute_bias_by_fit(
    y_obs: &[f64],
    y_pred: &[f64],
    weights: Option<&[f64]>,
    functional: Functional,
) -> Result<Vec<StepBias>, DiagnosticsError> {
    let model = IsotonicRegression::new(functional).fit(y_pred, y_obs, weights)?;
    let bias = identification_function(y_obs, y_pred, &functional)?;
    let assignment: Vec<Option<usize>> = y_pred.iter().map(|x| model.step_index(*x)).collect();
    let stats = aggregate(&bias, weights, &assignment, model.len());
    Ok(model
        .thresholds
        .iter()
        .zip(&model.values)
        .zip(stats)
        .filter_map(|((t, v), s)| {
            s.map(|s| StepBias {
                threshold: *t,
                fitted_value: *v,
                stats: s,
            })
        })
        .collect())
}
