//! Isotonic Regression
//!
//! Generalised pool adjacent violators (PAV) algorithm. The fitted step
//! function is non-decreasing and, on every block of pooled observations,
//! zeros the weighted sum of the identification function of the chosen
//! functional (mean, median, expectile or quantile).
use crate::data::validate_same_length;
use crate::errors::DiagnosticsError;
use crate::functional::{Functional, FunctionalKind};
use crate::utils::{fmt_vec_output, validate_finite, validate_weights};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Isotonic regression of observations `y` on predictions `x` for a functional.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct IsotonicRegression {
    pub functional: Functional,
}

/// A block of contiguous, sorted observations sharing one fitted value.
/// `start..end` indexes the sorted arrays.
#[derive(Clone, Debug)]
struct Block {
    start: usize,
    end: usize,
    value: f64,
    sum_wy: f64,
    sum_w: f64,
    /// Observations of the block in increasing order of `y`, with their
    /// weights. Left empty for the mean, which only needs the sums.
    sorted_y: Vec<f64>,
    sorted_w: Vec<f64>,
}

/// Fitted non-decreasing step function.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IsotonicModel {
    /// Functional the model was fitted for.
    pub functional: Functional,
    /// Smallest `x` of each step, strictly increasing.
    pub thresholds: Vec<f64>,
    /// Fitted value of each step, strictly increasing.
    pub values: Vec<f64>,
    /// Sum of the case weights in each step.
    pub weights: Vec<f64>,
    /// Number of observations in each step.
    pub counts: Vec<usize>,
    /// Min `x` in the fitting data.
    pub x_min: f64,
    /// Max `x` in the fitting data.
    pub x_max: f64,
}

impl IsotonicRegression {
    pub fn new(functional: Functional) -> Self {
        IsotonicRegression { functional }
    }

    /// Fit the isotonic regression.
    ///
    /// * `x` - Predictions, the regressor.
    /// * `y` - Observations, the response.
    /// * `sample_weight` - Optional non-negative case weights. Observations
    ///   with zero weight are ignored.
    pub fn fit(&self, x: &[f64], y: &[f64], sample_weight: Option<&[f64]>) -> Result<IsotonicModel, DiagnosticsError> {
        validate_same_length("x", x.len(), "y", y.len())?;
        validate_finite(x, "x")?;
        validate_finite(y, "y")?;
        if let Some(w) = sample_weight {
            validate_weights(w, y.len())?;
        }

        // Pair up (x, y, weight), drop zero weights and sort by x.
        // The sort is stable, ties keep their original order.
        let mut data: Vec<(f64, f64, f64)> = match sample_weight {
            Some(w) => x
                .iter()
                .zip(y)
                .zip(w)
                .filter(|(_, w_)| **w_ > 0.0)
                .map(|((x_, y_), w_)| (*x_, *y_, *w_))
                .collect(),
            None => x.iter().zip(y).map(|(x_, y_)| (*x_, *y_, 1.0)).collect(),
        };
        if data.is_empty() {
            return Ok(IsotonicModel {
                functional: self.functional,
                x_min: f64::NAN,
                x_max: f64::NAN,
                ..Default::default()
            });
        }
        data.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let xs: Vec<f64> = data.iter().map(|d| d.0).collect();
        let ys: Vec<f64> = data.iter().map(|d| d.1).collect();
        let ws: Vec<f64> = data.iter().map(|d| d.2).collect();
        let n = xs.len();

        // Stack of blocks with non-decreasing values.
        let mut blocks: Vec<Block> = Vec::with_capacity(n);
        let mut i = 0;
        while i < n {
            // All observations with the same x start in one block, so the
            // fit is a function of x.
            let mut j = i + 1;
            while j < n && xs[j] == xs[i] {
                j += 1;
            }
            let mut current = self.new_block(i, j, &ys, &ws);

            // Merge down while the previous block violates monotonicity.
            while blocks.last().map_or(false, |prev| prev.value > current.value) {
                if let Some(prev) = blocks.pop() {
                    current = self.merge(prev, current);
                }
            }
            blocks.push(current);
            i = j;
        }

        let model = self.build_model(&blocks, &xs);
        debug!(
            "Isotonic regression for {} fitted {} steps on {} observations.",
            self.functional,
            model.thresholds.len(),
            n
        );
        Ok(model)
    }

    fn new_block(&self, start: usize, end: usize, ys: &[f64], ws: &[f64]) -> Block {
        let (sorted_y, sorted_w) = if self.functional.kind == FunctionalKind::Mean {
            (Vec::new(), Vec::new())
        } else {
            let mut pairs: Vec<(f64, f64)> = ys[start..end].iter().copied().zip(ws[start..end].iter().copied()).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            pairs.into_iter().unzip()
        };
        let mut block = Block {
            start,
            end,
            value: f64::NAN,
            sum_wy: ys[start..end].iter().zip(&ws[start..end]).map(|(y, w)| y * w).sum(),
            sum_w: ws[start..end].iter().sum(),
            sorted_y,
            sorted_w,
        };
        block.value = self.solve(&block);
        block
    }

    /// Pool two adjacent blocks and re-solve the fitted value on the merged
    /// support. The sorted supports are merged, not sorted again.
    fn merge(&self, left: Block, right: Block) -> Block {
        let (sorted_y, sorted_w) = merge_sorted(left.sorted_y, left.sorted_w, right.sorted_y, right.sorted_w);
        let mut block = Block {
            start: left.start,
            end: right.end,
            value: f64::NAN,
            sum_wy: left.sum_wy + right.sum_wy,
            sum_w: left.sum_w + right.sum_w,
            sorted_y,
            sorted_w,
        };
        block.value = self.solve(&block);
        block
    }

    fn solve(&self, block: &Block) -> f64 {
        match self.functional.kind {
            FunctionalKind::Mean => block.sum_wy / block.sum_w,
            _ => self.functional.estimate_sorted(&block.sorted_y, &block.sorted_w),
        }
    }

    /// Compact adjacent blocks with equal values into single steps.
    fn build_model(&self, blocks: &[Block], xs: &[f64]) -> IsotonicModel {
        let mut thresholds = Vec::with_capacity(blocks.len());
        let mut values: Vec<f64> = Vec::with_capacity(blocks.len());
        let mut weights: Vec<f64> = Vec::with_capacity(blocks.len());
        let mut counts: Vec<usize> = Vec::with_capacity(blocks.len());

        for block in blocks {
            let count = block.end - block.start;
            match values.last() {
                Some(v) if *v == block.value => {
                    if let (Some(w), Some(c)) = (weights.last_mut(), counts.last_mut()) {
                        *w += block.sum_w;
                        *c += count;
                    }
                }
                _ => {
                    thresholds.push(xs[block.start]);
                    values.push(block.value);
                    weights.push(block.sum_w);
                    counts.push(count);
                }
            }
        }

        IsotonicModel {
            functional: self.functional,
            thresholds,
            values,
            weights,
            counts,
            x_min: xs[0],
            x_max: xs[xs.len() - 1],
        }
    }
}

/// Merge two runs sorted by value into one, carrying the weights along.
/// Ties keep the left run first.
fn merge_sorted(a_y: Vec<f64>, a_w: Vec<f64>, b_y: Vec<f64>, b_w: Vec<f64>) -> (Vec<f64>, Vec<f64>) {
    if b_y.is_empty() {
        return (a_y, a_w);
    }
    if a_y.is_empty() {
        return (b_y, b_w);
    }
    let n = a_y.len() + b_y.len();
    let mut y = Vec::with_capacity(n);
    let mut w = Vec::with_capacity(n);
    let (mut i, mut j) = (0, 0);
    while i < a_y.len() && j < b_y.len() {
        if b_y[j] < a_y[i] {
            y.push(b_y[j]);
            w.push(b_w[j]);
            j += 1;
        } else {
            y.push(a_y[i]);
            w.push(a_w[i]);
            i += 1;
        }
    }
    y.extend_from_slice(&a_y[i..]);
    w.extend_from_slice(&a_w[i..]);
    y.extend_from_slice(&b_y[j..]);
    w.extend_from_slice(&b_w[j..]);
    (y, w)
}

impl IsotonicModel {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Index of the step a value falls into, the step with the largest
    /// threshold less or equal to `x`. Values below the first threshold
    /// belong to the first step. Returns `None` for an empty model or NaN.
    pub fn step_index(&self, x: f64) -> Option<usize> {
        if self.thresholds.is_empty() || x.is_nan() {
            return None;
        }
        let idx = self.thresholds.partition_point(|t| *t <= x);
        Some(idx.saturating_sub(1))
    }

    /// Evaluate the fitted step function. Queries outside the fitted range
    /// are clipped to the boundary values, there is no extrapolation.
    /// An empty model and NaN queries give NaN.
    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .map(|x_| match self.step_index(*x_) {
                Some(i) => self.values[i],
                None => f64::NAN,
            })
            .collect()
    }

    /// Dump the model as a json object
    pub fn json_dump(&self) -> Result<String, DiagnosticsError> {
        match serde_json::to_string(self) {
            Ok(s) => Ok(s),
            Err(e) => Err(DiagnosticsError::UnableToWrite(e.to_string())),
        }
    }

    /// Load a model from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    pub fn from_json(json_str: &str) -> Result<Self, DiagnosticsError> {
        let model = serde_json::from_str::<IsotonicModel>(json_str);
        match model {
            Ok(m) => Ok(m),
            Err(e) => Err(DiagnosticsError::UnableToRead(e.to_string())),
        }
    }
}

impl fmt::Display for IsotonicModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IsotonicModel({}, thresholds: [{}], values: [{}])",
            self.functional,
            fmt_vec_output(&self.thresholds),
            fmt_vec_output(&self.values)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    fn all_functionals() -> Vec<Functional> {
        vec![
            Functional::mean(),
            Functional::median(),
            Functional::expectile(0.2).unwrap(),
            Functional::expectile(0.9).unwrap(),
            Functional::quantile(0.1).unwrap(),
            Functional::quantile(0.7).unwrap(),
        ]
    }

    fn is_increasing(v: &[f64]) -> bool {
        v.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn test_simple_violation() {
        let x = vec![1., 2., 3., 4.];
        let y = vec![1., 3., 2., 4.];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, None).unwrap();
        assert_eq!(model.thresholds, vec![1., 2., 4.]);
        assert_eq!(model.values, vec![1., 2.5, 4.]);
        assert_eq!(model.counts, vec![1, 2, 1]);
        assert_eq!(model.predict(&x), vec![1., 2.5, 2.5, 4.]);
    }

    #[test]
    fn test_monotone_is_noop_for_mean() {
        let x = vec![0.5, 1., 2., 3.5, 4., 8.];
        let y = vec![-1., 0., 0.3, 2., 7., 7.5];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, None).unwrap();
        assert_eq!(model.predict(&x), y);
        assert_eq!(model.thresholds, x);
    }

    #[test]
    fn test_constant_y_single_block() {
        let x = vec![3., 1., 2., 5., 4.];
        let y = vec![2.5; 5];
        for functional in all_functionals() {
            let model = IsotonicRegression::new(functional).fit(&x, &y, None).unwrap();
            assert_eq!(model.len(), 1, "{}", functional);
            assert_eq!(model.values, vec![2.5]);
            assert_eq!(model.thresholds, vec![1.]);
            assert_eq!(model.counts, vec![5]);
        }
    }

    #[test]
    fn test_identical_x_single_block() {
        let x = vec![1.; 4];
        let y = vec![4., 1., 3., 2.];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, None).unwrap();
        assert_eq!(model.values, vec![2.5]);
        let model = IsotonicRegression::new(Functional::quantile(0.25).unwrap())
            .fit(&x, &y, None)
            .unwrap();
        assert_eq!(model.values, vec![1.5]);
        let model = IsotonicRegression::new(Functional::median()).fit(&x, &y, None).unwrap();
        assert_eq!(model.values, vec![2.5]);
    }

    #[test]
    fn test_ties_in_x_share_value() {
        let x = vec![1., 2., 2., 3.];
        let y = vec![0., 5., 1., 4.];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, None).unwrap();
        let p = model.predict(&[2.]);
        assert_eq!(p, vec![3.]);
        assert_eq!(model.thresholds, vec![1., 2., 3.]);
        assert_eq!(model.values, vec![0., 3., 4.]);
    }

    #[test]
    fn test_reverse_sorted_pools_everything() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..50).map(|i| (50 - i) as f64).collect();
        for functional in all_functionals() {
            let model = IsotonicRegression::new(functional).fit(&x, &y, None).unwrap();
            assert_eq!(model.len(), 1, "{}", functional);
            let expected = functional.estimate(&y, &vec![1.; y.len()]);
            assert!((model.values[0] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_merge_sorted() {
        let (y, w) = merge_sorted(vec![1., 3., 5.], vec![1., 1., 1.], vec![2., 3., 6.], vec![2., 2., 2.]);
        assert_eq!(y, vec![1., 2., 3., 3., 5., 6.]);
        // Ties keep the left run first.
        assert_eq!(w, vec![1., 2., 1., 2., 1., 2.]);
        let (y, w) = merge_sorted(Vec::new(), Vec::new(), vec![4.], vec![0.5]);
        assert_eq!((y, w), (vec![4.], vec![0.5]));
    }

    #[test]
    fn test_long_reverse_sorted_pooling() {
        // Every new point merges into one growing block, the pooled support
        // must stay sorted to give the estimate on all observations.
        let n = 5000;
        let mut rng = StdRng::seed_from_u64(1);
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| (n - i) as f64 + rng.gen_range(0.0..0.5)).collect();
        let w: Vec<f64> = (0..n).map(|_| rng.gen_range(0.5..2.0)).collect();
        for functional in all_functionals() {
            let model = IsotonicRegression::new(functional).fit(&x, &y, Some(&w)).unwrap();
            assert_eq!(model.len(), 1, "{}", functional);
            let expected = functional.estimate(&y, &w);
            assert!((model.values[0] - expected).abs() < 1e-9, "{}", functional);
        }
    }

    #[test]
    fn test_random_input_is_monotone() {
        let mut rng = StdRng::seed_from_u64(0);
        for functional in all_functionals() {
            for _ in 0..20 {
                let n = rng.gen_range(1..200);
                let x: Vec<f64> = (0..n).map(|_| rng.gen_range(0..30) as f64).collect();
                let y: Vec<f64> = x.iter().map(|x_| x_ + rng.gen_range(-20.0..20.0)).collect();
                let w: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..3.0)).collect();
                let model = IsotonicRegression::new(functional).fit(&x, &y, Some(&w)).unwrap();
                assert!(is_increasing(&model.values), "{}", functional);
                assert!(is_increasing(&model.thresholds), "{}", functional);
                let mut sorted_x = x.clone();
                sorted_x.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let p = model.predict(&sorted_x);
                assert!(p.windows(2).all(|w| w[0] <= w[1]));
                assert_eq!(model.counts.iter().sum::<usize>(), w.iter().filter(|w_| **w_ > 0.0).count());
            }
        }
    }

    #[test]
    fn test_blocks_zero_identification_for_expectile() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 300;
        let x: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
        let y: Vec<f64> = x.iter().map(|x_| x_ + rng.gen_range(-3.0..3.0)).collect();
        let functional = Functional::expectile(0.3).unwrap();
        let model = IsotonicRegression::new(functional).fit(&x, &y, None).unwrap();
        let fitted = model.predict(&x);
        for step in 0..model.len() {
            let s: f64 = (0..n)
                .filter(|i| model.step_index(x[*i]) == Some(step))
                .map(|i| functional.identification(y[i], fitted[i]))
                .sum();
            assert!(s.abs() < 1e-6, "step {} has sum {}", step, s);
        }
    }

    #[test]
    fn test_predict_clips() {
        let x = vec![1., 2., 3., 4.];
        let y = vec![1., 2., 3., 4.];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, None).unwrap();
        assert_eq!(model.predict(&[-10.]), vec![1.]);
        assert_eq!(model.predict(&[100.]), vec![4.]);
        assert_eq!(model.predict(&[2.5]), vec![2.]);
        assert!(model.predict(&[f64::NAN])[0].is_nan());
    }

    #[test]
    fn test_weights() {
        let x = vec![1., 2.];
        let y = vec![3., 0.];
        let w = vec![1., 3.];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, Some(&w)).unwrap();
        assert_eq!(model.values, vec![0.75]);
        assert_eq!(model.weights, vec![4.]);

        // A zero weight observation does not influence the fit.
        let x = vec![1., 2., 3.];
        let y = vec![1., -100., 2.];
        let w = vec![1., 0., 1.];
        let model = IsotonicRegression::new(Functional::mean()).fit(&x, &y, Some(&w)).unwrap();
        assert_eq!(model.thresholds, vec![1., 3.]);
        assert_eq!(model.values, vec![1., 2.]);
    }

    #[test]
    fn test_empty_input() {
        let model = IsotonicRegression::default().fit(&[], &[], None).unwrap();
        assert!(model.is_empty());
        assert!(model.predict(&[1.])[0].is_nan());
    }

    #[test]
    fn test_invalid_input() {
        let iso = IsotonicRegression::default();
        assert!(matches!(
            iso.fit(&[1., f64::NAN], &[1., 2.], None),
            Err(DiagnosticsError::NonFiniteValue(..))
        ));
        assert!(matches!(
            iso.fit(&[1., 2.], &[1., f64::INFINITY], None),
            Err(DiagnosticsError::NonFiniteValue(..))
        ));
        assert!(matches!(
            iso.fit(&[1., 2.], &[1., 2.], Some(&[1., -1.])),
            Err(DiagnosticsError::InvalidWeight(..))
        ));
        assert!(matches!(
            iso.fit(&[1., 2.], &[1.], None),
            Err(DiagnosticsError::ShapeMismatch(..))
        ));
    }

    #[test]
    fn test_inputs_unchanged_and_repeatable() {
        let x = vec![3., 1., 2., 1.];
        let y = vec![1., 5., 0., 2.];
        let (x0, y0) = (x.clone(), y.clone());
        let iso = IsotonicRegression::new(Functional::quantile(0.4).unwrap());
        let m1 = iso.fit(&x, &y, None).unwrap();
        let m2 = iso.fit(&x, &y, None).unwrap();
        assert_eq!(x, x0);
        assert_eq!(y, y0);
        assert_eq!(m1.values, m2.values);
        assert_eq!(m1.thresholds, m2.thresholds);
    }

    #[test]
    fn test_json_round_trip() {
        let x = vec![1., 2., 3., 4.];
        let y = vec![1., 3., 2., 4.];
        let model = IsotonicRegression::new(Functional::expectile(0.3).unwrap())
            .fit(&x, &y, None)
            .unwrap();
        let s = model.json_dump().unwrap();
        let model2 = IsotonicModel::from_json(&s).unwrap();
        assert_eq!(model2.functional, model.functional);
        assert_eq!(model2.predict(&x), model.predict(&x));
        assert!(IsotonicModel::from_json("{").is_err());
    }
}
