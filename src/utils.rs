use crate::errors::DiagnosticsError;
use std::cmp::Ordering;
use std::convert::TryInto;

/// Format a list of items for an error message.
pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

pub fn fmt_vec_output(v: &[f64]) -> String {
    let mut res = String::new();
    if let Some(last) = v.len().checked_sub(1) {
        if last == 0 {
            return format!("{:.4}", v[0]);
        }
        for n in &v[..last] {
            res.push_str(format!("{:.4}", n).as_str());
            res.push_str(", ");
        }
        res.push_str(format!("{:.4}", &v[last]).as_str());
    }
    res
}

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), DiagnosticsError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(DiagnosticsError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Check that every value of a slice is finite.
///
/// * `v` - Values to check.
/// * `name` - Name of the array, used in the error message.
pub fn validate_finite(v: &[f64], name: &str) -> Result<(), DiagnosticsError> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(DiagnosticsError::NonFiniteValue(name.to_string(), i)),
        None => Ok(()),
    }
}

/// Check case weights, they have to be finite, non-negative and not all zero.
///
/// * `weights` - The case weights.
/// * `n` - Expected number of rows.
pub fn validate_weights(weights: &[f64], n: usize) -> Result<(), DiagnosticsError> {
    if weights.len() != n {
        return Err(DiagnosticsError::ShapeMismatch(
            "weights".to_string(),
            weights.len(),
            "y_obs".to_string(),
            n,
        ));
    }
    if let Some(i) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
        return Err(DiagnosticsError::InvalidWeight(format!(
            "weight at position {} is {}, weights must be finite and non-negative",
            i, weights[i]
        )));
    }
    if n > 0 && weights.iter().all(|w| *w == 0.0) {
        return Err(DiagnosticsError::InvalidWeight("all weights are zero".to_string()));
    }
    Ok(())
}

/// Total order on floats, NaN sorted last.
#[inline]
pub fn total_cmp_nan_last(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

const LANES: usize = 16;

/// Fast summation, ends up being roughly 8 to 10 times faster
/// than values.iter().copied().sum().
#[inline]
pub fn fast_sum(values: &[f64]) -> f64 {
    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    let sum = chunks.fold([0.0; LANES], |mut acc, chunk| {
        let chunk: &[f64; LANES] = match chunk.try_into() {
            Ok(c) => c,
            Err(_) => return acc,
        };
        for i in 0..LANES {
            acc[i] += chunk[i];
        }
        acc
    });

    let remainder: f64 = remainder.iter().copied().sum();

    let mut reduced = 0.0;
    for s in sum.iter().take(LANES) {
        reduced += *s;
    }
    reduced + remainder
}

/// Empirical quantiles with the inverted CDF definition, at the levels
/// `i / k` for `i = 1..k-1`.
///
/// The comparison is done on ranks with integer arithmetic, so levels like
/// 3/10 never suffer from rounding in the cumulative fraction.
///
/// * `sorted` - Sorted values, without missing values.
/// * `k` - Number of intervals the levels split the unit interval into.
pub fn inverted_cdf_quantiles(sorted: &[f64], k: usize) -> Vec<f64> {
    let n = sorted.len();
    let mut p = Vec::with_capacity(k.saturating_sub(1));
    if n == 0 {
        return p;
    }
    for i in 1..k {
        // Smallest rank r (1-based) with r / n >= i / k.
        let r = (i * n).div_ceil(k).max(1);
        p.push(sorted[r - 1]);
    }
    p
}

/// Lower and upper weighted quantile of a sorted sample.
///
/// The lower quantile is the smallest value `z` with `F(z) >= level`, the
/// upper quantile the smallest value with `F(z) > level`, where `F` is the
/// weighted empirical distribution function. If no value satisfies the
/// condition, the maximum is returned.
///
/// * `v` - Sorted values.
/// * `sample_weight` - Positive weights of the values.
/// * `level` - Level of the quantile, within 0 and 1.
pub fn weighted_quantile_bounds(v: &[f64], sample_weight: &[f64], level: f64) -> (f64, f64) {
    let total = fast_sum(sample_weight);
    let target = level * total;
    let last = v[v.len() - 1];
    let mut lower = None;
    let mut upper = last;
    let mut cuml = 0.0;
    for (value, w) in v.iter().zip(sample_weight) {
        cuml += w;
        if lower.is_none() && cuml >= target {
            lower = Some(*value);
        }
        if cuml > target {
            upper = *value;
            break;
        }
    }
    (lower.unwrap_or(last), upper)
}

/// Percentile of a sorted sample with linear interpolation between the
/// closest ranks.
pub fn linear_percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_sum() {
        let v: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(fast_sum(&v), 4950.0);
        assert_eq!(fast_sum(&[]), 0.0);
    }

    #[test]
    fn test_inverted_cdf_quantiles() {
        let v = vec![1., 2., 3., 4., 5., 6., 7., 8., 9., 10.];
        assert_eq!(inverted_cdf_quantiles(&v, 10), vec![1., 2., 3., 4., 5., 6., 7., 8., 9.]);
        assert_eq!(inverted_cdf_quantiles(&v, 4), vec![3., 5., 8.]);
        assert_eq!(inverted_cdf_quantiles(&v, 1), Vec::<f64>::new());
        assert_eq!(inverted_cdf_quantiles(&[], 4), Vec::<f64>::new());
    }

    #[test]
    fn test_weighted_quantile_bounds() {
        let v = vec![1., 2.];
        let w = vec![1., 1.];
        assert_eq!(weighted_quantile_bounds(&v, &w, 0.5), (1., 2.));
        let v = vec![1., 2., 3.];
        let w = vec![1., 1., 1.];
        assert_eq!(weighted_quantile_bounds(&v, &w, 0.5), (2., 2.));
        assert_eq!(weighted_quantile_bounds(&v, &w, 0.0), (1., 1.));
        assert_eq!(weighted_quantile_bounds(&v, &w, 1.0), (3., 3.));
        let w = vec![1., 5., 1.];
        assert_eq!(weighted_quantile_bounds(&v, &w, 0.2), (2., 2.));
    }

    #[test]
    fn test_linear_percentile() {
        let v = vec![1., 2., 3., 4., 5.];
        assert_eq!(linear_percentile(&v, 0.5), 3.);
        assert_eq!(linear_percentile(&v, 0.125), 1.5);
        assert_eq!(linear_percentile(&v, 1.0), 5.);
        assert!(linear_percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_validate_weights() {
        assert!(validate_weights(&[1., 0., 2.], 3).is_ok());
        assert!(matches!(
            validate_weights(&[1., -1.], 2),
            Err(DiagnosticsError::InvalidWeight(_))
        ));
        assert!(matches!(
            validate_weights(&[0., 0.], 2),
            Err(DiagnosticsError::InvalidWeight(_))
        ));
        assert!(matches!(
            validate_weights(&[1.], 2),
            Err(DiagnosticsError::ShapeMismatch(..))
        ));
    }
}
