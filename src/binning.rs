use crate::data::{ColumnKind, Feature, FeatureValues};
use crate::errors::DiagnosticsError;
use crate::utils::{inverted_cdf_quantiles, items_to_strings, total_cmp_nan_last};
use hashbrown::HashMap;
use log::warn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How to find the bin edges of a numeric feature.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinMethod {
    /// Empirical quantiles (inverted CDF), ties collapse bins.
    Quantile,
    /// Equal width bins between min and max.
    Uniform,
}

impl FromStr for BinMethod {
    type Err = DiagnosticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quantile" => Ok(BinMethod::Quantile),
            "uniform" => Ok(BinMethod::Uniform),
            _ => Err(DiagnosticsError::ParseString(
                s.to_string(),
                "bin_method".to_string(),
                items_to_strings(vec!["quantile", "uniform"]),
            )),
        }
    }
}

/// What a bin stands for.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub enum BinKey {
    /// Numeric values in `(low, high]`, the first bin also includes `low`.
    Interval { low: f64, high: f64 },
    /// A single category or string value.
    Category(String),
    /// Missing values.
    Null,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Bin {
    pub id: usize,
    pub key: BinKey,
    /// Number of rows assigned to the bin.
    pub count: usize,
}

impl Bin {
    pub fn is_null(&self) -> bool {
        self.key == BinKey::Null
    }
}

// A feature column reduced to at most n_bins groups.
// Bin ids run from 0 to n_bins - 1, the null bin, if any, is always the last one.
// For a numeric feature with inner edges [3, 7] and missing values we get
// bins 0 [min, 3], 1 (3, 7], 2 (7, max] and 3 for missing values.
// Rows of infrequent categories are not assigned to any bin.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BinnedFeature {
    pub name: String,
    pub kind: ColumnKind,
    /// Bin id of every row, `None` for rows excluded from all bins.
    pub assignment: Vec<Option<usize>>,
    /// Bins ordered by id.
    pub bins: Vec<Bin>,
    /// Inner bin edges of a numeric feature, empty otherwise.
    pub edges: Vec<f64>,
}

impl BinnedFeature {
    /// Effective number of bins, including the null bin.
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    /// Id of the bin of missing values, if there are any.
    pub fn null_bin(&self) -> Option<usize> {
        self.bins.iter().find(|b| b.is_null()).map(|b| b.id)
    }

    /// Number of rows not assigned to any bin.
    pub fn n_excluded(&self) -> usize {
        self.assignment.iter().filter(|a| a.is_none()).count()
    }
}

/// Bin a feature column.
///
/// Numeric features are cut into intervals, categorical and string features
/// are reduced to their most frequent values. Missing values (NaN for numeric
/// features) always get a bin of their own, which counts towards `n_bins`.
///
/// * `feature` - The feature column.
/// * `n_bins` - The number of bins for numeric features and the maximal number
///   of (most frequent) categories. Due to ties, the effective number of bins
///   might be smaller.
/// * `method` - How to find the edges of numeric bins.
pub fn bin_feature(feature: &Feature, n_bins: usize, method: BinMethod) -> Result<BinnedFeature, DiagnosticsError> {
    if n_bins < 1 {
        return Err(DiagnosticsError::InvalidParameter(
            "n_bins".to_string(),
            "a value of at least 1".to_string(),
            n_bins.to_string(),
        ));
    }
    let (assignment, bins, edges) = match feature.values {
        FeatureValues::Numeric(v) => bin_numeric(v, n_bins, method),
        FeatureValues::Categorical(v) | FeatureValues::String(v) => {
            let (assignment, bins) = bin_categorical(v, n_bins);
            (assignment, bins, Vec::new())
        }
    };
    Ok(BinnedFeature {
        name: feature.name.clone(),
        kind: feature.kind(),
        assignment,
        bins,
        edges,
    })
}

#[allow(clippy::type_complexity)]
fn bin_numeric(values: &[f64], n_bins: usize, method: BinMethod) -> (Vec<Option<usize>>, Vec<Bin>, Vec<f64>) {
    let has_null = values.iter().any(|v| v.is_nan());
    // If we have null values, we reserve one bin for them.
    let k = (if has_null { n_bins - 1 } else { n_bins }).max(1);

    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_unstable_by(total_cmp_nan_last);

    if sorted.is_empty() {
        if has_null {
            warn!("All values of the feature are missing, only the null bin is left.");
        }
        let bins = if has_null {
            vec![Bin {
                id: 0,
                key: BinKey::Null,
                count: values.len(),
            }]
        } else {
            Vec::new()
        };
        return (vec![Some(0); values.len()], bins, Vec::new());
    }

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let mut edges = match method {
        BinMethod::Quantile => inverted_cdf_quantiles(&sorted, k),
        BinMethod::Uniform => {
            let range = max - min;
            (1..k).map(|i| min + range * (i as f64) / (k as f64)).collect()
        }
    };
    // Some quantiles might be the same, and an edge at the maximum would
    // only open an empty last bin.
    edges.dedup();
    edges.retain(|e| *e < max);

    let null_id = edges.len() + 1;
    let assignment: Vec<Option<usize>> = values
        .iter()
        .map(|v| {
            if v.is_nan() {
                Some(null_id)
            } else {
                // We want: edges[i-1] < v <= edges[i]
                Some(edges.partition_point(|e| e < v))
            }
        })
        .collect();

    let mut full_edges = Vec::with_capacity(edges.len() + 2);
    full_edges.push(min);
    full_edges.extend_from_slice(&edges);
    full_edges.push(max);

    let mut bins: Vec<Bin> = full_edges
        .windows(2)
        .enumerate()
        .map(|(id, e)| Bin {
            id,
            key: BinKey::Interval { low: e[0], high: e[1] },
            count: 0,
        })
        .collect();
    if has_null {
        bins.push(Bin {
            id: null_id,
            key: BinKey::Null,
            count: 0,
        });
    }
    for id in assignment.iter().flatten() {
        bins[*id].count += 1;
    }
    (assignment, bins, edges)
}

fn bin_categorical(values: &[Option<&str>], n_bins: usize) -> (Vec<Option<usize>>, Vec<Bin>) {
    // Frequency table, sorted by descending count, ties by first appearance.
    let mut table: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut n_null = 0;
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(s) => table.entry(*s).or_insert((0, i)).0 += 1,
            None => n_null += 1,
        }
    }
    let mut value_count: Vec<(&str, usize, usize)> = table.into_iter().map(|(s, (c, first))| (s, c, first)).collect();
    value_count.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    // Consider
    //     feature  count
    //         "a"      3
    //         "b"      2
    //         "c"      2
    //         "d"      1
    // with n_bins = 2. Taking "b" without "c" would be arbitrary, so only "a"
    // is kept and the effective number of bins is 1.
    let has_null = n_null > 0;
    let n_bins_ef = if has_null { n_bins - 1 } else { n_bins };
    let n_keep = if n_bins_ef >= value_count.len() {
        value_count.len()
    } else {
        let n = value_count[n_bins_ef].1;
        let n_ge = value_count.iter().filter(|vc| vc.1 >= n).count();
        if n_ge > n_bins_ef {
            value_count.iter().filter(|vc| vc.1 > n).count()
        } else {
            n_ge
        }
    };
    if n_keep == 0 && !value_count.is_empty() {
        let n_needed = value_count.iter().filter(|vc| vc.1 >= value_count[0].1).count() + usize::from(has_null);
        warn!(
            "Due to ties, the effective number of bins is 0. Consider to increase n_bins>={}.",
            n_needed
        );
    }

    let mut ids: HashMap<&str, usize> = HashMap::with_capacity(n_keep);
    let mut bins = Vec::with_capacity(n_keep + 1);
    for (id, (s, c, _)) in value_count.iter().take(n_keep).enumerate() {
        ids.insert(*s, id);
        bins.push(Bin {
            id,
            key: BinKey::Category(s.to_string()),
            count: *c,
        });
    }
    if has_null {
        bins.push(Bin {
            id: n_keep,
            key: BinKey::Null,
            count: n_null,
        });
    }
    let assignment = values
        .iter()
        .map(|v| match v {
            Some(s) => ids.get(s).copied(),
            None => Some(n_keep),
        })
        .collect();
    (assignment, bins)
}
