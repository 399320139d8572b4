//! Sampler
//!
//! Row resampling for bootstrap confidence intervals of reliability curves.
use rand::rngs::StdRng;
use rand::Rng;

/// Draws `index.len()` rows with replacement. All columns of a row are
/// drawn together, i.e. the resampling is paired.
pub struct BootstrapSampler;

impl BootstrapSampler {
    /// Rows of one resample.
    pub fn sample(&self, rng: &mut StdRng, index: &[usize]) -> Vec<usize> {
        let n = index.len();
        (0..n).map(|_| index[rng.gen_range(0..n)]).collect()
    }
}

/// Select rows of a column.
pub fn take(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|i| values[*i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_bootstrap_sampler() {
        let mut rng = StdRng::seed_from_u64(42);
        let index = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let chosen = BootstrapSampler.sample(&mut rng, &index);

        assert_eq!(chosen.len(), index.len());
        assert!(chosen.iter().all(|i| index.contains(i)));
    }

    #[test]
    fn test_bootstrap_sampler_deterministic() {
        let index: Vec<usize> = (0..50).collect();
        let a = BootstrapSampler.sample(&mut StdRng::seed_from_u64(7), &index);
        let b = BootstrapSampler.sample(&mut StdRng::seed_from_u64(7), &index);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_take() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(BootstrapSampler.sample(&mut rng, &[]).is_empty());
        assert_eq!(take(&[10., 11., 12., 13.], &[3, 1, 2]), vec![13., 11., 12.]);
    }
}
