//! Random density-driven subsampling

use crate::PointSimplifier;
use lidarlod_core::{Error, LodPoint, Result};
use rand::{Rng, RngCore};

/// Keeps each point independently with a probability derived from a 0..=100
/// density setting: `0.1 + density / 100 * 0.6`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensitySubsampler {
    density: f64,
}

impl DensitySubsampler {
    pub fn new(density: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&density) {
            return Err(Error::InvalidData(format!(
                "density must be within 0..=100, got {}",
                density
            )));
        }
        Ok(Self { density })
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn keep_probability(&self) -> f64 {
        0.1 + self.density / 100.0 * 0.6
    }

    /// Flip the coin for one point
    pub fn keep<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() <= self.keep_probability()
    }
}

impl PointSimplifier for DensitySubsampler {
    fn simplify_points(&self, points: &[LodPoint], rng: &mut dyn RngCore) -> Result<Vec<LodPoint>> {
        Ok(points.iter().copied().filter(|_| self.keep(&mut *rng)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_keep_probability_range() {
        assert_relative_eq!(DensitySubsampler::new(0.0).unwrap().keep_probability(), 0.1);
        assert_relative_eq!(DensitySubsampler::new(50.0).unwrap().keep_probability(), 0.4);
        assert_relative_eq!(DensitySubsampler::new(100.0).unwrap().keep_probability(), 0.7);
        assert!(DensitySubsampler::new(101.0).is_err());
        assert!(DensitySubsampler::new(-1.0).is_err());
    }

    #[test]
    fn test_subsample_rate() {
        let points = vec![LodPoint::default(); 20_000];
        let sampler = DensitySubsampler::new(50.0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let kept = sampler.simplify_points(&points, &mut rng).unwrap().len();
        let rate = kept as f64 / points.len() as f64;
        assert!((rate - 0.4).abs() < 0.02, "kept rate {}", rate);
    }
}
