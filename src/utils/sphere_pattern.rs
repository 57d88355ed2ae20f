use crate::math::{Real, Vector};

/// Largest number of children a liquid particle is split into.
pub const MAX_SPLIT: usize = 64;

/// Precomputed quasi-uniform unit-sphere samplings with 1 to [`MAX_SPLIT`] points.
#[derive(Clone, Debug)]
pub struct SpherePattern {
    patterns: Vec<Vec<Vector<Real>>>,
}

impl SpherePattern {
    pub fn new() -> Self {
        let patterns = (0..=MAX_SPLIT).map(fibonacci_sphere).collect();
        Self { patterns }
    }

    /// The `n`-point pattern, `n` being clamped to [`MAX_SPLIT`].
    #[inline]
    pub fn get(&self, n: usize) -> &[Vector<Real>] {
        &self.patterns[n.min(MAX_SPLIT)]
    }
}

impl Default for SpherePattern {
    fn default() -> Self {
        Self::new()
    }
}

fn fibonacci_sphere(n: usize) -> Vec<Vector<Real>> {
    let golden_angle = std::f64::consts::PI * (3.0 - (5.0 as Real).sqrt());

    (0..n)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as Real + 0.5) / n as Real;
            let r = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden_angle * i as Real;
            Vector::new(r * theta.cos(), y, r * theta.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_are_unit_and_centered() {
        let pattern = SpherePattern::new();
        for n in 1..=MAX_SPLIT {
            let pts = pattern.get(n);
            assert_eq!(pts.len(), n);
            for p in pts {
                assert!((p.norm() - 1.0).abs() < 1.0e-12);
            }
        }

        let pts = pattern.get(MAX_SPLIT);
        let center = pts.iter().sum::<Vector<Real>>() / pts.len() as Real;
        assert!(center.norm() < 0.05);
    }
}
