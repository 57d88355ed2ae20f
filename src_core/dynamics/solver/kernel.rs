use crate::math::{Point, Real, Vector};

/// The quadratic B-spline used by every particle/grid transfer.
///
/// Its support spans three nodes per axis, so each particle touches a
/// `3 × 3 × 3` node stencil per staggered node family.
pub struct QuadraticKernel;

impl QuadraticKernel {
    /// Number of nodes touched by a single particle per node family.
    pub const STENCIL_SIZE: usize = 27;

    /// The APIC inverse-quadrature coefficient `D⁻¹ = 4 / h²`.
    #[inline(always)]
    pub fn inv_d(cell_width: Real) -> Real {
        4.0 / (cell_width * cell_width)
    }

    /// Weights of the three nodes of one axis, `x` being the particle offset
    /// (in cell units) from the first node of the stencil.
    #[inline(always)]
    pub fn eval_all(x: Real) -> [Real; 3] {
        [
            0.5 * (1.5 - x).powi(2),
            0.75 - (x - 1.0).powi(2),
            0.5 * (x - 0.5).powi(2),
        ]
    }

    #[inline(always)]
    pub fn eval(x: Real) -> Real {
        let x_abs = x.abs();

        if x_abs < 0.5 {
            3.0 / 4.0 - x_abs.powi(2)
        } else if x_abs < 3.0 / 2.0 {
            0.5 * (3.0 / 2.0 - x_abs).powi(2)
        } else {
            0.0
        }
    }

    #[inline(always)]
    pub fn stencil_with_dir(elt_pos_minus_particle_pos: Vector<Real>, h: Real) -> Real {
        let dpt = -elt_pos_minus_particle_pos / h;
        Self::eval(dpt.x) * Self::eval(dpt.y) * Self::eval(dpt.z)
    }

    #[inline(always)]
    pub fn stencil(elt_pos: Point<Real>, particle_pos: Point<Real>, h: Real) -> Real {
        Self::stencil_with_dir(elt_pos - particle_pos, h)
    }

    /// Lower corner (in cell coordinates) of the 3-node window centered on
    /// `local`, a particle position in cell units relative to some node.
    ///
    /// The window starts one node below when the particle lies in the lower
    /// half of its cell so that the support is always centered.
    #[inline(always)]
    pub fn window_start(local: Real) -> i32 {
        let cell = local.floor();
        if local - cell > 0.5 {
            cell as i32
        } else {
            cell as i32 - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QuadraticKernel;
    use crate::math::Real;

    #[test]
    fn partition_of_unity() {
        let mut rng = oorandom::Rand64::new(42);
        for _ in 0..100 {
            let x = 0.5 + rng.rand_float() as Real;
            let w = QuadraticKernel::eval_all(x);
            assert!((w.iter().sum::<Real>() - 1.0).abs() < 1.0e-12);
        }
    }

    #[test]
    fn eval_all_matches_eval() {
        let x = 0.8;
        let w = QuadraticKernel::eval_all(x);
        for (k, wk) in w.iter().enumerate() {
            let expected = QuadraticKernel::eval(x - k as Real);
            assert!((wk - expected).abs() < 1.0e-12, "node {}: {} != {}", k, wk, expected);
        }
    }

    #[test]
    fn window_is_centered() {
        assert_eq!(QuadraticKernel::window_start(2.7), 2);
        assert_eq!(QuadraticKernel::window_start(2.3), 1);
        assert_eq!(QuadraticKernel::window_start(-0.2), -1);
    }
}
