use crate::dynamics::Scene;
use crate::math::Real;

/// Seam for the pressure/viscosity solvers and force models acting on the
/// node velocities between the particle-to-grid and grid-to-particle transfers.
pub trait GridSolverHooks: Send + Sync {
    fn solve_grid(&mut self, scene: &mut Scene, dt: Real);
}

impl GridSolverHooks for () {
    fn solve_grid(&mut self, _: &mut Scene, _: Real) {
        /* nothing */
    }
}
