use crate::core::dynamics::{FixedFlags, InsideStatus, NodeKind};
use crate::dynamics::Scene;
use crate::math::{Kernel, Matrix, Real, Vector};
use rayon::prelude::*;

impl Scene {
    /// APIC transfer of the node velocities back to the particles.
    ///
    /// Surfels and liquid particles outside of the activated grid keep their
    /// velocity.
    pub fn map_node_particles_apic(&mut self) {
        let t0 = instant::now();
        let dx = self.cell_size();
        let inv_d = Kernel::inv_d(dx);
        let num_elasto = self.particles.num_elasto_particles();
        let liquid = &self.liquid;
        let grid = &self.nodes;

        self.particles
            .particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(pidx, p)| {
                let is_fluid = pidx >= num_elasto;
                if p.surfel.is_some() || (is_fluid && p.inside == InsideStatus::Outside) {
                    return;
                }

                let pos = p.position;
                let mut vel = Vector::zeros();
                let mut affine = Matrix::zeros();

                for axis in 0..3 {
                    let kind = NodeKind::velocity(axis);

                    for (_, id, w) in p.stencils.velocity[axis].iter() {
                        if !grid.is_active(id.bucket as usize) {
                            continue;
                        }

                        let node = grid.velocity_node(axis, id);
                        let nv = if is_fluid {
                            node.fluid_velocity
                        } else {
                            node.velocity
                        };
                        let np = grid.node_pos_id(kind, id);

                        vel[axis] += nv * w;
                        let mut row = affine.row_mut(axis);
                        row += (np - pos).transpose() * (nv * w * inv_d);
                    }
                }

                p.velocity = Vector::zeros();
                p.affine = Matrix::zeros();
                p.fluid_velocity = Vector::zeros();
                p.fluid_twist_velocity = 0.0;
                p.fluid_affine = Matrix::zeros();

                if is_fluid {
                    p.fluid_velocity = vel;
                    p.fluid_affine = affine * liquid.flip_coeff;
                } else {
                    p.velocity = vel * liquid.elasto_advect_coeff;
                    p.twist_velocity *= liquid.elasto_advect_coeff;

                    let cf = liquid.elasto_flip_coeff;
                    let ca = liquid.elasto_flip_asym_coeff;
                    p.affine = (affine * (cf + ca) + affine.transpose() * (cf - ca)) * 0.5;
                }

                debug_assert!(p.velocity.iter().all(|v| v.is_finite()));
                debug_assert!(p.fluid_velocity.iter().all(|v| v.is_finite()));
            });

        info!("- Grid to particle: {}ms", instant::now() - t0);
    }

    /// Moves the particles with their velocity. Pinned particles snap to their
    /// scripted rest configuration.
    pub fn advect_particles(&mut self, dt: Real) {
        let num_elasto = self.particles.num_elasto_particles();

        self.particles
            .particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(pidx, p)| {
                if pidx >= num_elasto {
                    p.position += p.fluid_velocity * dt;
                    return;
                }

                if p.fixed.contains(FixedFlags::POSITION) {
                    p.position = p.rest_position;
                } else {
                    p.position += p.velocity * dt;
                }

                if p.fixed.contains(FixedFlags::TWIST) {
                    p.twist = p.rest_twist;
                } else if p.twist_enabled {
                    p.twist += p.twist_velocity * dt;
                }
            });
    }
}
