use super::porous;
use crate::core::dynamics::NodeKind;
use crate::dynamics::Scene;
use crate::math::{Real, Vector, MASS_EPSILON};
use rayon::prelude::*;

impl Scene {
    /// APIC transfer of momentum, mass and volume from the particles to the
    /// velocity nodes, for the solid and the liquid phases separately.
    pub fn map_particle_nodes_apic(&mut self) {
        let t0 = instant::now();
        let dx = self.cell_size();
        let cell_volume = dx * dx * dx;
        let num_elasto = self.particles.num_elasto_particles();
        let particles = &self.particles.particles;
        let mut buckets = std::mem::take(&mut self.nodes.buckets);
        let grid = &self.nodes;

        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            if !grid.is_active(b) {
                return;
            }

            for axis in 0..3 {
                let kind = NodeKind::velocity(axis);

                for (n, node) in bucket.velocity[axis].iter_mut().enumerate() {
                    let np = grid.node_pos(kind, b, n);

                    let mut momentum = 0.0;
                    let mut mass = 0.0;
                    let mut vol_solid = 0.0;
                    let mut fluid_momentum = 0.0;
                    let mut fluid_mass = 0.0;
                    let mut vol_fluid = 0.0;
                    let mut vol_fluid_elasto = 0.0;
                    let mut shape_factor = 0.0;
                    let mut shape_factor_weight = 0.0;
                    let mut orientation = Vector::zeros();

                    for (pidx, slot) in &node.particles {
                        let p = &particles[*pidx];
                        let w = p.stencils.velocity[axis].weights[*slot as usize];
                        let dpos = np - p.position;

                        if *pidx < num_elasto {
                            let m = p.mass + p.fluid_mass;
                            let vel = p.velocity[axis] + (p.affine * dpos)[axis];
                            momentum += vel * m * w;
                            mass += m * w;

                            if p.surfel.is_none() {
                                vol_solid += p.rest_volume * p.rest_volume_fraction * w;
                                vol_fluid_elasto += p.fluid_volume * w;
                                shape_factor += p.shape_factor * w;
                                shape_factor_weight += w;
                                orientation += p.orientation * w;
                            }
                        } else {
                            let vel = p.fluid_velocity[axis] + (p.fluid_affine * dpos)[axis];
                            fluid_momentum += vel * p.fluid_mass * w;
                            fluid_mass += p.fluid_mass * w;
                            vol_fluid += p.fluid_volume * w;
                        }
                    }

                    node.velocity = if mass > MASS_EPSILON {
                        momentum / mass
                    } else {
                        0.0
                    };
                    node.fluid_velocity = if fluid_mass > MASS_EPSILON {
                        fluid_momentum / fluid_mass
                    } else {
                        0.0
                    };
                    if shape_factor_weight > MASS_EPSILON {
                        shape_factor /= shape_factor_weight;
                    }

                    node.mass = mass;
                    node.volume = vol_solid + vol_fluid_elasto;
                    node.fluid_mass = fluid_mass;
                    node.fluid_volume = vol_fluid;
                    node.psi = (vol_solid / cell_volume).max(0.0).min(1.0);
                    node.saturation = ((vol_fluid + vol_fluid_elasto)
                        / (cell_volume - vol_solid).max(MASS_EPSILON))
                    .max(0.0)
                    .min(1.0);
                    node.orientation = orientation.try_normalize(MASS_EPSILON).unwrap_or(orientation);
                    node.shape_factor = shape_factor;

                    debug_assert!(node.velocity.is_finite() && node.fluid_velocity.is_finite());
                }
            }
        });

        self.nodes.buckets = buckets;
        info!("- Particle to grid: {}ms", instant::now() - t0);
    }

    /// Solid fraction and saturation of every cell from the particles
    /// overlapping it.
    pub fn map_particle_saturation_psi_nodes(&mut self) {
        let dx = self.cell_size();
        let cell_volume = dx * dx * dx;
        let particles = &self.particles.particles;

        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for node in &mut bucket.pressure {
                let mut vol_liquid = 0.0;
                let mut vol_solid = 0.0;

                for (pidx, slot) in &node.particles {
                    let p = &particles[*pidx];
                    if p.surfel.is_some() {
                        continue;
                    }

                    let w = p.stencils.pressure.weights[*slot as usize];
                    vol_liquid += p.fluid_volume * w;
                    vol_solid += p.rest_volume * w * p.rest_volume_fraction;
                }

                node.psi = (vol_solid / cell_volume).max(0.0).min(1.0);
                node.saturation = (vol_liquid / (cell_volume - vol_solid).max(MASS_EPSILON))
                    .max(0.0)
                    .min(1.0);
            }
        });
    }

    /// Capillary suction of every cell, vanishing once saturated.
    pub fn update_pore_pressure_nodes(&mut self) {
        let liquid = &self.liquid;

        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for node in &mut bucket.pressure {
                node.pore_pressure =
                    porous::capillary_pressure(liquid, node.psi) * (1.0 - node.saturation);
            }
        });
    }

    /// Keeps the liquid node velocities before the grid solve.
    pub fn save_fluid_velocity(&mut self) {
        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for axis in 0..3 {
                for node in &mut bucket.velocity[axis] {
                    node.saved_fluid_velocity = node.fluid_velocity;
                }
            }
        });
    }

    /// Total liquid mass carried by the velocity nodes of one axis.
    pub fn total_node_fluid_mass(&self, axis: usize) -> Real {
        self.nodes
            .buckets
            .par_iter()
            .map(|bucket| bucket.velocity[axis].iter().map(|n| n.fluid_mass).sum::<Real>())
            .sum()
    }
}
