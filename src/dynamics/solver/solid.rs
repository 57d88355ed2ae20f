use super::weights::stencil_node_pos;
use crate::core::dynamics::{NodeKind, NodeState};
use crate::core::utils;
use crate::dynamics::{NodeGrid, NodeStencil, Scene};
use crate::geometry::DistanceFieldUsage;
use crate::math::{Kernel, Point, Real, Vector};
use rayon::prelude::*;

/// Interpolated solid distance at `pos` and its normalized gradient, from the
/// solid-phi footprint of a particle. Missing nodes count as three cells away.
pub(crate) fn solid_phi_gradient(grid: &NodeGrid, stencil: &NodeStencil, pos: &Point<Real>) -> (Real, Vector<Real>) {
    let dx = grid.cell_size;
    let inv_d = Kernel::inv_d(dx);
    let mut phi_ori = 0.0;
    let mut grad_phi = Vector::zeros();

    for slot in 0..27 {
        let phi = match stencil.nodes[slot] {
            Some(id) if grid.is_active(id.bucket as usize) => grid.solid_phi(id),
            _ => 3.0 * dx,
        };
        let w = stencil.weights[slot];
        let np = stencil_node_pos(grid, NodeKind::SolidPhi, pos, slot);

        phi_ori += phi * w;
        grad_phi += (np - pos) * (phi * inv_d * w);
    }

    if grad_phi.norm() > 1.0e-20 {
        grad_phi.normalize_mut();
    }

    (phi_ori, grad_phi)
}

impl Scene {
    /// Samples the solid distance fields on the grid: signed distance at the
    /// cell corners and solid velocity at the faces.
    ///
    /// With viscosity, the cell centers get their own solid distance and every
    /// velocity node is classified as solid or fluid from the two cells it
    /// separates.
    pub fn update_solid_phi(&mut self) {
        let t0 = instant::now();
        let mut buckets = std::mem::take(&mut self.nodes.buckets);
        let scene = &*self;
        let grid = &scene.nodes;

        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            if !grid.is_active(b) {
                return;
            }

            for (n, phi) in bucket.solid_phi.iter_mut().enumerate() {
                let pos = grid.node_pos(NodeKind::SolidPhi, b, n);
                *phi = scene.compute_phi(&pos, DistanceFieldUsage::Solid);
            }

            for axis in 0..3 {
                let kind = NodeKind::velocity(axis);
                for (n, node) in bucket.velocity[axis].iter_mut().enumerate() {
                    let pos = grid.node_pos(kind, b, n);
                    let (_, vel) = scene.compute_phi_vel(&pos, DistanceFieldUsage::Solid);
                    node.solid_velocity = vel[axis];
                }
            }

            if scene.liquid.compute_viscosity {
                for (n, node) in bucket.pressure.iter_mut().enumerate() {
                    let pos = grid.node_pos(NodeKind::P, b, n);
                    node.cell_solid_phi = scene.compute_phi(&pos, DistanceFieldUsage::Solid);
                }
            }
        });

        self.nodes.buckets = buckets;

        if self.liquid.compute_viscosity {
            let mut buckets = std::mem::take(&mut self.nodes.buckets);
            let grid = &self.nodes;
            let cell_phi: Vec<Vec<Real>> = buckets
                .iter()
                .map(|bucket| bucket.pressure.iter().map(|n| n.cell_solid_phi).collect())
                .collect();

            buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
                if !grid.is_active(b) {
                    return;
                }

                for axis in 0..3 {
                    for node in &mut bucket.velocity[axis] {
                        let sphi: Real = node
                            .pressure_neighbors
                            .iter()
                            .flatten()
                            .map(|id| cell_phi[id.bucket as usize][id.node as usize])
                            .sum();

                        node.state = if sphi < 0.0 {
                            NodeState::Solid
                        } else {
                            NodeState::Fluid
                        };
                    }
                }
            });

            self.nodes.buckets = buckets;
        }

        info!("- Solid phi: {}ms", instant::now() - t0);
    }

    /// Open fraction of every cell face from the solid distance at its four
    /// corners. Missing corners count as half a cell outside.
    pub fn update_solid_weights(&mut self) {
        let dx = self.cell_size();
        let mut buckets = std::mem::take(&mut self.nodes.buckets);
        let grid = &self.nodes;
        // Corners may belong to a neighboring bucket.
        let corners: Vec<Vec<Real>> = buckets.iter().map(|b| b.solid_phi.clone()).collect();

        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            if !grid.is_active(b) {
                return;
            }

            for axis in 0..3 {
                for node in &mut bucket.velocity[axis] {
                    let mut phi = [0.5 * dx; 4];

                    for (k, id) in node.solid_phi_neighbors.iter().enumerate() {
                        if let Some(id) = id {
                            if grid.is_active(id.bucket as usize) {
                                phi[k] = corners[id.bucket as usize][id.node as usize];
                            }
                        }
                    }

                    let inside = utils::fraction_inside_quad(phi[0], phi[1], phi[2], phi[3]);
                    node.solid_weight = (1.0 - inside).max(0.0).min(1.0);
                }
            }
        });

        self.nodes.buckets = buckets;
    }

    /// Pushes the liquid particles about to penetrate a solid back along the
    /// solid distance gradient.
    pub fn solid_projection(&mut self, dt: Real) {
        let num_elasto = self.particles.num_elasto_particles();
        let grid = &self.nodes;

        self.particles.particles[num_elasto..]
            .par_iter_mut()
            .for_each(|p| {
                if p.surfel.is_some() {
                    return;
                }

                let (phi_ori, grad_phi) = solid_phi_gradient(grid, &p.stencils.solid_phi, &p.position);
                let phi_now = phi_ori + grad_phi.dot(&(p.fluid_velocity * dt));

                if phi_now < 0.0 {
                    p.position -= grad_phi * phi_now;
                }
            });
    }

    /// Drags the liquid velocity of fully covered faces toward the solid
    /// velocity.
    pub fn constrain_liquid_velocity(&mut self) {
        let friction = self.liquid.liquid_boundary_friction;

        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for axis in 0..3 {
                for node in &mut bucket.velocity[axis] {
                    if node.solid_weight == 0.0 {
                        node.fluid_velocity +=
                            (node.solid_velocity - node.fluid_velocity) * friction;
                    }
                }
            }
        });
    }

    /// Deletes the liquid particles that entered a terminator field.
    pub fn terminate_particles(&mut self) -> usize {
        let num_elasto = self.particles.num_elasto_particles();
        let scene = &*self;
        let terminated: Vec<usize> = (num_elasto..scene.particles.len())
            .into_par_iter()
            .filter(|i| {
                let pos = scene.particles.particles[*i].position;
                scene.compute_phi(&pos, DistanceFieldUsage::Terminator) < 0.0
            })
            .collect();

        for i in &terminated {
            self.particles.particles[*i].fluid_volume = 0.0;
        }

        self.remove_empty_particles()
    }
}
