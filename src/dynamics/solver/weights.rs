use crate::core::dynamics::{InsideStatus, NodeKind};
use crate::dynamics::{NodeGrid, NodeId, NodeParticle, NodeStencil, Scene};
use crate::math::{Kernel, Point, Real, Vector};
use rayon::prelude::*;

/// World position of the node in `slot` of the `kind` stencil around `pos`,
/// whether or not that node exists.
pub(crate) fn stencil_node_pos(grid: &NodeGrid, kind: NodeKind, pos: &Point<Real>, slot: usize) -> Point<Real> {
    let local = (pos - grid.layout.origin) / grid.cell_size - kind.offset();
    let low = local.map(Kernel::window_start);
    let s = slot as i32;
    let global = low + Vector::new(s % 3, (s / 3) % 3, s / 9);
    grid.node_pos_from_global(kind, &global)
}

fn update_stencil_weights(grid: &NodeGrid, kind: NodeKind, stencil: &mut NodeStencil, pos: &Point<Real>) {
    let dx = grid.cell_size;

    for slot in 0..27 {
        stencil.weights[slot] = 0.0;

        if let Some(id) = stencil.nodes[slot] {
            if grid.is_active(id.bucket as usize) {
                let np = grid.node_pos_id(kind, id);
                stencil.weights[slot] = Kernel::stencil(np, *pos, dx);
            } else {
                stencil.nodes[slot] = None;
            }
        }
    }
}

impl Scene {
    /// Kernel weights of every particle and Gauss point on its node footprints.
    pub fn compute_weights(&mut self) {
        let t0 = instant::now();
        self.update_particle_weights();
        self.update_gauss_weights();
        info!("- Compute weights: {}ms", instant::now() - t0);
    }

    pub fn update_particle_weights(&mut self) {
        let grid = &self.nodes;

        self.particles.particles.par_iter_mut().for_each(|p| {
            if p.inside == InsideStatus::Outside {
                for stencil in p.stencils.velocity.iter_mut() {
                    stencil.weights = [0.0; 27];
                }
                p.stencils.solid_phi.weights = [0.0; 27];
                p.stencils.pressure.weights = [0.0; 27];
                return;
            }

            let pos = p.position;
            for (axis, stencil) in p.stencils.velocity.iter_mut().enumerate() {
                update_stencil_weights(grid, NodeKind::velocity(axis), stencil, &pos);
            }
            update_stencil_weights(grid, NodeKind::SolidPhi, &mut p.stencils.solid_phi, &pos);
            update_stencil_weights(grid, NodeKind::P, &mut p.stencils.pressure, &pos);
        });
    }

    pub fn update_gauss_weights(&mut self) {
        let grid = &self.nodes;
        let elements = &mut self.elements;
        let particles = &self.particles.particles;
        let surfels = &elements.surfels;
        let num_soft = elements.edges.len() + elements.faces.len();

        elements
            .gauss
            .par_iter_mut()
            .enumerate()
            .for_each(|(g, gauss)| {
                if g >= num_soft {
                    let pidx = surfels[g - num_soft];
                    if particles[pidx].inside == InsideStatus::Outside {
                        return;
                    }
                }

                let pos = gauss.position;
                for (axis, stencil) in gauss.stencils.velocity.iter_mut().enumerate() {
                    update_stencil_weights(grid, NodeKind::velocity(axis), stencil, &pos);
                }
                update_stencil_weights(grid, NodeKind::P, &mut gauss.stencils.pressure, &pos);
            });
    }

    /// Gathers, for every X/Y/Z/P node, the particles whose footprint covers it
    /// with a positive weight.
    pub fn build_node_particle_pairs(&mut self) {
        let t0 = instant::now();

        for kind in [NodeKind::X, NodeKind::Y, NodeKind::Z, NodeKind::P] {
            let particles = &self.particles.particles;
            let mut pairs: Vec<(NodeId, NodeParticle)> = particles
                .par_iter()
                .enumerate()
                .flat_map_iter(|(pidx, p)| {
                    let stencil = match kind {
                        NodeKind::X => &p.stencils.velocity[0],
                        NodeKind::Y => &p.stencils.velocity[1],
                        NodeKind::Z => &p.stencils.velocity[2],
                        _ => &p.stencils.pressure,
                    };
                    stencil
                        .iter()
                        .filter(|(_, _, w)| *w > 0.0)
                        .map(move |(slot, id, _)| (id, (pidx, slot as u8)))
                        .collect::<Vec<_>>()
                })
                .collect();
            pairs.par_sort_unstable_by_key(|(id, (pidx, _))| (*id, *pidx));

            for bucket in self.nodes.buckets.iter_mut() {
                match kind {
                    NodeKind::P => bucket.pressure.iter_mut().for_each(|n| n.particles.clear()),
                    NodeKind::X => bucket.velocity[0].iter_mut().for_each(|n| n.particles.clear()),
                    NodeKind::Y => bucket.velocity[1].iter_mut().for_each(|n| n.particles.clear()),
                    _ => bucket.velocity[2].iter_mut().for_each(|n| n.particles.clear()),
                }
            }

            for (id, pair) in pairs {
                if !self.nodes.is_active(id.bucket as usize) {
                    continue;
                }
                match kind {
                    NodeKind::P => self.nodes.pressure_node_mut(id).particles.push(pair),
                    NodeKind::X => self.nodes.velocity_node_mut(0, id).particles.push(pair),
                    NodeKind::Y => self.nodes.velocity_node_mut(1, id).particles.push(pair),
                    _ => self.nodes.velocity_node_mut(2, id).particles.push(pair),
                }
            }
        }

        info!("- Node particle pairs: {}ms", instant::now() - t0);
    }
}
