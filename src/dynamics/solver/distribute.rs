use super::porous::vertical_diffusivity;
use crate::core::dynamics::InsideStatus;
use crate::core::utils;
use crate::dynamics::{GaussKind, Particle, RandomStream, Scene};
use crate::math::{Point, Radii, Real, Vector, MASS_EPSILON};
use rayon::prelude::*;

/// Liquid the mesh must shed: new particles and the volume taken from every
/// vertex.
struct Release {
    spawned: Vec<(Point<Real>, Vector<Real>)>,
    taken: Vec<(usize, Real)>,
}

impl Scene {
    /// Volume beyond the pore capacity of a vertex.
    fn excess_fluid_volume(&self, i: usize, fluid_volume: Real) -> Real {
        let p = &self.particles.particles[i];
        let capacity = p.volume * (1.0 - p.volume_fraction);
        (fluid_volume - capacity).max(0.0)
    }

    /// Turns the liquid held by the mesh beyond its pore capacity into free
    /// liquid particles of the target size, sampled uniformly on the edges
    /// and faces.
    pub fn distribute_elasto_fluid(&mut self) {
        let t0 = instant::now();
        let fine_radius = self.fine_radius();
        let fine_volume = self.fine_volume();
        let density = self.liquid.liquid_density;
        let num_soft = self.elements.num_edges() + self.elements.num_faces();
        let old_total = self.particles.total_fluid_volume();

        let scene = &*self;
        let particles = &scene.particles.particles;
        let elements = &scene.elements;
        let rest_area_weight = |i: usize, w: Real| {
            let area = particles[i].rest_area;
            if area > MASS_EPSILON {
                w / area
            } else {
                0.0
            }
        };

        let releases: Vec<Release> = (0..num_soft)
            .into_par_iter()
            .filter_map(|g| {
                let (vertices, weights): (Vec<usize>, Vec<Real>) = match elements.gauss_kind(g) {
                    GaussKind::Edge(e) => elements.edges[e]
                        .iter()
                        .map(|v| {
                            let r = particles[*v].radii;
                            let w = elements.edge_rest_length[e] * utils::ellipse_perimeter(r.x, r.y) * 0.5;
                            (*v, rest_area_weight(*v, w))
                        })
                        .unzip(),
                    GaussKind::Face(f) => elements.faces[f]
                        .iter()
                        .map(|v| (*v, rest_area_weight(*v, elements.face_rest_area[f] / 3.0)))
                        .unzip(),
                    GaussKind::Surfel(_) => return None,
                };

                let excess: Vec<Real> = vertices
                    .iter()
                    .zip(weights.iter())
                    .map(|(v, w)| scene.excess_fluid_volume(*v, particles[*v].fluid_volume) * w)
                    .collect();
                let total_excess: Real = excess.iter().sum();

                if total_excess < fine_volume {
                    return None;
                }

                let num_release = (total_excess / fine_volume).floor() as usize;
                let mut rng = scene.rng(RandomStream::Spawn, g);
                let spawned = (0..num_release)
                    .map(|_| {
                        let bary = if vertices.len() == 2 {
                            let a = rng.rand_float();
                            vec![1.0 - a, a]
                        } else {
                            let r0 = rng.rand_float().sqrt();
                            let r1 = rng.rand_float();
                            vec![1.0 - r0, r0 * (1.0 - r1), r0 * r1]
                        };

                        let mut pos = Vector::zeros();
                        let mut vel = Vector::zeros();
                        for (v, a) in vertices.iter().zip(bary.iter()) {
                            pos += particles[*v].position.coords * *a;
                            vel += particles[*v].velocity * *a;
                        }
                        (Point::from(pos), vel)
                    })
                    .collect();

                let released = num_release as Real * fine_volume / total_excess;
                let taken = vertices
                    .into_iter()
                    .zip(excess.into_iter())
                    .map(|(v, e)| (v, e * released))
                    .collect();

                Some(Release { spawned, taken })
            })
            .collect();

        let num_spawned: usize = releases.iter().map(|r| r.spawned.len()).sum();
        if num_spawned == 0 {
            return;
        }

        let num_elasto = self.particles.num_elasto_particles();
        let mut new_particles = Vec::with_capacity(num_spawned);

        for release in releases {
            for (v, volume) in release.taken {
                let p = &mut self.particles.particles[v];
                p.fluid_volume = (p.fluid_volume - volume).max(0.0);
            }

            for (pos, vel) in release.spawned {
                let mut p = Particle::liquid(pos, fine_volume, density);
                p.fluid_velocity = vel;
                p.radii = Radii::repeat(fine_radius);
                new_particles.push(p);
            }
        }

        for p in &mut self.particles.particles[..num_elasto] {
            p.fluid_mass = p.fluid_volume * density;
        }

        self.append_liquid_particles(new_particles);

        self.conserve_fluid_volume(old_total);
        self.update_gauss_manifold_system();

        info!(
            "- Distribute elasto to fluid: {}ms ({} new particles)",
            instant::now() - t0,
            num_spawned
        );
    }

    /// Lets the mesh absorb the free liquid covering it, at a rate given by
    /// the vertical diffusivity of the medium, and shrinks the liquid
    /// particles accordingly.
    ///
    /// Uses the node-particle pairs of the last resampling.
    pub fn distribute_fluid_elasto(&mut self, dt: Real) {
        let t0 = instant::now();
        let num_elasto = self.particles.num_elasto_particles();
        let density = self.liquid.liquid_density;
        let capture_rate = self.liquid.elasto_capture_rate;
        let dx = self.cell_size();
        let old_total = self.particles.total_fluid_volume();

        // Liquid volume carried by the free particles onto the velocity nodes.
        {
            let mut buckets = std::mem::take(&mut self.nodes.buckets);
            let particles = &self.particles.particles;
            let grid = &self.nodes;

            buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
                if !grid.is_active(b) {
                    return;
                }

                for (axis, nodes) in bucket.velocity.iter_mut().enumerate() {
                    for node in nodes {
                        let mut volume = 0.0;
                        let mut raw_weight = 0.0;

                        for (pidx, slot) in &node.particles {
                            let p = &particles[*pidx];
                            if *pidx < num_elasto || p.inside != InsideStatus::Inside {
                                continue;
                            }

                            let w = p.stencils.velocity[axis].weights[*slot as usize];
                            volume += p.fluid_volume * w;
                            raw_weight += w;
                        }

                        node.pure_fluid_volume = volume;
                        node.raw_weight = raw_weight;
                    }
                }
            });

            self.nodes.buckets = buckets;
        }

        let grid = &self.nodes;
        let liquid = &self.liquid;
        let captured: Vec<Real> = self.particles.particles[..num_elasto]
            .par_iter_mut()
            .map(|p| {
                if p.surfel.is_some() {
                    return 0.0;
                }

                let capacity = p.volume * (1.0 - p.volume_fraction);
                if p.fluid_volume >= capacity {
                    return 0.0;
                }

                let mut available = 0.0;
                for (axis, stencil) in p.stencils.velocity.iter().enumerate() {
                    for (_, id, w) in stencil.iter() {
                        if grid.is_active(id.bucket as usize) {
                            available += grid.velocity_node(axis, id).pure_fluid_volume * w;
                        }
                    }
                }

                let rate = (capture_rate * dt * vertical_diffusivity(liquid, dx, p.volume_fraction, 0)).min(1.0);
                let amount = (capacity - p.fluid_volume).min(available * rate);

                let old_mass = p.mass + p.fluid_mass;
                p.fluid_volume += amount;
                p.fluid_mass = p.fluid_volume * density;
                let new_mass = p.mass + p.fluid_mass;

                if new_mass > MASS_EPSILON {
                    p.velocity *= (old_mass / new_mass).max(0.0).min(1.0);
                }

                amount
            })
            .collect();

        // Removes what the mesh captured from the nodes.
        {
            let mut buckets = std::mem::take(&mut self.nodes.buckets);
            let particles = &self.particles.particles;
            let grid = &self.nodes;

            buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
                if !grid.is_active(b) {
                    return;
                }

                for (axis, nodes) in bucket.velocity.iter_mut().enumerate() {
                    for node in nodes {
                        let mut amount = 0.0;
                        let mut wsum = 0.0;

                        for (pidx, slot) in &node.particles {
                            if *pidx >= num_elasto {
                                continue;
                            }

                            let w = particles[*pidx].stencils.velocity[axis].weights[*slot as usize];
                            amount += captured[*pidx] * w;
                            wsum += w;
                        }

                        if wsum > MASS_EPSILON {
                            amount /= wsum;
                        }

                        node.pure_fluid_volume = (node.pure_fluid_volume - amount).max(0.0);
                    }
                }
            });

            self.nodes.buckets = buckets;
        }

        let grid = &self.nodes;
        self.particles.particles[num_elasto..]
            .par_iter_mut()
            .for_each(|p| {
                if p.inside != InsideStatus::Inside {
                    return;
                }

                let mut volume = 0.0;
                let mut raw_weight = 0.0;

                for (axis, stencil) in p.stencils.velocity.iter().enumerate() {
                    for (_, id, w) in stencil.iter() {
                        if grid.is_active(id.bucket as usize) {
                            let node = grid.velocity_node(axis, id);
                            volume += node.pure_fluid_volume * w;
                            raw_weight += node.raw_weight * w;
                        }
                    }
                }

                if raw_weight > MASS_EPSILON {
                    volume /= raw_weight;
                }

                p.fluid_volume = volume;
                p.fluid_mass = volume * density;
                p.radii = Radii::repeat(utils::sphere_radius(volume));
            });

        self.conserve_fluid_volume(old_total);
        let removed = self.remove_empty_particles();

        info!(
            "- Distribute fluid to elasto: {}ms ({} removed)",
            instant::now() - t0,
            removed
        );
    }

    /// Rescales every fluid volume and mass so that the total fluid volume
    /// matches `old_total` again.
    ///
    /// Nothing happens when the current total is negligible.
    pub fn conserve_fluid_volume(&mut self, old_total: Real) {
        let new_total = self.particles.total_fluid_volume();
        if new_total <= MASS_EPSILON {
            return;
        }

        let ratio = old_total / new_total;
        let num_elasto = self.particles.num_elasto_particles();

        self.particles
            .particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                p.fluid_volume *= ratio;
                p.fluid_mass *= ratio;
                p.fluid_inertia *= ratio;

                if i >= num_elasto {
                    p.radii = Radii::repeat(utils::sphere_radius(p.fluid_volume));
                }
            });
    }
}
