use crate::core::dynamics::FixedFlags;
use crate::core::utils;
use crate::dynamics::{ElementSet, Scene};
use crate::math::{Real, Vector};
use rayon::prelude::*;

impl Scene {
    /// Rest direction of the yarn through particle `i`: the normalized sum of
    /// its incident rest edges.
    pub fn rest_twist_dir(&self, i: usize) -> Vector<Real> {
        let particles = &self.particles.particles;
        let dir: Vector<Real> = self.elements.particle_edges[i]
            .iter()
            .map(|e| {
                let [a, b] = self.elements.edges[*e];
                particles[b].rest_position - particles[a].rest_position
            })
            .sum();

        dir.try_normalize(0.0).unwrap_or_else(Vector::zeros)
    }

    /// Moves everything pinned to a scripted group by the rigid motion of
    /// that group since the last step, then advances the distance fields.
    pub fn apply_script(&mut self, dt: Real) {
        let t0 = instant::now();

        // Twist directions must be read from the rest positions before they move.
        let scene = &*self;
        let twist_dirs: Vec<Option<Vector<Real>>> = (0..scene.particles.len())
            .into_par_iter()
            .map(|i| {
                let p = &scene.particles.particles[i];
                if p.twist_enabled && p.fixed.contains(FixedFlags::TWIST) {
                    Some(scene.rest_twist_dir(i))
                } else {
                    None
                }
            })
            .collect();

        let groups = &self.groups;
        self.particles
            .particles
            .par_iter_mut()
            .zip(twist_dirs.into_par_iter())
            .for_each(|(p, twist_dir)| {
                if p.fixed.is_empty() {
                    return;
                }

                let transform = match groups.get(p.group) {
                    Some(t) => t,
                    None => return,
                };
                let rotation = transform.rotation_diff();

                if p.fixed.contains(FixedFlags::POSITION) {
                    let local = p.rest_position - transform.prev_translation;
                    let target = rotation * local + transform.translation;
                    p.rest_position = target;

                    if p.surfel.is_some() && dt > 0.0 {
                        p.velocity = (target - p.position) / dt;
                    }
                }

                if let Some(dir) = twist_dir {
                    p.rest_twist += utils::twist_component(&rotation, &dir);
                }
            });

        let particles = &self.particles.particles;
        let ElementSet {
            ref surfels,
            ref mut surfel_normals,
            ..
        } = self.elements;
        surfel_normals
            .par_iter_mut()
            .zip(surfels.par_iter())
            .for_each(|(normal, pidx)| {
                if let Some(transform) = groups.get(particles[*pidx].group) {
                    *normal = transform.rotation_diff() * *normal;
                }
            });

        self.distance_fields
            .par_iter_mut()
            .for_each(|field| field.advance(dt));
        self.groups.commit();

        info!("- Apply script: {}ms", instant::now() - t0);
    }
}
