use super::solid::solid_phi_gradient;
use crate::core::utils;
use crate::dynamics::{Particle, ParticleClass, RandomStream, Scene};
use crate::geometry::BucketGrid;
use crate::math::{Matrix, Radii, Real, Vector};
use crate::utils::MAX_SPLIT;
use rayon::prelude::*;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Scratch state of a merge pass, shared by the buckets of one color.
struct MergeState<'a> {
    particles: &'a mut [Particle],
    removed: Vec<bool>,
    gathered_volume: Vec<Real>,
    gathered_momentum: Vec<Vector<Real>>,
}

impl<'a> MergeState<'a> {
    fn full_volume(&self, i: usize) -> Real {
        self.particles[i].fluid_volume + self.gathered_volume[i]
    }

    fn full_momentum(&self, i: usize) -> Vector<Real> {
        let p = &self.particles[i];
        p.fluid_velocity * p.fluid_volume + self.gathered_momentum[i]
    }
}

#[derive(Copy, Clone)]
struct MergeContext {
    fine_volume: Real,
    search_radius: Real,
    num_elasto: usize,
}

fn merge_partners(
    state: &MergeState,
    buckets: &BucketGrid,
    ctx: &MergeContext,
    bucket: usize,
    pidx: usize,
    accepts: impl Fn(ParticleClass) -> bool,
) -> Vec<usize> {
    let pos = state.particles[pidx].position;
    let mut partners = vec![];

    buckets.for_each_neighbor_item(bucket, |j| {
        if j == pidx || j < ctx.num_elasto || state.removed[j] {
            return;
        }

        let nb = &state.particles[j];
        if accepts(nb.class)
            && state.full_volume(j) <= ctx.fine_volume
            && na::distance(&nb.position, &pos) < ctx.search_radius
        {
            partners.push(j);
        }
    });

    partners
}

/// A very small particle gives all its volume away, a large one its excess
/// over the target volume.
fn merge_particle(state: &mut MergeState, buckets: &BucketGrid, ctx: &MergeContext, bucket: usize, pidx: usize) {
    let full_volume = state.full_volume(pidx);
    let ratio = full_volume / ctx.fine_volume;

    match state.particles[pidx].class {
        ParticleClass::VerySmall => {
            if ratio >= 0.5 {
                state.particles[pidx].class = ParticleClass::Small;
                return;
            }

            let partners = merge_partners(state, buckets, ctx, bucket, pidx, |c| {
                c.accepts_small_donations()
            });
            if partners.is_empty() {
                return;
            }

            let share = 1.0 / partners.len() as Real;
            let volume = full_volume * share;
            let momentum = state.full_momentum(pidx) * share;

            for j in partners {
                state.gathered_volume[j] += volume;
                state.gathered_momentum[j] += momentum;
            }

            state.removed[pidx] = true;
            state.particles[pidx].fluid_volume = 0.0;
            state.gathered_volume[pidx] = 0.0;
            state.gathered_momentum[pidx] = Vector::zeros();
        }
        ParticleClass::Large => {
            if full_volume < 1.0e-20 {
                return;
            }
            if ratio > 2.0 {
                state.particles[pidx].class = ParticleClass::VeryLarge;
                return;
            }

            let partners = merge_partners(state, buckets, ctx, bucket, pidx, |c| {
                c == ParticleClass::Small
            });
            if partners.is_empty() {
                return;
            }

            let excess = full_volume - ctx.fine_volume;
            let volume = excess / partners.len() as Real;
            let momentum = state.full_momentum(pidx) * (volume / full_volume);

            for j in partners {
                state.gathered_volume[j] += volume;
                state.gathered_momentum[j] += momentum;
            }

            let scaling = ctx.fine_volume / full_volume;
            let length_scaling = scaling.cbrt();
            state.gathered_volume[pidx] *= scaling;
            state.gathered_momentum[pidx] *= scaling;

            let p = &mut state.particles[pidx];
            p.fluid_volume *= scaling;
            p.fluid_mass *= scaling;
            p.radii *= length_scaling;
            p.rest_length *= length_scaling;
            p.rest_area *= length_scaling * length_scaling;
            p.class = ParticleClass::Normal;
        }
        _ => {}
    }
}

impl Scene {
    /// Classifies every liquid particle from its volume relative to the
    /// target volume.
    pub fn relabel_liquid_particles(&mut self) {
        let fine_volume = self.fine_volume();
        let num_elasto = self.particles.num_elasto_particles();

        self.particles.particles[num_elasto..]
            .par_iter_mut()
            .for_each(|p| p.class = ParticleClass::from_volume_ratio(p.fluid_volume / fine_volume));
    }

    /// Breaks every very large liquid particle into target-sized children laid
    /// out on a randomly rotated sphere pattern.
    pub fn split_liquid_particles(&mut self) -> usize {
        let t0 = instant::now();
        let fine_volume = self.fine_volume();
        let density = self.liquid.liquid_density;
        let num_elasto = self.particles.num_elasto_particles();
        let scene = &*self;
        let particles = &scene.particles.particles;

        let splits: Vec<(usize, Particle, Vec<Particle>)> = (num_elasto..particles.len())
            .into_par_iter()
            .filter_map(|pidx| {
                let parent = &particles[pidx];
                if parent.class != ParticleClass::VeryLarge {
                    return None;
                }

                let n = ((parent.fluid_volume / fine_volume).ceil() as usize).min(MAX_SPLIT);
                if n <= 1 {
                    return None;
                }

                let new_volume = parent.fluid_volume / n as Real;
                let new_radius = utils::sphere_radius(new_volume);
                let splat = new_radius.max(parent.radii[0] - new_radius) * 0.75;

                let mut rng = scene.rng(RandomStream::Split, pidx);
                let (rotation, _) = utils::qr_decompose(&Matrix::from_fn(|_, _| rng.rand_float()));
                let pattern = scene.sphere_pattern.get(n);
                let center = parent.position;

                let mut base = *parent;
                base.fluid_volume = new_volume;
                base.fluid_mass = new_volume * density;
                base.fluid_inertia = base.fluid_mass * new_radius * new_radius * 0.4;
                base.radii = Radii::repeat(new_radius);
                base.rest_length = 2.0 * new_radius;
                base.rest_area = std::f64::consts::PI * new_radius * new_radius;
                base.class = ParticleClass::Normal;

                let mut new_parent = base;
                new_parent.position = center + rotation * pattern[0] * splat;
                new_parent.rest_position = new_parent.position;

                let children = pattern[1..]
                    .iter()
                    .map(|dir| {
                        let mut child = base;
                        child.position = center + rotation * dir * splat;
                        child.rest_position = child.position;
                        child.twist = 0.0;
                        child.rest_twist = 0.0;
                        child.affine = Matrix::zeros();
                        child.fluid_affine = Matrix::zeros();
                        child.shape_factor = 0.0;
                        child.orientation = Vector::zeros();
                        child
                    })
                    .collect();

                Some((pidx, new_parent, children))
            })
            .collect();

        if splits.is_empty() {
            return 0;
        }

        let mut new_particles = vec![];
        for (pidx, parent, children) in splits {
            self.particles.particles[pidx] = parent;
            new_particles.extend(children);
        }

        let num_new = new_particles.len();
        self.append_liquid_particles(new_particles);
        self.relabel_liquid_particles();

        info!("- Split: {}ms ({} new particles)", instant::now() - t0, num_new);
        num_new
    }

    /// Merges the very small liquid particles into their neighbors and spreads
    /// the excess volume of the large ones.
    ///
    /// Only one particle out of `correction_step`, picked at random, acts as a
    /// donor in a given call. Returns the number of removed particles.
    pub fn merge_liquid_particles(&mut self) -> usize {
        let t0 = instant::now();
        let num_elasto = self.particles.num_elasto_particles();

        if self.particles.num_fluid_particles() == 0 {
            return 0;
        }

        self.sort_particle_buckets();

        let step = self.liquid.correction_step.max(1) as u64;
        let selector = self.rng(RandomStream::MergeSelector, 0).rand_range(0..step);
        let mut colors: Vec<usize> = (0..27).collect();
        let mut rng = self.rng(RandomStream::MergeColors, 0);
        for i in (1..colors.len()).rev() {
            let j = rng.rand_range(0..i as u64 + 1) as usize;
            colors.swap(i, j);
        }

        let ctx = MergeContext {
            fine_volume: self.fine_volume(),
            search_radius: 2.0 * self.fine_radius(),
            num_elasto,
        };
        let density = self.liquid.liquid_density;
        let buckets = &self.particle_buckets;
        let num_particles = self.particles.particles.len();
        let mut state = MergeState {
            particles: &mut self.particles.particles,
            removed: vec![false; num_particles],
            gathered_volume: vec![0.0; num_particles],
            gathered_momentum: vec![Vector::zeros(); num_particles],
        };

        for color in colors {
            let state_ptr = &AtomicPtr::new(&mut state as *mut _);

            (0..buckets.len())
                .into_par_iter()
                .filter(|b| buckets.color27(*b) == color)
                .for_each(|b| {
                    // Buckets of the same color are three buckets apart, so
                    // their 27-neighborhoods never overlap.
                    let state: &mut MergeState = unsafe { std::mem::transmute(state_ptr.load(Ordering::Relaxed)) };

                    for pidx in buckets.bucket_items(b) {
                        let pidx = *pidx;
                        if pidx < num_elasto
                            || state.removed[pidx]
                            || ((pidx - num_elasto) as u64) % step != selector
                        {
                            continue;
                        }

                        merge_particle(state, buckets, &ctx, b, pidx);
                    }
                });
        }

        let MergeState {
            particles,
            removed,
            gathered_volume,
            gathered_momentum,
        } = state;

        particles
            .par_iter_mut()
            .zip(removed.par_iter())
            .zip(gathered_volume.par_iter().zip(gathered_momentum.par_iter()))
            .for_each(|((p, removed), (gv, gm))| {
                if *removed || *gv == 0.0 {
                    return;
                }

                let momentum = p.fluid_velocity * p.fluid_volume + gm;
                let volume = p.fluid_volume + gv;
                let radius = utils::sphere_radius(volume);

                p.fluid_volume = volume;
                p.fluid_velocity = momentum / volume;
                p.fluid_mass = volume * density;
                p.radii = Radii::repeat(radius);
                p.rest_length = 2.0 * radius;
                p.rest_area = std::f64::consts::PI * radius * radius;
            });

        self.next_rng_epoch();
        let num_removed = self.remove_empty_particles();
        self.relabel_liquid_particles();

        info!("- Merge: {}ms ({} removed)", instant::now() - t0, num_removed);
        num_removed
    }

    /// Pushes overlapping liquid particles apart with a smoothed spring force,
    /// without letting them enter the solids.
    ///
    /// Only one liquid particle out of `correction_step`, picked at random,
    /// moves in a given call.
    pub fn correct_liquid_particles(&mut self, dt: Real) {
        if self.particles.num_fluid_particles() == 0 {
            return;
        }

        let t0 = instant::now();
        self.sort_particle_buckets();

        let num_elasto = self.particles.num_elasto_particles();
        let step = self.liquid.correction_step.max(1) as u64;
        let selector = self.rng(RandomStream::CorrectionSelector, 0).rand_range(0..step);
        let coeff = self.liquid.correction_strength / dt;
        let multiplier = self.liquid.correction_multiplier;
        let scene = &*self;
        let particles = &scene.particles.particles;
        let buckets = &scene.particle_buckets;
        let layout = *buckets.layout();

        let moved: Vec<(usize, _)> = (num_elasto..particles.len())
            .into_par_iter()
            .filter(|i| ((i - num_elasto) as u64) % step == selector)
            .map(|i| {
                let p = &particles[i];
                let pos = p.position;
                let mut rng = scene.rng(RandomStream::Correction, i);
                let mut spring = Vector::zeros();

                buckets.for_each_neighbor_item(layout.clamped_index_of(&pos), |j| {
                    if j == i || j < num_elasto {
                        return;
                    }

                    let nb = &particles[j];
                    let re = (p.radii[0] * nb.radii[0]).sqrt() * multiplier;
                    let dist = na::distance(&pos, &nb.position);
                    if dist > re {
                        return;
                    }

                    let w = coeff * utils::smooth_kernel(dist * dist, re);
                    if w == 0.0 {
                        return;
                    }

                    if dist > 1.0e-4 * re {
                        spring += (pos - nb.position) * (w / dist * re);
                    } else {
                        spring += Vector::from_fn(|_, _| re * rng.rand_float());
                    }
                });

                let dpos = spring * dt;
                let (phi_ori, grad_phi) = solid_phi_gradient(&scene.nodes, &p.stencils.solid_phi, &pos);
                let phi_now = phi_ori + grad_phi.dot(&dpos);
                let mut new_pos = pos + dpos;

                if phi_now < 0.0 {
                    new_pos -= grad_phi * phi_now;
                }

                (i, new_pos)
            })
            .collect();

        for (i, pos) in moved {
            self.particles.particles[i].position = pos;
        }

        self.next_rng_epoch();
        info!("- Correction: {}ms", instant::now() - t0);
    }
}
