use crate::core::dynamics::InsideStatus;
use crate::dynamics::Particle;
use crate::math::{Real, MASS_EPSILON};
use ordered_float::NotNan;
use rayon::prelude::*;
use std::ops::Range;

/// The family of a batch of particles inserted into a [`ParticleSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParticleKind {
    Soft,
    Surfel,
    Liquid,
}

/// All the particles of a scene.
///
/// Particles are stored contiguously as `[soft | surfels | liquid]`. The
/// liquid block always trails and is indexed by [`ParticleSet::fluids`].
#[derive(Clone, Debug, Default)]
pub struct ParticleSet {
    pub(crate) particles: Vec<Particle>,
    pub(crate) fluids: Vec<usize>,
    pub(crate) num_elasto: usize,
    pub(crate) num_surfels: usize,
}

impl ParticleSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn get(&self, i: usize) -> Option<&Particle> {
        self.particles.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Particle> {
        self.particles.get_mut(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    /// Indices of the liquid particles.
    pub fn fluids(&self) -> &[usize] {
        &self.fluids
    }

    /// Number of soft elastic particles and surfels.
    #[inline]
    pub fn num_elasto_particles(&self) -> usize {
        self.num_elasto
    }

    #[inline]
    pub fn num_soft_elasto_particles(&self) -> usize {
        self.num_elasto - self.num_surfels
    }

    #[inline]
    pub fn num_surfels(&self) -> usize {
        self.num_surfels
    }

    #[inline]
    pub fn num_fluid_particles(&self) -> usize {
        self.fluids.len()
    }

    #[inline]
    pub fn is_fluid(&self, i: usize) -> bool {
        i >= self.num_elasto
    }

    /// Is this particle free to deform (not a surfel)?
    #[inline]
    pub fn is_soft(&self, i: usize) -> bool {
        self.particles[i].surfel.is_none()
    }

    #[inline]
    pub fn is_outside_fluid(&self, i: usize) -> bool {
        self.is_fluid(i) && self.particles[i].inside == InsideStatus::Outside
    }

    /// Appends a batch of particles of the given kind.
    ///
    /// Soft particles can only be inserted before any surfel or liquid
    /// particle, and surfels before any liquid particle.
    pub fn insert(
        &mut self,
        kind: ParticleKind,
        mut particles: Vec<Particle>,
    ) -> anyhow::Result<Range<usize>> {
        let start = self.particles.len();
        let range = start..start + particles.len();

        match kind {
            ParticleKind::Soft => {
                anyhow::ensure!(
                    self.num_surfels == 0 && self.fluids.is_empty(),
                    "soft particles must be inserted before surfels and liquid particles"
                );
                for p in &mut particles {
                    p.surfel = None;
                }
                self.num_elasto += particles.len();
            }
            ParticleKind::Surfel => {
                anyhow::ensure!(
                    self.fluids.is_empty(),
                    "surfels must be inserted before liquid particles"
                );
                for (k, p) in particles.iter_mut().enumerate() {
                    p.surfel = Some(self.num_surfels + k);
                }
                self.num_elasto += particles.len();
                self.num_surfels += particles.len();
            }
            ParticleKind::Liquid => {
                for p in &mut particles {
                    p.surfel = None;
                }
                self.fluids.extend(range.clone());
            }
        }

        self.particles.append(&mut particles);
        Ok(range)
    }

    /// Resets the set to `n` default soft particles.
    pub fn resize_particle_system(&mut self, n: usize) {
        self.particles.clear();
        self.particles.resize(n, Particle::default());
        self.fluids.clear();
        self.num_elasto = n;
        self.num_surfels = 0;
    }

    /// Resizes to `n` particles, keeping the existing ones.
    ///
    /// Particles added past the elastic block belong to the liquid block.
    pub fn conservative_resize_particles(&mut self, n: usize) {
        self.particles.resize(n, Particle::default());
        self.num_elasto = self.num_elasto.min(n);
        self.num_surfels = self.num_surfels.min(self.num_elasto);
        self.rebuild_fluid_indices();
    }

    /// Exchanges every attribute of two particles.
    #[inline]
    pub fn swap_particles(&mut self, i: usize, j: usize) {
        self.particles.swap(i, j);
    }

    /// Swap-deletes every liquid particle whose volume vanished.
    ///
    /// Returns the number of removed particles. Indices of liquid particles are
    /// not stable through this call.
    pub fn remove_empty_particles(&mut self) -> usize {
        let len0 = self.particles.len();
        let mut i = self.num_elasto;

        while i < self.particles.len() {
            if self.particles[i].fluid_volume < MASS_EPSILON {
                let last = self.particles.len() - 1;
                self.particles.swap(i, last);
                self.particles.pop();
            } else {
                i += 1;
            }
        }

        self.rebuild_fluid_indices();
        len0 - self.particles.len()
    }

    pub(crate) fn rebuild_fluid_indices(&mut self) {
        self.fluids.clear();
        self.fluids.extend(self.num_elasto..self.particles.len());
    }

    pub fn total_fluid_volume_particles(&self) -> Real {
        self.fluids
            .par_iter()
            .map(|i| self.particles[*i].fluid_volume)
            .sum()
    }

    pub fn total_fluid_volume_soft_elasto(&self) -> Real {
        self.particles[..self.num_elasto]
            .par_iter()
            .filter(|p| p.surfel.is_none())
            .map(|p| p.fluid_volume)
            .sum()
    }

    /// Fluid volume held by all the particles.
    pub fn total_fluid_volume(&self) -> Real {
        self.particles.par_iter().map(|p| p.fluid_volume).sum()
    }

    /// Largest speed of the soft elastic particles.
    pub fn max_velocity(&self) -> Real {
        self.particles[..self.num_elasto]
            .par_iter()
            .filter(|p| p.surfel.is_none())
            .filter_map(|p| NotNan::new(p.velocity.norm()).ok())
            .max()
            .map(|v| v.into_inner())
            .unwrap_or(0.0)
    }

    /// Largest speed of the liquid particles.
    pub fn max_fluid_velocity(&self) -> Real {
        self.fluids
            .par_iter()
            .filter_map(|i| NotNan::new(self.particles[*i].fluid_velocity.norm()).ok())
            .max()
            .map(|v| v.into_inner())
            .unwrap_or(0.0)
    }

    /// Stores the current velocities before the grid solve.
    pub fn save_particle_velocity(&mut self) {
        self.particles.par_iter_mut().for_each(|p| {
            p.saved_velocity = p.velocity;
            p.saved_twist_velocity = p.twist_velocity;
        });
    }

    /// The velocity change since [`Self::save_particle_velocity`].
    pub fn update_velocity_difference(&mut self) {
        self.particles.par_iter_mut().for_each(|p| {
            p.velocity_delta = p.velocity - p.saved_velocity;
            p.twist_velocity_delta = p.twist_velocity - p.saved_twist_velocity;
        });
    }
}
