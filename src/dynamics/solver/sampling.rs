use crate::core::utils;
use crate::dynamics::{FixedFlags, Particle, ParticleClass, ParticleKind, Scene};
use crate::geometry::DistanceFieldUsage;
use crate::math::{Point, Radii, Real};

impl Scene {
    /// Covers every sampled solid field with fixed surfels, about one per
    /// grid cell, oriented along the outward normal of the field.
    ///
    /// Surfels must exist before any liquid particle, so this runs before
    /// the liquid is inserted and before the gauss system is initialized.
    pub fn sample_solid_distance_fields(&mut self) -> anyhow::Result<usize> {
        let t0 = instant::now();
        let dx = self.cell_size();
        let radius = utils::DEFAULT_RADIUS_MULTIPLIER * dx * 0.5;
        let volume = utils::sphere_volume(radius);
        let mut num_sampled = 0;

        for (f, field) in self.distance_fields.iter().enumerate() {
            if !field.sampled || field.usage != DistanceFieldUsage::Solid {
                continue;
            }

            anyhow::ensure!(
                field.material < self.elements.materials.len(),
                "distance field {} uses the unknown material {}",
                f,
                field.material
            );
            anyhow::ensure!(
                self.particles.fluids.is_empty(),
                "solids must be sampled before inserting liquid particles"
            );
        }

        for f in 0..self.distance_fields.len() {
            let field = &self.distance_fields[f];
            if !field.sampled || field.usage != DistanceFieldUsage::Solid {
                continue;
            }

            let group = field.group;
            let density = self.elements.materials[field.material].density;
            let mass = volume * density;
            let (surfels, normals): (Vec<_>, Vec<_>) = field
                .resample_surface(dx)
                .into_iter()
                .map(|(position, normal)| {
                    let surfel = Particle {
                        mass,
                        inertia: mass * radius * radius * 0.4,
                        volume,
                        rest_volume: volume,
                        rest_length: 2.0 * radius,
                        rest_area: std::f64::consts::PI * radius * radius,
                        fixed: FixedFlags::POSITION,
                        group,
                        orientation: normal,
                        volume_fraction: 1.0,
                        rest_volume_fraction: 1.0,
                        shape_factor: 0.0,
                        ..Particle::soft(position, Radii::repeat(radius))
                    };
                    (surfel, normal)
                })
                .unzip();

            if surfels.is_empty() {
                continue;
            }

            let first_surfel = self.elements.surfels.len();
            num_sampled += surfels.len();
            self.insert_particles(ParticleKind::Surfel, surfels)?;
            self.elements.surfel_normals[first_surfel..].copy_from_slice(&normals);
        }

        info!(
            "- Sample solids: {}ms ({} surfels)",
            instant::now() - t0,
            num_sampled
        );
        Ok(num_sampled)
    }

    /// Fills the sources emitting at `time` with liquid particles of the
    /// target size, one per cell of the fine lattice not already holding
    /// liquid. Returns the number of new particles.
    pub fn sample_liquid_distance_fields(&mut self, time: Real) -> usize {
        let t0 = instant::now();
        let spacing = self.cell_size() * self.liquid.particle_cell_multiplier;
        let fine_volume = self.fine_volume();
        let density = self.liquid.liquid_density;
        let mut num_emitted = 0;

        for f in 0..self.distance_fields.len() {
            let field = &self.distance_fields[f];
            let velocity = match field.active_emission(time) {
                Some(velocity) => velocity,
                None => continue,
            };

            let existing: Vec<Point<Real>> = self
                .particles
                .fluids
                .iter()
                .map(|i| self.particles.particles[*i].position)
                .collect();
            let group = field.group;
            let new_particles: Vec<_> = field
                .resample_interior(spacing, &existing)
                .into_iter()
                .map(|position| Particle {
                    fluid_velocity: velocity,
                    group,
                    class: ParticleClass::Normal,
                    ..Particle::liquid(position, fine_volume, density)
                })
                .collect();

            if new_particles.is_empty() {
                continue;
            }

            num_emitted += new_particles.len();
            self.distance_fields[f].emitted_volume += new_particles.len() as Real * fine_volume;
            self.append_liquid_particles(new_particles);
        }

        if num_emitted > 0 {
            info!(
                "- Sample sources: {}ms ({} new particles)",
                instant::now() - t0,
                num_emitted
            );
        }
        num_emitted
    }
}
