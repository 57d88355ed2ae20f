use crate::core::dynamics::solver::{ElasticParameters, LiquidParameters, SceneParameters};
use crate::core::utils::{sphere_volume, DEFAULT_RADIUS_MULTIPLIER};
use crate::dynamics::{ElementSet, GroupTransforms, NodeGrid, Particle, ParticleKind, ParticleSet};
use crate::geometry::{BucketGrid, BucketLayout, DistanceField, DistanceFieldUsage};
use crate::math::{Point, Real, Vector};
use crate::utils::SpherePattern;
use na::vector;
use std::ops::Range;

/// Random streams, so that independent draws never share a generator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RandomStream {
    Split = 1,
    MergeSelector,
    MergeColors,
    CorrectionSelector,
    Correction,
    Spawn,
}

/// The complete state of a wet cloth simulation: particles, mesh elements,
/// the bucketed node graph and the collision fields.
pub struct Scene {
    pub params: SceneParameters,
    pub liquid: LiquidParameters,
    pub particles: ParticleSet,
    pub elements: ElementSet,
    pub particle_buckets: BucketGrid,
    pub gauss_buckets: BucketGrid,
    pub nodes: NodeGrid,
    pub distance_fields: Vec<DistanceField>,
    pub groups: GroupTransforms,
    pub bbox_min: Point<Real>,
    pub bbox_max: Point<Real>,
    /// Number of connected interface components found by the last coloring.
    pub num_colors: usize,
    pub(crate) rng_epoch: u64,
    pub(crate) sphere_pattern: SpherePattern,
}

impl Scene {
    pub fn new(params: SceneParameters, liquid: LiquidParameters) -> anyhow::Result<Self> {
        params.validate()?;
        liquid.validate()?;

        let layout = BucketLayout::new(Point::origin(), params.bucket_size, vector![1, 1, 1]);

        Ok(Self {
            params,
            liquid,
            particles: ParticleSet::new(),
            elements: ElementSet::new(),
            particle_buckets: BucketGrid::with_layout(layout),
            gauss_buckets: BucketGrid::with_layout(layout),
            nodes: NodeGrid::new(layout, params.num_nodes),
            distance_fields: vec![],
            groups: GroupTransforms::new(),
            bbox_min: Point::origin(),
            bbox_max: Point::origin(),
            num_colors: 0,
            rng_epoch: 0,
            sphere_pattern: SpherePattern::new(),
        })
    }

    #[inline]
    pub fn cell_size(&self) -> Real {
        self.params.cell_size()
    }

    #[inline]
    pub fn bucket_size(&self) -> Real {
        self.params.bucket_size
    }

    /// Radius of a liquid particle of the target size.
    #[inline]
    pub fn fine_radius(&self) -> Real {
        DEFAULT_RADIUS_MULTIPLIER * self.cell_size() * self.liquid.particle_cell_multiplier
    }

    /// Volume of a liquid particle of the target size.
    #[inline]
    pub fn fine_volume(&self) -> Real {
        sphere_volume(self.fine_radius())
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn num_gauss(&self) -> usize {
        self.elements.num_gauss()
    }

    pub fn set_materials(&mut self, materials: Vec<ElasticParameters>) -> anyhow::Result<()> {
        anyhow::ensure!(!materials.is_empty(), "at least one material is required");
        for m in &materials {
            m.validate()?;
        }
        self.elements.materials = materials;
        Ok(())
    }

    /// Appends particles of the given kind and returns their index range.
    pub fn insert_particles(
        &mut self,
        kind: ParticleKind,
        particles: Vec<Particle>,
    ) -> anyhow::Result<Range<usize>> {
        let range = self.particles.insert(kind, particles)?;

        if kind == ParticleKind::Surfel {
            for i in range.clone() {
                self.elements.surfels.push(i);
                self.elements.surfel_normals.push(Vector::z());
            }
        }

        let num_groups = self
            .particles
            .particles()
            .iter()
            .map(|p| p.group + 1)
            .max()
            .unwrap_or(0);
        if num_groups > self.groups.len() {
            self.groups.resize_groups(num_groups);
        }

        self.elements.rebuild_back_references(self.particles.len());
        Ok(range)
    }

    pub fn set_edges(&mut self, edges: &[[usize; 2]], materials: &[usize]) -> anyhow::Result<()> {
        let num_elasto = self.particles.num_elasto_particles();
        anyhow::ensure!(
            edges.iter().flatten().all(|i| *i < num_elasto),
            "edges must only connect elastic particles"
        );
        self.elements
            .set_edges(&mut self.particles.particles, edges, materials)
    }

    pub fn set_faces(&mut self, faces: &[[usize; 3]], materials: &[usize]) -> anyhow::Result<()> {
        let num_elasto = self.particles.num_elasto_particles();
        anyhow::ensure!(
            faces.iter().flatten().all(|i| *i < num_elasto),
            "faces must only connect elastic particles"
        );
        self.elements
            .set_faces(&mut self.particles.particles, faces, materials)
    }

    pub fn set_surfel_normals(&mut self, normals: Vec<Vector<Real>>) -> anyhow::Result<()> {
        anyhow::ensure!(
            normals.len() == self.elements.surfels.len(),
            "expected {} surfel normals, got {}",
            self.elements.surfels.len(),
            normals.len()
        );
        self.elements.surfel_normals = normals
            .into_iter()
            .map(|n| n.try_normalize(0.0).unwrap_or_else(Vector::z))
            .collect();
        Ok(())
    }

    pub fn add_distance_field(&mut self, field: DistanceField) {
        if field.group >= self.groups.len() {
            self.groups.resize_groups(field.group + 1);
        }
        self.distance_fields.push(field);
    }

    /// Exchanges two particles, their back references included.
    pub fn swap_particles(&mut self, i: usize, j: usize) {
        self.particles.swap_particles(i, j);
        self.elements.particle_edges.swap(i, j);
        self.elements.particle_faces.swap(i, j);
    }

    /// Removes the liquid particles whose volume vanished and re-sorts the
    /// particle buckets.
    pub fn remove_empty_particles(&mut self) -> usize {
        let removed = self.particles.remove_empty_particles();
        if removed > 0 {
            self.elements
                .particle_edges
                .resize(self.particles.len(), vec![]);
            self.elements
                .particle_faces
                .resize(self.particles.len(), vec![]);
            self.sort_particle_buckets();
        }
        removed
    }

    /// Appends new liquid particles at the end of the set and refreshes the
    /// indices depending on the particle count.
    pub(crate) fn append_liquid_particles(&mut self, new_particles: Vec<Particle>) {
        self.particles.particles.extend(new_particles);
        let len = self.particles.len();
        self.particles.rebuild_fluid_indices();
        self.elements.particle_edges.resize(len, vec![]);
        self.elements.particle_faces.resize(len, vec![]);
        self.next_rng_epoch();
        self.sort_particle_buckets();
    }

    pub(crate) fn sort_particle_buckets(&mut self) {
        let particles = &self.particles.particles;
        self.particle_buckets
            .sort(particles.len(), |i| particles[i].position);
    }

    pub(crate) fn sort_gauss_buckets(&mut self) {
        let gauss = &self.elements.gauss;
        self.gauss_buckets.sort(gauss.len(), |i| gauss[i].position);
    }

    pub fn total_fluid_volume_particles(&self) -> Real {
        self.particles.total_fluid_volume_particles()
    }

    pub fn total_fluid_volume_soft_elasto(&self) -> Real {
        self.particles.total_fluid_volume_soft_elasto()
    }

    pub fn max_velocity(&self) -> Real {
        self.particles.max_velocity()
    }

    pub fn max_fluid_velocity(&self) -> Real {
        self.particles.max_fluid_velocity()
    }

    /// Signed distance to the closest field of the given usage.
    ///
    /// Defaults to three buckets away when no such field exists.
    pub fn compute_phi(&self, pos: &Point<Real>, usage: DistanceFieldUsage) -> Real {
        self.compute_phi_vel(pos, usage).0
    }

    pub fn compute_phi_vel(
        &self,
        pos: &Point<Real>,
        usage: DistanceFieldUsage,
    ) -> (Real, Vector<Real>) {
        let mut best = (3.0 * self.bucket_size(), Vector::zeros());

        for field in self.distance_fields.iter().filter(|f| f.usage == usage) {
            let (phi, vel) = field.compute_phi_vel(pos);
            if phi < best.0 {
                best = (phi, vel);
            }
        }

        best
    }

    /// Moves on to a new set of random draws.
    pub(crate) fn next_rng_epoch(&mut self) {
        self.rng_epoch += 1;
    }

    /// A generator depending only on the seed, the epoch, the stream and `index`.
    pub(crate) fn rng(&self, stream: RandomStream, index: usize) -> oorandom::Rand64 {
        let seed = self.params.seed
            ^ ((self.rng_epoch as u128) << 72)
            ^ ((stream as u128) << 64)
            ^ (index as u128);
        let mut rng = oorandom::Rand64::new(seed);
        // Decorrelates neighboring seeds.
        let _ = rng.rand_u64();
        rng
    }
}
