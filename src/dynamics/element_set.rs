use crate::core::dynamics::solver::ElasticParameters;
use crate::core::utils;
use crate::dynamics::{NodeStencil, Particle};
use crate::math::{Matrix, Point, Radii, Real, Rotation, Vector};
use std::f64::consts::PI;

/// What a Gauss point samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GaussKind {
    Edge(usize),
    Face(usize),
    Surfel(usize),
}

/// Node footprints of a Gauss point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GaussStencils {
    pub velocity: [NodeStencil; 3],
    pub pressure: NodeStencil,
}

/// A quadrature point of an edge, a face or a surfel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GaussPoint {
    pub position: Point<Real>,
    pub velocity: Vector<Real>,
    pub velocity_delta: Vector<Real>,
    pub fluid_velocity: Vector<Real>,
    pub mass: Real,
    pub inertia: Real,
    pub fluid_mass: Real,
    pub volume: Real,
    pub rest_volume: Real,
    pub fluid_volume: Real,
    pub radii: Radii<Real>,
    pub volume_fraction: Real,
    pub rest_volume_fraction: Real,
    /// Gradients of the shape functions, one column per vertex.
    pub gradient: Matrix<Real>,
    /// Current material frame `D`.
    pub frame: Matrix<Real>,
    /// Rest frame `D*`.
    pub rest_frame: Matrix<Real>,
    pub inv_rest_frame: Matrix<Real>,
    /// Elastic deformation gradient `Fe = D D*⁻¹`.
    pub deformation_gradient: Matrix<Real>,
    /// Orthonormal frame whose columns are the tangent(s) and normal(s).
    pub normal_frame: Matrix<Real>,
    /// Rotation taking the reference Z axis to the normal of a surfel.
    pub surfel_rotation: Rotation<Real>,
    pub stencils: GaussStencils,
}

impl Default for GaussPoint {
    fn default() -> Self {
        Self {
            position: Point::origin(),
            velocity: Vector::zeros(),
            velocity_delta: Vector::zeros(),
            fluid_velocity: Vector::zeros(),
            mass: 0.0,
            inertia: 0.0,
            fluid_mass: 0.0,
            volume: 0.0,
            rest_volume: 0.0,
            fluid_volume: 0.0,
            radii: Radii::zeros(),
            volume_fraction: 0.0,
            rest_volume_fraction: 0.0,
            gradient: Matrix::zeros(),
            frame: Matrix::identity(),
            rest_frame: Matrix::identity(),
            inv_rest_frame: Matrix::identity(),
            deformation_gradient: Matrix::identity(),
            normal_frame: Matrix::identity(),
            surfel_rotation: Rotation::identity(),
            stencils: GaussStencils::default(),
        }
    }
}

/// A capillary bridge between two wet elements.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CohesionPair {
    /// Gauss point hit by the search ray.
    pub target: usize,
    /// Gauss point casting the search ray.
    pub origin: usize,
    pub dir: Vector<Real>,
    /// Closest point on the target element.
    pub hit: Point<Real>,
    /// Barycentric coordinates of `hit` on the target element.
    pub barycentric: Vector<Real>,
    pub dist: Real,
    pub weight: Real,
    pub volume_fraction: Real,
    pub c0: Real,
    pub c1: Real,
}

/// Mesh topology and the Gauss points sampling it.
///
/// Gauss points are ordered as `[edges | faces | surfels]`.
#[derive(Clone, Debug)]
pub struct ElementSet {
    pub edges: Vec<[usize; 2]>,
    pub faces: Vec<[usize; 3]>,
    /// Particle index of every surfel.
    pub surfels: Vec<usize>,
    pub surfel_normals: Vec<Vector<Real>>,
    pub edge_rest_length: Vec<Real>,
    pub face_rest_area: Vec<Real>,
    /// Fraction of the face attributed to each corner (its angle over π).
    pub face_weights: Vec<[Real; 3]>,
    pub particle_edges: Vec<Vec<usize>>,
    /// Faces incident to a particle and the particle's weight in each.
    pub particle_faces: Vec<Vec<(usize, Real)>>,
    pub materials: Vec<ElasticParameters>,
    pub edge_materials: Vec<usize>,
    pub face_materials: Vec<usize>,
    pub gauss: Vec<GaussPoint>,
    pub cohesion: Vec<Vec<CohesionPair>>,
}

impl Default for ElementSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementSet {
    pub fn new() -> Self {
        Self {
            edges: vec![],
            faces: vec![],
            surfels: vec![],
            surfel_normals: vec![],
            edge_rest_length: vec![],
            face_rest_area: vec![],
            face_weights: vec![],
            particle_edges: vec![],
            particle_faces: vec![],
            materials: vec![ElasticParameters::default()],
            edge_materials: vec![],
            face_materials: vec![],
            gauss: vec![],
            cohesion: vec![],
        }
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn num_surfels(&self) -> usize {
        self.surfels.len()
    }

    #[inline]
    pub fn num_gauss(&self) -> usize {
        self.edges.len() + self.faces.len() + self.surfels.len()
    }

    #[inline]
    pub fn gauss_kind(&self, g: usize) -> GaussKind {
        let ne = self.edges.len();
        let nf = self.faces.len();
        if g < ne {
            GaussKind::Edge(g)
        } else if g < ne + nf {
            GaussKind::Face(g - ne)
        } else {
            GaussKind::Surfel(g - ne - nf)
        }
    }

    /// Is this Gauss point deformable (an edge or a face)?
    #[inline]
    pub fn is_soft_gauss(&self, g: usize) -> bool {
        g < self.edges.len() + self.faces.len()
    }

    /// Material of a Gauss point; surfels use the first material.
    pub fn gauss_material(&self, g: usize) -> &ElasticParameters {
        let id = match self.gauss_kind(g) {
            GaussKind::Edge(e) => self.edge_materials[e],
            GaussKind::Face(f) => self.face_materials[f],
            GaussKind::Surfel(_) => 0,
        };
        &self.materials[id]
    }

    /// Sets the mesh edges and refreshes the rest lengths and lateral areas.
    pub fn set_edges(
        &mut self,
        particles: &mut [Particle],
        edges: &[[usize; 2]],
        materials: &[usize],
    ) -> anyhow::Result<()> {
        for e in edges {
            anyhow::ensure!(
                e[0] < particles.len() && e[1] < particles.len() && e[0] != e[1],
                "invalid edge {:?} for {} particles",
                e,
                particles.len()
            );
        }
        self.ensure_materials(materials, edges.len())?;

        self.edges = edges.to_vec();
        self.edge_materials = if materials.is_empty() {
            vec![0; edges.len()]
        } else {
            materials.to_vec()
        };
        self.edge_rest_length = edges
            .iter()
            .map(|e| na::distance(&particles[e[0]].rest_position, &particles[e[1]].rest_position))
            .collect();

        self.rebuild_back_references(particles.len());
        self.update_rest_measures(particles);
        Ok(())
    }

    /// Sets the mesh faces, their angle weights and rest areas.
    pub fn set_faces(
        &mut self,
        particles: &mut [Particle],
        faces: &[[usize; 3]],
        materials: &[usize],
    ) -> anyhow::Result<()> {
        for f in faces {
            anyhow::ensure!(
                f.iter().all(|v| *v < particles.len()) && f[0] != f[1] && f[1] != f[2] && f[0] != f[2],
                "invalid face {:?} for {} particles",
                f,
                particles.len()
            );
        }
        self.ensure_materials(materials, faces.len())?;

        self.faces = faces.to_vec();
        self.face_materials = if materials.is_empty() {
            vec![0; faces.len()]
        } else {
            materials.to_vec()
        };
        self.face_rest_area.clear();
        self.face_weights.clear();

        for f in faces {
            let x0 = particles[f[0]].rest_position.coords;
            let x1 = particles[f[1]].rest_position.coords;
            let x2 = particles[f[2]].rest_position.coords;

            self.face_rest_area
                .push(0.5 * (x1 - x0).cross(&(x2 - x0)).norm());

            let w0 = utils::corner_angle(&x0, &x1, &x2) / PI;
            let w1 = utils::corner_angle(&x1, &x2, &x0) / PI;
            self.face_weights.push([w0, w1, 1.0 - w0 - w1]);
        }

        self.rebuild_back_references(particles.len());
        self.update_rest_measures(particles);
        Ok(())
    }

    fn ensure_materials(&self, materials: &[usize], count: usize) -> anyhow::Result<()> {
        if materials.is_empty() {
            return Ok(());
        }
        anyhow::ensure!(
            materials.len() == count,
            "expected {} material indices, got {}",
            count,
            materials.len()
        );
        anyhow::ensure!(
            materials.iter().all(|m| *m < self.materials.len()),
            "material index out of range"
        );
        Ok(())
    }

    /// Recomputes the particle to edge/face maps. Never patched incrementally.
    pub fn rebuild_back_references(&mut self, num_particles: usize) {
        self.particle_edges = vec![vec![]; num_particles];
        self.particle_faces = vec![vec![]; num_particles];

        for (i, e) in self.edges.iter().enumerate() {
            self.particle_edges[e[0]].push(i);
            self.particle_edges[e[1]].push(i);
        }

        for (i, f) in self.faces.iter().enumerate() {
            for k in 0..3 {
                self.particle_faces[f[k]].push((i, self.face_weights[i][k]));
            }
        }
    }

    /// Half of the incident edge lengths and the lateral surface of the
    /// incident elements, accumulated on every vertex.
    fn update_rest_measures(&self, particles: &mut [Particle]) {
        for i in self
            .edges
            .iter()
            .flat_map(|e| e.iter())
            .chain(self.faces.iter().flat_map(|f| f.iter()))
        {
            particles[*i].rest_length = 0.0;
            particles[*i].rest_area = 0.0;
        }

        for (e, l0) in self.edges.iter().zip(self.edge_rest_length.iter()) {
            for v in e {
                let p = &mut particles[*v];
                p.rest_length += l0 * 0.5;
                p.rest_area += l0 * utils::ellipse_perimeter(p.radii.x, p.radii.y) * 0.5;
            }
        }

        for (f, a0) in self.faces.iter().zip(self.face_rest_area.iter()) {
            for v in f {
                particles[*v].rest_area += a0 / 3.0;
            }
        }
    }

    /// Effective principal radii of a Gauss point.
    pub fn gauss_radius(&self, particles: &[Particle], g: usize, dx: Real) -> Radii<Real> {
        match self.gauss_kind(g) {
            GaussKind::Edge(e) => {
                let [a, b] = self.edges[e];
                let (ra, rb) = (particles[a].radii, particles[b].radii);
                (ra.component_mul(&ra) + rb.component_mul(&rb)).map(|r| (r * 0.5).sqrt())
            }
            GaussKind::Face(f) => {
                let sum = self.faces[f]
                    .iter()
                    .map(|v| particles[*v].radii.component_mul(&particles[*v].radii))
                    .fold(Radii::zeros(), |a, b| a + b);
                sum.map(|r| (r / 3.0).sqrt())
            }
            GaussKind::Surfel(_) => {
                Radii::repeat(crate::core::utils::DEFAULT_RADIUS_MULTIPLIER * dx)
            }
        }
    }
}
