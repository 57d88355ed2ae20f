use crate::core::dynamics::NodeKind;
use crate::core::utils;
use crate::dynamics::{ElementSet, GaussKind, GaussPoint, GaussStencils, NodeGrid, Particle, Scene};
use crate::math::{Kernel, Matrix, PlaneMatrix, Point, Real, Rotation, Vector, MASS_EPSILON};
use na::Unit;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Shortest rotation taking the direction `a` to the direction `b`, including
/// the antiparallel case. The identity if either direction is zero.
fn rotation_between(a: &Vector<Real>, b: &Vector<Real>) -> Rotation<Real> {
    if a.norm_squared() <= MASS_EPSILON || b.norm_squared() <= MASS_EPSILON {
        return Rotation::identity();
    }

    Rotation::rotation_between(a, b).unwrap_or_else(|| {
        Unit::try_new(utils::find_normal(b), MASS_EPSILON)
            .map(|axis| Rotation::from_axis_angle(&axis, PI))
            .unwrap_or_else(Rotation::identity)
    })
}

/// Solid-phase velocity gradient at a Gauss point, from the node velocities.
fn velocity_gradient(grid: &NodeGrid, stencils: &GaussStencils, pos: &Point<Real>) -> Matrix<Real> {
    let inv_d = Kernel::inv_d(grid.cell_size);
    let mut grad = Matrix::zeros();

    for axis in 0..3 {
        for (_, id, w) in stencils.velocity[axis].iter() {
            if !grid.is_active(id.bucket as usize) {
                continue;
            }

            let nv = grid.velocity_node(axis, id).velocity;
            let np = grid.node_pos_id(NodeKind::velocity(axis), id);
            let mut row = grad.row_mut(axis);
            row += (np - pos).transpose() * (nv * w * inv_d);
        }
    }

    grad
}

/// Weighted average of a per-particle quantity over the vertices of a Gauss point.
fn vertex_average<T>(elements: &ElementSet, particles: &[Particle], g: usize, f: impl Fn(&Particle) -> T) -> T
where
    T: std::ops::Mul<Real, Output = T> + std::ops::Add<Output = T>,
{
    match elements.gauss_kind(g) {
        GaussKind::Edge(e) => {
            let [a, b] = elements.edges[e];
            (f(&particles[a]) + f(&particles[b])) * 0.5
        }
        GaussKind::Face(i) => {
            let [a, b, c] = elements.faces[i];
            let w = elements.face_weights[i];
            f(&particles[a]) * w[0] + f(&particles[b]) * w[1] + f(&particles[c]) * w[2]
        }
        GaussKind::Surfel(s) => f(&particles[elements.surfels[s]]),
    }
}

/// Rest frame `D*` of a triangle, expressed in its own plane.
fn face_rest_frame(t0: &Vector<Real>, t1: &Vector<Real>, normal: &Vector<Real>) -> Matrix<Real> {
    let to_z = rotation_between(normal, &Vector::z());
    let u = to_z * t0;
    let v = to_z * t1;
    let to_x = rotation_between(&u, &Vector::x());
    let ru = to_x * u;
    let rv = to_x * v;

    let mut rest = Matrix::identity();
    rest[(0, 0)] = ru.x;
    rest[(0, 1)] = rv.x;
    rest[(1, 1)] = rv.y;
    rest
}

fn face_normal_frame(t0: &Vector<Real>, normal: &Vector<Real>) -> Matrix<Real> {
    let t = utils::normalize_or_zero(t0);
    let b = utils::normalize_or_zero(&t0.cross(normal));
    Matrix::from_columns(&[t, b, *normal])
}

impl Scene {
    /// Creates one Gauss point per edge, face and surfel, with its frames,
    /// volumes, masses, radii and volume fractions.
    pub fn init_gauss_system(&mut self) {
        let dx = self.cell_size();
        let particles = &self.particles.particles;
        let elements = &self.elements;

        let gauss: Vec<GaussPoint> = (0..elements.num_gauss())
            .into_par_iter()
            .map(|g| {
                let material = elements.gauss_material(g);
                let radii = elements.gauss_radius(particles, g, dx);
                let mut gp = GaussPoint {
                    position: Point::from(vertex_average(elements, particles, g, |p| p.position.coords)),
                    velocity: vertex_average(elements, particles, g, |p| p.velocity),
                    velocity_delta: vertex_average(elements, particles, g, |p| p.velocity_delta),
                    fluid_velocity: vertex_average(elements, particles, g, |p| p.fluid_velocity),
                    fluid_volume: vertex_average(elements, particles, g, |p| p.fluid_volume),
                    fluid_mass: vertex_average(elements, particles, g, |p| p.fluid_mass),
                    volume_fraction: vertex_average(elements, particles, g, |p| p.volume_fraction),
                    rest_volume_fraction: vertex_average(elements, particles, g, |p| p.rest_volume_fraction),
                    radii,
                    ..GaussPoint::default()
                };

                match elements.gauss_kind(g) {
                    GaussKind::Edge(e) => {
                        let [a, b] = elements.edges[e];
                        let volume = elements.edge_rest_length[e] * radii.x * radii.y * PI;
                        gp.volume = volume;
                        gp.rest_volume = volume;
                        gp.mass = volume * material.density;
                        gp.inertia = volume * material.density * 0.5 * radii.x * radii.y;

                        let tangent = particles[b].position - particles[a].position;
                        let l2 = tangent.norm_squared();
                        let ev = if l2 > MASS_EPSILON { tangent / l2 } else { tangent };
                        gp.gradient = Matrix::from_columns(&[-ev, ev, Vector::zeros()]);

                        let unit_tangent = utils::normalize_or_zero(&tangent);
                        let normal = utils::find_normal(&unit_tangent);
                        let binormal = utils::normalize_or_zero(&tangent.cross(&normal));
                        gp.frame = Matrix::from_columns(&[tangent, normal, binormal]);
                        gp.normal_frame = Matrix::from_columns(&[unit_tangent, normal, binormal]);

                        let mut rest = Matrix::identity();
                        rest[(0, 0)] = tangent.norm();
                        gp.rest_frame = rest;
                    }
                    GaussKind::Face(f) => {
                        let [a, b, c] = elements.faces[f];
                        let volume = elements.face_rest_area[f] * (radii.x + radii.y);
                        gp.volume = volume;
                        gp.rest_volume = volume;
                        gp.mass = volume * material.density;
                        gp.inertia = 1.0;
                        gp.gradient = utils::triangle_gradient(
                            &particles[a].rest_position.coords,
                            &particles[b].rest_position.coords,
                            &particles[c].rest_position.coords,
                        );

                        let t0 = particles[b].position - particles[a].position;
                        let t1 = particles[c].position - particles[a].position;
                        let normal = utils::normalize_or_zero(&t1.cross(&t0));
                        gp.frame = Matrix::from_columns(&[t0, t1, normal]);
                        gp.normal_frame = face_normal_frame(&t0, &normal);
                        gp.rest_frame = face_rest_frame(&t0, &t1, &normal);
                    }
                    GaussKind::Surfel(s) => {
                        let p = &particles[elements.surfels[s]];
                        let normal = elements.surfel_normals[s];
                        let rot = rotation_between(&Vector::z(), &normal);
                        let frame = Matrix::from_columns(&[rot * Vector::x(), rot * Vector::y(), normal]);

                        gp.volume = p.volume;
                        gp.rest_volume = p.volume;
                        gp.radii = p.radii;
                        gp.mass = p.mass;
                        gp.inertia = p.inertia;
                        gp.fluid_volume = 0.0;
                        gp.fluid_mass = 0.0;
                        gp.volume_fraction = 1.0;
                        gp.rest_volume_fraction = 1.0;
                        gp.frame = frame;
                        gp.normal_frame = frame;
                        gp.surfel_rotation = rot;
                        gp.rest_frame = Matrix::identity();
                    }
                }

                gp.inv_rest_frame = gp.rest_frame.try_inverse().unwrap_or_else(Matrix::identity);
                gp.deformation_gradient = gp.frame * gp.inv_rest_frame;
                gp
            })
            .collect();

        self.elements.gauss = gauss;
        self.elements.cohesion = vec![vec![]; self.elements.gauss.len()];
        self.sort_gauss_buckets();
    }

    /// Refreshes the liquid carried by the edge and face Gauss points.
    pub fn update_gauss_manifold_system(&mut self) {
        let particles = &self.particles.particles;
        let elements = &self.elements;
        let num_soft = (elements.num_edges() + elements.num_faces()).min(elements.gauss.len());

        let values: Vec<_> = (0..num_soft)
            .into_par_iter()
            .map(|g| {
                (
                    vertex_average(elements, particles, g, |p| p.fluid_volume),
                    vertex_average(elements, particles, g, |p| p.velocity),
                    vertex_average(elements, particles, g, |p| p.fluid_mass),
                )
            })
            .collect();

        self.elements
            .gauss
            .par_iter_mut()
            .zip(values.into_par_iter())
            .for_each(|(gp, (fluid_volume, velocity, fluid_mass))| {
                gp.fluid_volume = fluid_volume;
                gp.velocity = velocity;
                gp.fluid_mass = fluid_mass;
            });
    }

    /// Moves the Gauss points with their vertices, then updates their
    /// deformation gradients.
    pub fn update_gauss_system(&mut self, dt: Real) {
        let particles = &self.particles.particles;
        let elements = &self.elements;

        let values: Vec<_> = (0..elements.gauss.len())
            .into_par_iter()
            .map(|g| {
                (
                    vertex_average(elements, particles, g, |p| p.position.coords),
                    vertex_average(elements, particles, g, |p| p.velocity),
                    vertex_average(elements, particles, g, |p| p.fluid_velocity),
                    vertex_average(elements, particles, g, |p| p.fluid_volume),
                    vertex_average(elements, particles, g, |p| p.fluid_mass),
                )
            })
            .collect();

        self.elements
            .gauss
            .par_iter_mut()
            .zip(values.into_par_iter())
            .for_each(|(gp, (pos, vel, fluid_vel, fluid_volume, fluid_mass))| {
                gp.position = Point::from(pos);
                gp.velocity = vel;
                gp.fluid_velocity = fluid_vel;
                gp.fluid_volume = fluid_volume;
                gp.fluid_mass = fluid_mass;
            });

        self.update_deformation_gradient(dt);
    }

    /// Advects the material frames of the Gauss points through the node
    /// velocity gradient. The tangents follow the vertices exactly.
    ///
    /// `dt` is expected to be bounded by the caller's CFL condition.
    pub fn update_deformation_gradient(&mut self, dt: Real) {
        let t0 = instant::now();
        let grid = &self.nodes;
        let particles = &self.particles.particles;
        let varying_fraction = self.liquid.use_varying_fraction;
        let ElementSet {
            ref edges,
            ref faces,
            ref surfel_normals,
            ref mut gauss,
            ..
        } = self.elements;
        let (num_edges, num_faces) = (edges.len(), faces.len());

        gauss.par_iter_mut().enumerate().for_each(|(g, gp)| {
            let grad = velocity_gradient(grid, &gp.stencils, &gp.position);
            let step = Matrix::identity() + grad * dt + grad * grad * (0.5 * dt * dt);
            let old = gp.frame;

            if g < num_edges {
                let [a, b] = edges[g];
                let tangent = particles[b].position - particles[a].position;
                gp.frame = Matrix::from_columns(&[tangent, step * old.column(1), step * old.column(2)]);
                gp.deformation_gradient = gp.frame * gp.inv_rest_frame;

                if varying_fraction {
                    let lower = (4.0 / PI * gp.rest_volume_fraction).min(1.0);
                    let j = gp.deformation_gradient.determinant().max(lower).min(2.0);
                    gp.volume = gp.rest_volume * j;
                    gp.volume_fraction = gp.rest_volume_fraction / j;
                }

                gp.normal_frame = utils::qr_decompose(&gp.frame).0;
            } else if g < num_edges + num_faces {
                let [a, b, c] = faces[g - num_edges];
                let t0 = particles[b].position - particles[a].position;
                let t1 = particles[c].position - particles[a].position;
                gp.frame = Matrix::from_columns(&[t0, t1, step * old.column(2)]);
                gp.deformation_gradient = gp.frame * gp.inv_rest_frame;

                if varying_fraction {
                    let lower = (1.15 * gp.rest_volume_fraction).min(1.0);
                    let j = gp.deformation_gradient.determinant().max(lower).min(2.0);
                    gp.volume = gp.rest_volume * j;
                    gp.volume_fraction = gp.rest_volume_fraction / j;
                }

                let normal = utils::normalize_or_zero(&t1.cross(&t0));
                gp.normal_frame = face_normal_frame(&t0, &normal);
            } else {
                let normal = surfel_normals[g - num_edges - num_faces];
                let rot = rotation_between(&Vector::z(), &normal);
                gp.frame = Matrix::from_columns(&[rot * Vector::x(), rot * Vector::y(), step * old.column(2)]);
                gp.deformation_gradient = gp.frame * gp.inv_rest_frame;
                gp.surfel_rotation = rot;
                gp.normal_frame = utils::qr_decompose(&gp.frame).0;
            }
        });

        if varying_fraction {
            self.update_solid_volume_fraction();
        }

        info!("- Deformation gradient: {}ms", instant::now() - t0);
    }

    /// Return mapping of the material frames for contact friction: yarns get a
    /// Drucker-Prager projection of their cross-section stretch, cloth and
    /// surfels a Coulomb bound on the shear of their normal.
    pub fn update_plasticity(&mut self, _dt: Real) {
        let num_edges = self.elements.num_edges();
        let ElementSet {
            ref mut gauss,
            ref materials,
            ref edge_materials,
            ref face_materials,
            ..
        } = self.elements;

        gauss.par_iter_mut().enumerate().for_each(|(g, gp)| {
            let material = if g < num_edges {
                &materials[edge_materials[g]]
            } else {
                match face_materials.get(g - num_edges) {
                    Some(m) => &materials[*m],
                    None => &materials[0],
                }
            };
            let la = material.lame_lambda() * material.collision_multiplier;
            let mu = material.lame_mu() * material.collision_multiplier;
            let beta = material.friction_beta;

            if mu <= MASS_EPSILON {
                return;
            }

            let (q, mut r) = utils::qr_decompose(&gp.frame);

            if g < num_edges {
                let alpha = material.friction_alpha;
                let cross: PlaneMatrix<Real> = r.fixed_slice::<2, 2>(1, 1).into_owned();
                let svd = cross.svd(true, true);
                let (u, v_t) = match (svd.u, svd.v_t) {
                    (Some(u), Some(v_t)) => (u, v_t),
                    _ => return,
                };
                let s = svd.singular_values;
                if s.min() <= 0.0 {
                    return;
                }

                let mut ep = s.map(|s| s.ln());
                if ep.sum() < 0.0 {
                    let tr = ep.sum();
                    let dev = ep.add_scalar(-0.5 * tr);
                    let dev_norm = dev.norm();
                    let dgp = dev_norm + (la + mu) / mu * tr * alpha;

                    if dev_norm < MASS_EPSILON {
                        ep.fill(0.0);
                    } else if dgp > 0.0 {
                        ep -= dev * (dgp / dev_norm);
                    }
                } else {
                    ep.fill(0.0);
                }

                let s = ep.map(|e| e.exp());
                let projected = u * PlaneMatrix::from_diagonal(&s) * v_t;
                r.fixed_slice_mut::<2, 2>(1, 1).copy_from(&projected);

                let ff = mu * (r[(0, 1)] * r[(0, 1)] + r[(0, 2)] * r[(0, 2)]).sqrt();
                let inv_s = s.map(|s| 1.0 / s);
                let fnormal = (inv_s.component_mul(&ep) * (2.0 * mu) + inv_s * (la * ep.sum())).norm() * 0.5;

                if ff > 0.0 && ff > fnormal * beta {
                    let scale = (beta * fnormal / ff).min(1.0);
                    r[(0, 1)] *= scale;
                    r[(0, 2)] *= scale;
                }
            } else if r[(2, 2)] < 1.0 {
                let fnormal = (2.0 * mu + la) * (1.0 - r[(2, 2)]) * (1.0 - r[(2, 2)]);
                let ff = mu * (r[(0, 2)] * r[(0, 2)] + r[(1, 2)] * r[(1, 2)]).sqrt();

                if ff > 0.0 && ff > fnormal * beta {
                    let scale = (beta * fnormal / ff).min(1.0);
                    r[(0, 2)] *= scale;
                    r[(1, 2)] *= scale;
                }
            } else {
                r[(0, 2)] = 0.0;
                r[(1, 2)] = 0.0;
                r[(2, 2)] = 1.0;
            }

            gp.frame = q * r;
            gp.deformation_gradient = gp.frame * gp.inv_rest_frame;
        });
    }

    /// Yarn (1) versus cloth (0) blend of every elastic vertex, from the
    /// volume of its incident edges.
    pub fn update_shape_factor(&mut self) {
        let num_elasto = self.particles.num_elasto_particles();
        let elements = &self.elements;

        self.particles.particles[..num_elasto]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                let edges = &elements.particle_edges[i];
                let faces = &elements.particle_faces[i];

                p.shape_factor = if p.surfel.is_some() {
                    0.0
                } else if faces.is_empty() {
                    1.0
                } else if edges.is_empty() || p.volume <= MASS_EPSILON {
                    0.0
                } else {
                    let edge_volume: Real = edges.iter().map(|e| elements.gauss[*e].volume * 0.5).sum();
                    (edge_volume / p.volume).max(0.0).min(1.0)
                };
            });
    }

    /// Fiber direction of every elastic vertex: the volume-weighted incident
    /// edge tangents and face normals, or the surfel normal.
    pub fn update_orientation(&mut self) {
        let num_elasto = self.particles.num_elasto_particles();
        let num_edges = self.elements.num_edges();
        let elements = &self.elements;
        let positions: Vec<Point<Real>> = self.particles.particles.iter().map(|p| p.position).collect();

        self.particles.particles[..num_elasto]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                if let Some(s) = p.surfel {
                    p.orientation = elements.surfel_normals[s];
                    return;
                }

                let mut ori = Vector::zeros();
                for e in &elements.particle_edges[i] {
                    let [a, b] = elements.edges[*e];
                    let dir = (positions[b] - positions[a]).try_normalize(0.0).unwrap_or_else(Vector::zeros);
                    ori += dir * (elements.gauss[*e].volume * 0.5);
                }
                for (f, w) in &elements.particle_faces[i] {
                    let gp = &elements.gauss[num_edges + f];
                    ori += gp.normal_frame.column(2) * (gp.volume * w);
                }

                p.orientation = ori.try_normalize(0.0).unwrap_or_else(Vector::zeros);
            });
    }

    /// Solid volume fraction and volume of the soft vertices from the volume
    /// change of their incident elements.
    pub fn update_solid_volume_fraction(&mut self) {
        let num_soft = self.particles.num_soft_elasto_particles();
        let num_edges = self.elements.num_edges();
        let elements = &self.elements;

        self.particles.particles[..num_soft]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                let mut current = 0.0;
                let mut rest = 0.0;

                for e in &elements.particle_edges[i] {
                    current += elements.gauss[*e].volume * 0.5;
                    rest += elements.gauss[*e].rest_volume * 0.5;
                }
                for (f, w) in &elements.particle_faces[i] {
                    let gp = &elements.gauss[num_edges + f];
                    current += gp.volume * w;
                    rest += gp.rest_volume * w;
                }

                if current > MASS_EPSILON && rest > MASS_EPSILON {
                    p.volume_fraction = p.rest_volume_fraction / current * rest;
                    p.volume = p.rest_volume * current / rest;
                }

                debug_assert!(p.volume_fraction.is_finite());
            });
    }
}
