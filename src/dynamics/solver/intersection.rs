use crate::core::utils;
use crate::dynamics::{CohesionPair, GaussKind, Scene};
use crate::math::{Point, Real, Vector, MASS_EPSILON};
use parry::query::PointQueryWithLocation;
use parry::shape::{Segment, Triangle};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Cosine of the largest angle between a search ray and a candidate.
const SEARCH_COS: Real = 0.866;
const MAX_CONTACT_ANGLE: Real = 1.35;

/// Closest point of a Gauss point's element to `pt`, with its barycentric
/// coordinates and squared distance.
fn closest_on_element(scene: &Scene, g: usize, pt: &Point<Real>) -> (Point<Real>, Vector<Real>, Real) {
    let particles = &scene.particles.particles;
    let elements = &scene.elements;

    match elements.gauss_kind(g) {
        GaussKind::Edge(e) => {
            let [a, b] = elements.edges[e];
            let segment = Segment::new(particles[a].position, particles[b].position);
            let (proj, location) = segment.project_local_point_and_get_location(pt, false);
            let [u, v] = location.barycentric_coordinates();
            (proj.point, Vector::new(u, v, 0.0), na::distance_squared(pt, &proj.point))
        }
        GaussKind::Face(f) => {
            let [a, b, c] = elements.faces[f];
            let triangle = Triangle::new(particles[a].position, particles[b].position, particles[c].position);
            let (proj, location) = triangle.project_local_point_and_get_location(pt, false);
            let bary = location
                .barycentric_coordinates()
                .map(|[u, v, w]| Vector::new(u, v, w))
                .unwrap_or_else(|| Vector::repeat(1.0 / 3.0));
            (proj.point, bary, na::distance_squared(pt, &proj.point))
        }
        GaussKind::Surfel(_) => {
            let hit = elements.gauss[g].position;
            (hit, Vector::x(), na::distance_squared(pt, &hit))
        }
    }
}

impl Scene {
    /// Finds the capillary bridges between wet elements.
    ///
    /// Every wet edge (resp. face) casts rays along its two normals (resp. its
    /// normal) in both directions, and keeps the closest element within 30°
    /// of each ray. A bridge is kept when the liquid fills between 40% and
    /// 60% of the gap. Mutual bridges count half each.
    pub fn update_intersection(&mut self) {
        let t0 = instant::now();
        let num_gauss = self.elements.gauss.len();
        let num_edges = self.elements.num_edges();
        let num_soft = (num_edges + self.elements.num_faces()).min(num_gauss);

        if !self.liquid.use_cohesion
            || self.liquid.surf_tension_coeff == 0.0
            || self.liquid.cohesion_coeff == 0.0
            || self.particles.num_fluid_particles() == 0
        {
            self.elements.cohesion = vec![vec![]; num_gauss];
            return;
        }

        self.sort_gauss_buckets();

        let scene = &*self;
        let liquid = &scene.liquid;
        let elements = &scene.elements;
        let gauss = &elements.gauss;
        let buckets = &scene.gauss_buckets;
        let layout = *buckets.layout();
        let dx = scene.cell_size();
        let cell_volume = dx * dx * dx;

        let mut cohesion: Vec<Vec<CohesionPair>> = (0..num_gauss)
            .into_par_iter()
            .map(|g| {
                let gp = &gauss[g];
                if g >= num_soft || gp.fluid_volume < MASS_EPSILON {
                    return vec![];
                }

                let n1 = gp.normal_frame.column(1).into_owned();
                let n2 = gp.normal_frame.column(2).into_owned();
                let dirs = if g < num_edges {
                    vec![n1, n2, -n1, -n2]
                } else {
                    vec![n2, -n2]
                };

                let mut best: Vec<Option<(usize, Real, Point<Real>, Vector<Real>)>> = vec![None; dirs.len()];

                buckets.for_each_neighbor_item(layout.clamped_index_of(&gp.position), |ng| {
                    if ng == g || ng >= num_gauss {
                        return;
                    }

                    let is_solid = ng >= num_soft;
                    if (is_solid && !liquid.solid_cohesion) || (!is_solid && !liquid.soft_cohesion) {
                        return;
                    }

                    let delta = gauss[ng].position - gp.position;
                    let len = delta.norm();
                    if len < MASS_EPSILON {
                        return;
                    }
                    let dir = delta / len;

                    if is_solid && dir.dot(&elements.surfel_normals[ng - num_soft]) < SEARCH_COS {
                        return;
                    }

                    let r = match dirs.iter().position(|d| dir.dot(d) >= SEARCH_COS) {
                        Some(r) => r,
                        None => return,
                    };

                    let (hit, bary, dist2) = closest_on_element(scene, ng, &gp.position);
                    if best[r].map(|b| dist2 < b.1).unwrap_or(true) {
                        best[r] = Some((ng, dist2, hit, bary));
                    }
                });

                dirs.iter()
                    .zip(best.into_iter())
                    .filter_map(|(dir, best)| {
                        let (target, dist2, hit, barycentric) = best?;
                        let weight = if target < num_edges {
                            dir.cross(&gauss[target].normal_frame.column(0)).norm()
                        } else {
                            dir.dot(&gauss[target].normal_frame.column(2)).abs()
                        };

                        Some(CohesionPair {
                            target,
                            origin: g,
                            dir: *dir,
                            hit,
                            barycentric,
                            dist: dist2.sqrt(),
                            weight,
                            volume_fraction: 0.0,
                            c0: 0.0,
                            c1: 0.0,
                        })
                    })
                    .collect()
            })
            .collect();

        cohesion.par_iter_mut().enumerate().for_each(|(g, pairs)| {
            if pairs.is_empty() {
                return;
            }

            let gp = &gauss[g];
            let psi = gp.volume_fraction;
            let sat = (gp.fluid_volume / ((1.0 - psi) * gp.volume)).max(0.0).min(1.0);
            let wet_cos = psi * liquid.rest_contact_angle.cos() + (1.0 - psi) * (2.0 * sat - 1.0);
            let wet_sin = (1.0 - wet_cos * wet_cos).max(0.0).sqrt();
            let theta = wet_sin.atan2(wet_cos).max(0.0).min(MAX_CONTACT_ANGLE);
            let equivalent_length = if g >= num_edges {
                (elements.face_rest_area[g - num_edges] / PI).sqrt()
            } else {
                elements.edge_rest_length[g]
            };
            let liquid_phi = |pos: &Point<Real>| scene.interpolate_value(pos, |node| node.liquid_phi, 3.0 * dx);

            for pair in pairs.iter_mut() {
                let num_steps = ((pair.dist / dx).ceil() as usize + 1).max(2);
                let ds = pair.dist / (num_steps - 1) as Real;

                let mut volume_fraction = gp.fluid_volume / (cell_volume - gp.volume).max(MASS_EPSILON)
                    + gauss[pair.target].fluid_volume / (cell_volume - gauss[pair.target].volume).max(MASS_EPSILON);
                let mut phi = liquid_phi(&gp.position);
                if phi > 0.0 {
                    continue;
                }

                for r in 1..num_steps {
                    let phi_next = liquid_phi(&(gp.position + pair.dir * (ds * r as Real)));
                    volume_fraction += utils::fraction_inside(phi, phi_next);
                    phi = phi_next;
                }

                pair.volume_fraction = volume_fraction / (num_steps + 2) as Real;
                pair.c0 = 0.0;
                pair.c1 = equivalent_length * liquid.surf_tension_coeff * PI * (PI - 2.0 * theta) / theta.cos()
                    * liquid.cohesion_coeff;
            }

            pairs.retain(|pair| pair.volume_fraction >= 0.4 && pair.volume_fraction <= 0.6);
        });

        // Mutual bridges.
        let targets: Vec<Vec<usize>> = cohesion.iter().map(|pairs| pairs.iter().map(|p| p.target).collect()).collect();
        cohesion.par_iter_mut().enumerate().for_each(|(g, pairs)| {
            for pair in pairs.iter_mut() {
                if targets[pair.target].contains(&g) {
                    pair.weight *= 0.5;
                }
            }
        });

        let num_pairs: usize = cohesion.iter().map(|pairs| pairs.len()).sum();
        self.elements.cohesion = cohesion;

        info!("- Intersection: {}ms ({} bridges)", instant::now() - t0, num_pairs);
    }
}
