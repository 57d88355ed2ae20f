use crate::core::dynamics::NodeKind;
use crate::core::utils;
use crate::dynamics::{NodeId, PressureNode, Scene};
use crate::geometry::DistanceFieldUsage;
use crate::math::{Point, Real, Vector};
use parry::query::PointQuery;
use parry::shape::{Segment, Triangle};
use rayon::prelude::*;
use std::collections::VecDeque;

/// Sweep directions of the fast sweeping, `true` meaning increasing indices.
const SWEEPS: [[bool; 3]; 8] = [
    [true, true, true],
    [false, true, false],
    [false, true, true],
    [true, true, false],
    [false, false, false],
    [true, false, true],
    [true, false, false],
    [false, false, true],
];

/// Minimal radius of the liquid level set around a particle, in cells.
const PARTICLE_PHI_RADIUS: Real = 0.883644;
/// Minimal radius of the wet level set around an edge, in cells.
const EDGE_PHI_RADIUS: Real = 0.71;
/// Minimal radius of the wet level set around a face, in cells.
const FACE_PHI_RADIUS: Real = 0.51;

fn ordered(forward: bool, n: i32) -> Vec<i32> {
    if forward {
        (0..n).collect()
    } else {
        (0..n).rev().collect()
    }
}

/// Closed-form upwind solution of the eikonal equation from the smallest
/// neighbor value along each axis.
fn eikonal_update(mut m: [Real; 3], dx: Real) -> Real {
    m.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let d2 = dx * dx;
    let mut dist = m[0] + dx;

    if dist > m[1] {
        let s = (-m[0] * m[0] + 2.0 * m[0] * m[1] - m[1] * m[1] + 2.0 * d2)
            .max(0.0)
            .sqrt();
        dist = (m[0] + m[1] + s) * 0.5;

        if dist > m[2] {
            let a = ((-m[0] * m[0] + m[0] * m[1] - m[1] * m[1] + m[0] * m[2] - m[2] * m[2]
                + m[1] * m[2])
                * 2.0
                + 3.0 * d2)
                .max(0.0)
                .sqrt();
            dist = (m[0] + m[1] + m[2] + a) / 3.0;
        }
    }

    dist
}

impl Scene {
    /// Rebuilds the liquid level set from the liquid particles.
    ///
    /// Cells start at the far-field value, are lowered by every liquid
    /// particle overlapping them and are set to half a cell inside when they
    /// lie in a solid.
    pub fn update_liquid_phi(&mut self, _dt: Real) {
        let t0 = instant::now();
        let dx = self.cell_size();
        let far = 3.0 * dx;

        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for node in &mut bucket.pressure {
                node.liquid_phi = far;
                node.pressure = 0.0;
            }
        });

        if self.particles.num_fluid_particles() > 0 {
            let num_elasto = self.particles.num_elasto_particles();
            let grid = &self.nodes;
            let mut candidates: Vec<(NodeId, Real)> = self.particles.particles[num_elasto..]
                .par_iter()
                .flat_map_iter(|p| {
                    let radius = p.radii[0].max(dx * PARTICLE_PHI_RADIUS);
                    let pos = p.position;
                    p.stencils
                        .pressure
                        .iter()
                        .filter(|(_, id, _)| grid.is_active(id.bucket as usize))
                        .map(move |(_, id, _)| {
                            let np = grid.node_pos_id(NodeKind::P, id);
                            (id, (pos - np).norm() - radius)
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            candidates.par_sort_unstable_by_key(|(id, _)| *id);

            for (id, phi) in candidates {
                let node = self.nodes.pressure_node_mut(id);
                if phi < node.liquid_phi {
                    node.liquid_phi = phi;
                }
            }

            let mut buckets = std::mem::take(&mut self.nodes.buckets);
            let scene = &*self;

            buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
                if !scene.nodes.is_active(b) {
                    return;
                }

                for (n, node) in bucket.pressure.iter_mut().enumerate() {
                    let np = scene.nodes.node_pos(NodeKind::P, b, n);
                    if scene.compute_phi(&np, DistanceFieldUsage::Solid) < 0.0 {
                        node.liquid_phi = -0.5 * dx;
                    }
                }
            });

            self.nodes.buckets = buckets;

            if self.liquid.compute_viscosity {
                for kind in [
                    NodeKind::P,
                    NodeKind::X,
                    NodeKind::Y,
                    NodeKind::Z,
                    NodeKind::EdgeX,
                    NodeKind::EdgeY,
                    NodeKind::EdgeZ,
                ] {
                    self.estimate_volume_fractions(kind);
                }
            }
        }

        self.extend_liquid_phi();
        info!("- Liquid phi: {}ms", instant::now() - t0);
    }

    /// Copies the liquid level set into the combined level set and, with
    /// surface tension, extends it around the wet edges and faces.
    pub fn extend_liquid_phi(&mut self) {
        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for node in &mut bucket.pressure {
                node.combined_phi = node.liquid_phi;
                node.surf_tension = 0.0;
            }
        });

        if self.liquid.use_surf_tension {
            self.extend_phi_with_elements();
        }
    }

    /// Lowers the combined level set to the distance to every edge and face,
    /// minus their radius.
    pub(crate) fn extend_phi_with_elements(&mut self) {
        let dx = self.cell_size();
        let grid = &self.nodes;
        let particles = &self.particles.particles;
        let elements = &self.elements;
        let num_edges = elements.num_edges();
        let num_soft = (num_edges + elements.num_faces()).min(elements.gauss.len());

        let mut candidates: Vec<(NodeId, Real)> = elements.gauss[..num_soft]
            .par_iter()
            .enumerate()
            .flat_map_iter(|(g, gauss)| {
                let radius = gauss.radii[0];
                let pos = |i: usize| particles[i].position;

                gauss
                    .stencils
                    .pressure
                    .iter()
                    .filter(|(_, id, _)| grid.is_active(id.bucket as usize))
                    .map(|(_, id, _)| {
                        let np = grid.node_pos_id(NodeKind::P, id);
                        let phi = if g < num_edges {
                            let [a, b] = elements.edges[g];
                            Segment::new(pos(a), pos(b)).distance_to_local_point(&np, true)
                                - radius.max(dx * EDGE_PHI_RADIUS)
                        } else {
                            let [a, b, c] = elements.faces[g - num_edges];
                            Triangle::new(pos(a), pos(b), pos(c))
                                .distance_to_local_point(&np, true)
                                - radius.max(dx * FACE_PHI_RADIUS)
                        };
                        (id, phi)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        candidates.par_sort_unstable_by_key(|(id, _)| *id);

        for (id, phi) in candidates {
            let node = self.nodes.pressure_node_mut(id);
            if phi < node.combined_phi {
                node.combined_phi = phi;
            }
        }
    }

    /// Redistances the combined level set away from the interface with an
    /// 8-direction fast sweeping.
    ///
    /// Nodes with a sign change toward one of their face neighbors keep their
    /// value. Negative nodes not connected to such a node through negative
    /// nodes are reset to the positive far-field value.
    pub fn renormalize_liquid_phi(&mut self) {
        let t0 = instant::now();
        let dx = self.cell_size();
        let far = 3.0 * dx;
        let grid = &self.nodes;
        let dims = grid.layout.dims;
        let n = grid.num_nodes as i32;

        let mut phi: Vec<Vec<Real>> = grid
            .buckets
            .iter()
            .map(|b| b.pressure.iter().map(|n| n.combined_phi).collect())
            .collect();
        let boundary: Vec<Vec<bool>> = grid
            .buckets
            .par_iter()
            .map(|bucket| {
                bucket
                    .pressure
                    .iter()
                    .map(|node| {
                        node.pp_neighbors[..6].iter().flatten().any(|id| {
                            node.combined_phi * grid.pressure_node(*id).combined_phi <= 0.0
                        })
                    })
                    .collect()
            })
            .collect();
        let negative: Vec<Vec<bool>> = phi
            .iter()
            .map(|b| b.iter().map(|phi| *phi < 0.0).collect())
            .collect();

        phi.par_iter_mut()
            .zip(boundary.par_iter())
            .for_each(|(bucket_phi, bucket_boundary)| {
                for (phi, boundary) in bucket_phi.iter_mut().zip(bucket_boundary.iter()) {
                    *phi = if *boundary { phi.abs() } else { far };
                }
            });

        for sweep in SWEEPS.iter() {
            for bk in ordered(sweep[2], dims.z) {
                for bj in ordered(sweep[1], dims.y) {
                    for bi in ordered(sweep[0], dims.x) {
                        let b = match grid.layout.index(&Vector::new(bi, bj, bk)) {
                            Some(b) if grid.is_active(b) => b,
                            _ => continue,
                        };
                        let bucket = &grid.buckets[b];

                        for k in ordered(sweep[2], n) {
                            for j in ordered(sweep[1], n) {
                                for i in ordered(sweep[0], n) {
                                    let node_idx = grid.node_index(&Vector::new(i, j, k));
                                    if boundary[b][node_idx] {
                                        continue;
                                    }

                                    let nbh = &bucket.pressure[node_idx].pp_neighbors;
                                    let phi_at = |s: usize| {
                                        nbh[s]
                                            .map(|id| phi[id.bucket as usize][id.node as usize])
                                            .unwrap_or(far)
                                    };
                                    let m = [
                                        phi_at(0).min(phi_at(1)),
                                        phi_at(2).min(phi_at(3)),
                                        phi_at(4).min(phi_at(5)),
                                    ];
                                    let dist = eikonal_update(m, dx);
                                    let cur = &mut phi[b][node_idx];
                                    *cur = cur.min(dist);
                                }
                            }
                        }
                    }
                }
            }
        }

        // Negative nodes connected to the interface.
        let mut reached: Vec<Vec<bool>> = boundary.clone();
        let mut queue: VecDeque<NodeId> = grid
            .active_nodes()
            .filter(|id| {
                boundary[id.bucket as usize][id.node as usize]
                    && negative[id.bucket as usize][id.node as usize]
            })
            .collect();

        while let Some(id) = queue.pop_front() {
            for nb in grid.pressure_node(id).pp_neighbors[..6].iter().flatten() {
                let (nb_b, nb_n) = (nb.bucket as usize, nb.node as usize);
                if negative[nb_b][nb_n] && !reached[nb_b][nb_n] {
                    reached[nb_b][nb_n] = true;
                    queue.push_back(*nb);
                }
            }
        }

        let buckets = &mut self.nodes.buckets;
        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            for (n, node) in bucket.pressure.iter_mut().enumerate() {
                node.combined_phi = if !negative[b][n] {
                    phi[b][n]
                } else if reached[b][n] {
                    -phi[b][n]
                } else {
                    far
                };
            }
        });

        info!("- Renormalize liquid phi: {}ms", instant::now() - t0);
    }

    /// Fraction of the control volume of every `kind` node lying inside the
    /// liquid, from the level set at the eight corners of the control volume.
    pub fn estimate_volume_fractions(&mut self, kind: NodeKind) {
        let dx = self.cell_size();
        let offset = 0.5 * dx;
        let scene = &*self;

        let fractions: Vec<Vec<Real>> = (0..scene.nodes.num_buckets())
            .into_par_iter()
            .map(|b| {
                if !scene.nodes.is_active(b) {
                    return vec![];
                }

                (0..scene.nodes.nodes_per_bucket())
                    .map(|n| {
                        let centre = scene.nodes.node_pos(kind, b, n);
                        let mut corners = [0.0; 8];

                        for (c, phi) in corners.iter_mut().enumerate() {
                            let shift = Vector::new(
                                if c & 1 == 0 { -offset } else { offset },
                                if c & 2 == 0 { -offset } else { offset },
                                if c & 4 == 0 { -offset } else { offset },
                            );
                            *phi = scene.interpolate_value(&(centre + shift), |node| node.liquid_phi, dx);
                        }

                        utils::volume_fraction(corners)
                    })
                    .collect()
            })
            .collect();

        self.nodes
            .buckets
            .par_iter_mut()
            .zip(fractions.into_par_iter())
            .for_each(|(bucket, fractions)| {
                for (n, fraction) in fractions.into_iter().enumerate() {
                    match kind {
                        NodeKind::P => bucket.pressure[n].volume_fraction = fraction,
                        NodeKind::X => bucket.velocity[0][n].volume_fraction = fraction,
                        NodeKind::Y => bucket.velocity[1][n].volume_fraction = fraction,
                        NodeKind::Z => bucket.velocity[2][n].volume_fraction = fraction,
                        NodeKind::EdgeX => bucket.edges[0][n].volume_fraction = fraction,
                        NodeKind::EdgeY => bucket.edges[1][n].volume_fraction = fraction,
                        NodeKind::EdgeZ => bucket.edges[2][n].volume_fraction = fraction,
                        NodeKind::SolidPhi => {}
                    }
                }
            });
    }

    /// Trilinear interpolation of a cell-centered field at `pos`.
    ///
    /// Corners outside of the grid or in non-activated buckets take the
    /// value `default`.
    pub fn interpolate_value(
        &self,
        pos: &Point<Real>,
        field: impl Fn(&PressureNode) -> Real,
        default: Real,
    ) -> Real {
        let grid = &self.nodes;
        let local = (pos - grid.layout.origin) / grid.cell_size - NodeKind::P.offset();
        let base = local.map(|e| e.floor());
        let base_idx = base.map(|e| e as i32);
        let frac = local - base;
        let mut values = [default; 8];

        for (c, value) in values.iter_mut().enumerate() {
            let corner = base_idx + Vector::new((c & 1) as i32, ((c >> 1) & 1) as i32, (c >> 2) as i32);
            if let Some(id) = grid.node_at(&corner) {
                *value = field(grid.pressure_node(id));
            }
        }

        utils::trilerp(&values, &frac)
    }
}
