use crate::core::dynamics::{InsideStatus, NodeKind};
use crate::dynamics::{NodeGrid, NodeId, NodeStencil, ParticleStencils, Scene, PP_SHIFTS};
use crate::dynamics::GaussStencils;
use crate::geometry::{BucketGrid, BucketLayout, NBH_SHIFTS};
use crate::math::{Kernel, Point, Real, Vector};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// The 27 nodes of the `kind` family around `pos`, marking their buckets as
/// activated when `activated` is given.
pub(crate) fn locate_nodes(
    grid: &NodeGrid,
    kind: NodeKind,
    pos: &Point<Real>,
    activated: Option<&[AtomicBool]>,
) -> [Option<NodeId>; 27] {
    let local = (pos - grid.layout.origin) / grid.cell_size - kind.offset();
    let low = local.map(Kernel::window_start);
    let mut nodes = [None; 27];

    for k in 0..3 {
        for j in 0..3 {
            for i in 0..3 {
                let global = low + Vector::new(i, j, k);
                let node = grid.node_in_grid(&global);

                if let (Some(id), Some(activated)) = (node, activated) {
                    activated[id.bucket as usize].store(true, Ordering::Relaxed);
                }

                nodes[(k * 9 + j * 3 + i) as usize] = node;
            }
        }
    }

    nodes
}

fn particle_stencil_mut(stencils: &mut ParticleStencils, kind: NodeKind) -> Option<&mut NodeStencil> {
    match kind {
        NodeKind::X => Some(&mut stencils.velocity[0]),
        NodeKind::Y => Some(&mut stencils.velocity[1]),
        NodeKind::Z => Some(&mut stencils.velocity[2]),
        NodeKind::SolidPhi => Some(&mut stencils.solid_phi),
        NodeKind::P => Some(&mut stencils.pressure),
        _ => None,
    }
}

fn gauss_stencil_mut(stencils: &mut GaussStencils, kind: NodeKind) -> Option<&mut NodeStencil> {
    match kind {
        NodeKind::X => Some(&mut stencils.velocity[0]),
        NodeKind::Y => Some(&mut stencils.velocity[1]),
        NodeKind::Z => Some(&mut stencils.velocity[2]),
        NodeKind::P => Some(&mut stencils.pressure),
        _ => None,
    }
}

impl Scene {
    /// Bounding box of all the particles, snapped to multiples of two buckets.
    pub fn update_particle_bounding_box(&mut self) {
        if self.particles.is_empty() {
            self.bbox_min = Point::origin();
            self.bbox_max = Point::origin();
            return;
        }

        let (min, max) = self
            .particles
            .particles
            .par_iter()
            .map(|p| (p.position, p.position))
            .reduce(
                || {
                    (
                        Point::from(Vector::repeat(Real::MAX)),
                        Point::from(Vector::repeat(-Real::MAX)),
                    )
                },
                |a, b| (a.0.inf(&b.0), a.1.sup(&b.1)),
            );

        let snap = 2.0 * self.bucket_size();
        self.bbox_min = min.map(|e| (e / snap).floor() * snap);
        self.bbox_max = max.map(|e| (e / snap).ceil() * snap);
    }

    /// Rebuilds the bucket grid around the particles and re-sorts particles and
    /// Gauss points into it. All the buckets end up deactivated.
    pub fn rebucketize_particles(&mut self) {
        let t0 = instant::now();
        self.update_particle_bounding_box();

        let bucket_size = self.bucket_size();
        let dx = self.cell_size();
        let border = self.params.border_buckets as Real * bucket_size;
        let content = self.bbox_max - self.bbox_min + Vector::repeat(2.0 * border);
        let dims = content.map(|c| {
            let cells = (c / dx).ceil().max(1.0);
            ((cells * dx / bucket_size).ceil() as i32).max(1)
        });
        let origin = self.bbox_min - Vector::repeat(border);
        let layout = BucketLayout::new(origin, bucket_size, dims);

        self.particle_buckets = BucketGrid::with_layout(layout);
        self.gauss_buckets = BucketGrid::with_layout(layout);
        self.sort_particle_buckets();
        self.sort_gauss_buckets();
        self.nodes = NodeGrid::new(layout, self.params.num_nodes);

        info!(
            "- Rebucketize: {}ms ({}x{}x{} buckets)",
            instant::now() - t0,
            dims.x,
            dims.y,
            dims.z
        );
    }

    pub fn pre_allocate_nodes(&mut self) {
        let num_buckets = self.nodes.layout.len();
        self.nodes.activated.clear();
        self.nodes.activated.resize(num_buckets, false);
        self.nodes.buckets.resize(num_buckets, Default::default());
    }

    /// Locates the `kind` nodes around every particle, activating the buckets
    /// touched by non-surfel particles.
    pub fn find_nodes(&mut self, kind: NodeKind) {
        let activated: Vec<_> = self
            .nodes
            .activated
            .iter()
            .map(|a| AtomicBool::new(*a))
            .collect();
        let grid = &self.nodes;

        self.particles.particles.par_iter_mut().for_each(|p| {
            let activate = p.surfel.is_none();
            if let Some(stencil) = particle_stencil_mut(&mut p.stencils, kind) {
                stencil.clear();
                stencil.nodes =
                    locate_nodes(grid, kind, &p.position, activate.then(|| &activated[..]));
            }
        });

        self.nodes.activated = activated.into_iter().map(|a| a.into_inner()).collect();
    }

    /// Locates the `kind` nodes around every Gauss point, activating the
    /// buckets touched by edges and faces.
    pub fn find_gauss_nodes(&mut self, kind: NodeKind) {
        let activated: Vec<_> = self
            .nodes
            .activated
            .iter()
            .map(|a| AtomicBool::new(*a))
            .collect();
        let grid = &self.nodes;
        let num_soft = self.elements.num_edges() + self.elements.num_faces();

        self.elements
            .gauss
            .par_iter_mut()
            .enumerate()
            .for_each(|(g, gauss)| {
                let activate = g < num_soft;
                if let Some(stencil) = gauss_stencil_mut(&mut gauss.stencils, kind) {
                    stencil.clear();
                    stencil.nodes = locate_nodes(
                        grid,
                        kind,
                        &gauss.position,
                        activate.then(|| &activated[..]),
                    );
                }
            });

        self.nodes.activated = activated.into_iter().map(|a| a.into_inner()).collect();
    }

    /// Dilates the set of activated buckets by `layers` rings of buckets.
    pub fn expand_fluid_nodes_marked(&mut self, layers: usize) {
        let layout = self.nodes.layout;

        for _ in 0..layers {
            let backup = self.nodes.activated.clone();

            self.nodes
                .activated
                .par_iter_mut()
                .enumerate()
                .for_each(|(b, active)| {
                    if *active {
                        return;
                    }

                    let handle = layout.handle(b);
                    *active = NBH_SHIFTS.iter().any(|shift| {
                        layout
                            .index(&(handle + shift))
                            .map(|nb| backup[nb])
                            .unwrap_or(false)
                    });
                });
        }
    }

    /// Allocates the node storage of the activated buckets and frees the others.
    pub fn generate_nodes(&mut self) {
        let num_nodes = self.nodes.nodes_per_bucket();
        let with_edges = self.liquid.compute_viscosity;
        let activated = &self.nodes.activated;

        self.nodes
            .buckets
            .par_iter_mut()
            .zip(activated.par_iter())
            .for_each(|(bucket, active)| {
                if *active {
                    bucket.allocate(num_nodes, with_edges)
                } else {
                    bucket.release()
                }
            });
    }

    /// Links every velocity node to the four solid-phi corners of its face.
    ///
    /// Slot `2r + s` of an X node holds the corner `(i, j + s, k + r)`, of a
    /// Y node `(i + r, j, k + s)` and of a Z node `(i + r, j + s, k)`.
    pub fn connect_solid_phi_nodes(&mut self) {
        let mut buckets = std::mem::take(&mut self.nodes.buckets);
        let grid = &self.nodes;

        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            if !grid.is_active(b) {
                return;
            }

            for axis in 0..3 {
                for (n, node) in bucket.velocity[axis].iter_mut().enumerate() {
                    let global = grid.global_node(b, n);

                    for r in 0..2 {
                        for s in 0..2 {
                            let shift = match axis {
                                0 => Vector::new(0, s, r),
                                1 => Vector::new(r, 0, s),
                                _ => Vector::new(r, s, 0),
                            };
                            node.solid_phi_neighbors[(r * 2 + s) as usize] =
                                grid.node_at(&(global + shift));
                        }
                    }
                }
            }
        });

        self.nodes.buckets = buckets;
    }

    /// Links the cell-centered nodes to their 18 neighbors and 6 faces, and
    /// every velocity node to the two cells it separates.
    pub fn connect_pressure_nodes(&mut self) {
        let mut buckets = std::mem::take(&mut self.nodes.buckets);
        let grid = &self.nodes;

        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            if !grid.is_active(b) {
                return;
            }

            for (n, node) in bucket.pressure.iter_mut().enumerate() {
                let global = grid.global_node(b, n);

                for (k, shift) in PP_SHIFTS.iter().enumerate() {
                    node.pp_neighbors[k] = grid.node_at(&(global + Vector::from(*shift)));
                }

                for axis in 0..3 {
                    for r in 0..2 {
                        let mut shift = Vector::zeros();
                        shift[axis] = r;
                        node.velocity_neighbors[axis * 2 + r as usize] =
                            grid.node_at(&(global + shift));
                    }
                }
            }

            for axis in 0..3 {
                for (n, node) in bucket.velocity[axis].iter_mut().enumerate() {
                    let global = grid.global_node(b, n);
                    let mut shift = Vector::zeros();
                    shift[axis] = -1;
                    node.pressure_neighbors = [grid.node_at(&(global + shift)), grid.node_at(&global)];
                }
            }
        });

        self.nodes.buckets = buckets;
    }

    /// Links every velocity node to the four edge nodes around it.
    ///
    /// X nodes see EdgeY `(i, j, k + r)` then EdgeZ `(i, j + r, k)`; Y nodes
    /// EdgeX `(i, j, k + r)` then EdgeZ `(i + r, j, k)`; Z nodes EdgeX
    /// `(i, j + r, k)` then EdgeY `(i + r, j, k)`.
    pub fn connect_edge_nodes(&mut self) {
        let mut buckets = std::mem::take(&mut self.nodes.buckets);
        let grid = &self.nodes;

        buckets.par_iter_mut().enumerate().for_each(|(b, bucket)| {
            if !grid.is_active(b) {
                return;
            }

            for axis in 0..3 {
                for (n, node) in bucket.velocity[axis].iter_mut().enumerate() {
                    let global = grid.global_node(b, n);

                    for r in 0..2 {
                        let (first, second) = match axis {
                            0 => (Vector::new(0, 0, r), Vector::new(0, r, 0)),
                            1 => (Vector::new(0, 0, r), Vector::new(r, 0, 0)),
                            _ => (Vector::new(0, r, 0), Vector::new(r, 0, 0)),
                        };
                        node.edge_neighbors[r as usize] = grid.node_at(&(global + first));
                        node.edge_neighbors[2 + r as usize] = grid.node_at(&(global + second));
                    }
                }
            }
        });

        self.nodes.buckets = buckets;
    }

    /// Classifies particles by how much of their velocity footprint lies in
    /// activated buckets.
    pub fn mark_inside_out(&mut self) {
        let grid = &self.nodes;

        self.particles.particles.par_iter_mut().for_each(|p| {
            let mut total = 0;
            let mut inside = 0;

            for stencil in &p.stencils.velocity {
                for node in &stencil.nodes {
                    total += 1;
                    if node.map(|id| grid.is_active(id.bucket as usize)) == Some(true) {
                        inside += 1;
                    }
                }
            }

            p.inside = if inside == total {
                InsideStatus::Inside
            } else if inside > 0 {
                InsideStatus::Boundary
            } else {
                InsideStatus::Outside
            };
        });
    }

    /// Resets the freshly allocated nodes to the far-field state.
    pub fn post_allocate_nodes(&mut self) {
        let far = 3.0 * self.cell_size();

        self.nodes.buckets.par_iter_mut().for_each(|bucket| {
            for node in &mut bucket.pressure {
                node.liquid_phi = far;
                node.combined_phi = far;
                node.cell_solid_phi = far;
            }
            for phi in &mut bucket.solid_phi {
                *phi = far;
            }
            for axis in 0..3 {
                for node in &mut bucket.velocity[axis] {
                    node.solid_weight = 1.0;
                }
            }
        });
    }

    /// Rebuilds the activated node graph around the current particles and
    /// Gauss points.
    pub fn resample_nodes(&mut self) {
        let t0 = instant::now();

        self.pre_allocate_nodes();

        for kind in [
            NodeKind::X,
            NodeKind::Y,
            NodeKind::Z,
            NodeKind::SolidPhi,
            NodeKind::P,
        ] {
            self.find_nodes(kind);
        }

        for kind in [NodeKind::X, NodeKind::Y, NodeKind::Z] {
            self.find_gauss_nodes(kind);
        }
        if self.liquid.use_surf_tension {
            self.find_gauss_nodes(NodeKind::P);
        }

        self.expand_fluid_nodes_marked(self.liquid.expanded_layers);
        self.generate_nodes();
        self.connect_solid_phi_nodes();
        self.connect_pressure_nodes();
        if self.liquid.compute_viscosity {
            self.connect_edge_nodes();
        }
        self.mark_inside_out();
        self.post_allocate_nodes();

        info!(
            "- Resample nodes: {}ms ({} active buckets)",
            instant::now() - t0,
            self.nodes.num_active_buckets()
        );
    }

    /// World position of a node from its bucket coordinates, valid for
    /// buckets outside of the grid or not activated.
    pub fn node_pos_from_bucket(
        &self,
        handle: &Vector<i32>,
        local: &Vector<i32>,
        kind: NodeKind,
    ) -> Point<Real> {
        let global = handle * self.params.num_nodes as i32 + local;
        self.nodes.node_pos_from_global(kind, &global)
    }

    #[inline]
    pub fn node_pos(&self, kind: NodeKind, bucket: usize, node: usize) -> Point<Real> {
        self.nodes.node_pos(kind, bucket, node)
    }
}
