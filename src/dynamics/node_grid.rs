use crate::core::dynamics::{NodeKind, NodeState};
use crate::geometry::BucketLayout;
use crate::math::{Point, Real, Vector};
use na::vector;

/// Identifies a node of an activated bucket.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeId {
    pub bucket: u32,
    pub node: u32,
}

impl NodeId {
    #[inline]
    pub fn new(bucket: usize, node: usize) -> Self {
        Self {
            bucket: bucket as u32,
            node: node as u32,
        }
    }

    /// Packs the node into a single integer, bucket in the high bits.
    #[inline]
    pub fn packed(self) -> u64 {
        (self.bucket as u64) << 32 | self.node as u64
    }
}

/// A particle touching a node, and the footprint slot the node occupies in the
/// particle's stencil.
pub type NodeParticle = (usize, u8);

/// A face-centered node carrying one component of the velocity.
#[derive(Clone, Debug, Default)]
pub struct VelocityNode {
    /// Elastic (plus carried liquid) mass.
    pub mass: Real,
    pub velocity: Real,
    /// Solid and elasto-captured liquid volume.
    pub volume: Real,
    pub fluid_mass: Real,
    pub fluid_velocity: Real,
    pub fluid_volume: Real,
    pub saved_fluid_velocity: Real,
    /// Solid volume fraction.
    pub psi: Real,
    pub saturation: Real,
    pub shape_factor: Real,
    pub orientation: Vector<Real>,
    /// Velocity of the closest solid distance field.
    pub solid_velocity: Real,
    /// Open fraction of the cell face, 0 when fully covered by solids.
    pub solid_weight: Real,
    pub state: NodeState,
    /// Liquid volume fraction of the control volume (viscosity).
    pub volume_fraction: Real,
    pub pure_fluid_volume: Real,
    pub raw_weight: Real,
    /// Cell-centered nodes at `-½` and `+½` cell along the axis.
    pub pressure_neighbors: [Option<NodeId>; 2],
    /// The four solid-phi corners of the face.
    pub solid_phi_neighbors: [Option<NodeId>; 4],
    /// The four edge nodes around the face (viscosity stencils).
    pub edge_neighbors: [Option<NodeId>; 4],
    pub particles: Vec<NodeParticle>,
}

/// A cell-centered node.
#[derive(Clone, Debug, Default)]
pub struct PressureNode {
    pub liquid_phi: Real,
    /// Liquid phi extended by the wet elements.
    pub combined_phi: Real,
    pub pressure: Real,
    pub surf_tension: Real,
    pub curvature: Real,
    /// Connected component of the sign-change boundary, 0 when none.
    pub color: usize,
    pub psi: Real,
    pub saturation: Real,
    pub pore_pressure: Real,
    pub cell_solid_phi: Real,
    pub volume_fraction: Real,
    /// The 18 neighbors sharing a face or an edge, see [`PP_SHIFTS`].
    pub pp_neighbors: [Option<NodeId>; 18],
    /// The six surrounding velocity nodes, `[x-, x+, y-, y+, z-, z+]`.
    pub velocity_neighbors: [Option<NodeId>; 6],
    pub particles: Vec<NodeParticle>,
}

/// An edge-centered node used by the viscosity stencils.
#[derive(Copy, Clone, Debug, Default)]
pub struct EdgeNode {
    pub volume_fraction: Real,
    pub state: NodeState,
}

/// The node storage of one bucket, empty while the bucket is not activated.
#[derive(Clone, Debug, Default)]
pub struct NodeBucket {
    pub velocity: [Vec<VelocityNode>; 3],
    pub pressure: Vec<PressureNode>,
    pub solid_phi: Vec<Real>,
    pub edges: [Vec<EdgeNode>; 3],
}

impl NodeBucket {
    pub fn allocate(&mut self, num_nodes: usize, with_edges: bool) {
        for axis in 0..3 {
            self.velocity[axis].clear();
            self.velocity[axis].resize(num_nodes, VelocityNode::default());

            self.edges[axis].clear();
            if with_edges {
                self.edges[axis].resize(num_nodes, EdgeNode::default());
            }
        }
        self.pressure.clear();
        self.pressure.resize(num_nodes, PressureNode::default());
        self.solid_phi.clear();
        self.solid_phi.resize(num_nodes, 0.0);
    }

    pub fn release(&mut self) {
        *self = NodeBucket::default();
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        !self.pressure.is_empty()
    }
}

/// Shifts of the 18 pressure-node neighbors: 6 face neighbors then 12 edge
/// neighbors.
pub const PP_SHIFTS: [[i32; 3]; 18] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
    [-1, -1, 0],
    [1, -1, 0],
    [-1, 1, 0],
    [1, 1, 0],
    [-1, 0, -1],
    [1, 0, -1],
    [0, -1, -1],
    [0, 1, -1],
    [-1, 0, 1],
    [1, 0, 1],
    [0, -1, 1],
    [0, 1, 1],
];

/// The staggered node lattice of every bucket of the scene.
#[derive(Clone, Debug)]
pub struct NodeGrid {
    pub layout: BucketLayout,
    /// Nodes per bucket along each axis.
    pub num_nodes: usize,
    pub cell_size: Real,
    pub buckets: Vec<NodeBucket>,
    pub activated: Vec<bool>,
}

impl NodeGrid {
    pub fn new(layout: BucketLayout, num_nodes: usize) -> Self {
        Self {
            layout,
            num_nodes,
            cell_size: layout.bucket_size / num_nodes as Real,
            buckets: vec![NodeBucket::default(); layout.len()],
            activated: vec![false; layout.len()],
        }
    }

    /// Number of nodes of each family in one bucket.
    #[inline]
    pub fn nodes_per_bucket(&self) -> usize {
        self.num_nodes * self.num_nodes * self.num_nodes
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn is_active(&self, bucket: usize) -> bool {
        self.activated[bucket]
    }

    #[inline]
    pub fn num_active_buckets(&self) -> usize {
        self.activated.iter().filter(|a| **a).count()
    }

    #[inline]
    pub fn node_index(&self, local: &Vector<i32>) -> usize {
        let n = self.num_nodes as i32;
        (local.z * n * n + local.y * n + local.x) as usize
    }

    #[inline]
    pub fn node_local(&self, node: usize) -> Vector<i32> {
        let n = self.num_nodes as i32;
        let i = node as i32;
        vector![i % n, (i / n) % n, i / (n * n)]
    }

    /// Node coordinates in the global lattice spanning all the buckets.
    #[inline]
    pub fn global_node(&self, bucket: usize, node: usize) -> Vector<i32> {
        self.layout.handle(bucket) * self.num_nodes as i32 + self.node_local(node)
    }

    /// The node at the given global lattice coordinates, if it lies in the grid.
    ///
    /// The bucket may not be activated.
    #[inline]
    pub fn node_in_grid(&self, global: &Vector<i32>) -> Option<NodeId> {
        let n = self.num_nodes as i32;
        let handle = global.map(|e| e.div_euclid(n));
        let local = global.map(|e| e.rem_euclid(n));
        let bucket = self.layout.index(&handle)?;
        Some(NodeId::new(bucket, self.node_index(&local)))
    }

    /// The node at the given global lattice coordinates, if its bucket is activated.
    #[inline]
    pub fn node_at(&self, global: &Vector<i32>) -> Option<NodeId> {
        self.node_in_grid(global)
            .filter(|id| self.activated[id.bucket as usize])
    }

    /// The node shifted by `shift` from `id`, wrapping across buckets.
    #[inline]
    pub fn offset_node(&self, id: NodeId, shift: &Vector<i32>) -> Option<NodeId> {
        self.node_at(&(self.global_node(id.bucket as usize, id.node as usize) + shift))
    }

    /// World position of a node given its global lattice coordinates.
    ///
    /// Valid for nodes of non-activated buckets as well.
    #[inline]
    pub fn node_pos_from_global(&self, kind: NodeKind, global: &Vector<i32>) -> Point<Real> {
        self.layout.origin + (global.cast::<Real>() + kind.offset()) * self.cell_size
    }

    /// World position of a node of the given family.
    #[inline]
    pub fn node_pos(&self, kind: NodeKind, bucket: usize, node: usize) -> Point<Real> {
        self.node_pos_from_global(kind, &self.global_node(bucket, node))
    }

    #[inline]
    pub fn node_pos_id(&self, kind: NodeKind, id: NodeId) -> Point<Real> {
        self.node_pos(kind, id.bucket as usize, id.node as usize)
    }

    #[inline]
    pub fn velocity_node(&self, axis: usize, id: NodeId) -> &VelocityNode {
        &self.buckets[id.bucket as usize].velocity[axis][id.node as usize]
    }

    #[inline]
    pub fn velocity_node_mut(&mut self, axis: usize, id: NodeId) -> &mut VelocityNode {
        &mut self.buckets[id.bucket as usize].velocity[axis][id.node as usize]
    }

    #[inline]
    pub fn pressure_node(&self, id: NodeId) -> &PressureNode {
        &self.buckets[id.bucket as usize].pressure[id.node as usize]
    }

    #[inline]
    pub fn pressure_node_mut(&mut self, id: NodeId) -> &mut PressureNode {
        &mut self.buckets[id.bucket as usize].pressure[id.node as usize]
    }

    #[inline]
    pub fn solid_phi(&self, id: NodeId) -> Real {
        self.buckets[id.bucket as usize].solid_phi[id.node as usize]
    }

    #[inline]
    pub fn edge_node(&self, axis: usize, id: NodeId) -> &EdgeNode {
        &self.buckets[id.bucket as usize].edges[axis][id.node as usize]
    }

    /// Iterates through the ids of all the nodes of the activated buckets.
    pub fn active_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        let nnodes = self.nodes_per_bucket();
        self.activated
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .flat_map(move |(bucket, _)| (0..nnodes).map(move |node| NodeId::new(bucket, node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point;

    fn grid() -> NodeGrid {
        let layout = BucketLayout::new(Point::origin(), 1.0, vector![2, 2, 2]);
        let mut grid = NodeGrid::new(layout, 4);
        grid.activated.iter_mut().for_each(|a| *a = true);
        grid
    }

    #[test]
    fn offset_wraps_across_buckets() {
        let grid = grid();
        let id = NodeId::new(0, grid.node_index(&vector![3, 0, 0]));
        let next = grid.offset_node(id, &vector![1, 0, 0]).unwrap();
        assert_eq!(next.bucket, 1);
        assert_eq!(grid.node_local(next.node as usize), vector![0, 0, 0]);
        assert_eq!(grid.offset_node(id, &vector![0, -1, 0]), None);
    }

    #[test]
    fn analytic_positions() {
        let grid = grid();
        let p = grid.node_pos(NodeKind::P, 1, 0);
        assert!((p - Point::new(1.125, 0.125, 0.125)).norm() < 1.0e-12);
        let x = grid.node_pos(NodeKind::X, 0, grid.node_index(&vector![1, 0, 0]));
        assert!((x - Point::new(0.25, 0.125, 0.125)).norm() < 1.0e-12);
    }
}
