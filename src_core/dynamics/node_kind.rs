use crate::math::{Real, Vector};
use na::vector;

/// The staggered node families living in every bucket.
///
/// Each family shares the same `n³` lattice of a bucket and only differs by
/// its offset (in cell units) from the bucket-local lattice corner.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Cell corners, carrying the solid signed distance.
    SolidPhi,
    /// Face centers normal to X.
    X,
    /// Face centers normal to Y.
    Y,
    /// Face centers normal to Z.
    Z,
    /// Cell centers (pressure, level set, saturation).
    P,
    /// Edge centers along X (viscosity stencils).
    EdgeX,
    /// Edge centers along Y.
    EdgeY,
    /// Edge centers along Z.
    EdgeZ,
}

impl NodeKind {
    pub const VELOCITY: [NodeKind; 3] = [NodeKind::X, NodeKind::Y, NodeKind::Z];
    pub const EDGES: [NodeKind; 3] = [NodeKind::EdgeX, NodeKind::EdgeY, NodeKind::EdgeZ];

    /// The velocity node family storing the `axis`-th velocity component.
    #[inline]
    pub fn velocity(axis: usize) -> Self {
        Self::VELOCITY[axis]
    }

    /// Offset of this node family, in cell units.
    #[inline]
    pub fn offset(self) -> Vector<Real> {
        match self {
            NodeKind::SolidPhi => vector![0.0, 0.0, 0.0],
            NodeKind::X => vector![0.0, 0.5, 0.5],
            NodeKind::Y => vector![0.5, 0.0, 0.5],
            NodeKind::Z => vector![0.5, 0.5, 0.0],
            NodeKind::P => vector![0.5, 0.5, 0.5],
            NodeKind::EdgeX => vector![0.5, 0.0, 0.0],
            NodeKind::EdgeY => vector![0.0, 0.5, 0.0],
            NodeKind::EdgeZ => vector![0.0, 0.0, 0.5],
        }
    }
}

/// Solid/fluid classification of a velocity node for the viscosity solve.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    Fluid = 0,
    Solid = 1,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Fluid
    }
}
