pub use self::element_set::{CohesionPair, ElementSet, GaussKind, GaussPoint, GaussStencils};
pub use self::groups::{GroupTransform, GroupTransforms};
pub use self::node_grid::{
    EdgeNode, NodeBucket, NodeGrid, NodeId, NodeParticle, PressureNode, VelocityNode, PP_SHIFTS,
};
pub use self::particle::{NodeStencil, Particle, ParticleStencils};
pub use self::particle_set::{ParticleKind, ParticleSet};
pub use self::scene::Scene;
pub use crate::core::dynamics::{FixedFlags, InsideStatus, NodeKind, NodeState, ParticleClass};

pub(crate) use self::scene::RandomStream;

mod element_set;
mod groups;
mod node_grid;
mod particle;
mod particle_set;
mod scene;
pub mod solver;
