pub use self::node_kind::{NodeKind, NodeState};
pub use self::particle_class::{FixedFlags, InsideStatus, ParticleClass};

mod node_kind;
mod particle_class;
pub mod solver;
