pub use self::grid_solver_hooks::GridSolverHooks;
pub use crate::core::dynamics::solver::{
    ElasticParameters, LiquidParameters, QuadraticKernel, SceneParameters,
};

mod distribute;
mod elements;
mod grid_solver_hooks;
mod grid_to_particle;
mod intersection;
mod liquid_phi;
mod node_graph;
mod particle_to_grid;
mod population;
mod porous;
mod sampling;
mod scripting;
mod solid;
mod surface_tension;
mod weights;
