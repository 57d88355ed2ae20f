pub use self::kernel::QuadraticKernel;
pub use self::liquid_parameters::LiquidParameters;
pub use self::material_parameters::ElasticParameters;
pub use self::scene_parameters::SceneParameters;

mod kernel;
mod liquid_parameters;
mod material_parameters;
mod scene_parameters;
