pub extern crate nalgebra as na;
pub extern crate parry3d_f64 as parry;
pub extern crate wetcloth3d_core;

#[macro_use]
extern crate log;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

pub use wetcloth3d_core as core;

pub mod prelude {
    pub use crate::dynamics::solver::*;
    pub use crate::dynamics::*;
    pub use crate::geometry::*;
    pub use crate::math::*;
    pub use crate::pipelines::*;
}

pub mod math {
    pub use crate::core::math::*;
}

pub mod dynamics;
pub mod geometry;
pub mod pipelines;
pub mod utils;
