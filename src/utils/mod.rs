pub use self::sphere_pattern::{SpherePattern, MAX_SPLIT};
pub use crate::core::utils::*;

mod sphere_pattern;
