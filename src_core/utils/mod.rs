pub use self::frames::*;
pub use self::level_set::*;
pub use self::physics::*;

mod frames;
mod level_set;
mod physics;
