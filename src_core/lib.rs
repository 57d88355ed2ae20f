pub extern crate nalgebra as na;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

pub mod prelude {
    pub use crate::dynamics::solver::*;
    pub use crate::dynamics::*;
    pub use crate::math::*;
}

pub mod math {
    pub use super::scalar_math::math::*;
    pub type Kernel = crate::dynamics::solver::QuadraticKernel;
}

mod scalar_math {

    mod real {
        /// The scalar type used throughout this crate.
        #[cfg(feature = "f64")]
        pub type Real = f64;
    }

    /// Compilation flags dependent aliases for mathematical types.
    #[cfg(feature = "dim3")]
    pub mod math {
        pub use super::real::*;
        use na::{Isometry3, Matrix2, Matrix3, Point3, UnitQuaternion, Vector2, Vector3};

        /// Threshold under which masses, volumes and weights are considered empty.
        pub const MASS_EPSILON: Real = 1.0e-20;

        /// The point type.
        pub type Point<N> = Point3<N>;

        /// The vector type.
        pub type Vector<N> = Vector3<N>;

        /// The matrix type.
        pub type Matrix<N> = Matrix3<N>;

        /// The transformation matrix type.
        pub type Isometry<N> = Isometry3<N>;

        /// The rotation matrix type.
        pub type Rotation<N> = UnitQuaternion<N>;

        /// The two principal radii of a particle or element cross-section.
        pub type Radii<N> = Vector2<N>;

        /// In-plane stretch block of a rod frame.
        pub type PlaneMatrix<N> = Matrix2<N>;
    }
}

pub mod dynamics;
pub mod utils;
