pub use self::bucket_grid::{BucketGrid, BucketLayout};
pub use self::distance_field::{
    BooleanOperator, DistanceField, DistanceFieldKind, DistanceFieldUsage, EmissionWindow,
};

mod bucket_grid;
mod distance_field;

use crate::math::Vector;
use na::vector;

/// Shifts to the 27 buckets (or nodes) of a `3 × 3 × 3` neighborhood, the
/// center included, in `k, j, i` order.
pub const NBH_SHIFTS: [Vector<i32>; 27] = [
    vector![-1, -1, -1],
    vector![0, -1, -1],
    vector![1, -1, -1],
    vector![-1, 0, -1],
    vector![0, 0, -1],
    vector![1, 0, -1],
    vector![-1, 1, -1],
    vector![0, 1, -1],
    vector![1, 1, -1],
    vector![-1, -1, 0],
    vector![0, -1, 0],
    vector![1, -1, 0],
    vector![-1, 0, 0],
    vector![0, 0, 0],
    vector![1, 0, 0],
    vector![-1, 1, 0],
    vector![0, 1, 0],
    vector![1, 1, 0],
    vector![-1, -1, 1],
    vector![0, -1, 1],
    vector![1, -1, 1],
    vector![-1, 0, 1],
    vector![0, 0, 1],
    vector![1, 0, 1],
    vector![-1, 1, 1],
    vector![0, 1, 1],
    vector![1, 1, 1],
];
