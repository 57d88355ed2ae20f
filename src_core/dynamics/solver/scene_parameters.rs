use crate::math::{Real, Vector};

/// Spatial partition and global settings of a scene.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SceneParameters {
    /// Edge length of one bucket.
    pub bucket_size: Real,
    /// Number of cells (and nodes per staggered family) along each bucket axis.
    pub num_nodes: usize,
    /// Number of empty buckets padding the particle bounding box on each side.
    pub border_buckets: usize,
    /// Seed of every random draw (split orientations, merge strides, spawning).
    pub seed: u128,
    pub gravity: Vector<Real>,
}

impl SceneParameters {
    /// Edge length of one grid cell.
    #[inline]
    pub fn cell_size(&self) -> Real {
        self.bucket_size / self.num_nodes as Real
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.bucket_size > 0.0 && self.bucket_size.is_finite(),
            "the bucket size must be positive, got {}",
            self.bucket_size
        );
        anyhow::ensure!(self.num_nodes > 0, "a bucket needs at least one node per axis");
        anyhow::ensure!(
            self.gravity.iter().all(|g| g.is_finite()),
            "the gravity must be finite"
        );
        Ok(())
    }
}

impl Default for SceneParameters {
    fn default() -> Self {
        Self {
            bucket_size: 0.4,
            num_nodes: 4,
            border_buckets: 3,
            seed: 0x5eed_5eed,
            gravity: Vector::new(0.0, -981.0, 0.0),
        }
    }
}
