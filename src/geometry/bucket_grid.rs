use super::NBH_SHIFTS;
use crate::math::{Point, Real, Vector};
use na::vector;
use rayon::prelude::*;
use std::ops::Range;

/// A uniform partition of an axis-aligned box into cubic buckets.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BucketLayout {
    /// Lower corner of the first bucket.
    pub origin: Point<Real>,
    pub bucket_size: Real,
    /// Number of buckets along each axis.
    pub dims: Vector<i32>,
}

impl BucketLayout {
    pub fn new(origin: Point<Real>, bucket_size: Real, dims: Vector<i32>) -> Self {
        Self {
            origin,
            bucket_size,
            dims: dims.map(|d| d.max(1)),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.dims.x * self.dims.y * self.dims.z) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The integer coordinates of the `index`-th bucket.
    #[inline]
    pub fn handle(&self, index: usize) -> Vector<i32> {
        let i = index as i32;
        vector![
            i % self.dims.x,
            (i / self.dims.x) % self.dims.y,
            i / (self.dims.x * self.dims.y)
        ]
    }

    #[inline]
    pub fn has_bucket(&self, handle: &Vector<i32>) -> bool {
        handle.x >= 0
            && handle.y >= 0
            && handle.z >= 0
            && handle.x < self.dims.x
            && handle.y < self.dims.y
            && handle.z < self.dims.z
    }

    /// The linear index of a bucket, `None` if it lies outside of the grid.
    #[inline]
    pub fn index(&self, handle: &Vector<i32>) -> Option<usize> {
        if self.has_bucket(handle) {
            Some((handle.z * self.dims.x * self.dims.y + handle.y * self.dims.x + handle.x) as usize)
        } else {
            None
        }
    }

    /// Coordinates of the bucket containing `pt`, possibly outside of the grid.
    #[inline]
    pub fn bucket_of(&self, pt: &Point<Real>) -> Vector<i32> {
        ((pt - self.origin) / self.bucket_size).map(|e| e.floor() as i32)
    }

    /// Index of the bucket containing `pt`, clamped to the border buckets.
    #[inline]
    pub fn clamped_index_of(&self, pt: &Point<Real>) -> usize {
        let h = self.bucket_of(pt);
        let clamped = vector![
            h.x.max(0).min(self.dims.x - 1),
            h.y.max(0).min(self.dims.y - 1),
            h.z.max(0).min(self.dims.z - 1)
        ];
        (clamped.z * self.dims.x * self.dims.y + clamped.y * self.dims.x + clamped.x) as usize
    }

    /// Lower corner of the `index`-th bucket.
    #[inline]
    pub fn bucket_origin(&self, index: usize) -> Point<Real> {
        self.origin + self.handle(index).cast::<Real>() * self.bucket_size
    }

    /// The color of a bucket in a 27-coloring where two buckets with the same
    /// color never share a neighbor.
    #[inline]
    pub fn color27(&self, index: usize) -> usize {
        let h = self.handle(index);
        (h.x.rem_euclid(3) + 3 * h.y.rem_euclid(3) + 9 * h.z.rem_euclid(3)) as usize
    }
}

/// Items (particles or Gauss points) sorted by the bucket containing them.
#[derive(Clone, Debug)]
pub struct BucketGrid {
    layout: BucketLayout,
    order: Vec<usize>,
    ranges: Vec<Range<usize>>,
}

impl BucketGrid {
    pub fn new(origin: Point<Real>, bucket_size: Real, dims: Vector<i32>) -> Self {
        Self::with_layout(BucketLayout::new(origin, bucket_size, dims))
    }

    pub fn with_layout(layout: BucketLayout) -> Self {
        Self {
            layout,
            order: vec![],
            ranges: vec![0..0; layout.len()],
        }
    }

    #[inline]
    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Number of buckets along each axis.
    #[inline]
    pub fn dim(&self) -> Vector<i32> {
        self.layout.dims
    }

    #[inline]
    pub fn handle(&self, index: usize) -> Vector<i32> {
        self.layout.handle(index)
    }

    #[inline]
    pub fn index(&self, handle: &Vector<i32>) -> Option<usize> {
        self.layout.index(handle)
    }

    #[inline]
    pub fn has_bucket(&self, handle: &Vector<i32>) -> bool {
        self.layout.has_bucket(handle)
    }

    #[inline]
    pub fn color27(&self, index: usize) -> usize {
        self.layout.color27(index)
    }

    /// Rebuilds the item lists of every bucket from scratch.
    ///
    /// Items whose position falls outside of the grid are assigned to the
    /// nearest border bucket.
    pub fn sort(&mut self, num_items: usize, key: impl Fn(usize) -> Point<Real> + Sync) {
        let layout = self.layout;
        let num_buckets = layout.len();
        let keys: Vec<usize> = (0..num_items)
            .into_par_iter()
            .map(|i| layout.clamped_index_of(&key(i)))
            .collect();

        // Count, exclusive scan, then a stable scatter.
        let mut offsets = vec![0; num_buckets + 1];
        for k in &keys {
            offsets[*k + 1] += 1;
        }
        for b in 0..num_buckets {
            offsets[b + 1] += offsets[b];
        }

        self.ranges.clear();
        self.ranges
            .extend((0..num_buckets).map(|b| offsets[b]..offsets[b + 1]));

        self.order.clear();
        self.order.resize(num_items, 0);
        for (i, k) in keys.iter().enumerate() {
            self.order[offsets[*k]] = i;
            offsets[*k] += 1;
        }
    }

    /// The items sorted into the `bucket`-th bucket.
    #[inline]
    pub fn bucket_items(&self, bucket: usize) -> &[usize] {
        &self.order[self.ranges[bucket].clone()]
    }

    /// Calls `f` on the index of every existing bucket of the `3 × 3 × 3`
    /// neighborhood of `bucket`, `bucket` included.
    pub fn for_each_neighbor_bucket(&self, bucket: usize, mut f: impl FnMut(usize)) {
        let handle = self.layout.handle(bucket);
        for shift in NBH_SHIFTS.iter() {
            if let Some(nb) = self.layout.index(&(handle + shift)) {
                f(nb)
            }
        }
    }

    /// Calls `f` on every item of the `3 × 3 × 3` bucket neighborhood of `bucket`.
    pub fn for_each_neighbor_item(&self, bucket: usize, mut f: impl FnMut(usize)) {
        self.for_each_neighbor_bucket(bucket, |nb| {
            for item in self.bucket_items(nb) {
                f(*item)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::point;

    #[test]
    fn handle_index_roundtrip() {
        let layout = BucketLayout::new(Point::origin(), 1.0, vector![3, 4, 5]);
        for i in 0..layout.len() {
            assert_eq!(layout.index(&layout.handle(i)), Some(i));
        }
        assert_eq!(layout.index(&vector![-1, 0, 0]), None);
        assert_eq!(layout.index(&vector![0, 4, 0]), None);
    }

    #[test]
    fn sort_clamps_outliers() {
        let mut grid = BucketGrid::new(Point::origin(), 1.0, vector![2, 2, 2]);
        let pts = [
            point![0.5, 0.5, 0.5],
            point![1.5, 0.5, 0.5],
            point![-3.0, 0.2, 0.2],
            point![0.2, 0.2, 0.2],
        ];
        grid.sort(pts.len(), |i| pts[i]);

        // The scatter keeps the items of a bucket in increasing order.
        assert_eq!(grid.bucket_items(0), &[0, 2, 3]);
        assert_eq!(grid.bucket_items(1), &[1]);
        assert!(grid.bucket_items(7).is_empty());
    }

    #[test]
    fn same_color_buckets_are_not_neighbors() {
        let layout = BucketLayout::new(Point::origin(), 1.0, vector![6, 6, 6]);
        for a in 0..layout.len() {
            for b in 0..layout.len() {
                if a != b && layout.color27(a) == layout.color27(b) {
                    let d = layout.handle(a) - layout.handle(b);
                    assert!(d.x.abs().max(d.y.abs()).max(d.z.abs()) >= 3);
                }
            }
        }
    }
}
