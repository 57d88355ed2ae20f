use crate::core::utils;
use crate::math::{Isometry, Point, Real, Rotation, Vector};
use parry::bounding_volume::{BoundingVolume, AABB};
use parry::query::PointQuery;
use parry::shape::SharedShape;
use rayon::prelude::*;
use std::collections::HashSet;

/// Lattices with more cells than this are not sampled.
const MAX_LATTICE_CELLS: Real = 16_777_216.0;

/// What the solver does with a distance field.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DistanceFieldUsage {
    /// A collision object for both the elastic and liquid phases.
    Solid,
    /// A region emitting liquid.
    Source,
    /// A region deleting the liquid particles entering it.
    Terminator,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BooleanOperator {
    Union,
    Intersection,
}

#[derive(Clone)]
pub enum DistanceFieldKind {
    Primitive {
        shape: SharedShape,
        pose: Isometry<Real>,
        linvel: Vector<Real>,
        angvel: Vector<Real>,
    },
    Operator {
        op: BooleanOperator,
        children: Vec<DistanceField>,
    },
}

/// A time interval during which a source emits liquid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EmissionWindow {
    pub start: Real,
    pub end: Real,
    /// Initial velocity of the emitted liquid.
    pub velocity: Vector<Real>,
    /// The source stops once the total volume it emitted reaches this.
    pub max_volume: Real,
}

impl EmissionWindow {
    pub fn new(start: Real, end: Real, velocity: Vector<Real>) -> Self {
        Self {
            start,
            end,
            velocity,
            max_volume: Real::INFINITY,
        }
    }

    pub fn with_max_volume(mut self, max_volume: Real) -> Self {
        self.max_volume = max_volume;
        self
    }
}

/// A signed distance field, negative inside, moving rigidly with its group.
#[derive(Clone)]
pub struct DistanceField {
    pub kind: DistanceFieldKind,
    pub usage: DistanceFieldUsage,
    pub group: usize,
    /// Solids are covered with surfels, sources emit liquid particles.
    pub sampled: bool,
    /// Material of the surfels covering a sampled solid.
    pub material: usize,
    pub emission: Vec<EmissionWindow>,
    pub emitted_volume: Real,
}

impl DistanceField {
    pub fn primitive(
        shape: SharedShape,
        pose: Isometry<Real>,
        usage: DistanceFieldUsage,
        group: usize,
    ) -> Self {
        Self {
            kind: DistanceFieldKind::Primitive {
                shape,
                pose,
                linvel: Vector::zeros(),
                angvel: Vector::zeros(),
            },
            usage,
            group,
            sampled: false,
            material: 0,
            emission: vec![],
            emitted_volume: 0.0,
        }
    }

    pub fn union(children: Vec<DistanceField>, usage: DistanceFieldUsage, group: usize) -> Self {
        Self {
            kind: DistanceFieldKind::Operator {
                op: BooleanOperator::Union,
                children,
            },
            usage,
            group,
            sampled: false,
            material: 0,
            emission: vec![],
            emitted_volume: 0.0,
        }
    }

    pub fn intersection(
        children: Vec<DistanceField>,
        usage: DistanceFieldUsage,
        group: usize,
    ) -> Self {
        Self {
            kind: DistanceFieldKind::Operator {
                op: BooleanOperator::Intersection,
                children,
            },
            usage,
            group,
            sampled: false,
            material: 0,
            emission: vec![],
            emitted_volume: 0.0,
        }
    }

    /// Marks this field for sampling. Solids use `material` for their surfels.
    pub fn sampled(mut self, material: usize) -> Self {
        self.sampled = true;
        self.material = material;
        self
    }

    pub fn with_emission(mut self, window: EmissionWindow) -> Self {
        self.sampled = true;
        self.emission.push(window);
        self
    }

    /// The velocity of the liquid emitted at `time`, if this is a sampled
    /// source with an open window that did not exhaust its volume.
    pub fn active_emission(&self, time: Real) -> Option<Vector<Real>> {
        if !self.sampled || self.usage != DistanceFieldUsage::Source {
            return None;
        }

        self.emission
            .iter()
            .find(|w| time >= w.start && time < w.end && self.emitted_volume < w.max_volume)
            .map(|w| w.velocity)
    }

    /// Sets the rigid velocity of this field and of all its children.
    pub fn with_velocity(mut self, linvel: Vector<Real>, angvel: Vector<Real>) -> Self {
        self.set_velocity(linvel, angvel);
        self
    }

    pub fn set_velocity(&mut self, new_linvel: Vector<Real>, new_angvel: Vector<Real>) {
        match &mut self.kind {
            DistanceFieldKind::Primitive { linvel, angvel, .. } => {
                *linvel = new_linvel;
                *angvel = new_angvel;
            }
            DistanceFieldKind::Operator { children, .. } => {
                for child in children {
                    child.set_velocity(new_linvel, new_angvel);
                }
            }
        }
    }

    #[inline]
    pub fn compute_phi(&self, pt: &Point<Real>) -> Real {
        self.compute_phi_vel(pt).0
    }

    /// The signed distance at `pt` and the velocity of the closest surface.
    pub fn compute_phi_vel(&self, pt: &Point<Real>) -> (Real, Vector<Real>) {
        match &self.kind {
            DistanceFieldKind::Primitive {
                shape,
                pose,
                linvel,
                angvel,
            } => {
                let proj = shape.project_point(pose, pt, false);
                let dist = na::distance(&proj.point, pt);
                let phi = if proj.is_inside { -dist } else { dist };
                let vel = linvel + angvel.cross(&(pt - Point::from(pose.translation.vector)));
                (phi, vel)
            }
            DistanceFieldKind::Operator { op, children } => {
                let mut best = (Real::INFINITY, Vector::zeros());
                let mut first = true;

                for child in children {
                    let (phi, vel) = child.compute_phi_vel(pt);
                    let better = match op {
                        BooleanOperator::Union => phi < best.0,
                        BooleanOperator::Intersection => first || phi > best.0,
                    };
                    if better {
                        best = (phi, vel);
                    }
                    first = false;
                }

                best
            }
        }
    }

    /// Bounds of the primitives of this field, at their current pose.
    pub fn aabb(&self) -> AABB {
        match &self.kind {
            DistanceFieldKind::Primitive { shape, pose, .. } => shape.compute_aabb(pose),
            DistanceFieldKind::Operator { children, .. } => children
                .iter()
                .map(|child| child.aabb())
                .fold(AABB::new_invalid(), |acc, aabb| acc.merged(&aabb)),
        }
    }

    /// Outward unit normal at `pt`, from central differences of width `h`.
    pub fn normal(&self, pt: &Point<Real>, h: Real) -> Vector<Real> {
        let grad = Vector::from_fn(|i, _| {
            let mut shift = Vector::zeros();
            shift[i] = h;
            self.compute_phi(&(pt + shift)) - self.compute_phi(&(pt - shift))
        });
        utils::normalize_or_zero(&grad)
    }

    /// Points on the surface, at most one per cell of a lattice of
    /// `spacing`, each with its outward normal.
    pub fn resample_surface(&self, spacing: Real) -> Vec<(Point<Real>, Vector<Real>)> {
        let h = spacing * 1.0e-3;

        lattice_cells(&self.aabb().loosened(spacing), spacing)
            .filter_map(|pt| {
                let phi = self.compute_phi(&pt);
                if phi < -0.5 * spacing || phi >= 0.5 * spacing {
                    return None;
                }

                let n = self.normal(&pt, h);
                if n == Vector::zeros() {
                    None
                } else {
                    Some((pt - n * phi, n))
                }
            })
            .collect()
    }

    /// Centers of the lattice cells of `spacing` lying inside the field,
    /// skipping the cells that already contain one of `existing`.
    pub fn resample_interior(&self, spacing: Real, existing: &[Point<Real>]) -> Vec<Point<Real>> {
        let occupied: HashSet<[i64; 3]> = existing
            .iter()
            .map(|pt| lattice_cell(pt, spacing))
            .collect();

        lattice_cells(&self.aabb(), spacing)
            .filter(|pt| {
                self.compute_phi(pt) < 0.0 && !occupied.contains(&lattice_cell(pt, spacing))
            })
            .collect()
    }

    /// Integrates the rigid motion of this field over `dt`.
    pub fn advance(&mut self, dt: Real) {
        match &mut self.kind {
            DistanceFieldKind::Primitive {
                pose,
                linvel,
                angvel,
                ..
            } => {
                pose.append_rotation_wrt_center_mut(&Rotation::new(*angvel * dt));
                pose.translation.vector += *linvel * dt;
            }
            DistanceFieldKind::Operator { children, .. } => {
                for child in children {
                    child.advance(dt)
                }
            }
        }
    }
}

fn lattice_cell(pt: &Point<Real>, spacing: Real) -> [i64; 3] {
    [
        (pt.x / spacing).floor() as i64,
        (pt.y / spacing).floor() as i64,
        (pt.z / spacing).floor() as i64,
    ]
}

/// Centers of the cells of the lattice of `spacing` overlapping `aabb`.
fn lattice_cells(aabb: &AABB, spacing: Real) -> impl ParallelIterator<Item = Point<Real>> {
    let lo = aabb.mins.coords.map(|x| (x / spacing).floor());
    let hi = aabb.maxs.coords.map(|x| (x / spacing).ceil());
    let extents = hi - lo;
    let num_cells = extents.x.max(0.0) * extents.y.max(0.0) * extents.z.max(0.0);

    let (lo, hi) = if spacing > 0.0 && num_cells.is_finite() && num_cells <= MAX_LATTICE_CELLS {
        (lo.map(|x| x as i64), hi.map(|x| x as i64))
    } else {
        if num_cells > 0.0 {
            warn!(
                "Skipping the sampling of {} lattice cells of size {}.",
                num_cells, spacing
            );
        }
        (Vector::zeros(), Vector::zeros())
    };

    (lo.z..hi.z).into_par_iter().flat_map_iter(move |k| {
        (lo.y..hi.y).flat_map(move |j| {
            (lo.x..hi.x).map(move |i| {
                Point::new(
                    (i as Real + 0.5) * spacing,
                    (j as Real + 0.5) * spacing,
                    (k as Real + 0.5) * spacing,
                )
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::{point, vector};

    #[test]
    fn ball_phi_sign() {
        let ball = DistanceField::primitive(
            SharedShape::ball(1.0),
            Isometry::translation(1.0, 0.0, 0.0),
            DistanceFieldUsage::Solid,
            0,
        );
        assert!((ball.compute_phi(&point![1.0, 0.5, 0.0]) + 0.5).abs() < 1.0e-12);
        assert!((ball.compute_phi(&point![4.0, 0.0, 0.0]) - 2.0).abs() < 1.0e-12);
    }

    #[test]
    fn union_takes_the_closest_child() {
        let a = DistanceField::primitive(
            SharedShape::ball(1.0),
            Isometry::identity(),
            DistanceFieldUsage::Solid,
            0,
        );
        let b = DistanceField::primitive(
            SharedShape::ball(1.0),
            Isometry::translation(5.0, 0.0, 0.0),
            DistanceFieldUsage::Solid,
            0,
        )
        .with_velocity(vector![0.0, 2.0, 0.0], Vector::zeros());
        let u = DistanceField::union(vec![a, b], DistanceFieldUsage::Solid, 0);

        let (phi, vel) = u.compute_phi_vel(&point![4.5, 0.0, 0.0]);
        assert!((phi + 0.5).abs() < 1.0e-12);
        assert_eq!(vel, vector![0.0, 2.0, 0.0]);
    }

    #[test]
    fn advance_translates() {
        let mut ball = DistanceField::primitive(
            SharedShape::ball(1.0),
            Isometry::identity(),
            DistanceFieldUsage::Solid,
            0,
        )
        .with_velocity(vector![1.0, 0.0, 0.0], Vector::zeros());
        ball.advance(0.5);
        assert!(ball.compute_phi(&point![0.5, 0.0, 0.0]) < -0.99);
    }

    #[test]
    fn ball_surface_samples_lie_on_the_sphere() {
        let ball = DistanceField::primitive(
            SharedShape::ball(0.2),
            Isometry::translation(0.5, 0.5, 0.5),
            DistanceFieldUsage::Solid,
            0,
        );
        let center = point![0.5, 0.5, 0.5];
        let samples = ball.resample_surface(0.05);

        assert!(samples.len() > 50);
        for (pt, n) in samples {
            assert!((na::distance(&pt, &center) - 0.2).abs() < 1.0e-6);
            assert!(n.dot(&(pt - center).normalize()) > 0.999);
        }
    }

    #[test]
    fn interior_samples_skip_occupied_cells() {
        let cube = DistanceField::primitive(
            SharedShape::cuboid(0.1, 0.1, 0.1),
            Isometry::translation(0.1, 0.1, 0.1),
            DistanceFieldUsage::Source,
            0,
        );
        let all = cube.resample_interior(0.05, &[]);
        assert_eq!(all.len(), 64);

        let rest = cube.resample_interior(0.05, &[point![0.01, 0.01, 0.01]]);
        assert_eq!(rest.len(), 63);
        assert!(rest.iter().all(|pt| pt.x > 0.05 || pt.y > 0.05 || pt.z > 0.05));
    }

    #[test]
    fn emission_follows_windows_and_volume() {
        let source = DistanceField::primitive(
            SharedShape::ball(0.1),
            Isometry::identity(),
            DistanceFieldUsage::Source,
            0,
        )
        .with_emission(EmissionWindow::new(0.0, 1.0, vector![0.0, -1.0, 0.0]).with_max_volume(2.0));

        assert_eq!(source.active_emission(0.5), Some(vector![0.0, -1.0, 0.0]));
        assert_eq!(source.active_emission(1.5), None);

        let mut exhausted = source.clone();
        exhausted.emitted_volume = 2.0;
        assert_eq!(exhausted.active_emission(0.5), None);
    }
}
