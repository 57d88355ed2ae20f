use crate::core::dynamics::{FixedFlags, InsideStatus, ParticleClass};
use crate::dynamics::NodeId;
use crate::math::{Matrix, Point, Radii, Real, Vector};

/// The 27 nodes of one node family touched by a particle, and their weights.
///
/// Slot `s` holds the node at offset `(s % 3, (s / 3) % 3, s / 9)` from the
/// lower corner of the particle's stencil window. A slot is `None` when the
/// node lies outside of the grid or in a non-activated bucket.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeStencil {
    pub nodes: [Option<NodeId>; 27],
    pub weights: [Real; 27],
}

impl NodeStencil {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Iterates through the `(slot, node, weight)` of every present node.
    pub fn iter(&self) -> impl Iterator<Item = (usize, NodeId, Real)> + '_ {
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .enumerate()
            .filter_map(|(slot, (node, w))| node.map(|node| (slot, node, *w)))
    }
}

impl Default for NodeStencil {
    fn default() -> Self {
        Self {
            nodes: [None; 27],
            weights: [0.0; 27],
        }
    }
}

/// Node footprints of a particle for every node family it interacts with.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ParticleStencils {
    pub velocity: [NodeStencil; 3],
    pub solid_phi: NodeStencil,
    pub pressure: NodeStencil,
}

/// A soft elastic vertex, a rigid surface sample (surfel) or a liquid particle.
///
/// Twist (the rotational degree of freedom of a yarn vertex) travels along
/// every positional quantity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Point<Real>,
    pub twist: Real,
    pub rest_position: Point<Real>,
    pub rest_twist: Real,

    pub velocity: Vector<Real>,
    pub twist_velocity: Real,
    pub saved_velocity: Vector<Real>,
    pub saved_twist_velocity: Real,
    pub velocity_delta: Vector<Real>,
    pub twist_velocity_delta: Real,
    pub fluid_velocity: Vector<Real>,
    pub fluid_twist_velocity: Real,

    pub mass: Real,
    pub inertia: Real,
    pub fluid_mass: Real,
    pub fluid_inertia: Real,

    pub volume: Real,
    pub rest_volume: Real,
    pub fluid_volume: Real,
    pub radii: Radii<Real>,
    /// Half the rest length of the incident edges (or the diameter of a liquid particle).
    pub rest_length: Real,
    /// Lateral rest area of the incident elements.
    pub rest_area: Real,

    pub fixed: FixedFlags,
    pub twist_enabled: bool,
    pub strand_tip: bool,
    pub group: usize,
    /// Index of the surfel sampled by this particle.
    pub surfel: Option<usize>,
    pub inside: InsideStatus,
    pub class: ParticleClass,

    /// APIC affine velocity matrix of the solid phase.
    pub affine: Matrix<Real>,
    /// APIC affine velocity matrix of the liquid phase.
    pub fluid_affine: Matrix<Real>,

    /// Blend between yarn (1) and cloth (0) behaviors.
    pub shape_factor: Real,
    pub orientation: Vector<Real>,
    pub volume_fraction: Real,
    pub rest_volume_fraction: Real,

    pub stencils: ParticleStencils,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Point::origin(),
            twist: 0.0,
            rest_position: Point::origin(),
            rest_twist: 0.0,
            velocity: Vector::zeros(),
            twist_velocity: 0.0,
            saved_velocity: Vector::zeros(),
            saved_twist_velocity: 0.0,
            velocity_delta: Vector::zeros(),
            twist_velocity_delta: 0.0,
            fluid_velocity: Vector::zeros(),
            fluid_twist_velocity: 0.0,
            mass: 0.0,
            inertia: 0.0,
            fluid_mass: 0.0,
            fluid_inertia: 0.0,
            volume: 1.0,
            rest_volume: 1.0,
            fluid_volume: 0.0,
            radii: Radii::repeat(1.0),
            rest_length: 0.0,
            rest_area: 0.0,
            fixed: FixedFlags::empty(),
            twist_enabled: false,
            strand_tip: false,
            group: 0,
            surfel: None,
            inside: InsideStatus::Outside,
            class: ParticleClass::None,
            affine: Matrix::zeros(),
            fluid_affine: Matrix::zeros(),
            shape_factor: 0.0,
            orientation: Vector::zeros(),
            volume_fraction: 0.0,
            rest_volume_fraction: 0.0,
            stencils: ParticleStencils::default(),
        }
    }
}

impl Particle {
    /// A liquid particle of the given volume, at rest.
    pub fn liquid(position: Point<Real>, fluid_volume: Real, density: Real) -> Self {
        let radius = crate::core::utils::sphere_radius(fluid_volume);
        let fluid_mass = fluid_volume * density;

        Self {
            position,
            rest_position: position,
            fluid_mass,
            fluid_inertia: fluid_mass * radius * radius * 0.4,
            volume: 0.0,
            rest_volume: 0.0,
            fluid_volume,
            radii: Radii::repeat(radius),
            rest_length: 2.0 * radius,
            rest_area: std::f64::consts::PI * radius * radius,
            ..Self::default()
        }
    }

    /// A soft elastic vertex.
    pub fn soft(position: Point<Real>, radii: Radii<Real>) -> Self {
        Self {
            position,
            rest_position: position,
            radii,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.fixed.contains(FixedFlags::POSITION)
    }

    #[inline]
    pub fn is_twist_fixed(&self) -> bool {
        self.fixed.contains(FixedFlags::TWIST)
    }
}
