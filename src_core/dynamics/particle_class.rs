use crate::math::Real;

/// Size band of a liquid particle relative to the target ("fine") volume.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParticleClass {
    /// Not classified (elastic particles, surfels, fresh allocations).
    None,
    VerySmall,
    Small,
    Normal,
    Large,
    VeryLarge,
}

impl ParticleClass {
    /// Classifies a liquid particle from `fluid_volume / target_volume`.
    ///
    /// Bands: `< 0.5` very small, `[0.5, 0.9]` small, `(0.9, 1.1]` normal,
    /// `(1.1, 2.0]` large and `> 2.0` very large.
    pub fn from_volume_ratio(ratio: Real) -> Self {
        if ratio < 0.5 {
            ParticleClass::VerySmall
        } else if ratio <= 0.9 {
            ParticleClass::Small
        } else if ratio <= 1.1 {
            ParticleClass::Normal
        } else if ratio <= 2.0 {
            ParticleClass::Large
        } else {
            ParticleClass::VeryLarge
        }
    }

    /// Can this particle receive the whole volume of a very small neighbor?
    pub fn accepts_small_donations(self) -> bool {
        matches!(
            self,
            ParticleClass::VerySmall | ParticleClass::Small | ParticleClass::Normal
        )
    }
}

impl Default for ParticleClass {
    fn default() -> Self {
        ParticleClass::None
    }
}

bitflags::bitflags! {
    /// Degrees of freedom of a particle pinned by its group script.
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    #[derive(Default)]
    pub struct FixedFlags: u8 {
        const POSITION = 1 << 0;
        const TWIST = 1 << 1;
    }
}

/// Whether the velocity footprint of a particle lies in activated buckets.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InsideStatus {
    Outside = 0,
    Boundary = 1,
    Inside = 2,
}

impl Default for InsideStatus {
    fn default() -> Self {
        InsideStatus::Outside
    }
}
