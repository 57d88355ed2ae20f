use crate::math::Real;

/// Material of a group of mesh elements (yarns or cloth patches).
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ElasticParameters {
    pub density: Real,
    pub young_modulus: Real,
    pub shear_modulus: Real,
    /// Drucker-Prager cohesion slope of the rod return mapping.
    pub friction_alpha: Real,
    /// Coulomb friction coefficient bounding the shear of the frame.
    pub friction_beta: Real,
    /// Scale of the Lamé parameters used by the contact plasticity.
    pub collision_multiplier: Real,
}

impl ElasticParameters {
    /// First Lamé parameter, `μ (E - 2μ) / (3μ - E)`.
    pub fn lame_lambda(&self) -> Real {
        crate::utils::lame_lambda(self.young_modulus, self.shear_modulus)
    }

    /// Second Lamé parameter (the shear modulus).
    #[inline]
    pub fn lame_mu(&self) -> Real {
        self.shear_modulus
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.density >= 0.0, "negative element density: {}", self.density);
        anyhow::ensure!(
            self.shear_modulus >= 0.0 && self.young_modulus >= 0.0,
            "elastic moduli must be non-negative"
        );
        Ok(())
    }
}

impl Default for ElasticParameters {
    fn default() -> Self {
        Self {
            density: 1.32,
            young_modulus: 1.0e7,
            shear_modulus: 3.65e6,
            friction_alpha: 0.2,
            friction_beta: 0.3,
            collision_multiplier: 1.0,
        }
    }
}
