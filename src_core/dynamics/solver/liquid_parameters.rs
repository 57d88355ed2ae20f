use crate::math::Real;

/// Every liquid and porous-media constant used by the scene.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LiquidParameters {
    pub liquid_density: Real,
    pub air_density: Real,
    /// Dynamic viscosity of the liquid.
    pub viscosity: Real,
    pub air_viscosity: Real,
    pub surf_tension_coeff: Real,
    /// Rest contact angle, in radians.
    pub rest_contact_angle: Real,
    /// Diameter of the fibers making up a yarn.
    pub yarn_diameter: Real,
    pub pore_radius: Real,
    /// Exponent of the inertial (Forchheimer) drag term.
    pub yazdchi_power: Real,
    /// Solid volume fraction of a fresh elastic particle.
    pub rest_volume_fraction: Real,
    pub cohesion_coeff: Real,
    pub flip_coeff: Real,
    pub elasto_flip_coeff: Real,
    pub elasto_flip_asym_coeff: Real,
    pub elasto_advect_coeff: Real,
    /// Radius of a fine liquid particle relative to the cell size.
    pub particle_cell_multiplier: Real,
    /// Search radius of the particle correction, in fine particle radii.
    pub correction_multiplier: Real,
    pub correction_strength: Real,
    /// Only one particle out of `correction_step` is corrected or merged per call.
    pub correction_step: usize,
    pub liquid_boundary_friction: Real,
    pub elasto_capture_rate: Real,
    pub surf_tension_smoothing_step: usize,
    /// Number of bucket layers activated around the liquid for the solvers.
    pub expanded_layers: usize,
    pub use_surf_tension: bool,
    pub use_drag: bool,
    pub use_nonlinear_drag: bool,
    pub use_cohesion: bool,
    /// Allow cohesion pairs between elements of the rigid surfels.
    pub solid_cohesion: bool,
    /// Allow cohesion pairs between soft elements.
    pub soft_cohesion: bool,
    pub use_varying_fraction: bool,
    pub compute_viscosity: bool,
    /// Subtract the liquid pressure of the grid from the pore pressure of the
    /// elastic vertices.
    pub apply_pressure_manifold: bool,
}

impl LiquidParameters {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.liquid_density > 0.0,
            "the liquid density must be positive, got {}",
            self.liquid_density
        );
        anyhow::ensure!(self.air_density >= 0.0, "negative air density");
        anyhow::ensure!(
            self.viscosity >= 0.0 && self.air_viscosity >= 0.0,
            "negative viscosity"
        );
        anyhow::ensure!(
            self.particle_cell_multiplier > 0.0,
            "the particle cell multiplier must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.rest_volume_fraction),
            "the rest volume fraction must lie in [0, 1], got {}",
            self.rest_volume_fraction
        );
        anyhow::ensure!(self.correction_step > 0, "the correction step must be non-zero");
        Ok(())
    }
}

impl Default for LiquidParameters {
    fn default() -> Self {
        Self {
            liquid_density: 1.0,
            air_density: 1.225e-3,
            viscosity: 8.9e-3,
            air_viscosity: 1.81e-4,
            surf_tension_coeff: 72.8,
            rest_contact_angle: 40.0_f64.to_radians(),
            yarn_diameter: 0.011,
            pore_radius: 0.011,
            yazdchi_power: 1.6,
            rest_volume_fraction: 0.4,
            cohesion_coeff: 1.0,
            flip_coeff: 0.95,
            elasto_flip_coeff: 0.95,
            elasto_flip_asym_coeff: 1.0,
            elasto_advect_coeff: 1.0,
            particle_cell_multiplier: 0.3,
            correction_multiplier: 2.0,
            correction_strength: 0.1,
            correction_step: 8,
            liquid_boundary_friction: 1.0,
            elasto_capture_rate: 1.0,
            surf_tension_smoothing_step: 7,
            expanded_layers: 1,
            use_surf_tension: true,
            use_drag: true,
            use_nonlinear_drag: true,
            use_cohesion: true,
            solid_cohesion: true,
            soft_cohesion: true,
            use_varying_fraction: true,
            compute_viscosity: false,
            apply_pressure_manifold: true,
        }
    }
}
