use crate::core::dynamics::solver::LiquidParameters;
use crate::core::utils;
use crate::dynamics::{GaussKind, Scene};
use crate::math::{Real, Vector, MASS_EPSILON};
use rayon::prelude::*;

const ERGUN_COEFF: Real = 0.1428869017;
const MAX_DRAG: Real = 1.0e63;

/// Permeability across the fibers.
fn planar_permeability(psi: Real, di: Real) -> Real {
    (-psi.ln() - 1.476 + 2.0 * psi - 0.5 * psi * psi) / (16.0 * psi) * di * di
}

/// Permeability along the fibers.
fn axial_permeability(psi: Real, di: Real) -> Real {
    (-psi.ln() - 1.476 + 2.0 * psi - 1.774 * psi * psi + 4.078 * psi.powi(3)) / (32.0 * psi)
        * di
        * di
}

fn viscosity_and_density(liquid: &LiquidParameters, material: usize) -> (Real, Real) {
    if material == 0 {
        (liquid.viscosity, liquid.liquid_density)
    } else {
        (liquid.air_viscosity, liquid.air_density)
    }
}

/// Darcy drag with the nonlinear Yazdchi correction, for a permeability `k`.
fn drag_from_permeability(liquid: &LiquidParameters, psi: Real, k: Real, dv: Real, material: usize) -> Real {
    let ergun = if liquid.use_nonlinear_drag {
        ERGUN_COEFF
    } else {
        0.0
    };
    let di = liquid.yarn_diameter;
    let p = liquid.yazdchi_power;
    let (mu, rho) = viscosity_and_density(liquid, material);

    let c = mu / k
        + ergun * di.powf(p - 1.0) * mu.powf(1.0 - p) / ((1.0 - psi).powf(1.5) * k.sqrt())
            * (rho * dv.abs()).powf(p);
    c.min(MAX_DRAG)
}

pub(crate) fn capillary_pressure(liquid: &LiquidParameters, psi: Real) -> Real {
    if 1.0 - psi < MASS_EPSILON || liquid.pore_radius < MASS_EPSILON {
        return 0.0;
    }

    let alpha = psi / (1.0 - psi);
    alpha * liquid.surf_tension_coeff * liquid.rest_contact_angle.cos() / liquid.pore_radius
}

pub(crate) fn vertical_diffusivity(liquid: &LiquidParameters, dx: Real, psi: Real, material: usize) -> Real {
    if psi == 0.0 {
        return 1.0;
    }

    let k = axial_permeability(psi, liquid.yarn_diameter).max(MASS_EPSILON);
    let (mu, _) = viscosity_and_density(liquid, material);
    k * capillary_pressure(liquid, psi) / (dx * dx * mu)
}

impl Scene {
    /// Capillary pressure of a porous medium with solid fraction `psi`.
    pub fn capillary_pressure(&self, psi: Real) -> Real {
        capillary_pressure(&self.liquid, psi)
    }

    /// Drag coefficient along the fibers for a relative speed `dv`.
    pub fn drag_coeff(&self, psi: Real, s: Real, dv: Real, material: usize) -> Real {
        if !self.liquid.use_drag || psi == 0.0 || s == 0.0 {
            return 0.0;
        }

        let k = axial_permeability(psi, self.liquid.yarn_diameter).max(MASS_EPSILON);
        drag_from_permeability(&self.liquid, psi, k, dv, material)
    }

    /// Drag coefficient across the fibers for a relative speed `dv`.
    pub fn planar_drag_coeff(&self, psi: Real, s: Real, dv: Real, material: usize) -> Real {
        if !self.liquid.use_drag || psi == 0.0 || s == 0.0 {
            return 0.0;
        }

        let k = planar_permeability(psi, self.liquid.yarn_diameter).max(MASS_EPSILON);
        drag_from_permeability(&self.liquid, psi, k, dv, material)
    }

    /// Component `axis` of the anisotropic drag of a medium whose fibers follow
    /// `orientation`, blended between yarn and cloth by `shape_factor`.
    pub fn drag_coeff_with_orientation(
        &self,
        psi: Real,
        s: Real,
        dv: Real,
        orientation: &Vector<Real>,
        shape_factor: Real,
        axis: usize,
        material: usize,
    ) -> Real {
        if !self.liquid.use_drag
            || psi == 0.0
            || s == 0.0
            || orientation.norm_squared() < MASS_EPSILON
        {
            return 0.0;
        }

        let di = self.liquid.yarn_diameter;
        let ka = planar_permeability(psi, di).max(MASS_EPSILON);
        let kb = axial_permeability(psi, di).max(MASS_EPSILON);
        let ca = drag_from_permeability(&self.liquid, psi, ka, dv, material);
        let cb = drag_from_permeability(&self.liquid, psi, kb, dv, material);

        let c_xy = ca * (1.0 - shape_factor) + cb * shape_factor;
        let c_z = ca * shape_factor + cb * (1.0 - shape_factor);
        utils::rotated_drag(orientation, c_xy, c_z, axis)
    }

    /// Rate at which liquid diffuses into a medium of solid fraction `psi`.
    pub fn vertical_diffusivity(&self, psi: Real, material: usize) -> Real {
        vertical_diffusivity(&self.liquid, self.cell_size(), psi, material)
    }

    /// Pore pressure of every elastic vertex: twice the capillary suction of
    /// its dry pores, minus the liquid pressure left on its cells by the grid
    /// solver when `apply_pressure_manifold` is set.
    pub fn elasto_pore_pressure(&self) -> Vec<Real> {
        let num_elasto = self.particles.num_elasto_particles();
        let grid = &self.nodes;
        let liquid = &self.liquid;

        self.particles.particles[..num_elasto]
            .par_iter()
            .map(|p| {
                let vol_empty = p.volume * (1.0 - p.volume_fraction);
                let s = if vol_empty > MASS_EPSILON {
                    (p.fluid_volume / vol_empty).max(0.0).min(1.0)
                } else {
                    0.0
                };
                let mut pressure = capillary_pressure(liquid, p.volume_fraction) * (1.0 - s) * 2.0;

                if liquid.apply_pressure_manifold {
                    pressure -= p
                        .stencils
                        .pressure
                        .iter()
                        .filter(|(_, id, w)| *w != 0.0 && grid.is_active(id.bucket as usize))
                        .map(|(_, id, w)| grid.pressure_node(id).pressure * w)
                        .sum::<Real>();
                }

                pressure
            })
            .collect()
    }

    /// Adds the pore-pressure gradient force of every edge and face Gauss
    /// point to `f`, indexed like `elements.gauss`. Surfel entries are left
    /// untouched.
    pub fn accumulate_manifold_grad_pore_pressure(&self, f: &mut [Vector<Real>]) {
        let pore_pressure = self.elasto_pore_pressure();
        let elements = &self.elements;
        let num_soft = (elements.num_edges() + elements.num_faces()).min(elements.gauss.len());

        f.par_iter_mut()
            .enumerate()
            .take(num_soft)
            .for_each(|(g, force)| {
                let gp = &elements.gauss[g];
                let grad_p = match elements.gauss_kind(g) {
                    GaussKind::Edge(e) => {
                        let [a, b] = elements.edges[e];
                        gp.gradient.column(0) * pore_pressure[a] + gp.gradient.column(1) * pore_pressure[b]
                    }
                    GaussKind::Face(i) => {
                        let [a, b, c] = elements.faces[i];
                        gp.gradient.column(0) * pore_pressure[a]
                            + gp.gradient.column(1) * pore_pressure[b]
                            + gp.gradient.column(2) * pore_pressure[c]
                    }
                    GaussKind::Surfel(_) => Vector::zeros(),
                };

                *force += grad_p * gp.fluid_volume;
            });
    }
}
