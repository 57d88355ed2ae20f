use crate::math::Real;
use std::f64::consts::PI;

/// Ratio between the radius of a sphere and the edge of the cube of same volume.
pub const DEFAULT_RADIUS_MULTIPLIER: Real = 0.620_350_490_899_400_1;

pub fn inv_exact(e: Real) -> Real {
    // We don't want to use any threshold here.
    if e == 0.0 {
        0.0
    } else {
        1.0 / e
    }
}

/// First Lamé parameter from the Young and shear moduli.
pub fn lame_lambda(young_modulus: Real, shear_modulus: Real) -> Real {
    let mu = shear_modulus;
    mu * (young_modulus - 2.0 * mu) / (3.0 * mu - young_modulus)
}

/// Ramanujan's approximation of the perimeter of an ellipse.
pub fn ellipse_perimeter(a: Real, b: Real) -> Real {
    PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt())
}

pub fn sphere_volume(radius: Real) -> Real {
    4.0 / 3.0 * PI * radius.powi(3)
}

pub fn sphere_radius(volume: Real) -> Real {
    (0.75 * volume / PI).cbrt()
}

/// Component along `axis` of a transversely isotropic drag tensor.
///
/// The tensor is `c_xy` across the fiber direction `orientation` and `c_z`
/// along it; `orientation` needs not be normalized.
pub fn rotated_drag(
    orientation: &crate::math::Vector<Real>,
    c_xy: Real,
    c_z: Real,
    axis: usize,
) -> Real {
    let n2 = orientation.norm_squared();
    if n2 == 0.0 {
        return c_xy;
    }

    c_xy + (c_z - c_xy) * orientation[axis] * orientation[axis] / n2
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::vector;

    #[test]
    fn radius_multiplier() {
        let expected = (3.0 / (4.0 * PI)).cbrt();
        assert!((DEFAULT_RADIUS_MULTIPLIER - expected).abs() < 1.0e-12);
        assert!((sphere_volume(DEFAULT_RADIUS_MULTIPLIER) - 1.0).abs() < 1.0e-12);
        assert!((sphere_radius(sphere_volume(0.3)) - 0.3).abs() < 1.0e-12);
    }

    #[test]
    fn circle_perimeter() {
        assert!((ellipse_perimeter(1.0, 1.0) - 2.0 * PI).abs() < 1.0e-12);
    }

    #[test]
    fn drag_tensor_projection() {
        let fiber = vector![0.0, 2.0, 0.0];
        assert_eq!(rotated_drag(&fiber, 1.0, 3.0, 1), 3.0);
        assert_eq!(rotated_drag(&fiber, 1.0, 3.0, 0), 1.0);
        let diag = vector![1.0, 1.0, 0.0];
        assert!((rotated_drag(&diag, 1.0, 3.0, 0) - 2.0).abs() < 1.0e-12);
    }

    #[test]
    fn lame_from_moduli() {
        // E = 2 mu (1 + nu) with nu = 0.25 gives lambda = mu.
        let mu = 4.0;
        let e = 2.0 * mu * 1.25;
        assert!((lame_lambda(e, mu) - mu).abs() < 1.0e-12);
    }
}
