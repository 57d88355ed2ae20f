//! Closed-form level-set helpers: fraction of a segment, square or cube lying
//! inside the negative region of a linearly-interpolated signed distance.

use crate::math::{Real, Vector};
use na::Matrix4;

/// Fraction of the segment `[a, b]` where the linear interpolant of
/// `phi_left` and `phi_right` is negative.
pub fn fraction_inside(phi_left: Real, phi_right: Real) -> Real {
    if phi_left < 0.0 && phi_right < 0.0 {
        1.0
    } else if phi_left < 0.0 && phi_right >= 0.0 {
        phi_left / (phi_left - phi_right)
    } else if phi_left >= 0.0 && phi_right < 0.0 {
        phi_right / (phi_right - phi_left)
    } else {
        0.0
    }
}

/// Fraction of a unit square inside the negative region, given the values at
/// its bottom-left, bottom-right, top-left and top-right corners.
pub fn fraction_inside_quad(phi_bl: Real, phi_br: Real, phi_tl: Real, phi_tr: Real) -> Real {
    let inside_count = [phi_bl, phi_br, phi_tl, phi_tr]
        .iter()
        .filter(|phi| **phi < 0.0)
        .count();
    // Counter-clockwise order.
    let mut list = [phi_bl, phi_br, phi_tr, phi_tl];

    match inside_count {
        4 => 1.0,
        3 => {
            while list[0] < 0.0 {
                list.rotate_left(1);
            }

            let side0 = 1.0 - fraction_inside(list[0], list[3]);
            let side1 = 1.0 - fraction_inside(list[0], list[1]);
            1.0 - 0.5 * side0 * side1
        }
        2 => {
            while list[0] >= 0.0 || !(list[1] < 0.0 || list[2] < 0.0) {
                list.rotate_left(1);
            }

            if list[1] < 0.0 {
                // Adjacent corners.
                let side_left = fraction_inside(list[0], list[3]);
                let side_right = fraction_inside(list[1], list[2]);
                0.5 * (side_left + side_right)
            } else {
                // Diagonal corners, disambiguated by the center value.
                let middle = 0.25 * list.iter().sum::<Real>();

                if middle < 0.0 {
                    let side1 = 1.0 - fraction_inside(list[0], list[3]);
                    let side3 = 1.0 - fraction_inside(list[2], list[3]);
                    let side2 = 1.0 - fraction_inside(list[2], list[1]);
                    let side0 = 1.0 - fraction_inside(list[0], list[1]);
                    1.0 - 0.5 * side1 * side3 - 0.5 * side0 * side2
                } else {
                    let side0 = fraction_inside(list[0], list[1]);
                    let side1 = fraction_inside(list[0], list[3]);
                    let side2 = fraction_inside(list[2], list[1]);
                    let side3 = fraction_inside(list[2], list[3]);
                    0.5 * side0 * side1 + 0.5 * side2 * side3
                }
            }
        }
        1 => {
            while list[0] >= 0.0 {
                list.rotate_left(1);
            }

            let side0 = fraction_inside(list[0], list[3]);
            let side1 = fraction_inside(list[0], list[1]);
            0.5 * side0 * side1
        }
        _ => 0.0,
    }
}

/// Barycentric coordinates of the point of the edge `(a, b)` where the linear
/// interpolant vanishes.
fn edge_crossing(phi: &[Real; 4], a: usize, b: usize) -> [Real; 4] {
    let t = phi[a] / (phi[a] - phi[b]);
    let mut out = [0.0; 4];
    out[a] = 1.0 - t;
    out[b] = t;
    out
}

fn vertex(a: usize) -> [Real; 4] {
    let mut out = [0.0; 4];
    out[a] = 1.0;
    out
}

/// Volume of a sub-tetrahedron given in barycentric coordinates, relative to
/// the volume of the enclosing tetrahedron.
fn relative_volume(pts: [[Real; 4]; 4]) -> Real {
    Matrix4::from_fn(|i, j| pts[j][i]).determinant().abs()
}

/// Fraction of a tetrahedron inside the negative region of the linear
/// interpolant of its four vertex values.
pub fn tet_fraction_inside(phi: [Real; 4]) -> Real {
    let inside: Vec<usize> = (0..4).filter(|i| phi[*i] < 0.0).collect();
    let outside: Vec<usize> = (0..4).filter(|i| phi[*i] >= 0.0).collect();

    match inside.len() {
        0 => 0.0,
        4 => 1.0,
        1 => {
            let a = inside[0];
            outside
                .iter()
                .map(|b| phi[a] / (phi[a] - phi[*b]))
                .product()
        }
        3 => {
            let a = outside[0];
            1.0 - inside
                .iter()
                .map(|b| phi[a] / (phi[a] - phi[*b]))
                .product::<Real>()
        }
        _ => {
            // Triangular prism between the two inside vertices and the four
            // crossing points.
            let (a, b) = (inside[0], inside[1]);
            let (c, d) = (outside[0], outside[1]);
            let a0 = vertex(a);
            let a1 = edge_crossing(&phi, a, c);
            let a2 = edge_crossing(&phi, a, d);
            let b0 = vertex(b);
            let b1 = edge_crossing(&phi, b, c);
            let b2 = edge_crossing(&phi, b, d);

            relative_volume([a0, a1, a2, b2])
                + relative_volume([a0, a1, b1, b2])
                + relative_volume([a0, b0, b1, b2])
        }
    }
}

/// Fraction of a unit cube inside the negative region.
///
/// The corner values are ordered by `i + 2j + 4k`, i.e. `000, 100, 010, 110,
/// 001, 101, 011, 111`. The cube is split into the six tetrahedra of its
/// Kuhn triangulation, all sharing the `000 - 111` diagonal.
pub fn volume_fraction(phi: [Real; 8]) -> Real {
    if phi.iter().all(|p| *p < 0.0) {
        return 1.0;
    }
    if phi.iter().all(|p| *p >= 0.0) {
        return 0.0;
    }

    const AXIS_ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    AXIS_ORDERS
        .iter()
        .map(|order| {
            let v1 = 1 << order[0];
            let v2 = v1 | (1 << order[1]);
            tet_fraction_inside([phi[0], phi[v1], phi[v2], phi[7]])
        })
        .sum::<Real>()
        / 6.0
}

/// Trilinear interpolation of the eight corner values (ordered like
/// [`volume_fraction`]) at the local coordinates `frac ∈ [0, 1]³`.
pub fn trilerp(values: &[Real; 8], frac: &Vector<Real>) -> Real {
    let lerp = |a: Real, b: Real, t: Real| a + (b - a) * t;
    let x00 = lerp(values[0], values[1], frac.x);
    let x10 = lerp(values[2], values[3], frac.x);
    let x01 = lerp(values[4], values[5], frac.x);
    let x11 = lerp(values[6], values[7], frac.x);
    lerp(lerp(x00, x10, frac.y), lerp(x01, x11, frac.y), frac.z)
}

/// Mean curvature from a `3 × 3` height-function stencil.
///
/// `heights[3 * r + c]` is the column height at tangent offsets
/// `(c - 1, r - 1)`, in world units.
pub fn mean_curvature(heights: &[Real; 9], dx: Real) -> Real {
    let hu = (heights[5] - heights[3]) / (2.0 * dx);
    let hv = (heights[7] - heights[1]) / (2.0 * dx);
    let huu = (heights[5] - 2.0 * heights[4] + heights[3]) / (dx * dx);
    let hvv = (heights[7] - 2.0 * heights[4] + heights[1]) / (dx * dx);
    let huv = (heights[8] - heights[6] - heights[2] + heights[0]) / (4.0 * dx * dx);
    let denom = (1.0 + hu * hu + hv * hv).powf(1.5);

    (huu * (1.0 + hv * hv) + hvv * (1.0 + hu * hu) - 2.0 * hu * hv * huv) / denom
}

/// Compactly supported smoothing kernel `max(0, 1 - r²/h²)³`.
#[inline]
pub fn smooth_kernel(r2: Real, h: Real) -> Real {
    (1.0 - r2 / (h * h)).max(0.0).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::vector;

    #[test]
    fn segment_fraction() {
        assert_eq!(fraction_inside(-1.0, -2.0), 1.0);
        assert_eq!(fraction_inside(1.0, 2.0), 0.0);
        assert!((fraction_inside(-1.0, 3.0) - 0.25).abs() < 1.0e-12);
        assert!((fraction_inside(3.0, -1.0) - 0.25).abs() < 1.0e-12);
    }

    #[test]
    fn quad_fraction_half_plane() {
        // Plane x = 0.5 crossing the square.
        let f = fraction_inside_quad(-0.5, 0.5, -0.5, 0.5);
        assert!((f - 0.5).abs() < 1.0e-12);
        // Single corner cut.
        let f = fraction_inside_quad(-0.5, 0.5, 0.5, 1.5);
        assert!((f - 0.125).abs() < 1.0e-12);
        let f = fraction_inside_quad(0.5, -0.5, -0.5, -1.5);
        assert!((f - 0.875).abs() < 1.0e-12);
    }

    #[test]
    fn cube_fraction_planes() {
        // phi = x - 0.3 is inside for x < 0.3.
        let phi = |x: Real, _y: Real, _z: Real| x - 0.3;
        let corners = [
            phi(0.0, 0.0, 0.0),
            phi(1.0, 0.0, 0.0),
            phi(0.0, 1.0, 0.0),
            phi(1.0, 1.0, 0.0),
            phi(0.0, 0.0, 1.0),
            phi(1.0, 0.0, 1.0),
            phi(0.0, 1.0, 1.0),
            phi(1.0, 1.0, 1.0),
        ];
        assert!((volume_fraction(corners) - 0.3).abs() < 1.0e-10);

        // Diagonal plane x + y + z = 1.5 splits the cube in halves.
        let corners = [
            -1.5, -0.5, -0.5, 0.5, -0.5, 0.5, 0.5, 1.5,
        ];
        assert!((volume_fraction(corners) - 0.5).abs() < 1.0e-10);

        assert_eq!(volume_fraction([-1.0; 8]), 1.0);
        assert_eq!(volume_fraction([1.0; 8]), 0.0);
    }

    #[test]
    fn tet_corner_cut() {
        let f = tet_fraction_inside([-1.0, 1.0, 1.0, 1.0]);
        assert!((f - 0.125).abs() < 1.0e-12);
        let f = tet_fraction_inside([1.0, -1.0, -1.0, -1.0]);
        assert!((f - 0.875).abs() < 1.0e-12);
        let f = tet_fraction_inside([-1.0, -1.0, 1.0, 1.0]);
        assert!((f - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn trilerp_reproduces_linear_functions() {
        let f = |x: Real, y: Real, z: Real| 1.0 + 2.0 * x - y + 0.5 * z;
        let values = [
            f(0.0, 0.0, 0.0),
            f(1.0, 0.0, 0.0),
            f(0.0, 1.0, 0.0),
            f(1.0, 1.0, 0.0),
            f(0.0, 0.0, 1.0),
            f(1.0, 0.0, 1.0),
            f(0.0, 1.0, 1.0),
            f(1.0, 1.0, 1.0),
        ];
        let p = vector![0.25, 0.6, 0.9];
        assert!((trilerp(&values, &p) - f(p.x, p.y, p.z)).abs() < 1.0e-12);
    }

    #[test]
    fn paraboloid_curvature() {
        let dx = 0.1;
        let a = 2.0;
        let mut heights = [0.0; 9];
        for r in 0..3 {
            for c in 0..3 {
                let u = (c as Real - 1.0) * dx;
                let v = (r as Real - 1.0) * dx;
                heights[r * 3 + c] = a * (u * u + v * v);
            }
        }
        assert!((mean_curvature(&heights, dx) - 4.0 * a).abs() < 1.0e-9);
        assert_eq!(mean_curvature(&[0.3; 9], dx), 0.0);
    }
}
