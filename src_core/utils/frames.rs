use crate::math::{Matrix, Real, Rotation, Vector, MASS_EPSILON};

/// An arbitrary unit vector orthogonal to `v`.
///
/// Crosses `v` with the coordinate axis it is the least aligned with. Returns
/// the zero vector if `v` is zero.
pub fn find_normal(v: &Vector<Real>) -> Vector<Real> {
    let abs = v.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector::x()
    } else if abs.y <= abs.z {
        Vector::y()
    } else {
        Vector::z()
    };

    v.cross(&axis).try_normalize(0.0).unwrap_or_else(Vector::zeros)
}

/// `v` scaled to unit length, or the zero vector when `v` is degenerate.
#[inline]
pub fn normalize_or_zero(v: &Vector<Real>) -> Vector<Real> {
    v.try_normalize(MASS_EPSILON).unwrap_or_else(Vector::zeros)
}

/// Gram-Schmidt QR decomposition `m = q * r` with a non-negative diagonal in `r`.
///
/// Degenerate columns yield zero columns in `q`.
pub fn qr_decompose(m: &Matrix<Real>) -> (Matrix<Real>, Matrix<Real>) {
    let mut q = Matrix::zeros();
    let mut r = Matrix::zeros();

    for j in 0..3 {
        let mut col = m.column(j).into_owned();

        for i in 0..j {
            let qi = q.column(i).into_owned();
            let proj = qi.dot(&m.column(j));
            r[(i, j)] = proj;
            col -= qi * proj;
        }

        let norm = col.norm();
        r[(j, j)] = norm;
        if norm > 0.0 {
            q.set_column(j, &(col / norm));
        }
    }

    (q, r)
}

/// Rotation angle of `q` around `dir` (the twist of its swing-twist
/// decomposition).
pub fn twist_component(q: &Rotation<Real>, dir: &Vector<Real>) -> Real {
    let q = q.quaternion();
    2.0 * q.imag().dot(dir).atan2(q.w)
}

/// Gradients of the three barycentric coordinate functions of a triangle,
/// stored as the columns of the result.
pub fn triangle_gradient(x0: &Vector<Real>, x1: &Vector<Real>, x2: &Vector<Real>) -> Matrix<Real> {
    let n = (x1 - x0).cross(&(x2 - x0));
    let area2 = n.norm();

    if area2 == 0.0 {
        return Matrix::zeros();
    }

    let nhat = n / area2;
    Matrix::from_columns(&[
        nhat.cross(&(x2 - x1)) / area2,
        nhat.cross(&(x0 - x2)) / area2,
        nhat.cross(&(x1 - x0)) / area2,
    ])
}

/// Angle at vertex `a` of the triangle `(a, b, c)`.
pub fn corner_angle(a: &Vector<Real>, b: &Vector<Real>, c: &Vector<Real>) -> Real {
    let e0 = b - a;
    let e1 = c - a;
    e0.cross(&e1).norm().atan2(e0.dot(&e1))
}
