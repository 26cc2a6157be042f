use crate::geometry::{Point2, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Types usable as entries of a [`TransformStack`].
pub trait Identity {
    fn identity() -> Self;
}

/// Row-major 4×4 matrix, column vectors (`p' = M * p`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix4(pub [f64; 16]);

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Identity for Matrix4 {
    fn identity() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * 4 + col]
    }

    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::IDENTITY;
        m.0[3] = x;
        m.0[7] = y;
        m.0[11] = z;
        m
    }

    pub fn scale(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::IDENTITY;
        m.0[0] = x;
        m.0[5] = y;
        m.0[10] = z;
        m
    }

    /// Symmetric perspective frustum looking down -z.
    pub fn perspective(fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
        let f = 1.0 / (fov_y_degrees.to_radians() / 2.0).tan();
        Matrix4([
            f / aspect, 0.0, 0.0, 0.0, //
            0.0, f, 0.0, 0.0, //
            0.0, 0.0, (far + near) / (near - far), 2.0 * far * near / (near - far), //
            0.0, 0.0, -1.0, 0.0,
        ])
    }

    /// Homogeneous transform of `(p, 1)`.
    pub fn transform_homogeneous(&self, p: [f64; 4]) -> [f64; 4] {
        let m = &self.0;
        let mut out = [0.0; 4];
        for (row, value) in out.iter_mut().enumerate() {
            *value = m[row * 4] * p[0] + m[row * 4 + 1] * p[1] + m[row * 4 + 2] * p[2] + m[row * 4 + 3] * p[3];
        }
        out
    }

    pub fn transform_point(&self, p: Vec3) -> [f64; 4] {
        self.transform_homogeneous([p.x, p.y, p.z, 1.0])
    }

    pub fn determinant(&self) -> f64 {
        self.adjugate().1
    }

    /// Inverse, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Matrix4> {
        let (adj, det) = self.adjugate();
        if det.abs() < 1e-300 {
            return None;
        }
        let inv_det = 1.0 / det;
        let mut out = [0.0; 16];
        for (o, a) in out.iter_mut().zip(adj.iter()) {
            *o = a * inv_det;
        }
        Some(Matrix4(out))
    }

    // Cofactor expansion; returns (adjugate, determinant).
    fn adjugate(&self) -> ([f64; 16], f64) {
        let m = &self.0;
        let mut inv = [0.0; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14] + m[13] * m[6] * m[11] - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14] - m[12] * m[6] * m[11] + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13] + m[12] * m[5] * m[11] - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13] - m[12] * m[5] * m[10] + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14] - m[13] * m[2] * m[11] + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14] + m[12] * m[2] * m[11] - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13] - m[12] * m[1] * m[11] + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13] + m[12] * m[1] * m[10] - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14] + m[13] * m[2] * m[7] - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14] - m[12] * m[2] * m[7] + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13] + m[12] * m[1] * m[7] - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13] - m[12] * m[1] * m[6] + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10] - m[9] * m[2] * m[7] + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10] + m[8] * m[2] * m[7] - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9] - m[8] * m[1] * m[7] + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9] + m[8] * m[1] * m[6] - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        (inv, det)
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: Matrix4) -> Matrix4 {
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = (0..4).map(|k| self.0[row * 4 + k] * rhs.0[k * 4 + col]).sum();
            }
        }
        Matrix4(out)
    }
}

/// Row-major 3×3 affine matrix for 2D devices.
///
/// `x' = m[0]·x + m[1]·y + m[2]`, `y' = m[3]·x + m[4]·y + m[5]`. The PDF/SVG
/// `a b c d e f` operand order is `m[0] m[3] m[1] m[4] m[2] m[5]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3(pub [f64; 9]);

impl Default for Matrix3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Identity for Matrix3 {
    fn identity() -> Self {
        Self::IDENTITY
    }
}

impl Matrix3 {
    pub const IDENTITY: Matrix3 = Matrix3([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub fn translation(x: f64, y: f64) -> Self {
        Matrix3([1.0, 0.0, x, 0.0, 1.0, y, 0.0, 0.0, 1.0])
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix3([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn rotation_degrees(angle: f64) -> Self {
        let (s, c) = angle.to_radians().sin_cos();
        Matrix3([c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0])
    }

    /// Affine coefficients in PDF/SVG order `[a, b, c, d, e, f]`.
    pub fn to_affine(&self) -> [f64; 6] {
        let m = &self.0;
        [m[0], m[3], m[1], m[4], m[2], m[5]]
    }

    pub fn from_affine([a, b, c, d, e, f]: [f64; 6]) -> Self {
        Matrix3([a, c, e, b, d, f, 0.0, 0.0, 1.0])
    }

    pub fn transform_point(&self, p: Point2) -> Point2 {
        let m = &self.0;
        Point2::new(m[0] * p.x + m[1] * p.y + m[2], m[3] * p.x + m[4] * p.y + m[5])
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6])
    }

    pub fn inverse(&self) -> Option<Matrix3> {
        let det = self.determinant();
        if det.abs() < 1e-300 {
            return None;
        }
        let m = &self.0;
        let inv_det = 1.0 / det;
        Some(Matrix3([
            (m[4] * m[8] - m[5] * m[7]) * inv_det,
            (m[2] * m[7] - m[1] * m[8]) * inv_det,
            (m[1] * m[5] - m[2] * m[4]) * inv_det,
            (m[5] * m[6] - m[3] * m[8]) * inv_det,
            (m[0] * m[8] - m[2] * m[6]) * inv_det,
            (m[2] * m[3] - m[0] * m[5]) * inv_det,
            (m[3] * m[7] - m[4] * m[6]) * inv_det,
            (m[1] * m[6] - m[0] * m[7]) * inv_det,
            (m[0] * m[4] - m[1] * m[3]) * inv_det,
        ]))
    }

    pub fn approx_eq(&self, other: &Matrix3, tolerance: f64) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| (a - b).abs() <= tolerance)
    }

    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.approx_eq(&Matrix3::IDENTITY, tolerance)
    }

    /// Signed scale factors `(sx, sy)` of the linear part.
    ///
    /// `sx = sign(a)·√(a² + b²)` and `sy = sign(d)·√(c² + d²)`, using the affine
    /// coefficient names of [`Matrix3::to_affine`].
    pub fn scale_factors(&self) -> (f64, f64) {
        let [a, b, c, d, _, _] = self.to_affine();
        let sx = a.signum() * (a * a + b * b).sqrt();
        let sy = d.signum() * (c * c + d * d).sqrt();
        (sx, sy)
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: Matrix3) -> Matrix3 {
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = (0..3).map(|k| self.0[row * 3 + k] * rhs.0[k * 3 + col]).sum();
            }
        }
        Matrix3(out)
    }
}

/// A matrix with push/pop semantics. The bottom entry is never popped.
#[derive(Debug, Clone)]
pub struct TransformStack<M> {
    stack: Vec<M>,
}

impl<M: Copy + Identity + Mul<Output = M>> Default for TransformStack<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Copy + Identity + Mul<Output = M>> TransformStack<M> {
    pub fn new() -> Self {
        Self { stack: vec![M::identity()] }
    }

    pub fn current(&self) -> M {
        // The stack always holds at least the root entry.
        self.stack.last().copied().unwrap_or_else(M::identity)
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn push(&mut self) {
        let top = self.current();
        self.stack.push(top);
    }

    /// Returns `false` when only the root entry remains.
    pub fn pop(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    pub fn set(&mut self, m: M) {
        if let Some(top) = self.stack.last_mut() {
            *top = m;
        }
    }

    /// Post-multiplies the current matrix: `current = current * m`.
    pub fn multiply(&mut self, m: M) {
        if let Some(top) = self.stack.last_mut() {
            *top = *top * m;
        }
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(M::identity());
    }
}
