// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Vector3f, Matrix4f };

use nalgebra as na;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or_else(Matrix4f::identity) }
    }

    pub fn translate(v: Vector3f) -> Self {
        Self::new(Matrix4f::new_translation(&v))
    }

    pub fn scale(v: Vector3f) -> Self {
        Self::new(Matrix4f::new_nonuniform_scaling(&v))
    }

    pub fn rotate(axis: Vector3f, angle_deg: Float) -> Self {
        let axis = na::Unit::new_normalize(axis);
        Self::new(na::Rotation3::from_axis_angle(&axis, angle_deg.to_radians()).to_homogeneous())
    }

    /// `other` is applied after `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self::new(other.matrix * self.matrix)
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        let h = self.matrix * p.push(1.0);
        Vector3f::new(h.x / h.w, h.y / h.w, h.z / h.w)
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.matrix * v.push(0.0)).xyz()
    }

    // Normal transformation is different from point transformation.
    // Before transformation, we have n^Tx = 0
    // After transformation, we have (Sn)^T(Mx) = 0
    // Then, we will get: S = (M^{-1})^T
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        (self.inv_matrix.transpose() * n.push(0.0)).xyz()
    }

    pub fn inv_apply_point(&self, p: Vector3f) -> Vector3f {
        let h = self.inv_matrix * p.push(1.0);
        Vector3f::new(h.x / h.w, h.y / h.w, h.z / h.w)
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.inv_matrix * v.push(0.0)).xyz()
    }
}
