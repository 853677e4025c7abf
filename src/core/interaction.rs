// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::frame::Frame;

/// A ray/surface hit. `object` is filled in by the scene once the hit is
/// resolved against its object list.
#[derive(Debug, Clone)]
pub struct SurfaceIntersection {
    p: Vector3f,
    geo_normal: Vector3f,
    sh_normal: Vector3f,
    uv: Vector2f,
    dp_du: Vector3f,
    dp_dv: Vector3f,
    t: Float,
    object: Option<usize>,
}

pub struct SurfaceSampleRecord {
    intersection: SurfaceIntersection,
    pdf: Float,
}

impl SurfaceIntersection {
    pub fn new(p: Vector3f,
               geo_normal: Vector3f,
               sh_normal: Vector3f,
               uv: Vector2f,
               t: Float) -> Self {
        Self { p, geo_normal, sh_normal, uv,
               dp_du: Vector3f::zeros(), dp_dv: Vector3f::zeros(),
               t, object: None }
    }

    pub fn with_partials(mut self, dp_du: Vector3f, dp_dv: Vector3f) -> Self {
        self.dp_du = dp_du;
        self.dp_dv = dp_dv;
        self
    }

    pub fn with_object(mut self, object: usize) -> Self {
        self.object = Some(object);
        self
    }

    pub fn t(&self) -> Float {
        self.t
    }

    pub fn p(&self) -> Vector3f {
        self.p
    }

    pub fn uv(&self) -> Vector2f {
        self.uv
    }

    pub fn geo_normal(&self) -> Vector3f {
        self.geo_normal
    }

    pub fn sh_normal(&self) -> Vector3f {
        self.sh_normal
    }

    pub fn dp_du(&self) -> Vector3f {
        self.dp_du
    }

    pub fn dp_dv(&self) -> Vector3f {
        self.dp_dv
    }

    pub fn object(&self) -> Option<usize> {
        self.object
    }

    /// Shading frame with `x` along dPdU (NU) and `y` completing it (NV).
    pub fn shading_frame(&self) -> Frame {
        Frame::from_tangent(&self.sh_normal, &self.dp_du)
    }

    /// Shading-space derivatives (dSdU, dSdV): dPdU and dPdV expressed in
    /// the shading frame.
    pub fn shading_partials(&self) -> (Vector3f, Vector3f) {
        let frame = self.shading_frame();
        (frame.to_local(&self.dp_du), frame.to_local(&self.dp_dv))
    }

    /// Normal flipped to the side `w` points to.
    pub fn facing_normal(&self, w: &Vector3f) -> Vector3f {
        if self.geo_normal.dot(w) < 0.0 { -self.geo_normal } else { self.geo_normal }
    }

    /// Ray origin offset along the geometric normal toward `w`.
    pub fn spawn_origin(&self, w: &Vector3f, bias: Float) -> Vector3f {
        self.p + self.facing_normal(w) * bias
    }
}

impl SurfaceSampleRecord {
    pub fn new(intersection: SurfaceIntersection, pdf: Float) -> Self {
        Self { intersection, pdf }
    }

    pub fn intersection(&self) -> &SurfaceIntersection {
        &self.intersection
    }

    /// Area-measure density.
    pub fn pdf(&self) -> Float {
        self.pdf
    }
}
