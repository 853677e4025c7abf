// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterFlag(u8);

impl EmitterFlag {
    pub const NONE: Self = Self(0);
    pub const SURFACE: Self = Self(1 << 1);
    pub const DELTA: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for EmitterFlag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Incident illumination sampled toward a shading point.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub wi: Vector3f,
    pub distance: Float,
    pub position: Vector3f,
    pub normal: Option<Vector3f>,
    pub radiance: RGBSpectrum,
    /// Solid-angle density; 1 for delta lights.
    pub pdf: Float,
}

/// A photon leaving an emitter. `power` already carries the
/// 1 / (pdf_pos · pdf_dir) factor.
#[derive(Debug, Clone, Copy)]
pub struct PhotonEmission {
    pub ray: Ray3f,
    pub power: RGBSpectrum,
    pub normal: Option<Vector3f>,
    pub pdf_pos: Float,
}

pub trait Emitter: Send + Sync {
    fn get_flag(&self) -> EmitterFlag;
    fn sample_li(&self, p: &Vector3f, u: &Vector2f) -> Option<LightSample>;
    fn sample_photon(&self, u_pos: &Vector2f, u_dir: &Vector2f) -> PhotonEmission;
    /// Total emitted flux, used for power-proportional selection.
    fn power(&self) -> RGBSpectrum;
    /// Index of the scene object this emitter is attached to.
    fn object(&self) -> Option<usize> {
        None
    }
    fn is_delta(&self) -> bool {
        self.get_flag().contains(EmitterFlag::DELTA)
    }
}
