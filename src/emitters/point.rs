// Copyright @yucwang 2026

use crate::core::emitter::{Emitter, EmitterFlag, LightSample, PhotonEmission};
use crate::math::constants::{Vector2f, Vector3f, PI};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_uniform_sphere, sample_uniform_sphere_pdf};

/// Isotropic point light; `intensity` is radiant intensity.
pub struct PointEmitter {
    position: Vector3f,
    intensity: RGBSpectrum,
}

impl PointEmitter {
    pub fn new(position: Vector3f, intensity: RGBSpectrum) -> Self {
        Self { position, intensity }
    }
}

impl Emitter for PointEmitter {
    fn get_flag(&self) -> EmitterFlag {
        EmitterFlag::DELTA
    }

    fn sample_li(&self, p: &Vector3f, _u: &Vector2f) -> Option<LightSample> {
        let to_light = self.position - p;
        let dist2 = to_light.norm_squared();
        if dist2 <= 0.0 {
            return None;
        }
        let distance = dist2.sqrt();
        Some(LightSample {
            wi: to_light / distance,
            distance,
            position: self.position,
            normal: None,
            radiance: self.intensity / dist2,
            pdf: 1.0,
        })
    }

    fn sample_photon(&self, _u_pos: &Vector2f, u_dir: &Vector2f) -> PhotonEmission {
        PhotonEmission {
            ray: Ray3f::new(self.position, sample_uniform_sphere(u_dir), None, None),
            power: self.intensity / sample_uniform_sphere_pdf(),
            normal: None,
            pdf_pos: 1.0,
        }
    }

    fn power(&self) -> RGBSpectrum {
        self.intensity * (4.0 * PI)
    }
}
