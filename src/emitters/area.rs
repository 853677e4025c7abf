// Copyright @yucwang 2026

use crate::core::emitter::{Emitter, EmitterFlag, LightSample, PhotonEmission};
use crate::core::shape::Shape;
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::sample_cosine_hemisphere;
use std::sync::Arc;

/// One-sided diffuse emitter attached to a scene object; it radiates
/// along the shape normal.
pub struct AreaEmitter {
    shape: Arc<dyn Shape>,
    radiance: RGBSpectrum,
    object: usize,
}

impl AreaEmitter {
    pub fn from_shape(shape: Arc<dyn Shape>, radiance: RGBSpectrum, object: usize) -> Self {
        Self { shape, radiance, object }
    }

    pub fn radiance(&self) -> RGBSpectrum {
        self.radiance
    }
}

impl Emitter for AreaEmitter {
    fn get_flag(&self) -> EmitterFlag {
        EmitterFlag::SURFACE
    }

    fn sample_li(&self, p: &Vector3f, u: &Vector2f) -> Option<LightSample> {
        let record = self.shape.sample(u);
        let its = record.intersection();
        let to_light = its.p() - p;
        let dist2 = to_light.norm_squared();
        if dist2 <= 0.0 || record.pdf() <= 0.0 {
            return None;
        }
        let distance = dist2.sqrt();
        let wi = to_light / distance;
        let cos_light = its.geo_normal().dot(&(-wi));
        if cos_light <= 0.0 {
            return None;
        }
        Some(LightSample {
            wi,
            distance,
            position: its.p(),
            normal: Some(its.geo_normal()),
            radiance: self.radiance,
            pdf: record.pdf() * dist2 / cos_light,
        })
    }

    fn sample_photon(&self, u_pos: &Vector2f, u_dir: &Vector2f) -> PhotonEmission {
        let record = self.shape.sample(u_pos);
        let its = record.intersection();
        let n = its.geo_normal();
        let dir = Frame::from_normal(&n).from_local(&sample_cosine_hemisphere(u_dir));
        let pdf_pos = record.pdf();
        let power = if pdf_pos > 0.0 { self.radiance * (PI / pdf_pos) } else { RGBSpectrum::default() };
        PhotonEmission {
            ray: Ray3f::new(its.p(), dir, None, None),
            power,
            normal: Some(n),
            pdf_pos,
        }
    }

    fn power(&self) -> RGBSpectrum {
        self.radiance * (PI * self.shape.surface_area())
    }

    fn object(&self) -> Option<usize> {
        Some(self.object)
    }
}

pub fn emitted_radiance(radiance: RGBSpectrum, normal: &Vector3f, w: &Vector3f) -> RGBSpectrum {
    if normal.dot(w) > 0.0 { radiance } else { RGBSpectrum::default() }
}
