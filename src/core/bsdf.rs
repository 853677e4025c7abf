// Copyright @yucwang 2023

use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::spectrum::RGBSpectrum;

// All directions handed to a BSDF are in the local shading frame,
// z is the shading normal.
pub type BSDFValue = RGBSpectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lobe {
    Diffuse,
    SpecularReflection,
    SpecularTransmission,
}

impl Lobe {
    pub fn is_specular(&self) -> bool {
        !matches!(self, Lobe::Diffuse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BSDFSampleRecord {
    pub wi: Vector3f,
    pub wo: Vector3f,
    pub pdf: Float,
    /// f · |cos θi| / pdf
    pub weight: BSDFValue,
    pub lobe: Lobe,
}

#[derive(Debug, PartialEq)]
pub struct BSDFEvalResult {
    pub value: BSDFValue,
    pub pdf: Float,
}

pub trait BSDF: Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
    /// Non-delta part of the BSDF, without the cosine term.
    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> BSDFEvalResult;
    fn sample(&self, wo: &Vector3f, u: &Vector2f, u_lobe: Float) -> Option<BSDFSampleRecord>;
    /// True when every lobe is a delta distribution.
    fn is_specular(&self) -> bool {
        false
    }
    /// Every delta lobe leaving toward `wo`, each weight already scaled by
    /// the lobe's share of the energy. Empty for non-specular materials.
    fn specular_lobes(&self, _wo: &Vector3f) -> Vec<BSDFSampleRecord> {
        Vec::new()
    }
    /// Diffuse reflectance, used by colour passes and clay overrides.
    fn albedo(&self) -> RGBSpectrum;
    /// Filter applied to shadow rays crossing the surface; black when opaque.
    fn transmittance(&self) -> RGBSpectrum {
        RGBSpectrum::default()
    }
    fn sample_and_eval(&self, wo: &Vector3f, u: &Vector2f, u_lobe: Float) -> BSDFEvalResult {
        match self.sample(wo, u, u_lobe) {
            Some(record) => BSDFEvalResult { value: record.weight, pdf: record.pdf },
            None => BSDFEvalResult::default(),
        }
    }
}

impl Default for BSDFEvalResult {
    fn default() -> Self {
        Self {
            value: RGBSpectrum::default(),
            pdf: 0.0,
        }
    }
}

pub fn same_hemisphere(a: &Vector3f, b: &Vector3f) -> bool {
    a.z * b.z > 0.0
}
