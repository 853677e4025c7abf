// Copyright @yucwang 2023

use crate::core::bsdf::{same_hemisphere, BSDFEvalResult, BSDFSampleRecord, Lobe, BSDF};
use crate::math::constants::{ Float, INV_PI, Vector2f, Vector3f };
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{ sample_cosine_hemisphere, sample_cosine_hemisphere_pdf };

pub struct LambertianDiffuseBSDF {
    color: RGBSpectrum
}

impl LambertianDiffuseBSDF {
    pub fn new(rgb: RGBSpectrum) -> Self {
        Self {
            color: rgb,
        }
    }
}

impl BSDF for LambertianDiffuseBSDF {
    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> BSDFEvalResult {
        if !same_hemisphere(wo, wi) {
            return BSDFEvalResult::default();
        }
        BSDFEvalResult {
            value: self.color * INV_PI,
            pdf: sample_cosine_hemisphere_pdf(wi.z.abs()),
        }
    }

    fn sample(&self, wo: &Vector3f, u: &Vector2f, _u_lobe: Float) -> Option<BSDFSampleRecord> {
        let mut wi = sample_cosine_hemisphere(u);
        if wo.z < 0.0 {
            wi.z *= -1.0;
        }
        let pdf = sample_cosine_hemisphere_pdf(wi.z.abs());
        if pdf <= 0.0 {
            return None;
        }
        Some(BSDFSampleRecord { wi, wo: *wo, pdf, weight: self.color, lobe: Lobe::Diffuse })
    }

    fn albedo(&self) -> RGBSpectrum {
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambertian_sample_weight_is_albedo() {
        let bsdf = LambertianDiffuseBSDF::new(RGBSpectrum::new(0.8, 0.5, 0.2));
        let wo = Vector3f::new(0.0, 0.3, 0.9).normalize();
        let record = bsdf.sample(&wo, &Vector2f::new(0.3, 0.7), 0.5).expect("expected a sample");
        assert!(record.wi.z > 0.0);
        assert_eq!(record.weight, bsdf.albedo());

        let eval = bsdf.eval(&wo, &record.wi);
        let expected = eval.value * (record.wi.z / eval.pdf);
        assert!(expected.max_abs_diff(&record.weight) < 1e-4);

        let below = Vector3f::new(0.0, 0.0, -1.0);
        assert!(bsdf.eval(&wo, &below).value.is_black());
    }
}
