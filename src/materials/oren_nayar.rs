// Copyright @yucwang 2026

use crate::core::bsdf::{same_hemisphere, BSDFEvalResult, BSDFSampleRecord, Lobe, BSDF};
use crate::math::constants::{Float, Vector2f, Vector3f, INV_PI};
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_cosine_hemisphere, sample_cosine_hemisphere_pdf};

/// Qualitative Oren-Nayar rough diffuse reflection; `sigma` is the slope
/// deviation in radians.
pub struct OrenNayarBSDF {
    color: RGBSpectrum,
    a: Float,
    b: Float,
}

impl OrenNayarBSDF {
    pub fn new(color: RGBSpectrum, sigma: Float) -> Self {
        let sigma2 = sigma * sigma;
        Self {
            color,
            a: 1.0 - 0.5 * sigma2 / (sigma2 + 0.33),
            b: 0.45 * sigma2 / (sigma2 + 0.09),
        }
    }

    fn factor(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        let sin_theta_o = (1.0 - wo.z * wo.z).max(0.0).sqrt();
        let sin_theta_i = (1.0 - wi.z * wi.z).max(0.0).sqrt();

        let mut max_cos = 0.0;
        if sin_theta_o > 1e-4 && sin_theta_i > 1e-4 {
            let (cos_po, sin_po) = (wo.x / sin_theta_o, wo.y / sin_theta_o);
            let (cos_pi, sin_pi) = (wi.x / sin_theta_i, wi.y / sin_theta_i);
            max_cos = (cos_pi * cos_po + sin_pi * sin_po).max(0.0);
        }

        let (sin_alpha, tan_beta) = if wi.z.abs() > wo.z.abs() {
            (sin_theta_o, sin_theta_i / wi.z.abs())
        } else {
            (sin_theta_i, sin_theta_o / wo.z.abs().max(1e-6))
        };
        self.a + self.b * max_cos * sin_alpha * tan_beta
    }
}

impl BSDF for OrenNayarBSDF {
    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> BSDFEvalResult {
        if !same_hemisphere(wo, wi) {
            return BSDFEvalResult::default();
        }
        BSDFEvalResult {
            value: self.color * (INV_PI * self.factor(wo, wi)),
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
        let weight = self.color * self.factor(wo, &wi);
        Some(BSDFSampleRecord { wi, wo: *wo, pdf, weight, lobe: Lobe::Diffuse })
    }

    fn albedo(&self) -> RGBSpectrum {
        self.color
    }
}
