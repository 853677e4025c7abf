// Copyright @yucwang 2026

use crate::core::bsdf::{BSDFEvalResult, BSDFSampleRecord, Lobe, BSDF};
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;

fn reflect(wo: &Vector3f) -> Vector3f {
    Vector3f::new(-wo.x, -wo.y, wo.z)
}

/// Unpolarized Fresnel reflectance for a dielectric interface. `cos_i` is
/// signed: negative when arriving from inside.
pub fn fresnel_dielectric(cos_i: Float, ior: Float) -> Float {
    let (eta_i, eta_t, cos_i) = if cos_i > 0.0 { (1.0, ior, cos_i) } else { (ior, 1.0, -cos_i) };
    let sin_t = eta_i / eta_t * (1.0 - cos_i * cos_i).max(0.0).sqrt();
    if sin_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin_t * sin_t).max(0.0).sqrt();
    let r_par = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    0.5 * (r_par * r_par + r_perp * r_perp)
}

pub struct MirrorBSDF {
    reflectance: RGBSpectrum,
}

impl MirrorBSDF {
    pub fn new(reflectance: RGBSpectrum) -> Self {
        Self { reflectance }
    }
}

impl BSDF for MirrorBSDF {
    fn eval(&self, _wo: &Vector3f, _wi: &Vector3f) -> BSDFEvalResult {
        BSDFEvalResult::default()
    }

    fn sample(&self, wo: &Vector3f, _u: &Vector2f, _u_lobe: Float) -> Option<BSDFSampleRecord> {
        if wo.z == 0.0 {
            return None;
        }
        Some(BSDFSampleRecord {
            wi: reflect(wo),
            wo: *wo,
            pdf: 1.0,
            weight: self.reflectance,
            lobe: Lobe::SpecularReflection,
        })
    }

    fn is_specular(&self) -> bool {
        true
    }

    fn specular_lobes(&self, wo: &Vector3f) -> Vec<BSDFSampleRecord> {
        self.sample(wo, &Vector2f::zeros(), 0.0).into_iter().collect()
    }

    fn albedo(&self) -> RGBSpectrum {
        RGBSpectrum::default()
    }
}

/// Smooth dielectric; the lobe is picked with probability equal to the
/// Fresnel term.
pub struct GlassBSDF {
    ior: Float,
    reflectance: RGBSpectrum,
    transmittance: RGBSpectrum,
}

impl GlassBSDF {
    pub fn new(ior: Float, reflectance: RGBSpectrum, transmittance: RGBSpectrum) -> Self {
        Self { ior: ior.max(1e-3), reflectance, transmittance }
    }
}

impl BSDF for GlassBSDF {
    fn eval(&self, _wo: &Vector3f, _wi: &Vector3f) -> BSDFEvalResult {
        BSDFEvalResult::default()
    }

    fn sample(&self, wo: &Vector3f, _u: &Vector2f, u_lobe: Float) -> Option<BSDFSampleRecord> {
        if wo.z == 0.0 {
            return None;
        }
        let fr = fresnel_dielectric(wo.z, self.ior);
        if u_lobe < fr {
            return Some(BSDFSampleRecord {
                wi: reflect(wo),
                wo: *wo,
                pdf: fr,
                weight: self.reflectance,
                lobe: Lobe::SpecularReflection,
            });
        }

        let entering = wo.z > 0.0;
        let eta = if entering { 1.0 / self.ior } else { self.ior };
        let cos_i = wo.z.abs();
        let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
        if sin2_t >= 1.0 {
            return None;
        }
        let cos_t = (1.0 - sin2_t).sqrt();
        let wi = Vector3f::new(-eta * wo.x, -eta * wo.y, if entering { -cos_t } else { cos_t });
        Some(BSDFSampleRecord {
            wi,
            wo: *wo,
            pdf: 1.0 - fr,
            weight: self.transmittance,
            lobe: Lobe::SpecularTransmission,
        })
    }

    fn is_specular(&self) -> bool {
        true
    }

    fn specular_lobes(&self, wo: &Vector3f) -> Vec<BSDFSampleRecord> {
        // u_lobe = 0 always reflects, u_lobe = 1 always refracts unless the
        // ray is totally reflected.
        [0.0, 1.0]
            .iter()
            .filter_map(|u_lobe| self.sample(wo, &Vector2f::zeros(), *u_lobe))
            .map(|mut record| {
                record.weight *= record.pdf;
                record.pdf = 1.0;
                record
            })
            .collect()
    }

    fn albedo(&self) -> RGBSpectrum {
        RGBSpectrum::default()
    }

    fn transmittance(&self) -> RGBSpectrum {
        self.transmittance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresnel_limits() {
        let normal = fresnel_dielectric(1.0, 1.5);
        assert!((normal - 0.04).abs() < 1e-3);
        assert!((fresnel_dielectric(-0.1, 1.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_glass_refraction_bends_toward_normal() {
        let glass = GlassBSDF::new(1.5, RGBSpectrum::splat(1.0), RGBSpectrum::splat(1.0));
        let wo = Vector3f::new(0.6, 0.0, 0.8);
        let record = glass.sample(&wo, &Vector2f::zeros(), 0.99).expect("expected transmission");
        assert_eq!(record.lobe, Lobe::SpecularTransmission);
        assert!(record.wi.z < 0.0);
        assert!((record.wi.norm() - 1.0).abs() < 1e-4);
        assert!(record.wi.x.abs() < wo.x.abs());

        let record = glass.sample(&wo, &Vector2f::zeros(), 0.0).expect("expected reflection");
        assert_eq!(record.lobe, Lobe::SpecularReflection);
        assert!((record.wi - Vector3f::new(-0.6, 0.0, 0.8)).norm() < 1e-6);
    }

    #[test]
    fn test_specular_lobes_conserve_energy() {
        let glass = GlassBSDF::new(1.5, RGBSpectrum::splat(1.0), RGBSpectrum::splat(1.0));
        let lobes = glass.specular_lobes(&Vector3f::new(0.6, 0.0, 0.8));
        assert_eq!(lobes.len(), 2);
        let total: Float = lobes.iter().map(|l| l.weight.r()).sum();
        assert!((total - 1.0).abs() < 1e-5);

        // Total internal reflection leaves a single lobe.
        let inside = Vector3f::new(0.9, 0.0, -(1.0 - 0.81 as Float).sqrt());
        let lobes = glass.specular_lobes(&inside);
        assert_eq!(lobes.len(), 1);
        assert_eq!(lobes[0].lobe, Lobe::SpecularReflection);

        let mirror = MirrorBSDF::new(RGBSpectrum::splat(0.9));
        assert_eq!(mirror.specular_lobes(&Vector3f::new(0.0, 0.0, 1.0)).len(), 1);
    }
}
