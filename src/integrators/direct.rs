// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::error::RenderResult;
use crate::core::integrator::{AmbientOcclusion, CausticPhotons, Integrator, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, PassId};
use crate::core::sampling::clamp_sample;
use crate::core::scene::Scene;
use crate::integrators::common::{SurfaceShader, Tracer};
use crate::integrators::photon_map::{shoot_photons, PhotonKind, PhotonMap, ShootSettings};
use crate::math::constants::Vector3f;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Light sampling at the first diffuse hit, with optional caustic photons
/// and ambient occlusion.
pub struct DirectLightingIntegrator {
    tracer: Tracer,
    caustics: CausticPhotons,
    ao: Option<AmbientOcclusion>,
    caustic_map: Option<PhotonMap>,
    seed: u64,
}

impl DirectLightingIntegrator {
    pub fn new(tracer: Tracer, caustics: CausticPhotons, ao: Option<AmbientOcclusion>, seed: u64) -> Self {
        Self { tracer, caustics, ao, caustic_map: None, seed }
    }
}

impl SurfaceShader for DirectLightingIntegrator {
    fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
             ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum {
        let direct = self.tracer.direct_light(scene, hit, wo, bsdf, ctx);
        let mut color = direct.shaded;

        let caustic = match self.caustic_map.as_ref() {
            Some(map) => {
                let estimate = map.radiance(&hit.p(), &hit.shading_frame(), wo, bsdf,
                                            self.caustics.mix as usize, self.caustics.radius, false);
                clamp_sample(estimate, ctx.clamp_indirect)
            }
            None => RGBSpectrum::default(),
        };
        color += caustic;

        if let Some(ao) = self.ao.as_ref() {
            let open = self.tracer.occlusion(scene, hit, wo, ao, ctx);
            color += ao.color * bsdf.albedo() * open;
        }

        if let Some(layers) = layers {
            direct.write_layers(layers);
            layers.set(PassId::Indirect, caustic);
            layers.set(PassId::AdvIndirect, caustic);
        }
        color
    }
}

impl Integrator for DirectLightingIntegrator {
    fn name(&self) -> &'static str {
        "DirectLighting"
    }

    fn preprocess(&mut self, scene: &Scene, threads: usize) -> RenderResult<()> {
        self.tracer.prepare(scene);
        self.caustic_map = None;
        if self.caustics.enabled {
            let settings = ShootSettings {
                kind: PhotonKind::Caustic,
                photons: self.caustics.photons,
                max_bounces: self.caustics.depth,
                seed: self.seed,
                threads,
            };
            self.caustic_map = Some(shoot_photons(scene, &self.tracer.params, &settings)?);
        }
        Ok(())
    }

    fn estimate_radiance(&self, scene: &Scene, ray: &Ray3f, ctx: &mut SampleContext) -> RadianceSample {
        self.tracer.estimate(self, scene, ray, ctx)
    }
}
