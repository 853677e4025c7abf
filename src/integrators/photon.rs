// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::error::RenderResult;
use crate::core::integrator::{FinalGather, Integrator, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, PassId};
use crate::core::sampling::clamp_sample;
use crate::core::scene::Scene;
use crate::integrators::common::{SurfaceShader, Tracer};
use crate::integrators::photon_map::{shoot_photons, PhotonKind, PhotonMap, ShootSettings};
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

#[derive(Debug, Clone, Copy)]
pub struct PhotonMappingParams {
    pub diffuse_photons: u32,
    pub caustic_photons: u32,
    pub bounces: u32,
    pub diffuse_radius: Float,
    pub caustic_radius: Float,
    pub search: u32,
    pub caustic_mix: u32,
    pub final_gather: Option<FinalGather>,
    pub show_map: bool,
}

/// Direct light by sampling, caustics and indirect light from two photon
/// maps, optionally refined by a final gather.
pub struct PhotonMappingIntegrator {
    tracer: Tracer,
    params: PhotonMappingParams,
    diffuse_map: PhotonMap,
    caustic_map: PhotonMap,
    seed: u64,
}

impl PhotonMappingIntegrator {
    pub fn new(tracer: Tracer, params: PhotonMappingParams, seed: u64) -> Self {
        Self { tracer, params, diffuse_map: PhotonMap::empty(), caustic_map: PhotonMap::empty(), seed }
    }

    fn diffuse_estimate(&self, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF, skip_direct: bool) -> RGBSpectrum {
        self.diffuse_map.radiance(&hit.p(), &hit.shading_frame(), wo, bsdf,
                                  self.params.search as usize, self.params.diffuse_radius, skip_direct)
    }

    fn caustic_estimate(&self, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF) -> RGBSpectrum {
        self.caustic_map.radiance(&hit.p(), &hit.shading_frame(), wo, bsdf,
                                  self.params.caustic_mix as usize, self.params.caustic_radius, false)
    }

    /// Cosine-distributed gather rays reading the photon maps where they
    /// land on a diffuse surface. Specular hits are followed for up to
    /// `fg.bounces` bounces.
    fn final_gather(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
                    fg: &FinalGather, ctx: &mut SampleContext) -> RGBSpectrum {
        let frame = hit.shading_frame();
        let wo_local = frame.to_local(wo);
        let n = ctx.indirect_samples(fg.samples);
        let mut sum = RGBSpectrum::default();
        for _ in 0..n {
            let record = match bsdf.sample(&wo_local, &ctx.rng.next_2d(), ctx.rng.next_f32()) {
                Some(record) => record,
                None => continue,
            };
            let wi = frame.from_local(&record.wi);
            let mut throughput = record.weight;
            let mut ray = self.tracer.spawn_ray(hit, &wi);
            for _ in 0..fg.bounces.max(1) {
                let next = match scene.ray_intersection(&ray) {
                    Some(next) => next,
                    None => break,
                };
                let next_bsdf = match scene.material(&next) {
                    Some(b) => b,
                    None => break,
                };
                let next_wo = -ray.dir();
                if !next_bsdf.is_specular() {
                    let radiance = self.diffuse_estimate(&next, &next_wo, next_bsdf, false)
                        + self.caustic_estimate(&next, &next_wo, next_bsdf);
                    sum += throughput * radiance;
                    break;
                }
                let next_frame = next.shading_frame();
                let bounce = match next_bsdf.sample(&next_frame.to_local(&next_wo), &ctx.rng.next_2d(), ctx.rng.next_f32()) {
                    Some(bounce) => bounce,
                    None => break,
                };
                throughput *= bounce.weight;
                let dir = next_frame.from_local(&bounce.wi);
                ray = self.tracer.spawn_ray(&next, &dir);
            }
        }
        sum / n as Float
    }
}

impl SurfaceShader for PhotonMappingIntegrator {
    fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
             ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum {
        if self.params.show_map {
            let radiance = self.diffuse_estimate(hit, wo, bsdf, false);
            if let Some(layers) = layers {
                layers.set(PassId::AdvRadiance, radiance);
            }
            return radiance;
        }

        let direct = self.tracer.direct_light(scene, hit, wo, bsdf, ctx);
        let caustic = clamp_sample(self.caustic_estimate(hit, wo, bsdf), ctx.clamp_indirect);
        let indirect = match self.params.final_gather.as_ref() {
            Some(fg) => self.final_gather(scene, hit, wo, bsdf, fg, ctx),
            None => self.diffuse_estimate(hit, wo, bsdf, true),
        };
        let indirect = clamp_sample(indirect, ctx.clamp_indirect);

        if let Some(layers) = layers {
            direct.write_layers(layers);
            layers.set(PassId::Indirect, indirect);
            layers.set(PassId::AdvDiffuseIndirect, indirect);
            layers.set(PassId::AdvIndirect, caustic);
            layers.set(PassId::AdvRadiance, self.diffuse_estimate(hit, wo, bsdf, false));
        }
        direct.shaded + caustic + indirect
    }
}

impl Integrator for PhotonMappingIntegrator {
    fn name(&self) -> &'static str {
        "PhotonMapping"
    }

    fn preprocess(&mut self, scene: &Scene, threads: usize) -> RenderResult<()> {
        self.tracer.prepare(scene);
        let diffuse = ShootSettings {
            kind: PhotonKind::Diffuse,
            photons: self.params.diffuse_photons,
            max_bounces: self.params.bounces,
            seed: self.seed,
            threads,
        };
        self.diffuse_map = shoot_photons(scene, &self.tracer.params, &diffuse)?;
        let caustic = ShootSettings {
            kind: PhotonKind::Caustic,
            photons: self.params.caustic_photons,
            max_bounces: self.params.bounces,
            seed: self.seed.wrapping_add(0x9e37_79b9),
            threads,
        };
        self.caustic_map = shoot_photons(scene, &self.tracer.params, &caustic)?;
        Ok(())
    }

    fn estimate_radiance(&self, scene: &Scene, ray: &Ray3f, ctx: &mut SampleContext) -> RadianceSample {
        self.tracer.estimate(self, scene, ray, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCategory;
    use crate::core::passes::RenderPassSelection;
    use crate::core::rng::LcgRng;
    use crate::core::settings::RenderSettings;
    use crate::integrators::common::test_scenes::caustic_box;

    fn params(final_gather: Option<FinalGather>, show_map: bool) -> PhotonMappingParams {
        PhotonMappingParams {
            diffuse_photons: 20000,
            caustic_photons: 20000,
            bounces: 4,
            diffuse_radius: 0.5,
            caustic_radius: 0.3,
            search: 50,
            caustic_mix: 50,
            final_gather,
            show_map,
        }
    }

    fn tracer() -> Tracer {
        Tracer::new(&RenderSettings::default(), &RenderPassSelection::default(), None)
    }

    #[test]
    fn test_requires_emitters() {
        let mut scene = Scene::new();
        scene.build_bvh().unwrap();
        let mut integrator = PhotonMappingIntegrator::new(tracer(), params(None, false), 0);
        let err = integrator.preprocess(&scene, 1).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Resource);
    }

    #[test]
    fn test_show_map_reads_diffuse_map() {
        let scene = caustic_box();
        let mut integrator = PhotonMappingIntegrator::new(tracer(), params(None, true), 0);
        integrator.preprocess(&scene, 2).unwrap();
        assert!(!integrator.diffuse_map.is_empty());

        let ray = Ray3f::new(Vector3f::new(2.0, 2.0, 1.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut rng = LcgRng::new(1);
        let mut ctx = SampleContext::new(&mut rng);
        let sample = integrator.estimate_radiance(&scene, &ray, &mut ctx);
        assert!(sample.color.luminance() > 0.0);
        assert_eq!(sample.color, sample.layers.get(PassId::AdvRadiance));
    }

    #[test]
    fn test_final_gather_is_finite_and_positive() {
        let scene = caustic_box();
        let fg = FinalGather { bounces: 2, samples: 8 };
        let mut integrator = PhotonMappingIntegrator::new(tracer(), params(Some(fg), false), 0);
        integrator.preprocess(&scene, 2).unwrap();

        let ray = Ray3f::new(Vector3f::new(2.0, 2.0, 1.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut rng = LcgRng::new(1);
        let mut ctx = SampleContext::new(&mut rng);
        let sample = integrator.estimate_radiance(&scene, &ray, &mut ctx);
        assert!(sample.color.is_finite());
        assert!(sample.color.luminance() > 0.0);
        assert!(sample.layers.get(PassId::Diffuse).luminance() > 0.0);
    }
}
