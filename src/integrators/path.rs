// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::error::RenderResult;
use crate::core::integrator::{CausticMethod, CausticPhotons, Integrator, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, PassId};
use crate::core::sampling::clamp_sample;
use crate::core::scene::Scene;
use crate::integrators::common::{SurfaceShader, Tracer};
use crate::integrators::photon_map::{shoot_photons, PhotonKind, PhotonMap, ShootSettings};
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

const RR_START_BOUNCE: u32 = 3;

pub struct PathIntegrator {
    tracer: Tracer,
    path_samples: u32,
    max_bounces: u32,
    no_recursion: bool,
    caustic_method: CausticMethod,
    caustic: CausticPhotons,
    caustic_map: Option<PhotonMap>,
    seed: u64,
}

impl PathIntegrator {
    pub fn new(tracer: Tracer, path_samples: u32, max_bounces: u32, no_recursion: bool,
               caustic_method: CausticMethod, caustic: CausticPhotons, seed: u64) -> Self {
        Self {
            tracer,
            path_samples: path_samples.max(1),
            max_bounces: max_bounces.max(1),
            no_recursion,
            caustic_method,
            caustic,
            caustic_map: None,
            seed,
        }
    }

    fn caustic_estimate(&self, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF) -> RGBSpectrum {
        match self.caustic_map.as_ref() {
            Some(map) => map.radiance(&hit.p(), &hit.shading_frame(), wo, bsdf,
                                      self.caustic.mix as usize, self.caustic.radius, false),
            None => RGBSpectrum::default(),
        }
    }

    /// Whether light reached through a specular chain that started at a
    /// diffuse vertex is counted. `from_primary` tells whether that vertex
    /// is the camera hit.
    fn counts_specular_emission(&self, from_primary: bool) -> bool {
        match self.caustic_method {
            CausticMethod::Path => true,
            CausticMethod::PathPhoton => !from_primary,
            CausticMethod::None | CausticMethod::Photon => false,
        }
    }

    /// One path continuing from the diffuse camera hit. Returns the
    /// indirect radiance it carries back.
    fn trace_path(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
                  ctx: &mut SampleContext) -> RGBSpectrum {
        let frame = hit.shading_frame();
        let record = match bsdf.sample(&frame.to_local(wo), &ctx.rng.next_2d(), ctx.rng.next_f32()) {
            Some(record) => record,
            None => return RGBSpectrum::default(),
        };
        let mut throughput = record.weight;
        let dir = frame.from_local(&record.wi);
        let mut ray = self.tracer.spawn_ray(hit, &dir);
        let mut prev_specular = record.lobe.is_specular();
        let mut chain_from_primary = true;
        let mut radiance = RGBSpectrum::default();

        for bounce in 1..=self.max_bounces {
            let next = match scene.ray_intersection(&ray) {
                Some(next) => next,
                None => break,
            };
            let next_wo = -ray.dir();
            if prev_specular && self.counts_specular_emission(chain_from_primary) {
                radiance += throughput * scene.emitted(&next, &next_wo);
            }
            let next_bsdf = match scene.material(&next) {
                Some(b) => b,
                None => break,
            };

            let specular = next_bsdf.is_specular();
            if !specular {
                let direct = self.tracer.direct_light(scene, &next, &next_wo, next_bsdf, ctx);
                radiance += throughput * direct.shaded;
                if self.caustic_method == CausticMethod::Photon {
                    radiance += throughput * self.caustic_estimate(&next, &next_wo, next_bsdf);
                }
                chain_from_primary = false;
            }
            if self.no_recursion || bounce == self.max_bounces {
                break;
            }

            if bounce >= RR_START_BOUNCE {
                let survive = throughput.max_component().min(0.95);
                if survive <= 0.0 || ctx.rng.next_f32() >= survive {
                    break;
                }
                throughput = throughput / survive;
            }

            let next_frame = next.shading_frame();
            let record = match next_bsdf.sample(&next_frame.to_local(&next_wo), &ctx.rng.next_2d(), ctx.rng.next_f32()) {
                Some(record) => record,
                None => break,
            };
            throughput *= record.weight;
            if throughput.is_black() {
                break;
            }
            prev_specular = record.lobe.is_specular();
            let dir = next_frame.from_local(&record.wi);
            ray = self.tracer.spawn_ray(&next, &dir);
        }
        radiance
    }
}

impl SurfaceShader for PathIntegrator {
    fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
             ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum {
        let direct = self.tracer.direct_light(scene, hit, wo, bsdf, ctx);

        let n = ctx.indirect_samples(self.path_samples);
        let mut indirect = RGBSpectrum::default();
        for _ in 0..n {
            indirect += self.trace_path(scene, hit, wo, bsdf, ctx);
        }
        let indirect = clamp_sample(indirect / n as Float, ctx.clamp_indirect);

        let caustic = if self.caustic_method.uses_photons() {
            clamp_sample(self.caustic_estimate(hit, wo, bsdf), ctx.clamp_indirect)
        } else {
            RGBSpectrum::default()
        };

        if let Some(layers) = layers {
            direct.write_layers(layers);
            layers.set(PassId::Indirect, indirect);
            layers.set(PassId::AdvDiffuseIndirect, indirect);
            layers.set(PassId::AdvIndirect, caustic);
        }
        direct.shaded + indirect + caustic
    }
}

impl Integrator for PathIntegrator {
    fn name(&self) -> &'static str {
        "PathTracing"
    }

    fn preprocess(&mut self, scene: &Scene, threads: usize) -> RenderResult<()> {
        self.tracer.prepare(scene);
        self.caustic_map = None;
        if self.caustic_method.uses_photons() && self.caustic.enabled {
            let settings = ShootSettings {
                kind: PhotonKind::Caustic,
                photons: self.caustic.photons,
                max_bounces: self.caustic.depth,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::passes::RenderPassSelection;
    use crate::core::rng::LcgRng;
    use crate::core::settings::RenderSettings;
    use crate::integrators::common::test_scenes::{caustic_box, lit_floor};

    fn caustic(enabled: bool, photons: u32, radius: Float) -> CausticPhotons {
        CausticPhotons { enabled, photons, mix: 50, depth: 5, radius }
    }

    fn integrator(method: CausticMethod, params: CausticPhotons, no_recursion: bool) -> PathIntegrator {
        let tracer = Tracer::new(&RenderSettings::default(), &RenderPassSelection::default(), None);
        PathIntegrator::new(tracer, 4, 4, no_recursion, method, params, 3)
    }

    fn estimate(integrator: &mut PathIntegrator, scene: &Scene, ray: &Ray3f, seed: u64) -> RadianceSample {
        integrator.preprocess(scene, 2).unwrap();
        let mut rng = LcgRng::new(seed);
        let mut ctx = SampleContext::new(&mut rng);
        integrator.estimate_radiance(scene, ray, &mut ctx)
    }

    fn floor_ray() -> Ray3f {
        Ray3f::new(Vector3f::new(0.05, 0.0, 0.6), Vector3f::new(0.0, 0.0, -1.0), None, None)
    }

    #[test]
    fn test_caustic_method_none_ignores_parameters() {
        let scene = caustic_box();
        let mut a = integrator(CausticMethod::None, caustic(false, 100, 0.1), false);
        let mut b = integrator(CausticMethod::None, caustic(false, 50000, 3.0), false);
        let ra = estimate(&mut a, &scene, &floor_ray(), 17);
        let rb = estimate(&mut b, &scene, &floor_ray(), 17);
        assert_eq!(ra.color, rb.color);
        assert!(a.caustic_map.is_none());
    }

    #[test]
    fn test_path_caustics_brighten_shadow_under_glass() {
        let scene = caustic_box();
        let mut none = integrator(CausticMethod::None, caustic(false, 1, 1.0), false);
        let mut path = integrator(CausticMethod::Path, caustic(false, 1, 1.0), false);
        let mut total_none = 0.0;
        let mut total_path = 0.0;
        for seed in 0..16 {
            total_none += estimate(&mut none, &scene, &floor_ray(), seed).color.luminance();
            total_path += estimate(&mut path, &scene, &floor_ray(), seed).color.luminance();
        }
        assert!(total_path > total_none);
    }

    #[test]
    fn test_no_recursion_single_bounce() {
        // A lone floor has no indirect light either way.
        let scene = lit_floor();
        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut single = integrator(CausticMethod::None, caustic(false, 1, 1.0), true);
        let sample = estimate(&mut single, &scene, &ray, 5);
        assert!(sample.layers.get(PassId::Indirect).is_black());
        assert!(sample.color.luminance() > 0.0);
    }

    #[test]
    fn test_photon_caustics_build_map() {
        let scene = caustic_box();
        let mut photon = integrator(CausticMethod::Photon, caustic(true, 20000, 0.3), false);
        let sample = estimate(&mut photon, &scene, &floor_ray(), 2);
        assert!(photon.caustic_map.is_some());
        assert!(sample.layers.get(PassId::AdvIndirect).luminance() > 0.0);
    }
}
