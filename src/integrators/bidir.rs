// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::error::RenderResult;
use crate::core::integrator::{Integrator, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, PassId};
use crate::core::sampling::clamp_sample;
use crate::core::scene::Scene;
use crate::integrators::common::{SurfaceShader, Tracer};
use crate::math::constants::{Float, Vector3f};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

struct PathVertex<'a> {
    hit: SurfaceIntersection,
    frame: Frame,
    bsdf: &'a dyn BSDF,
    /// Direction toward the previous vertex of the subpath.
    wo: Vector3f,
    throughput: RGBSpectrum,
    specular: bool,
    /// Emission toward the previous vertex; camera subpaths only.
    emitted: RGBSpectrum,
}

/// Number of connection strategies able to produce a path. `specular`
/// holds the flags of every vertex except the one on the light.
pub fn strategy_count(specular: &[bool], light_is_delta: bool) -> usize {
    let k = specular.len() + 1;
    let mut count = 0;
    for s in 0..k {
        let valid = match s {
            0 => !light_is_delta,
            1 => !specular[k - 2],
            _ => !specular[k - s - 1] && !specular[k - s],
        };
        if valid {
            count += 1;
        }
    }
    count.max(1)
}

/// Camera and light subpaths joined by every connection strategy, each
/// weighted uniformly over the strategies that can sample the path.
pub struct BidirectionalIntegrator {
    tracer: Tracer,
    max_vertices: usize,
}

impl BidirectionalIntegrator {
    pub fn new(tracer: Tracer, bounces: u32) -> Self {
        Self { tracer, max_vertices: bounces.max(1) as usize + 1 }
    }

    fn extend<'a>(&self, scene: &'a Scene, mut ray: Ray3f, mut throughput: RGBSpectrum, max_len: usize,
                  ctx: &mut SampleContext, path: &mut Vec<PathVertex<'a>>) {
        while path.len() < max_len {
            let hit = match scene.ray_intersection(&ray) {
                Some(hit) => hit,
                None => return,
            };
            let bsdf = match scene.material(&hit) {
                Some(bsdf) => bsdf,
                None => return,
            };
            let wo = -ray.dir();
            let frame = hit.shading_frame();
            let emitted = scene.emitted(&hit, &wo);
            path.push(PathVertex { frame, bsdf, wo, throughput, specular: bsdf.is_specular(), emitted, hit: hit.clone() });
            if path.len() >= max_len {
                return;
            }

            let record = match bsdf.sample(&frame.to_local(&wo), &ctx.rng.next_2d(), ctx.rng.next_f32()) {
                Some(record) => record,
                None => return,
            };
            throughput *= record.weight;
            if throughput.is_black() {
                return;
            }
            let dir = frame.from_local(&record.wi);
            ray = self.tracer.spawn_ray(&hit, &dir);
        }
    }

    fn visible(&self, scene: &Scene, from: &SurfaceIntersection, to: &Vector3f) -> RGBSpectrum {
        let d = to - from.p();
        let dist = d.norm();
        if dist <= 0.0 {
            return RGBSpectrum::default();
        }
        let dir = d / dist;
        let origin = from.spawn_origin(&dir, self.tracer.params.shadow_bias);
        let ray = Ray3f::shadow_segment(origin, dir, to, self.tracer.params.min_ray_dist,
                                        self.tracer.params.shadow_bias);
        scene.shadow(&ray, self.tracer.transparent_shadows, self.tracer.shadow_depth).transmittance
    }

    /// Returns (direct, indirect) radiance leaving `hit` toward `wo`.
    fn connect_all(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
                   ctx: &mut SampleContext) -> (RGBSpectrum, RGBSpectrum) {
        let mut camera = vec![PathVertex {
            hit: hit.clone(),
            frame: hit.shading_frame(),
            bsdf,
            wo: *wo,
            throughput: RGBSpectrum::splat(1.0),
            specular: bsdf.is_specular(),
            emitted: RGBSpectrum::default(),
        }];
        let first = {
            let v = &camera[0];
            v.bsdf.sample(&v.frame.to_local(&v.wo), &ctx.rng.next_2d(), ctx.rng.next_f32())
        };
        if let Some(record) = first {
            let dir = camera[0].frame.from_local(&record.wi);
            let ray = self.tracer.spawn_ray(hit, &dir);
            self.extend(scene, ray, record.weight, self.max_vertices, ctx, &mut camera);
        }

        let mut light = Vec::new();
        let mut light_is_delta = false;
        if let Some((idx, pick_pdf)) = scene.sample_emitter(ctx.rng.next_f32()) {
            let emitter = &scene.emitters()[idx];
            light_is_delta = emitter.is_delta();
            let emission = emitter.sample_photon(&ctx.rng.next_2d(), &ctx.rng.next_2d());
            let power = emission.power / pick_pdf.max(1e-8);
            if !power.is_black() && power.is_finite() && self.max_vertices > 2 {
                let ray = Ray3f::new(emission.ray.origin(), emission.ray.dir(), Some(self.tracer.params.shadow_bias), None);
                self.extend(scene, ray, power, self.max_vertices - 2, ctx, &mut light);
            }
        }

        let mut direct = RGBSpectrum::default();
        let mut indirect = RGBSpectrum::default();
        let mut add = |k: usize, value: RGBSpectrum| {
            if k == 2 {
                direct += value;
            } else {
                indirect += value;
            }
        };
        let camera_flags: Vec<bool> = camera.iter().map(|v| v.specular).collect();

        for t in 1..=camera.len() {
            let x = &camera[t - 1];

            // s = 0: the camera subpath landed on an emitter.
            if t >= 2 && !x.emitted.is_black() {
                let weight = 1.0 / strategy_count(&camera_flags[..t - 1], false) as Float;
                add(t, x.throughput * x.emitted * weight);
            }
            if x.specular {
                continue;
            }

            // s = 1: connect to a fresh point on an emitter.
            if t + 1 <= self.max_vertices {
                if let Some((idx, pick_pdf)) = scene.sample_emitter(ctx.rng.next_f32()) {
                    let emitter = &scene.emitters()[idx];
                    if let Some(sample) = emitter.sample_li(&x.hit.p(), &ctx.rng.next_2d()) {
                        let wi_local = x.frame.to_local(&sample.wi);
                        let f = x.bsdf.eval(&x.frame.to_local(&x.wo), &wi_local).value;
                        if sample.pdf > 0.0 && pick_pdf > 0.0 && !f.is_black() {
                            let vis = self.visible(scene, &x.hit, &sample.position);
                            let weight = 1.0 / strategy_count(&camera_flags[..t], emitter.is_delta()) as Float;
                            let value = x.throughput * f * sample.radiance * vis
                                * (wi_local.z.abs() / (sample.pdf * pick_pdf) * weight);
                            add(t + 1, value);
                        }
                    }
                }
            }

            // s >= 2: connect to a vertex of the light subpath.
            for (j, y) in light.iter().enumerate() {
                let s = j + 2;
                if t + s > self.max_vertices || y.specular {
                    continue;
                }
                let d = y.hit.p() - x.hit.p();
                let dist2 = d.norm_squared();
                if dist2 <= 1e-10 {
                    continue;
                }
                let dir = d / dist2.sqrt();
                let wi_x = x.frame.to_local(&dir);
                let wi_y = y.frame.to_local(&(-dir));
                let f_x = x.bsdf.eval(&x.frame.to_local(&x.wo), &wi_x).value;
                let f_y = y.bsdf.eval(&y.frame.to_local(&y.wo), &wi_y).value;
                if f_x.is_black() || f_y.is_black() {
                    continue;
                }
                let vis = self.visible(scene, &x.hit, &y.hit.p());
                if vis.is_black() {
                    continue;
                }
                let mut flags: Vec<bool> = camera_flags[..t].to_vec();
                flags.extend(light[..=j].iter().rev().map(|v| v.specular));
                let weight = 1.0 / strategy_count(&flags, light_is_delta) as Float;
                let g = wi_x.z.abs() * wi_y.z.abs() / dist2;
                add(t + s, x.throughput * f_x * f_y * y.throughput * vis * (g * weight));
            }
        }
        (direct, indirect)
    }
}

impl SurfaceShader for BidirectionalIntegrator {
    fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
             ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum {
        let (direct, indirect) = self.connect_all(scene, hit, wo, bsdf, ctx);
        let indirect = clamp_sample(indirect, ctx.clamp_indirect);
        if let Some(layers) = layers {
            self.tracer.direct_light(scene, hit, wo, bsdf, ctx).write_layers(layers);
            layers.set(PassId::Indirect, indirect);
            layers.set(PassId::AdvDiffuseIndirect, indirect);
        }
        direct + indirect
    }
}

impl Integrator for BidirectionalIntegrator {
    fn name(&self) -> &'static str {
        "Bidirectional"
    }

    fn preprocess(&mut self, scene: &Scene, _threads: usize) -> RenderResult<()> {
        self.tracer.prepare(scene);
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

    #[test]
    fn test_strategy_count() {
        // Diffuse x1 → area light: hit the light or sample it.
        assert_eq!(strategy_count(&[false], false), 2);
        // Point lights cannot be hit.
        assert_eq!(strategy_count(&[false], true), 1);
        // x1, x2 diffuse: s' = 0, 1, 2.
        assert_eq!(strategy_count(&[false, false], false), 3);
        // Specular middle vertex only leaves the unidirectional strategies.
        assert_eq!(strategy_count(&[false, true], false), 1);
        // s' = 0 and NEE from the last diffuse vertex.
        assert_eq!(strategy_count(&[false, true, false], false), 2);
        assert_eq!(strategy_count(&[false, false, false], true), 3);
    }

    #[test]
    fn test_point_light_direct_matches_light_sampling() {
        let scene = lit_floor();
        let tracer = Tracer::new(&RenderSettings::default(), &RenderPassSelection::default(), None);
        let mut integrator = BidirectionalIntegrator::new(tracer, 3);
        integrator.preprocess(&scene, 1).unwrap();

        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut rng = LcgRng::new(8);
        let mut ctx = SampleContext::new(&mut rng);
        let sample = integrator.estimate_radiance(&scene, &ray, &mut ctx);
        let expected = 0.5 / crate::math::constants::PI;
        assert!((sample.color.r() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_estimates_are_finite() {
        let scene = caustic_box();
        let tracer = Tracer::new(&RenderSettings::default(), &RenderPassSelection::default(), None);
        let mut integrator = BidirectionalIntegrator::new(tracer, 5);
        integrator.preprocess(&scene, 1).unwrap();
        let mut rng = LcgRng::new(4);
        for i in 0..32 {
            let x = -1.5 + 3.0 * (i as Float) / 31.0;
            let ray = Ray3f::new(Vector3f::new(x, 0.3, 3.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
            let mut ctx = SampleContext::new(&mut rng);
            let sample = integrator.estimate_radiance(&scene, &ray, &mut ctx);
            assert!(sample.color.is_finite());
            assert!(sample.color.r() >= 0.0 && sample.color.g() >= 0.0 && sample.color.b() >= 0.0);
        }
    }
}
