// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::error::RenderResult;
use crate::core::integrator::{Integrator, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, PassId};
use crate::core::rng::mix64;
use crate::core::sampling::clamp_sample;
use crate::core::scene::Scene;
use crate::integrators::common::{SurfaceShader, Tracer};
use crate::integrators::photon_map::{shoot_photons, PhotonKind, PhotonMap, ShootSettings};
use crate::math::constants::{Float, Vector3f, PI};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Radius shrink rate of progressive photon mapping.
pub const ALPHA: Float = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct SppmParams {
    pub photons: u32,
    pub pass_num: u32,
    pub bounces: u32,
    pub radius_factor: Float,
    pub photon_radius: Float,
    pub search: u32,
    pub initial_radius_estimate: bool,
}

/// Squared gather radius of 0-based pass `pass`:
/// r²(i+1) = r²(i) · (i + α) / (i + 1).
pub fn pass_radius2(initial_radius: Float, pass: u32) -> Float {
    let mut r2 = initial_radius * initial_radius;
    for i in 0..pass {
        let i = i as Float;
        r2 *= (i + ALPHA) / (i + 1.0);
    }
    r2
}

/// Initial radius from the scene bounds, sized so that a disk holds about
/// `search` photons when they spread evenly over the bounding box.
pub fn estimate_initial_radius(scene: &Scene, photons: u32, search: u32) -> Float {
    let bounds = scene.scene_bounds();
    let area = if bounds.is_valid() { bounds.surface_area() } else { 0.0 };
    if area <= 0.0 || photons == 0 {
        return 1.0;
    }
    (area * search as Float / (PI * photons as Float)).sqrt()
}

/// Progressive photon mapping: every pass shoots a fresh photon map and
/// gathers it with a shrinking global radius. Direct light is sampled.
pub struct SppmIntegrator {
    tracer: Tracer,
    params: SppmParams,
    initial_radius: Float,
    radius2: Float,
    map: PhotonMap,
    seed: u64,
}

impl SppmIntegrator {
    pub fn new(tracer: Tracer, params: SppmParams, seed: u64) -> Self {
        Self {
            tracer,
            params,
            initial_radius: 0.0,
            radius2: 0.0,
            map: PhotonMap::empty(),
            seed,
        }
    }

    pub fn radius(&self) -> Float {
        self.radius2.sqrt()
    }
}

impl SurfaceShader for SppmIntegrator {
    fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
             ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum {
        let direct = self.tracer.direct_light(scene, hit, wo, bsdf, ctx);
        let indirect = self.map.radiance(&hit.p(), &hit.shading_frame(), wo, bsdf,
                                         self.params.search as usize, self.radius(), false);
        let indirect = clamp_sample(indirect, ctx.clamp_indirect);
        if let Some(layers) = layers {
            direct.write_layers(layers);
            layers.set(PassId::Indirect, indirect);
            layers.set(PassId::AdvDiffuseIndirect, indirect);
            layers.set(PassId::AdvRadiance, indirect);
        }
        direct.shaded + indirect
    }
}

impl Integrator for SppmIntegrator {
    fn name(&self) -> &'static str {
        "SPPM"
    }

    fn preprocess(&mut self, scene: &Scene, _threads: usize) -> RenderResult<()> {
        self.tracer.prepare(scene);
        scene.require_emitters("SPPM")?;
        let fixed = self.params.photon_radius * self.params.radius_factor;
        self.initial_radius = if self.params.initial_radius_estimate || fixed <= 0.0 {
            estimate_initial_radius(scene, self.params.photons, self.params.search)
        } else {
            fixed
        };
        log::info!("SPPM initial radius {:.4}, {} passes.", self.initial_radius, self.params.pass_num);
        Ok(())
    }

    fn prepare_pass(&mut self, scene: &Scene, pass: u32, threads: usize) -> RenderResult<()> {
        self.radius2 = pass_radius2(self.initial_radius, pass);
        let settings = ShootSettings {
            kind: PhotonKind::Global,
            photons: self.params.photons,
            max_bounces: self.params.bounces,
            seed: mix64(self.seed ^ ((pass as u64 + 1) << 32)),
            threads: threads.max(1),
        };
        self.map = shoot_photons(scene, &self.tracer.params, &settings)?;
        log::debug!("SPPM pass {}: radius {:.5}, {} photons stored.", pass + 1, self.radius(), self.map.len());
        Ok(())
    }

    fn estimate_radiance(&self, scene: &Scene, ray: &Ray3f, ctx: &mut SampleContext) -> RadianceSample {
        self.tracer.estimate(self, scene, ray, ctx)
    }

    fn progressive_passes(&self) -> Option<u32> {
        Some(self.params.pass_num)
    }
}
