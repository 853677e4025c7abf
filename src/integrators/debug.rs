// Copyright @yucwang 2026

use crate::core::error::RenderResult;
use crate::core::integrator::{DebugKind, Integrator, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, PassId};
use crate::core::scene::Scene;
use crate::integrators::common::Tracer;
use crate::math::constants::Vector3f;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Shows one differential-geometry quantity of the camera hit, mapped
/// from [-1, 1] to [0, 1].
pub struct DebugIntegrator {
    tracer: Tracer,
    kind: DebugKind,
    show_perturbed_normals: bool,
}

impl DebugIntegrator {
    pub fn new(tracer: Tracer, kind: DebugKind, show_perturbed_normals: bool) -> Self {
        Self { tracer, kind, show_perturbed_normals }
    }

    fn quantity(&self, hit: &SurfaceIntersection) -> Vector3f {
        let frame = hit.shading_frame();
        let (ds_du, ds_dv) = hit.shading_partials();
        match self.kind {
            DebugKind::N if self.show_perturbed_normals => hit.sh_normal(),
            DebugKind::N => hit.geo_normal(),
            DebugKind::DpDu => hit.dp_du(),
            DebugKind::DpDv => hit.dp_dv(),
            DebugKind::Nu => frame.x,
            DebugKind::Nv => frame.y,
            DebugKind::DsDu => ds_du,
            DebugKind::DsDv => ds_dv,
        }
    }
}

fn to_color(v: &Vector3f) -> RGBSpectrum {
    let norm = v.norm();
    if norm <= 0.0 || !norm.is_finite() {
        return RGBSpectrum::splat(0.5);
    }
    RGBSpectrum::from_vector((v / norm).add_scalar(1.0) * 0.5)
}

impl Integrator for DebugIntegrator {
    fn name(&self) -> &'static str {
        "Debug"
    }

    fn preprocess(&mut self, scene: &Scene, _threads: usize) -> RenderResult<()> {
        self.tracer.prepare(scene);
        Ok(())
    }

    fn estimate_radiance(&self, scene: &Scene, ray: &Ray3f, ctx: &mut SampleContext) -> RadianceSample {
        let hit = match scene.ray_intersection(ray) {
            Some(hit) => hit,
            None => {
                let alpha = if self.tracer.transparent_background { 0.0 } else { 1.0 };
                return RadianceSample::background(RGBSpectrum::default(), alpha);
            }
        };
        let mut layers = ColorLayers::default();
        self.tracer.record_first_hit(scene, &hit, &-ray.dir(), ctx, &mut layers);
        let color = to_color(&self.quantity(&hit));
        layers.set(PassId::Combined, color);
        RadianceSample { color, alpha: 1.0, layers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::passes::RenderPassSelection;
    use crate::core::rng::LcgRng;
    use crate::core::settings::RenderSettings;
    use crate::integrators::common::test_scenes::{down_ray, lit_floor};

    fn render(kind: DebugKind, ray: &Ray3f) -> RadianceSample {
        let scene = lit_floor();
        let tracer = Tracer::new(&RenderSettings::default(), &RenderPassSelection::default(), None);
        let mut integrator = DebugIntegrator::new(tracer, kind, false);
        integrator.preprocess(&scene, 1).unwrap();
        let mut rng = LcgRng::new(0);
        let mut ctx = SampleContext::new(&mut rng);
        integrator.estimate_radiance(&scene, ray, &mut ctx)
    }

    #[test]
    fn test_floor_normal_maps_to_blue() {
        let sample = render(DebugKind::N, &down_ray());
        assert!((sample.color.r() - 0.5).abs() < 1e-5);
        assert!((sample.color.g() - 0.5).abs() < 1e-5);
        assert!((sample.color.b() - 1.0).abs() < 1e-5);
        assert_eq!(sample.alpha, 1.0);
        assert!(sample.layers.depth.is_some());
    }

    #[test]
    fn test_every_kind_stays_in_unit_range() {
        for kind in [DebugKind::N, DebugKind::DpDu, DebugKind::DpDv, DebugKind::Nu,
                     DebugKind::Nv, DebugKind::DsDu, DebugKind::DsDv].iter() {
            let c = render(*kind, &down_ray()).color;
            for i in 0..3 {
                assert!(c[i] >= 0.0 && c[i] <= 1.0);
            }
        }
    }

    #[test]
    fn test_miss_is_black() {
        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(0.0, 0.0, 1.0), None, None);
        let sample = render(DebugKind::N, &ray);
        assert!(sample.color.is_black());
        assert!(!sample.layers.is_hit());
    }
}
