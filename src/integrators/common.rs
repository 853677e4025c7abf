// Copyright @yucwang 2026

//! Pieces shared by every surface integrator: camera-ray tracing with
//! specular recursion, direct lighting, ambient occlusion and the
//! first-hit auxiliary layers.

use crate::core::bsdf::{Lobe, BSDF};
use crate::core::integrator::{AmbientOcclusion, RadianceSample, SampleContext};
use crate::core::interaction::SurfaceIntersection;
use crate::core::passes::{ColorLayers, MaskSettings, PassId, RenderPassSelection};
use crate::core::scene::Scene;
use crate::core::settings::{RenderSettings, TraceParams};
use crate::math::constants::{Float, Vector3f};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::sample_cosine_hemisphere;

/// Settings every integrator traces with. `params` is resolved against the
/// scene bounds in `prepare`.
#[derive(Debug, Clone)]
pub struct Tracer {
    pub params: TraceParams,
    pub ray_depth: u32,
    pub shadow_depth: u32,
    pub transparent_shadows: bool,
    pub transparent_background: bool,
    pub transparent_refraction: bool,
    pub mask: MaskSettings,
    /// Ambient occlusion evaluated for the AO passes.
    pub ao_pass: Option<AmbientOcclusion>,
    settings: RenderSettings,
}

/// Direct illumination at a surface point.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectLight {
    pub shaded: RGBSpectrum,
    pub unshadowed: RGBSpectrum,
    pub object_mask_shadow: Float,
    pub material_mask_shadow: Float,
}

impl DirectLight {
    pub fn write_layers(&self, layers: &mut ColorLayers) {
        layers.set(PassId::Diffuse, self.shaded);
        layers.set(PassId::DiffuseNoShadow, self.unshadowed);
        layers.set(PassId::Shadow, self.unshadowed - self.shaded);
        layers.object_mask_shadow = self.object_mask_shadow;
        layers.material_mask_shadow = self.material_mask_shadow;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Traced {
    pub color: RGBSpectrum,
    pub alpha: Float,
}

/// Outgoing radiance at non-specular hits. Emission and specular
/// recursion are handled by [`trace`].
pub trait SurfaceShader: Send + Sync {
    fn tracer(&self) -> &Tracer;

    /// `layers` is only present for the camera hit.
    fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
             ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum;
}

impl Tracer {
    pub fn new(settings: &RenderSettings, passes: &RenderPassSelection, ao: Option<AmbientOcclusion>) -> Self {
        let ao_requested = passes.requires(PassId::Ao) || passes.requires(PassId::AoClay);
        Self {
            params: TraceParams::default(),
            ray_depth: settings.ray_depth,
            shadow_depth: settings.shadow_depth,
            transparent_shadows: settings.transparent_shadows,
            transparent_background: settings.transparent_background,
            transparent_refraction: settings.transparent_refraction,
            mask: passes.mask,
            ao_pass: if ao_requested { Some(ao.unwrap_or_default()) } else { None },
            settings: settings.clone(),
        }
    }

    pub fn prepare(&mut self, scene: &Scene) {
        self.params = self.settings.trace_params(scene.scene_bounds());
        log::debug!(
            "Trace params: shadow bias {:e}, min ray distance {:e}.",
            self.params.shadow_bias,
            self.params.min_ray_dist
        );
    }

    pub fn spawn_ray(&self, hit: &SurfaceIntersection, dir: &Vector3f) -> Ray3f {
        Ray3f::new(hit.spawn_origin(dir, self.params.shadow_bias), *dir, Some(self.params.min_ray_dist), None)
    }

    /// Samples every emitter; non-delta emitters get
    /// `ctx.light_samples(1)` samples.
    pub fn direct_light(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f,
                        bsdf: &dyn BSDF, ctx: &mut SampleContext) -> DirectLight {
        let frame = hit.shading_frame();
        let wo_local = frame.to_local(wo);
        let mut result = DirectLight::default();
        let mut total_samples = 0usize;
        let mut object_blocked = 0usize;
        let mut material_blocked = 0usize;

        for emitter in scene.emitters() {
            let n = if emitter.is_delta() { 1 } else { ctx.light_samples(1) };
            let inv_n = 1.0 / n as Float;
            for _ in 0..n {
                total_samples += 1;
                let u = ctx.rng.next_2d();
                let sample = match emitter.sample_li(&hit.p(), &u) {
                    Some(sample) if sample.pdf > 0.0 => sample,
                    _ => continue,
                };
                let wi_local = frame.to_local(&sample.wi);
                let f = bsdf.eval(&wo_local, &wi_local).value;
                if f.is_black() {
                    continue;
                }
                let contribution = f * sample.radiance * (wi_local.z.abs() / sample.pdf * inv_n);

                let origin = hit.spawn_origin(&sample.wi, self.params.shadow_bias);
                let shadow_ray = Ray3f::shadow_segment(origin, sample.wi, &sample.position,
                                                       self.params.min_ray_dist, self.params.shadow_bias);
                let shadow = scene.shadow(&shadow_ray, self.transparent_shadows, self.shadow_depth);

                result.unshadowed += contribution;
                result.shaded += contribution * shadow.transmittance;
                if shadow.is_occluded() {
                    if let Some(blocker) = shadow.occluder.and_then(|idx| scene.object(idx)) {
                        if blocker.index == self.mask.object_index {
                            object_blocked += 1;
                        }
                        if blocker.material_index == self.mask.material_index {
                            material_blocked += 1;
                        }
                    }
                }
            }
        }
        if total_samples > 0 {
            result.object_mask_shadow = object_blocked as Float / total_samples as Float;
            result.material_mask_shadow = material_blocked as Float / total_samples as Float;
        }
        result
    }

    /// Unoccluded fraction of `ao.samples` cosine rays limited to
    /// `ao.distance`.
    pub fn occlusion(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f,
                     ao: &AmbientOcclusion, ctx: &mut SampleContext) -> Float {
        let n = hit.facing_normal(wo);
        let frame = Frame::from_normal(&n);
        let samples = ao.samples.max(1);
        let mut open = 0u32;
        for _ in 0..samples {
            let dir = frame.from_local(&sample_cosine_hemisphere(&ctx.rng.next_2d()));
            let max_t = if ao.distance > 0.0 { Some(ao.distance) } else { None };
            let ray = Ray3f::new(hit.spawn_origin(&dir, self.params.shadow_bias), dir, Some(self.params.min_ray_dist), max_t);
            if !scene.ray_intersection_t(&ray) {
                open += 1;
            }
        }
        open as Float / samples as Float
    }

    /// Geometry, index and debug layers of the camera hit.
    pub fn record_first_hit(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f,
                            ctx: &mut SampleContext, layers: &mut ColorLayers) {
        layers.depth = Some(hit.t());
        if let Some(object) = hit.object().and_then(|idx| scene.object(idx)) {
            layers.object_index = Some(object.index);
            layers.material_index = Some(object.material_index);
            layers.set(PassId::AdvDiffuseColor, object.material.albedo());
            layers.set(PassId::AdvTransColor, object.material.transmittance());
        }

        let uv = hit.uv();
        layers.set(PassId::DebugUv, RGBSpectrum::new(uv.x, uv.y, 0.0));
        let (ds_du, ds_dv) = hit.shading_partials();
        let frame = hit.shading_frame();
        layers.set(PassId::DebugDpDu, RGBSpectrum::from_vector(hit.dp_du()));
        layers.set(PassId::DebugDpDv, RGBSpectrum::from_vector(hit.dp_dv()));
        layers.set(PassId::DebugDsDu, RGBSpectrum::from_vector(ds_du));
        layers.set(PassId::DebugDsDv, RGBSpectrum::from_vector(ds_dv));
        layers.set(PassId::DebugNu, RGBSpectrum::from_vector(frame.x));
        layers.set(PassId::DebugNv, RGBSpectrum::from_vector(frame.y));
        layers.set(PassId::DebugNormalGeom, RGBSpectrum::from_vector(hit.geo_normal()));
        layers.set(PassId::DebugNormalSmooth, RGBSpectrum::from_vector(hit.sh_normal()));

        let diagonal = self.params.scene_diagonal;
        let mist = if diagonal > 0.0 { (hit.t() / diagonal).min(1.0) } else { 0.0 };
        layers.set(PassId::Mist, RGBSpectrum::splat(mist));

        if let Some(ao) = self.ao_pass.as_ref() {
            let open = self.occlusion(scene, hit, wo, ao, ctx);
            let albedo = scene.material(hit).map(|m| m.albedo()).unwrap_or_default();
            layers.set(PassId::Ao, ao.color * albedo * open);
            layers.set(PassId::AoClay, ao.color * open);
        }
    }

    /// Full camera-sample estimate: trace, then fill the combined layers.
    pub fn estimate<S: SurfaceShader + ?Sized>(&self, shader: &S, scene: &Scene, ray: &Ray3f,
                                                ctx: &mut SampleContext) -> RadianceSample {
        let mut layers = ColorLayers::default();
        let traced = trace(shader, scene, ray, 0, ctx, Some(&mut layers));
        layers.set(PassId::Combined, traced.color);
        layers.set(PassId::AdvSurfaceIntegration, traced.color);
        RadianceSample { color: traced.color, alpha: traced.alpha, layers }
    }
}

/// Traces `ray`, adding emission at every vertex it reaches and following
/// specular lobes up to the ray depth.
pub fn trace<S: SurfaceShader + ?Sized>(shader: &S, scene: &Scene, ray: &Ray3f, depth: u32,
                                        ctx: &mut SampleContext, mut layers: Option<&mut ColorLayers>) -> Traced {
    let tracer = shader.tracer();
    let hit = match scene.ray_intersection(ray) {
        Some(hit) => hit,
        None => {
            let background = scene.background(&ray.dir());
            if let Some(layers) = layers {
                layers.set(PassId::Env, background);
            }
            let alpha = if tracer.transparent_background { 0.0 } else { 1.0 };
            return Traced { color: background, alpha };
        }
    };

    let wo = -ray.dir();
    let mut color = scene.emitted(&hit, &wo);
    if let Some(layers) = layers.as_deref_mut() {
        layers.set(PassId::Emit, color);
        if depth == 0 {
            tracer.record_first_hit(scene, &hit, &wo, ctx, layers);
        }
    }

    let bsdf = match scene.material(&hit) {
        Some(bsdf) => bsdf,
        None => return Traced { color, alpha: 1.0 },
    };

    let mut alpha = 1.0;
    if bsdf.is_specular() {
        if depth >= tracer.ray_depth {
            return Traced { color, alpha };
        }
        let frame = hit.shading_frame();
        for lobe in bsdf.specular_lobes(&frame.to_local(&wo)) {
            let wi = frame.from_local(&lobe.wi);
            let child = trace(shader, scene, &tracer.spawn_ray(&hit, &wi), depth + 1, ctx, None);
            let contribution = child.color * lobe.weight;
            color += contribution;
            match lobe.lobe {
                Lobe::SpecularTransmission => {
                    if tracer.transparent_refraction {
                        alpha = child.alpha;
                    }
                    if let Some(layers) = layers.as_deref_mut() {
                        layers.add(PassId::Refract, contribution);
                        layers.add(PassId::AdvRefract, contribution);
                        layers.add(PassId::AdvTrans, contribution);
                    }
                }
                _ => {
                    if let Some(layers) = layers.as_deref_mut() {
                        layers.add(PassId::Reflect, contribution);
                        layers.add(PassId::AdvReflect, contribution);
                    }
                }
            }
        }
    } else {
        color += shader.shade(scene, &hit, &wo, bsdf, ctx, layers);
    }
    Traced { color, alpha }
}

#[cfg(test)]
pub(crate) mod test_scenes {
    use super::*;
    use crate::core::scene::SceneObject;
    use crate::emitters::point::PointEmitter;
    use crate::materials::lambertian_diffuse::LambertianDiffuseBSDF;
    use crate::materials::specular::GlassBSDF;
    use crate::sensors::perspective::PerspectiveCamera;
    use crate::shapes::rectangle::Rectangle;
    use crate::shapes::sphere::Sphere;
    use crate::math::transform::Transform;
    use std::sync::Arc;

    /// Floor at z = 0, an area light above it, a glass sphere and a
    /// camera looking down.
    pub fn caustic_box() -> Scene {
        let mut scene = Scene::new();
        let floor = Rectangle::new(Transform::scale(Vector3f::new(4.0, 4.0, 1.0)));
        scene.add_object(
            SceneObject::new(Arc::new(floor), Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::splat(0.7))))
                .with_indices(1, 1),
        );
        let light = Rectangle::new(
            Transform::scale(Vector3f::new(0.5, 0.5, 1.0))
                .then(&Transform::rotate(Vector3f::new(1.0, 0.0, 0.0), 180.0))
                .then(&Transform::translate(Vector3f::new(0.0, 0.0, 4.0))),
        );
        scene.add_object(
            SceneObject::new(Arc::new(light), Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::splat(0.0))))
                .with_emission(RGBSpectrum::splat(10.0))
                .with_indices(2, 2),
        );
        let glass = Sphere::new(Vector3f::new(0.0, 0.0, 1.5), 0.5);
        scene.add_object(
            SceneObject::new(
                Arc::new(glass),
                Arc::new(GlassBSDF::new(1.5, RGBSpectrum::splat(1.0), RGBSpectrum::splat(1.0))),
            )
            .with_indices(3, 2),
        );
        scene.add_sensor(Box::new(PerspectiveCamera::new(
            Vector3f::new(0.0, -6.0, 3.0),
            Vector3f::new(0.0, 0.0, 0.5),
            Vector3f::new(0.0, 0.0, 1.0),
            std::f32::consts::FRAC_PI_4,
            32,
            24,
            0.0,
            std::f32::MAX,
        )));
        scene.build_bvh().expect("scene builds");
        scene
    }

    /// Single diffuse floor lit by a point light.
    pub fn lit_floor() -> Scene {
        let mut scene = Scene::new();
        let floor = Rectangle::new(Transform::scale(Vector3f::new(4.0, 4.0, 1.0)));
        scene.add_object(
            SceneObject::new(Arc::new(floor), Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::splat(0.5))))
                .with_indices(1, 1),
        );
        scene.add_emitter(Arc::new(PointEmitter::new(Vector3f::new(0.0, 0.0, 2.0), RGBSpectrum::splat(4.0))));
        scene.build_bvh().expect("scene builds");
        scene
    }

    pub fn down_ray() -> Ray3f {
        Ray3f::new(Vector3f::new(0.1, 0.2, 3.0), Vector3f::new(0.0, 0.0, -1.0), None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::test_scenes::*;
    use super::*;
    use crate::core::rng::LcgRng;
    use crate::core::scene::SceneObject;
    use crate::materials::lambertian_diffuse::LambertianDiffuseBSDF;
    use crate::math::constants::PI;
    use crate::shapes::sphere::Sphere;
    use std::sync::Arc;

    struct DirectOnly {
        tracer: Tracer,
    }

    impl SurfaceShader for DirectOnly {
        fn tracer(&self) -> &Tracer {
            &self.tracer
        }

        fn shade(&self, scene: &Scene, hit: &SurfaceIntersection, wo: &Vector3f, bsdf: &dyn BSDF,
                 ctx: &mut SampleContext, layers: Option<&mut ColorLayers>) -> RGBSpectrum {
            let direct = self.tracer.direct_light(scene, hit, wo, bsdf, ctx);
            if let Some(layers) = layers {
                direct.write_layers(layers);
            }
            direct.shaded
        }
    }

    fn shader(scene: &Scene, passes: &RenderPassSelection) -> DirectOnly {
        let mut tracer = Tracer::new(&RenderSettings::default(), passes, None);
        tracer.prepare(scene);
        DirectOnly { tracer }
    }

    #[test]
    fn test_point_light_irradiance() {
        let scene = lit_floor();
        let shader = shader(&scene, &RenderPassSelection::default());
        let mut rng = LcgRng::new(3);
        let mut ctx = SampleContext::new(&mut rng);
        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let sample = shader.tracer.estimate(&shader, &scene, &ray, &mut ctx);

        // f = 0.5/π, L = 4/4 at distance 2, cos = 1.
        let expected = 0.5 / PI;
        assert!((sample.color.r() - expected).abs() < 1e-4);
        assert_eq!(sample.alpha, 1.0);
        assert!((sample.layers.depth.unwrap() - 1.0).abs() < 1e-4);
        assert_eq!(sample.layers.object_index, Some(1));
        assert!(sample.layers.get(PassId::Shadow).is_black());
    }

    #[test]
    fn test_shadow_and_mask_shadow() {
        let mut scene = Scene::new();
        let floor = crate::shapes::rectangle::Rectangle::new(
            crate::math::transform::Transform::scale(Vector3f::new(4.0, 4.0, 1.0)));
        scene.add_object(
            SceneObject::new(Arc::new(floor), Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::splat(0.5))))
                .with_indices(1, 1),
        );
        scene.add_object(
            SceneObject::new(
                Arc::new(Sphere::new(Vector3f::new(0.0, 0.0, 1.0), 0.3)),
                Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::splat(0.5))),
            )
            .with_indices(7, 4),
        );
        scene.add_emitter(Arc::new(crate::emitters::point::PointEmitter::new(
            Vector3f::new(0.0, 0.0, 2.0),
            RGBSpectrum::splat(4.0),
        )));
        scene.build_bvh().unwrap();

        let mut passes = RenderPassSelection::default();
        passes.mask.object_index = 7;
        let shader = shader(&scene, &passes);
        let mut rng = LcgRng::new(3);
        let mut ctx = SampleContext::new(&mut rng);
        let ray = Ray3f::new(Vector3f::new(0.05, 0.0, 0.5), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let sample = shader.tracer.estimate(&shader, &scene, &ray, &mut ctx);
        assert!(sample.color.is_black());
        assert!(!sample.layers.get(PassId::Shadow).is_black());
        assert_eq!(sample.layers.object_mask_shadow, 1.0);
        assert_eq!(sample.layers.material_mask_shadow, 0.0);
    }

    #[test]
    fn test_background_alpha() {
        let scene = lit_floor();
        let mut settings = RenderSettings::default();
        settings.transparent_background = true;
        let mut tracer = Tracer::new(&settings, &RenderPassSelection::default(), None);
        tracer.prepare(&scene);
        let shader = DirectOnly { tracer };
        let mut rng = LcgRng::new(3);
        let mut ctx = SampleContext::new(&mut rng);
        let up = Ray3f::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(0.0, 0.0, 1.0), None, None);
        let sample = shader.tracer.estimate(&shader, &scene, &up, &mut ctx);
        assert_eq!(sample.alpha, 0.0);
        assert!(!sample.layers.is_hit());
    }

    #[test]
    fn test_specular_recursion_fills_refract_layer() {
        let scene = caustic_box();
        let shader = shader(&scene, &RenderPassSelection::default());
        let mut rng = LcgRng::new(9);
        let mut ctx = SampleContext::new(&mut rng);
        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let sample = shader.tracer.estimate(&shader, &scene, &ray, &mut ctx);
        assert_eq!(sample.layers.object_index, Some(3));
        assert!(sample.layers.get(PassId::DebugNormalGeom).b() > 0.9);
        let refract = sample.layers.get(PassId::Refract);
        let reflect = sample.layers.get(PassId::Reflect);
        assert!((refract + reflect).max_abs_diff(&sample.color) < 1e-5);
    }
}
