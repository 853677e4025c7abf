// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::bvh::BVH;
use crate::core::emitter::Emitter;
use crate::core::error::{RenderError, RenderResult};
use crate::core::interaction::SurfaceIntersection;
use crate::core::sensor::Sensor;
use crate::core::settings::ClaySettings;
use crate::core::shape::Shape;
use crate::emitters::area::{emitted_radiance, AreaEmitter};
use crate::materials::lambertian_diffuse::LambertianDiffuseBSDF;
use crate::materials::oren_nayar::OrenNayarBSDF;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use std::sync::Arc;

pub struct SceneObject {
    pub shape: Arc<dyn Shape>,
    pub material: Arc<dyn BSDF>,
    pub emission: RGBSpectrum,
    pub name: Option<String>,
    /// Pass index used by the object-index passes and masks.
    pub index: u32,
    pub material_index: u32,
}

impl SceneObject {
    pub fn new(shape: Arc<dyn Shape>, material: Arc<dyn BSDF>) -> Self {
        Self { shape, material, emission: RGBSpectrum::default(), name: None, index: 0, material_index: 0 }
    }

    pub fn with_emission(mut self, emission: RGBSpectrum) -> Self {
        self.emission = emission;
        self
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_indices(mut self, index: u32, material_index: u32) -> Self {
        self.index = index;
        self.material_index = material_index;
        self
    }

    pub fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }
}

/// Result of tracing a shadow ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowQuery {
    pub transmittance: RGBSpectrum,
    pub occluder: Option<usize>,
}

impl ShadowQuery {
    pub fn is_occluded(&self) -> bool {
        self.transmittance.is_black()
    }
}

pub struct Scene {
    objects: Vec<SceneObject>,
    sensors: Vec<Box<dyn Sensor>>,
    emitters: Vec<Arc<dyn Emitter>>,
    emitter_cdf: Vec<Float>,
    background: RGBSpectrum,
    scene_bounds: AABB,
    bvh: Option<BVH>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            sensors: Vec::new(),
            emitters: Vec::new(),
            emitter_cdf: Vec::new(),
            background: RGBSpectrum::default(),
            scene_bounds: AABB::default(),
            bvh: None,
        }
    }

    pub fn add_object(&mut self, object: SceneObject) {
        let idx = self.objects.len();
        if object.is_emissive() {
            let emitter = AreaEmitter::from_shape(object.shape.clone(), object.emission, idx);
            self.emitters.push(Arc::new(emitter));
        }
        self.objects.push(object);
        self.bvh = None;
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, idx: usize) -> Option<&SceneObject> {
        self.objects.get(idx)
    }

    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.sensors.push(sensor);
    }

    pub fn camera(&self, camera_id: usize) -> Option<&dyn Sensor> {
        self.sensors.get(camera_id).map(|s| s.as_ref())
    }

    pub fn add_emitter(&mut self, emitter: Arc<dyn Emitter>) {
        self.emitters.push(emitter);
        self.bvh = None;
    }

    pub fn emitters(&self) -> &[Arc<dyn Emitter>] {
        &self.emitters
    }

    pub fn set_background(&mut self, background: RGBSpectrum) {
        self.background = background;
    }

    pub fn background(&self, _dir: &Vector3f) -> RGBSpectrum {
        self.background
    }

    pub fn has_background(&self) -> bool {
        !self.background.is_black()
    }

    pub fn scene_bounds(&self) -> &AABB {
        &self.scene_bounds
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.bvh.is_some()
    }

    /// Builds the acceleration structure and the emitter selection table.
    /// Must run before any ray query.
    pub fn build_bvh(&mut self) -> RenderResult<()> {
        let prim_bounds: Vec<AABB> = self.objects.iter().map(|o| o.shape.bounding_box()).collect();
        let mut scene_bounds = AABB::default();
        for bounds in &prim_bounds {
            scene_bounds.expand_by_aabb(bounds);
        }
        self.bvh = Some(BVH::new(&prim_bounds)?);
        self.scene_bounds = scene_bounds;

        let mut total = 0.0;
        self.emitter_cdf = self
            .emitters
            .iter()
            .map(|e| {
                total += e.power().luminance().max(0.0);
                total
            })
            .collect();
        if total <= 0.0 {
            // Equal weights when no emitter reports power.
            let n = self.emitters.len() as Float;
            self.emitter_cdf = (1..=self.emitters.len()).map(|i| i as Float / n).collect();
        } else {
            for c in &mut self.emitter_cdf {
                *c /= total;
            }
        }
        log::info!(
            "Scene ready: {} objects, {} emitters, bounds diagonal {:.3}.",
            self.objects.len(),
            self.emitters.len(),
            self.scene_bounds.diagonal().norm()
        );
        Ok(())
    }

    pub fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let bvh = self.bvh.as_ref()?;
        bvh.ray_intersection(ray, |prim_idx, ray| {
            self.objects[prim_idx].shape.ray_intersection(ray).map(|h| {
                let t = h.t();
                (h, t)
            })
        })
        .map(|(idx, hit)| hit.with_object(idx))
    }

    pub fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.occluder(ray).is_some()
    }

    /// Any object blocking `ray`.
    pub fn occluder(&self, ray: &Ray3f) -> Option<usize> {
        let bvh = self.bvh.as_ref()?;
        let mut found = None;
        bvh.ray_intersection_t(ray, |prim_idx, ray| {
            if self.objects[prim_idx].shape.ray_intersection_t(ray) {
                found = Some(prim_idx);
                true
            } else {
                false
            }
        });
        found
    }

    /// Shadow ray toward a light. With `transparent_shadows`, up to
    /// `shadow_depth` transmissive surfaces filter the light instead of
    /// blocking it.
    pub fn shadow(&self, ray: &Ray3f, transparent_shadows: bool, shadow_depth: u32) -> ShadowQuery {
        if !transparent_shadows {
            let occluder = self.occluder(ray);
            let transmittance = if occluder.is_some() { RGBSpectrum::default() } else { RGBSpectrum::splat(1.0) };
            return ShadowQuery { transmittance, occluder };
        }

        let mut transmittance = RGBSpectrum::splat(1.0);
        let mut first = None;
        let mut segment = *ray;
        for _ in 0..=shadow_depth {
            let hit = match self.ray_intersection(&segment) {
                Some(hit) => hit,
                None => return ShadowQuery { transmittance, occluder: first },
            };
            let idx = hit.object().unwrap_or(0);
            first = first.or(Some(idx));
            let filter = self.objects[idx].material.transmittance();
            if filter.is_black() {
                return ShadowQuery { transmittance: RGBSpectrum::default(), occluder: first };
            }
            transmittance *= filter;
            segment.min_t = hit.t() + 1e-4 * (1.0 + hit.t());
        }
        ShadowQuery { transmittance: RGBSpectrum::default(), occluder: first }
    }

    /// Radiance leaving the hit toward `w` if the hit object emits.
    pub fn emitted(&self, hit: &SurfaceIntersection, w: &Vector3f) -> RGBSpectrum {
        match hit.object().and_then(|idx| self.objects.get(idx)) {
            Some(object) if object.is_emissive() => emitted_radiance(object.emission, &hit.geo_normal(), w),
            _ => RGBSpectrum::default(),
        }
    }

    pub fn material(&self, hit: &SurfaceIntersection) -> Option<&dyn BSDF> {
        hit.object().and_then(|idx| self.objects.get(idx)).map(|o| o.material.as_ref())
    }

    /// Picks an emitter proportionally to its power. Returns the index and
    /// the selection probability.
    pub fn sample_emitter(&self, u: Float) -> Option<(usize, Float)> {
        if self.emitter_cdf.is_empty() {
            return None;
        }
        let idx = self
            .emitter_cdf
            .iter()
            .position(|&c| u < c)
            .unwrap_or(self.emitter_cdf.len() - 1);
        Some((idx, self.emitter_pdf(idx)))
    }

    pub fn emitter_pdf(&self, idx: usize) -> Float {
        match idx {
            0 => self.emitter_cdf.first().copied().unwrap_or(0.0),
            _ => self.emitter_cdf.get(idx).copied().unwrap_or(0.0) - self.emitter_cdf[idx - 1],
        }
    }

    /// Overrides every material with the clay material. Emission is kept.
    pub fn apply_clay(&mut self, clay: &ClaySettings) {
        let material: Arc<dyn BSDF> = if clay.oren_nayar {
            Arc::new(OrenNayarBSDF::new(clay.color, clay.sigma))
        } else {
            Arc::new(LambertianDiffuseBSDF::new(clay.color))
        };
        let mut replaced = 0usize;
        for object in &mut self.objects {
            if clay.keep_transparency && !object.material.transmittance().is_black() {
                continue;
            }
            object.material = material.clone();
            replaced += 1;
        }
        log::info!("Clay render: {} materials overridden.", replaced);
    }

    pub fn require_emitters(&self, method: &str) -> RenderResult<()> {
        if self.emitters.is_empty() {
            return Err(RenderError::resource(format!("{} requires at least one emitter in the scene", method)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::specular::GlassBSDF;
    use crate::shapes::sphere::Sphere;

    fn diffuse() -> Arc<dyn BSDF> {
        Arc::new(LambertianDiffuseBSDF::new(RGBSpectrum::splat(0.5)))
    }

    #[test]
    fn test_scene_ray_intersection_closest_hit() {
        let mut scene = Scene::new();
        for z in [5.0, 2.0, 10.0].iter() {
            scene.add_object(SceneObject::new(Arc::new(Sphere::new(Vector3f::new(0.0, 0.0, *z), 0.5)), diffuse()));
        }
        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(scene.ray_intersection(&ray).is_none());

        scene.build_bvh().unwrap();
        let hit = scene.ray_intersection(&ray).expect("expected intersection");
        assert!((hit.t() - 1.5).abs() < 1e-4);
        assert_eq!(hit.object(), Some(1));
    }

    #[test]
    fn test_emitter_selection_follows_power() {
        let mut scene = Scene::new();
        let weak = SceneObject::new(Arc::new(Sphere::new(Vector3f::zeros(), 1.0)), diffuse())
            .with_emission(RGBSpectrum::splat(1.0));
        let strong = SceneObject::new(Arc::new(Sphere::new(Vector3f::new(5.0, 0.0, 0.0), 1.0)), diffuse())
            .with_emission(RGBSpectrum::splat(3.0));
        scene.add_object(weak);
        scene.add_object(strong);
        scene.build_bvh().unwrap();

        assert_eq!(scene.emitters().len(), 2);
        assert!((scene.emitter_pdf(0) - 0.25).abs() < 1e-5);
        assert!((scene.emitter_pdf(1) - 0.75).abs() < 1e-5);
        assert_eq!(scene.sample_emitter(0.1).map(|(i, _)| i), Some(0));
        assert_eq!(scene.sample_emitter(0.9).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_transparent_shadows_filter_light() {
        let mut scene = Scene::new();
        let glass = Arc::new(GlassBSDF::new(1.5, RGBSpectrum::splat(1.0), RGBSpectrum::splat(0.5)));
        scene.add_object(
            SceneObject::new(Arc::new(Sphere::new(Vector3f::new(0.0, 0.0, 5.0), 1.0)), glass).with_indices(7, 2),
        );
        scene.build_bvh().unwrap();

        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), Some(0.0), Some(10.0));
        let opaque = scene.shadow(&ray, false, 4);
        assert!(opaque.is_occluded());
        assert_eq!(opaque.occluder, Some(0));

        let filtered = scene.shadow(&ray, true, 4);
        assert!(!filtered.is_occluded());
        assert!((filtered.transmittance.r() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_clay_keeps_transparency() {
        let mut scene = Scene::new();
        let glass = Arc::new(GlassBSDF::new(1.5, RGBSpectrum::splat(1.0), RGBSpectrum::splat(1.0)));
        scene.add_object(SceneObject::new(Arc::new(Sphere::new(Vector3f::zeros(), 1.0)), glass));
        scene.add_object(SceneObject::new(Arc::new(Sphere::new(Vector3f::new(3.0, 0.0, 0.0), 1.0)), diffuse()));
        let clay = ClaySettings {
            keep_transparency: true,
            keep_normals: false,
            oren_nayar: false,
            sigma: 0.3,
            color: RGBSpectrum::splat(0.8),
        };
        scene.apply_clay(&clay);
        assert!(scene.objects()[0].material.is_specular());
        assert_eq!(scene.objects()[1].material.albedo(), RGBSpectrum::splat(0.8));
    }
}
