// Copyright @yucwang 2026

use crate::core::interaction::{SurfaceIntersection, SurfaceSampleRecord};
use crate::core::shape::Shape;
use crate::math::aabb::AABB;
use crate::math::constants::{EPSILON, Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;

/// The square [-1, 1]² in the local z = 0 plane, placed by `to_world`.
pub struct Rectangle {
    to_world: Transform,
    normal: Vector3f,
    dp_du: Vector3f,
    dp_dv: Vector3f,
    area: Float,
}

impl Rectangle {
    pub fn new(to_world: Transform) -> Self {
        let dp_du = to_world.apply_vector(Vector3f::new(2.0, 0.0, 0.0));
        let dp_dv = to_world.apply_vector(Vector3f::new(0.0, 2.0, 0.0));
        let cross = dp_du.cross(&dp_dv);
        let area = cross.norm();
        let normal = if area > 0.0 {
            cross / area
        } else {
            to_world.apply_normal(Vector3f::new(0.0, 0.0, 1.0)).normalize()
        };

        Self { to_world, normal, dp_du, dp_dv, area }
    }

    /// Local hit point and world distance along `ray`.
    fn intersect_local(&self, ray: &Ray3f) -> Option<(Vector3f, Float)> {
        let o = self.to_world.inv_apply_point(ray.origin());
        let d = self.to_world.inv_apply_vector(ray.dir());
        if d.z.abs() < EPSILON * EPSILON {
            return None;
        }

        // t is shared between spaces because `d` is not renormalized.
        let t = -o.z / d.z;
        if !ray.test_segment(t) {
            return None;
        }
        let p_local = o + d * t;
        if p_local.x.abs() > 1.0 || p_local.y.abs() > 1.0 {
            return None;
        }
        Some((p_local, t))
    }

    fn surface_at(&self, p_local: &Vector3f, t: Float) -> SurfaceIntersection {
        let uv = Vector2f::new(0.5 * (p_local.x + 1.0), 0.5 * (p_local.y + 1.0));
        SurfaceIntersection::new(self.to_world.apply_point(*p_local), self.normal, self.normal, uv, t)
            .with_partials(self.dp_du, self.dp_dv)
    }
}

impl Shape for Rectangle {
    fn bounding_box(&self) -> AABB {
        let mut bbox = AABB::default();
        for &(x, y) in &[(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
            bbox.expand_by_point(&self.to_world.apply_point(Vector3f::new(x, y, 0.0)));
        }
        bbox
    }

    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let (p_local, t) = self.intersect_local(ray)?;
        Some(self.surface_at(&p_local, t))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.intersect_local(ray).is_some()
    }

    fn sample(&self, u: &Vector2f) -> SurfaceSampleRecord {
        let p_local = Vector3f::new(2.0 * u.x - 1.0, 2.0 * u.y - 1.0, 0.0);
        let pdf = if self.area > 0.0 { 1.0 / self.area } else { 0.0 };
        SurfaceSampleRecord::new(self.surface_at(&p_local, 0.0), pdf)
    }

    fn surface_area(&self) -> Float {
        self.area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_rectangle() {
        let to_world = Transform::scale(Vector3f::new(2.0, 3.0, 1.0))
            .then(&Transform::translate(Vector3f::new(0.0, 0.0, -5.0)));
        let rect = Rectangle::new(to_world);
        assert!((rect.surface_area() - 24.0).abs() < 1e-4);

        let ray = Ray3f::new(Vector3f::new(1.5, 2.5, 0.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let hit = rect.ray_intersection(&ray).expect("expected a hit");
        assert!((hit.t() - 5.0).abs() < 1e-4);
        assert!((hit.p() - Vector3f::new(1.5, 2.5, -5.0)).norm() < 1e-4);

        let outside = Ray3f::new(Vector3f::new(2.5, 0.0, 0.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(!rect.ray_intersection_t(&outside));

        let record = rect.sample(&Vector2f::new(0.5, 0.5));
        assert!((record.intersection().p() - Vector3f::new(0.0, 0.0, -5.0)).norm() < 1e-4);
        assert!((record.pdf() - 1.0 / 24.0).abs() < 1e-6);
    }
}
