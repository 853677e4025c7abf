// Copyright @yucwang 2026

use crate::core::interaction::{SurfaceIntersection, SurfaceSampleRecord};
use crate::core::shape::Shape;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::ray::Ray3f;
use crate::math::warp::sample_uniform_sphere;

pub struct Sphere {
    center: Vector3f,
    radius: Float,
}

impl Sphere {
    pub fn new(center: Vector3f, radius: Float) -> Self {
        Self { center, radius: radius.abs() }
    }

    fn nearest_t(&self, ray: &Ray3f) -> Option<Float> {
        let oc = ray.origin() - self.center;
        let b = oc.dot(&ray.dir());
        let c = oc.norm_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let (t0, t1) = (-b - sqrt_disc, -b + sqrt_disc);
        if ray.test_segment(t0) {
            Some(t0)
        } else if ray.test_segment(t1) {
            Some(t1)
        } else {
            None
        }
    }

    fn surface_at(&self, p: Vector3f, t: Float) -> SurfaceIntersection {
        let local = p - self.center;
        let n = local / self.radius;
        let mut phi = local.y.atan2(local.x);
        if phi < 0.0 {
            phi += 2.0 * PI;
        }
        let theta = n.z.max(-1.0).min(1.0).acos();
        let uv = Vector2f::new(phi / (2.0 * PI), theta / PI);

        let dp_du = Vector3f::new(-2.0 * PI * local.y, 2.0 * PI * local.x, 0.0);
        let (sin_phi, cos_phi) = phi.sin_cos();
        let dp_dv = PI * Vector3f::new(local.z * cos_phi, local.z * sin_phi, -self.radius * theta.sin());
        SurfaceIntersection::new(p, n, n, uv, t).with_partials(dp_du, dp_dv)
    }
}

impl Shape for Sphere {
    fn bounding_box(&self) -> AABB {
        let r = Vector3f::new(self.radius, self.radius, self.radius);
        AABB::new(self.center - r, self.center + r)
    }

    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let t = self.nearest_t(ray)?;
        Some(self.surface_at(ray.at(t), t))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.nearest_t(ray).is_some()
    }

    fn sample(&self, u: &Vector2f) -> SurfaceSampleRecord {
        let p = self.center + sample_uniform_sphere(u) * self.radius;
        SurfaceSampleRecord::new(self.surface_at(p, 0.0), 1.0 / self.surface_area())
    }

    fn surface_area(&self) -> Float {
        4.0 * PI * self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_hits_front_and_inside() {
        let sphere = Sphere::new(Vector3f::new(0.0, 0.0, -5.0), 1.0);
        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let hit = sphere.ray_intersection(&ray).expect("expected a hit");
        assert!((hit.t() - 4.0).abs() < 1e-4);
        assert!((hit.geo_normal() - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-4);

        let inside = Ray3f::new(Vector3f::new(0.0, 0.0, -5.0), Vector3f::new(1.0, 0.0, 0.0), None, None);
        let hit = sphere.ray_intersection(&inside).expect("expected an exit hit");
        assert!((hit.t() - 1.0).abs() < 1e-4);

        let miss = Ray3f::new(Vector3f::new(0.0, 2.0, 0.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(!sphere.ray_intersection_t(&miss));
    }

    #[test]
    fn test_sphere_partials_are_tangent() {
        let sphere = Sphere::new(Vector3f::zeros(), 2.0);
        let ray = Ray3f::new(Vector3f::new(5.0, 0.3, 0.4), Vector3f::new(-1.0, 0.0, 0.0), None, None);
        let hit = sphere.ray_intersection(&ray).expect("expected a hit");
        assert!(hit.dp_du().dot(&hit.geo_normal()).abs() < 1e-3);
        assert!(hit.dp_dv().dot(&hit.geo_normal()).abs() < 1e-3);
    }
}
