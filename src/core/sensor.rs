// Copyright @yucwang 2026

use crate::math::constants::{Vector2f, Vector3f};
use crate::math::ray::Ray3f;

pub trait Sensor: Send + Sync {
    /// `u` is the film position in [0, 1]², origin at the top-left corner.
    fn sample_ray(&self, u: &Vector2f) -> Ray3f;
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn position(&self) -> Vector3f;
    fn describe(&self) -> String {
        String::from("Sensor")
    }
}
