// Copyright 2020 @TwoCookingMice

use super::constants::{Float, Vector3f};

#[derive(Debug, Clone, Copy)]
pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f,
               min_t: Option<Float>, max_t: Option<Float>) -> Self {
        Self { origin: o, dir: d.normalize(),
               min_t: min_t.unwrap_or(0.0),
               max_t: max_t.unwrap_or(std::f32::MAX)}
    }

    /// Shadow ray from `origin` towards `target`, stopping `bias` short of
    /// the target so the light's own surface never occludes it.
    pub fn shadow_segment(origin: Vector3f, dir: Vector3f, target: &Vector3f,
                          min_dist: Float, bias: Float) -> Self {
        let max_t = (target - origin).norm() * (1.0 - 1e-3) - bias;
        Self::new(origin, dir, Some(min_dist), Some(max_t.max(0.0)))
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.origin + self.dir * t
    }

    /// Shrinks the valid range to end at `t` when `t` lies inside it.
    pub fn update(&mut self, t: Float) -> bool {
        if !self.test_segment(t) {
            false
        } else {
            self.max_t = t;
            true
        }
    }

    pub fn test_segment(&self, t: Float) -> bool {
        t >= self.min_t && t <= self.max_t
    }
}
