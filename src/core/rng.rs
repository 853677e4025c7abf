// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f};

pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Decorrelated stream for a (seed, pass, x, y) tuple.
    pub fn for_pixel(seed: u64, pass: u32, x: usize, y: usize) -> Self {
        let key = ((seed & 0xFFF) << 44)
            ^ (((pass as u64) & 0xFFF) << 32)
            ^ (((y as u64) & 0xFFFF) << 16)
            ^ ((x as u64) & 0xFFFF);
        Self { state: mix64(key) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> Float {
        ((self.next_u32() >> 8) as Float) * (1.0 / 16777216.0)
    }

    pub fn next_2d(&mut self) -> Vector2f {
        Vector2f::new(self.next_f32(), self.next_f32())
    }

    /// Uniform integer in [0, bound).
    pub fn next_below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        ((self.next_u32() as u64 * bound as u64) >> 32) as usize
    }
}

// splitmix64 finalizer
pub fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_range_and_determinism() {
        let mut a = LcgRng::new(7);
        let mut b = LcgRng::new(7);
        for _ in 0..1000 {
            let v = a.next_f32();
            assert!(v >= 0.0 && v < 1.0);
            assert_eq!(v, b.next_f32());
        }
        for _ in 0..100 {
            assert!(a.next_below(5) < 5);
        }
    }

    #[test]
    fn test_pixel_streams_differ() {
        let mut a = LcgRng::for_pixel(0, 0, 3, 4);
        let mut b = LcgRng::for_pixel(0, 1, 3, 4);
        assert_ne!(a.next_u32(), b.next_u32());
    }
}
