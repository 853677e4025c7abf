// Copyright 2020 @TwoCookingMice

use super::constants::{Float, Vector3f};

use std::ops;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RGBSpectrum {
    rgb: Vector3f
}

impl Default for RGBSpectrum {
    fn default() -> Self {
        Self { rgb: Vector3f::zeros() }
    }
}

impl RGBSpectrum {
    pub fn new(r: Float, g: Float, b: Float) -> Self {
        Self { rgb: Vector3f::new(r, g, b) }
    }

    pub fn splat(v: Float) -> Self {
        Self::new(v, v, v)
    }

    pub fn from_vector(v: Vector3f) -> Self {
        Self { rgb: v }
    }

    pub fn to_vector(&self) -> Vector3f {
        self.rgb
    }

    pub fn r(&self) -> Float { self.rgb.x }
    pub fn g(&self) -> Float { self.rgb.y }
    pub fn b(&self) -> Float { self.rgb.z }

    pub fn is_black(&self) -> bool {
        self.rgb.iter().all(|c| *c == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.rgb.iter().all(|c| c.is_finite())
    }

    pub fn max_component(&self) -> Float {
        self.rgb.x.max(self.rgb.y).max(self.rgb.z)
    }

    /// Rec.709 luminance.
    pub fn luminance(&self) -> Float {
        0.2126 * self.rgb.x + 0.7152 * self.rgb.y + 0.0722 * self.rgb.z
    }

    pub fn powf(&self, e: Float) -> Self {
        Self::new(self.rgb.x.max(0.0).powf(e), self.rgb.y.max(0.0).powf(e), self.rgb.z.max(0.0).powf(e))
    }

    pub fn clamp01(&self) -> Self {
        Self::new(self.rgb.x.max(0.0).min(1.0), self.rgb.y.max(0.0).min(1.0), self.rgb.z.max(0.0).min(1.0))
    }

    /// Largest absolute per-component difference.
    pub fn max_abs_diff(&self, other: &RGBSpectrum) -> Float {
        (self.rgb - other.rgb).abs().max()
    }
}

impl ops::Index<usize> for RGBSpectrum {
    type Output = Float;

    fn index(&self, idx: usize) -> &Float {
        &self.rgb[idx]
    }
}

impl ops::Add for RGBSpectrum {
    type Output = Self;
    fn add(self, rhs: Self) -> Self { Self { rgb: self.rgb + rhs.rgb } }
}

impl ops::AddAssign for RGBSpectrum {
    fn add_assign(&mut self, rhs: Self) { self.rgb += rhs.rgb; }
}

impl ops::Sub for RGBSpectrum {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self { Self { rgb: self.rgb - rhs.rgb } }
}

impl ops::Mul for RGBSpectrum {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self { Self { rgb: self.rgb.component_mul(&rhs.rgb) } }
}

impl ops::MulAssign for RGBSpectrum {
    fn mul_assign(&mut self, rhs: Self) { self.rgb.component_mul_assign(&rhs.rgb); }
}

impl ops::Mul<Float> for RGBSpectrum {
    type Output = Self;
    fn mul(self, rhs: Float) -> Self { Self { rgb: self.rgb * rhs } }
}

impl ops::MulAssign<Float> for RGBSpectrum {
    fn mul_assign(&mut self, rhs: Float) { self.rgb *= rhs; }
}

impl ops::Div<Float> for RGBSpectrum {
    type Output = Self;
    fn div(self, rhs: Float) -> Self { Self { rgb: self.rgb / rhs } }
}

#[cfg(test)]
mod tests {
    use super::RGBSpectrum;

    #[test]
    fn test_spectrum_arithmetic() {
        let a = RGBSpectrum::new(1.0, 0.5, 0.25);
        let b = RGBSpectrum::splat(2.0);
        assert_eq!(a * b, RGBSpectrum::new(2.0, 1.0, 0.5));
        assert_eq!((a + a) / 2.0, a);
        assert!(RGBSpectrum::default().is_black());
        assert!(!a.is_black());
        assert_eq!(a.max_component(), 1.0);
        assert!((RGBSpectrum::splat(1.0).luminance() - 1.0).abs() < 1e-6);
    }
}
