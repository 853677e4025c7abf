// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::properties::Properties;
use crate::math::constants::{Float, Vector2f, PI};
use crate::math::spectrum::RGBSpectrum;

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Box,
    Mitchell,
    Gauss,
    Lanczos,
}

impl FromStr for FilterKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "box" => Ok(FilterKind::Box),
            "mitchell" => Ok(FilterKind::Mitchell),
            "gauss" => Ok(FilterKind::Gauss),
            "lanczos" => Ok(FilterKind::Lanczos),
            _ => Err(()),
        }
    }
}

/// Pixel reconstruction kernel with support `width` (in pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelFilter {
    pub kind: FilterKind,
    pub width: Float,
}

impl PixelFilter {
    pub fn new(kind: FilterKind, width: Float) -> Self {
        Self { kind, width }
    }

    pub fn radius(&self) -> Float {
        0.5 * self.width
    }

    /// Weight at pixel-space offset (dx, dy) from the pixel center.
    pub fn eval(&self, dx: Float, dy: Float) -> Float {
        let r = self.radius();
        if dx.abs() > r || dy.abs() > r {
            return 0.0;
        }
        self.kind.eval_1d(dx / r) * self.kind.eval_1d(dy / r)
    }
}

impl FilterKind {
    /// One axis of the separable kernel over the normalized support [-1, 1].
    fn eval_1d(&self, x: Float) -> Float {
        match self {
            FilterKind::Box => 1.0,
            FilterKind::Gauss => gauss_1d(x),
            FilterKind::Mitchell => mitchell_1d(x),
            FilterKind::Lanczos => lanczos_1d(x),
        }
    }
}

const FILTER_TABLE_SIZE: usize = 64;

/// Draws sample offsets distributed as |f| of a separable pixel filter.
/// The returned weight is the sign of f, so kernels with negative lobes
/// keep their shape without producing near-zero weight sums.
#[derive(Debug, Clone)]
pub struct FilterSampler {
    kind: FilterKind,
    radius: Float,
    cdf: Vec<Float>,
}

impl FilterSampler {
    pub fn new(filter: &PixelFilter) -> Self {
        let n = FILTER_TABLE_SIZE;
        let mut cdf: Vec<Float> = Vec::with_capacity(n + 1);
        let mut total: Float = 0.0;
        cdf.push(total);
        for i in 0..n {
            let x = -1.0 + 2.0 * (i as Float + 0.5) / n as Float;
            total += filter.kind.eval_1d(x).abs();
            cdf.push(total);
        }
        if total > 0.0 {
            cdf.iter_mut().for_each(|c| *c /= total);
        } else {
            cdf.iter_mut().enumerate().for_each(|(i, c)| *c = i as Float / n as Float);
        }
        Self { kind: filter.kind, radius: filter.radius(), cdf }
    }

    fn sample_1d(&self, u: Float) -> (Float, Float) {
        let n = self.cdf.len() - 1;
        let bin = self.cdf[1..].iter().position(|&c| c > u).unwrap_or(n - 1);
        let (lo, hi) = (self.cdf[bin], self.cdf[bin + 1]);
        let t = if hi > lo { ((u - lo) / (hi - lo)).min(1.0) } else { 0.5 };
        let center = -1.0 + 2.0 * (bin as Float + 0.5) / n as Float;
        let sign = if self.kind.eval_1d(center) < 0.0 { -1.0 } else { 1.0 };
        let x = -1.0 + 2.0 * (bin as Float + t) / n as Float;
        (x * self.radius, sign)
    }

    /// Pixel-space offset from the pixel center and its signed unit weight.
    pub fn sample(&self, u: &Vector2f) -> (Vector2f, Float) {
        let (dx, sx) = self.sample_1d(u.x);
        let (dy, sy) = self.sample_1d(u.y);
        (Vector2f::new(dx, dy), sx * sy)
    }
}

fn gauss_1d(x: Float) -> Float {
    ((-6.0 * x * x).exp() - (-6.0 as Float).exp()).max(0.0)
}

// B = C = 1/3
fn mitchell_1d(x: Float) -> Float {
    let (b, c) = (1.0 / 3.0, 1.0 / 3.0);
    let x = (2.0 * x).abs();
    if x > 1.0 {
        ((-b - 6.0 * c) * x * x * x + (6.0 * b + 30.0 * c) * x * x
            + (-12.0 * b - 48.0 * c) * x + (8.0 * b + 24.0 * c)) * (1.0 / 6.0)
    } else {
        ((12.0 - 9.0 * b - 6.0 * c) * x * x * x + (-18.0 + 12.0 * b + 6.0 * c) * x * x
            + (6.0 - 2.0 * b)) * (1.0 / 6.0)
    }
}

fn sinc(x: Float) -> Float {
    let x = x.abs();
    if x < 1e-5 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

// Lanczos-2 over the normalized support.
fn lanczos_1d(x: Float) -> Float {
    let x = 2.0 * x;
    sinc(x) * sinc(x / 2.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AASamplingConfig {
    pub min_samples: u32,
    pub inc_samples: u32,
    pub passes: u32,
    pub threshold: Float,
    pub filter: PixelFilter,
}

impl Default for AASamplingConfig {
    fn default() -> Self {
        Self {
            min_samples: 1,
            inc_samples: 1,
            passes: 1,
            threshold: 0.05,
            filter: PixelFilter::new(FilterKind::Gauss, 1.5),
        }
    }
}

impl AASamplingConfig {
    pub fn from_properties(props: &Properties) -> RenderResult<Self> {
        let kind = props.choice::<FilterKind>("AA_filter_type", "gauss", &["box", "mitchell", "gauss", "lanczos"])?;
        Ok(Self {
            min_samples: props.integer("AA_min_samples", 1, 1..=i32::MAX as i64)? as u32,
            inc_samples: props.integer("AA_inc_samples", 1, 1..=i32::MAX as i64)? as u32,
            passes: props.integer("AA_passes", 1, 1..=i32::MAX as i64)? as u32,
            threshold: props.float("AA_threshold", 0.05, 0.0..=1.0)?,
            filter: PixelFilter::new(kind, props.float("AA_pixelwidth", 1.5, 1.0..=20.0)?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseControlConfig {
    /// Percentage of total pixels.
    pub resampled_floor: Float,
    pub sample_multiplier_factor: Float,
    pub light_sample_multiplier_factor: Float,
    pub indirect_sample_multiplier_factor: Float,
    pub detect_color_noise: bool,
    pub dark_threshold_factor: Float,
    pub variance_edge_size: u32,
    pub variance_pixels: u32,
    pub clamp_samples: Float,
    pub clamp_indirect: Float,
    /// Threshold scale applied when the resampled share drops below the floor.
    pub threshold_tightening: Float,
}

impl Default for NoiseControlConfig {
    fn default() -> Self {
        Self {
            resampled_floor: 0.0,
            sample_multiplier_factor: 1.0,
            light_sample_multiplier_factor: 1.0,
            indirect_sample_multiplier_factor: 1.0,
            detect_color_noise: false,
            dark_threshold_factor: 0.0,
            variance_edge_size: 10,
            variance_pixels: 0,
            clamp_samples: 0.0,
            clamp_indirect: 0.0,
            threshold_tightening: 0.9,
        }
    }
}

impl NoiseControlConfig {
    pub fn from_properties(props: &Properties) -> RenderResult<Self> {
        let config = Self {
            resampled_floor: props.float("resampled_floor", 0.0, 0.0..=100.0)?,
            sample_multiplier_factor: props.float("sample_multiplier_factor", 1.0, 1.0..=2.0)?,
            light_sample_multiplier_factor: props.float("light_sample_multiplier_factor", 1.0, 1.0..=2.0)?,
            indirect_sample_multiplier_factor: props.float("indirect_sample_multiplier_factor", 1.0, 1.0..=2.0)?,
            detect_color_noise: props.boolean("detect_color_noise", false)?,
            dark_threshold_factor: props.float("dark_threshold_factor", 0.0, 0.0..=1.0)?,
            variance_edge_size: props.integer("variance_edge_size", 10, 4..=20)? as u32,
            variance_pixels: props.integer("variance_pixels", 0, 0..=10)? as u32,
            clamp_samples: props.float("clamp_samples", 0.0, 0.0..=Float::MAX)?,
            clamp_indirect: props.float("clamp_indirect", 0.0, 0.0..=Float::MAX)?,
            threshold_tightening: props.float("threshold_tightening", 0.9, 0.0..=1.0)?,
        };
        if config.threshold_tightening <= 0.0 {
            return Err(RenderError::config("threshold_tightening", config.threshold_tightening, "must be greater than zero"));
        }
        Ok(config)
    }
}

/// Scales `color` so that no component exceeds `clamp`. A clamp of 0.0
/// disables clamping.
pub fn clamp_sample(color: RGBSpectrum, clamp: Float) -> RGBSpectrum {
    if clamp <= 0.0 {
        return color;
    }
    let max = color.max_component();
    if max > clamp {
        color * (clamp / max)
    } else {
        color
    }
}
