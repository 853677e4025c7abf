// Copyright @yucwang 2026

//! Adaptive anti-aliasing: pass planning and noise detection.

use crate::core::sampling::{AASamplingConfig, NoiseControlConfig};
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::renderers::film::PixelBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Initial,
    Sampling,
    Evaluating,
    Converged,
}

/// What one AA pass samples.
#[derive(Debug, Clone)]
pub struct PassPlan {
    /// 0-based.
    pub pass: u32,
    pub samples: u32,
    pub light_multiplier: Float,
    pub indirect_multiplier: Float,
    /// Image-wide resample marks. `None` samples every pixel.
    pub marks: Option<Vec<bool>>,
}

impl PassPlan {
    pub fn marked(&self) -> Option<usize> {
        self.marks.as_ref().map(|m| m.iter().filter(|&&b| b).count())
    }
}

/// Per-pixel result of noise detection.
#[derive(Debug, Clone)]
pub struct NoiseMap {
    pub marks: Vec<bool>,
    /// Largest neighbour difference relative to the scaled threshold.
    pub estimates: Vec<Float>,
}

impl NoiseMap {
    pub fn marked(&self) -> usize {
        self.marks.iter().filter(|&&b| b).count()
    }
}

fn difference(a: &RGBSpectrum, b: &RGBSpectrum, color: bool) -> Float {
    let lum = (a.luminance() - b.luminance()).abs();
    if color {
        lum.max(a.max_abs_diff(b))
    } else {
        lum
    }
}

/// Marks pixels whose difference to a right, lower or diagonal neighbour
/// exceeds the threshold. The threshold shrinks in dark regions by
/// `dark_threshold_factor`. Both pixels of a noisy pair are marked.
pub fn detect_noise(image: &PixelBuffer, threshold: Float, noise: &NoiseControlConfig) -> NoiseMap {
    let (w, h) = (image.width(), image.height());
    let mut marks = vec![false; w * h];
    let mut estimates: Vec<Float> = vec![0.0; w * h];
    let dark = noise.dark_threshold_factor;
    let scaled = |lum: Float| threshold * ((1.0 - dark) + lum.max(0.0).min(1.0) * dark);

    for y in 0..h {
        for x in 0..w {
            let c = image.color(x, y);
            let t = scaled(c.luminance());
            let neighbours = [
                (x as isize + 1, y as isize),
                (x as isize, y as isize + 1),
                (x as isize + 1, y as isize + 1),
                (x as isize - 1, y as isize + 1),
            ];
            for &(nx, ny) in neighbours.iter() {
                if nx < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let diff = difference(&c, &image.color(nx, ny), noise.detect_color_noise);
                let ratio = if t > 0.0 { diff / t } else if diff > 0.0 { Float::MAX } else { 0.0 };
                let i = x + w * y;
                let j = nx + w * ny;
                estimates[i] = estimates[i].max(ratio);
                estimates[j] = estimates[j].max(ratio);
                if diff > t {
                    marks[i] = true;
                    marks[j] = true;
                }
            }
        }
    }

    if noise.variance_pixels > 0 {
        mark_variance(image, &mut marks, noise, &scaled);
    }
    NoiseMap { marks, estimates }
}

/// Counts steps above threshold along a horizontal and a vertical window
/// centered on each pixel; marks the pixel when either count reaches
/// `variance_pixels`.
fn mark_variance<F: Fn(Float) -> Float>(image: &PixelBuffer, marks: &mut [bool], noise: &NoiseControlConfig, scaled: &F) {
    let (w, h) = (image.width() as isize, image.height() as isize);
    let half = (noise.variance_edge_size / 2) as isize;
    let trigger = noise.variance_pixels as usize;
    let step_above = |ax: isize, ay: isize, bx: isize, by: isize| -> bool {
        if ax < 0 || ay < 0 || bx >= w || by >= h {
            return false;
        }
        let a = image.color(ax as usize, ay as usize);
        let b = image.color(bx as usize, by as usize);
        difference(&a, &b, noise.detect_color_noise) > scaled(a.luminance())
    };

    let mut variance_marks = vec![false; marks.len()];
    for y in 0..h {
        for x in 0..w {
            let horizontal = (-half..half).filter(|&i| step_above(x + i, y, x + i + 1, y)).count();
            let vertical = (-half..half).filter(|&i| step_above(x, y + i, x, y + i + 1)).count();
            if horizontal >= trigger || vertical >= trigger {
                variance_marks[(x + w * y) as usize] = true;
            }
        }
    }
    for (mark, extra) in marks.iter_mut().zip(variance_marks) {
        *mark |= extra;
    }
}

/// Drives the AA passes: plans sample counts and multipliers, evaluates
/// noise between passes and tightens the threshold when too few pixels are
/// resampled.
pub struct AdaptiveSampler {
    aa: AASamplingConfig,
    noise: NoiseControlConfig,
    total_passes: u32,
    progressive: bool,
    state: SamplerState,
    awaiting_evaluation: bool,
    next_pass: u32,
    threshold: Float,
    multiplier: Float,
    light_multiplier: Float,
    indirect_multiplier: Float,
    marks: Option<Vec<bool>>,
    estimates: Option<Vec<Float>>,
}

impl AdaptiveSampler {
    /// `progressive` overrides the pass count and disables noise
    /// detection.
    pub fn new(aa: AASamplingConfig, noise: NoiseControlConfig, progressive: Option<u32>) -> Self {
        let total_passes = progressive.unwrap_or(aa.passes).max(1);
        Self {
            aa,
            noise,
            total_passes,
            progressive: progressive.is_some(),
            state: SamplerState::Initial,
            awaiting_evaluation: false,
            next_pass: 0,
            threshold: aa.threshold,
            multiplier: 1.0,
            light_multiplier: 1.0,
            indirect_multiplier: 1.0,
            marks: None,
            estimates: None,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn total_passes(&self) -> u32 {
        self.total_passes
    }

    pub fn threshold(&self) -> Float {
        self.threshold
    }

    pub fn passes_done(&self) -> u32 {
        self.next_pass
    }

    /// Noise estimates of the last evaluation.
    pub fn estimates(&self) -> Option<&[Float]> {
        self.estimates.as_deref()
    }

    /// Plan of the next pass, or `None` once converged.
    pub fn next_pass(&mut self) -> Option<PassPlan> {
        if self.state == SamplerState::Converged || self.awaiting_evaluation {
            return None;
        }
        if self.next_pass >= self.total_passes {
            self.state = SamplerState::Converged;
            return None;
        }
        let pass = self.next_pass;
        let (samples, light_multiplier, indirect_multiplier) = if pass == 0 {
            (self.aa.min_samples.max(1), 1.0, 1.0)
        } else {
            let samples = ((self.aa.inc_samples as Float * self.multiplier).round() as u32).max(1);
            (samples, self.light_multiplier, self.indirect_multiplier)
        };
        self.state = SamplerState::Sampling;
        self.awaiting_evaluation = true;
        self.next_pass += 1;
        Some(PassPlan {
            pass,
            samples,
            light_multiplier,
            indirect_multiplier,
            marks: if pass == 0 { None } else { self.marks.take() },
        })
    }

    /// Evaluates the image after a pass. Returns the number of pixels marked
    /// for the next pass.
    pub fn evaluate(&mut self, image: &PixelBuffer) -> usize {
        self.state = SamplerState::Evaluating;
        self.awaiting_evaluation = false;
        let total = image.width() * image.height();
        if self.next_pass >= self.total_passes {
            self.state = SamplerState::Converged;
            return 0;
        }
        // The pass-2 multiplier is 1; later ones compound.
        if self.next_pass >= 2 {
            self.multiplier *= self.noise.sample_multiplier_factor;
            self.light_multiplier *= self.noise.light_sample_multiplier_factor;
            self.indirect_multiplier *= self.noise.indirect_sample_multiplier_factor;
        }

        if self.progressive {
            self.marks = None;
            self.state = SamplerState::Sampling;
            return total;
        }

        let noise = detect_noise(image, self.threshold, &self.noise);
        let marked = noise.marked();
        let NoiseMap { marks, estimates } = noise;
        self.estimates = Some(estimates);
        let resampled = if total > 0 { 100.0 * marked as Float / total as Float } else { 0.0 };
        log::debug!(
            "AA pass {}: {} of {} pixels marked ({:.2}%), threshold {:.5}.",
            self.next_pass, marked, total, resampled, self.threshold
        );
        if resampled < self.noise.resampled_floor {
            self.threshold *= self.noise.threshold_tightening;
        }
        if marked == 0 {
            self.state = SamplerState::Converged;
            return 0;
        }
        self.marks = Some(marks);
        self.state = SamplerState::Sampling;
        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: u32, inc: u32, passes: u32) -> AASamplingConfig {
        AASamplingConfig { min_samples: min, inc_samples: inc, passes, threshold: 0.0, ..AASamplingConfig::default() }
    }

    fn checkerboard(w: usize, h: usize) -> PixelBuffer {
        let mut image = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 1.0 } else { 0.0 };
                image.add_sample(x, y, RGBSpectrum::splat(v), 1.0, 1.0);
            }
        }
        image
    }

    fn flat(w: usize, h: usize, v: Float) -> PixelBuffer {
        let mut image = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                image.add_sample(x, y, RGBSpectrum::splat(v), 1.0, 1.0);
            }
        }
        image
    }

    fn run(sampler: &mut AdaptiveSampler, image: &PixelBuffer) -> Vec<u32> {
        let mut counts = Vec::new();
        while let Some(plan) = sampler.next_pass() {
            counts.push(plan.samples);
            sampler.evaluate(image);
        }
        counts
    }

    #[test]
    fn test_pass_sample_counts_compound() {
        let noise = NoiseControlConfig { sample_multiplier_factor: 2.0, ..NoiseControlConfig::default() };
        let mut sampler = AdaptiveSampler::new(config(1, 2, 4), noise, None);
        let counts = run(&mut sampler, &checkerboard(8, 8));
        assert_eq!(counts, vec![1, 2, 4, 8]);
        assert_eq!(sampler.state(), SamplerState::Converged);

        // Running totals: 1, 3, 3 + 2f.
        let noise = NoiseControlConfig { sample_multiplier_factor: 1.5, ..NoiseControlConfig::default() };
        let mut sampler = AdaptiveSampler::new(config(1, 2, 3), noise, None);
        let totals: Vec<u32> = run(&mut sampler, &checkerboard(8, 8))
            .iter()
            .scan(0, |acc, &n| { *acc += n; Some(*acc) })
            .collect();
        assert_eq!(totals, vec![1, 3, 6]);
    }

    #[test]
    fn test_never_exceeds_pass_limit() {
        for passes in 1..6 {
            let mut sampler = AdaptiveSampler::new(config(2, 1, passes), NoiseControlConfig::default(), None);
            let counts = run(&mut sampler, &checkerboard(4, 4));
            assert_eq!(counts.len() as u32, passes);
            assert!(sampler.next_pass().is_none());
        }
    }

    #[test]
    fn test_converges_when_nothing_marked() {
        let mut sampler = AdaptiveSampler::new(config(1, 1, 10), NoiseControlConfig::default(), None);
        let counts = run(&mut sampler, &flat(8, 8, 0.5));
        assert_eq!(counts, vec![1]);
        assert_eq!(sampler.state(), SamplerState::Converged);
    }

    #[test]
    fn test_progressive_samples_every_pixel() {
        let mut sampler = AdaptiveSampler::new(config(1, 1, 2), NoiseControlConfig::default(), Some(5));
        let image = flat(4, 4, 0.2);
        let mut passes = 0;
        while let Some(plan) = sampler.next_pass() {
            assert!(plan.marks.is_none());
            sampler.evaluate(&image);
            passes += 1;
        }
        assert_eq!(passes, 5);
    }

    #[test]
    fn test_noise_marks_both_pixels_of_pair() {
        let mut image = flat(4, 4, 0.5);
        image.add_sample(1, 1, RGBSpectrum::splat(50.0), 1.0, 1.0);
        let map = detect_noise(&image, 0.05, &NoiseControlConfig::default());
        assert!(map.marks[1 + 4 * 1]);
        assert!(map.marks[2 + 4 * 1]);
        assert!(map.marks[1 + 4 * 2]);
        assert!(map.marks[0 + 4 * 0]);
        assert!(!map.marks[3 + 4 * 3]);
        assert!(map.estimates[1 + 4 * 1] > 1.0);
    }

    #[test]
    fn test_color_noise_sees_hue_changes() {
        let mut image = PixelBuffer::new(2, 1);
        image.add_sample(0, 0, RGBSpectrum::new(1.0, 0.0, 0.0), 1.0, 1.0);
        let lum = RGBSpectrum::new(1.0, 0.0, 0.0).luminance();
        image.add_sample(1, 0, RGBSpectrum::new(0.0, lum / 0.7152, 0.0), 1.0, 1.0);

        let plain = detect_noise(&image, 0.05, &NoiseControlConfig::default());
        assert_eq!(plain.marked(), 0);
        let color = NoiseControlConfig { detect_color_noise: true, ..NoiseControlConfig::default() };
        assert_eq!(detect_noise(&image, 0.05, &color).marked(), 2);
    }

    #[test]
    fn test_dark_regions_lower_threshold() {
        let mut image = PixelBuffer::new(2, 1);
        image.add_sample(0, 0, RGBSpectrum::splat(0.02), 1.0, 1.0);
        image.add_sample(1, 0, RGBSpectrum::splat(0.05), 1.0, 1.0);
        assert_eq!(detect_noise(&image, 0.05, &NoiseControlConfig::default()).marked(), 0);
        let dark = NoiseControlConfig { dark_threshold_factor: 1.0, ..NoiseControlConfig::default() };
        assert_eq!(detect_noise(&image, 0.05, &dark).marked(), 2);
    }

    #[test]
    fn test_floor_tightens_threshold() {
        let aa = AASamplingConfig { threshold: 0.1, ..config(1, 1, 5) };
        let mut image = flat(10, 10, 0.5);
        image.add_sample(0, 0, RGBSpectrum::splat(5.0), 1.0, 1.0);
        let noise = NoiseControlConfig { resampled_floor: 50.0, threshold_tightening: 0.5, ..NoiseControlConfig::default() };
        let mut sampler = AdaptiveSampler::new(aa, noise, None);
        sampler.next_pass();
        assert!(sampler.evaluate(&image) > 0);
        assert!((sampler.threshold() - 0.05).abs() < 1e-6);

        let mut steady = AdaptiveSampler::new(aa, NoiseControlConfig::default(), None);
        steady.next_pass();
        steady.evaluate(&image);
        assert!((steady.threshold() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_variance_window_spreads_marks() {
        let mut image = PixelBuffer::new(12, 1);
        for x in 0..12 {
            let v = if x == 6 { 1.0 } else { 0.5 };
            image.add_sample(x, 0, RGBSpectrum::splat(v), 1.0, 1.0);
        }
        assert_eq!(detect_noise(&image, 0.05, &NoiseControlConfig::default()).marked(), 3);

        // Every pixel whose window holds one of the two steps.
        let noise = NoiseControlConfig { variance_pixels: 1, variance_edge_size: 8, ..NoiseControlConfig::default() };
        let map = detect_noise(&image, 0.05, &noise);
        assert_eq!(map.marked(), 9);
        assert!(map.marks[2] && map.marks[10]);
        assert!(!map.marks[1] && !map.marks[11]);
    }
}
