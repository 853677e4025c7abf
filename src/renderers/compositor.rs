// Copyright @yucwang 2026

//! Per-channel accumulation of camera samples and the post-render
//! normalization pass.

use crate::core::integrator::RadianceSample;
use crate::core::passes::{ExternalChannel, MaskSettings, PassId, RenderPassSelection};
use crate::core::rng::mix64;
use crate::math::bitmap::Bitmap;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::renderers::film::{Film, FilmChannel, PixelBuffer, Tile};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lock-free running min/max of `f32` values.
#[derive(Debug)]
pub struct AtomicRange {
    min: AtomicU32,
    max: AtomicU32,
}

impl Default for AtomicRange {
    fn default() -> Self {
        Self {
            min: AtomicU32::new(Float::INFINITY.to_bits()),
            max: AtomicU32::new(Float::NEG_INFINITY.to_bits()),
        }
    }
}

impl AtomicRange {
    pub fn update(&self, v: Float) {
        if !v.is_finite() {
            return;
        }
        let mut current = self.min.load(Ordering::Relaxed);
        while v < Float::from_bits(current) {
            match self.min.compare_exchange_weak(current, v.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        let mut current = self.max.load(Ordering::Relaxed);
        while v > Float::from_bits(current) {
            match self.max.compare_exchange_weak(current, v.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// `None` until the first update.
    pub fn get(&self) -> Option<(Float, Float)> {
        let min = Float::from_bits(self.min.load(Ordering::Relaxed));
        let max = Float::from_bits(self.max.load(Ordering::Relaxed));
        if min <= max {
            Some((min, max))
        } else {
            None
        }
    }
}

/// Global ranges of the quantities behind the `-norm` passes.
#[derive(Debug, Default)]
pub struct NormRanges {
    pub depth: AtomicRange,
    pub object_index: AtomicRange,
    pub material_index: AtomicRange,
}

/// Stable pseudo-random color for an object or material index. Index 0
/// (unassigned) is black.
pub fn auto_index_color(index: u32) -> RGBSpectrum {
    if index == 0 {
        return RGBSpectrum::default();
    }
    let h = mix64(index as u64);
    let channel = |shift: u32| ((h >> shift) & 0xFF) as Float / 255.0;
    RGBSpectrum::new(channel(0), channel(8), channel(16))
}

fn mask_value(hit: Option<u32>, target: u32) -> Float {
    match hit {
        Some(index) if index == target => 1.0,
        _ => 0.0,
    }
}

/// Value a sample contributes to `pass`, and the alpha it is accumulated
/// with. `-norm` passes accumulate the raw quantity with hit coverage as
/// alpha; they are rescaled in [`PassCompositor::finalize`].
pub fn channel_value(pass: PassId, sample: &RadianceSample, mask: &MaskSettings) -> (RGBSpectrum, Float) {
    let layers = &sample.layers;
    let coverage = |v: Option<Float>| match v {
        Some(v) => (RGBSpectrum::splat(v), 1.0),
        None => (RGBSpectrum::default(), 0.0),
    };
    let masked = |v: Float| {
        let v = if mask.invert { 1.0 - v } else { v };
        (RGBSpectrum::splat(v), sample.alpha)
    };
    let object_mask = mask_value(layers.object_index, mask.object_index);
    let material_mask = mask_value(layers.material_index, mask.material_index);

    match pass {
        PassId::Combined => (sample.color, sample.alpha),
        PassId::ZDepthAbs => (RGBSpectrum::splat(layers.depth.unwrap_or(0.0)), sample.alpha),
        PassId::ZDepthNorm => coverage(layers.depth),
        PassId::ObjIndexAbs => (RGBSpectrum::splat(layers.object_index.unwrap_or(0) as Float), sample.alpha),
        PassId::ObjIndexNorm => coverage(layers.object_index.map(|i| i as Float)),
        PassId::ObjIndexAuto => (auto_index_color(layers.object_index.unwrap_or(0)), sample.alpha),
        PassId::ObjIndexMask => masked(object_mask),
        PassId::ObjIndexMaskShadow => masked(layers.object_mask_shadow),
        PassId::ObjIndexMaskAll => masked(object_mask.max(layers.object_mask_shadow)),
        PassId::MatIndexAbs => (RGBSpectrum::splat(layers.material_index.unwrap_or(0) as Float), sample.alpha),
        PassId::MatIndexNorm => coverage(layers.material_index.map(|i| i as Float)),
        PassId::MatIndexAuto => (auto_index_color(layers.material_index.unwrap_or(0)), sample.alpha),
        PassId::MatIndexMask => masked(material_mask),
        PassId::MatIndexMaskShadow => masked(layers.material_mask_shadow),
        PassId::MatIndexMaskAll => masked(material_mask.max(layers.material_mask_shadow)),
        PassId::DebugAaSamples | PassId::Disabled => (RGBSpectrum::default(), sample.alpha),
        other => (layers.get(other), sample.alpha),
    }
}

/// Tile-local buffers filled by one worker and merged on completion.
pub struct TileAccumulator {
    tile: Tile,
    mask: MaskSettings,
    passes: Vec<PassId>,
    combined: PixelBuffer,
    buffers: Vec<PixelBuffer>,
    ranges: Arc<NormRanges>,
}

impl TileAccumulator {
    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    pub fn combined(&self) -> &PixelBuffer {
        &self.combined
    }

    pub fn samples(&self) -> u64 {
        self.combined.total_samples()
    }

    /// Adds one filtered sample of image pixel (`x`, `y`) to every channel.
    pub fn accumulate(&mut self, x: usize, y: usize, sample: &RadianceSample, weight: Float) {
        let (lx, ly) = (x - self.tile.x0, y - self.tile.y0);
        self.combined.add_sample(lx, ly, sample.color, sample.alpha, weight);

        let layers = &sample.layers;
        if let Some(depth) = layers.depth {
            self.ranges.depth.update(depth);
        }
        if let Some(index) = layers.object_index {
            self.ranges.object_index.update(index as Float);
        }
        if let Some(index) = layers.material_index {
            self.ranges.material_index.update(index as Float);
        }

        for slot in 0..self.passes.len() {
            self.accumulate_channel(slot, lx, ly, sample, weight);
        }
    }

    fn accumulate_channel(&mut self, slot: usize, lx: usize, ly: usize, sample: &RadianceSample, weight: Float) {
        let (value, alpha) = channel_value(self.passes[slot], sample, &self.mask);
        self.buffers[slot].add_sample(lx, ly, value, alpha, weight);
    }
}

pub struct PassCompositor {
    width: usize,
    height: usize,
    mask: MaskSettings,
    channels: Vec<(ExternalChannel, PassId)>,
    combined: PixelBuffer,
    buffers: Vec<PixelBuffer>,
    ranges: Arc<NormRanges>,
}

impl PassCompositor {
    pub fn new(width: usize, height: usize, passes: &RenderPassSelection) -> Self {
        let channels = passes.active();
        let buffers = channels.iter().map(|_| PixelBuffer::new(width, height)).collect();
        Self {
            width,
            height,
            mask: passes.mask,
            channels,
            combined: PixelBuffer::new(width, height),
            buffers,
            ranges: Arc::new(NormRanges::default()),
        }
    }

    pub fn channels(&self) -> &[(ExternalChannel, PassId)] {
        &self.channels
    }

    pub fn combined(&self) -> &PixelBuffer {
        &self.combined
    }

    pub fn ranges(&self) -> &NormRanges {
        &self.ranges
    }

    pub fn tile_accumulator(&self, tile: &Tile) -> TileAccumulator {
        let (w, h) = (tile.width(), tile.height());
        TileAccumulator {
            tile: *tile,
            mask: self.mask,
            passes: self.channels.iter().map(|(_, p)| *p).collect(),
            combined: PixelBuffer::new(w, h),
            buffers: self.channels.iter().map(|_| PixelBuffer::new(w, h)).collect(),
            ranges: Arc::clone(&self.ranges),
        }
    }

    pub fn merge(&mut self, acc: &TileAccumulator) {
        let (x0, y0) = (acc.tile.x0, acc.tile.y0);
        self.combined.merge(&acc.combined, x0, y0);
        for (buffer, local) in self.buffers.iter_mut().zip(acc.buffers.iter()) {
            buffer.merge(local, x0, y0);
        }
    }

    fn combined_bitmap(&self) -> Bitmap {
        let mut image = Bitmap::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                image[(x, y)] = self.combined.color(x, y);
                image.set_alpha(x, y, self.combined.alpha(x, y));
            }
        }
        image
    }

    /// Resolves every channel into a bitmap: rescales `-norm` passes with
    /// the global ranges, normalizes sample counts and applies masks.
    pub fn finalize(&self) -> Film {
        let combined = self.combined_bitmap();
        let max_samples = self.combined.max_samples().max(1) as Float;
        let mut channels = Vec::with_capacity(self.channels.len());

        for ((channel, pass), buffer) in self.channels.iter().zip(self.buffers.iter()) {
            let mut image = Bitmap::new(self.width, self.height);
            let range = match pass {
                PassId::ZDepthNorm => self.ranges.depth.get(),
                PassId::ObjIndexNorm => self.ranges.object_index.get(),
                PassId::MatIndexNorm => self.ranges.material_index.get(),
                _ => None,
            };
            for y in 0..self.height {
                for x in 0..self.width {
                    let (value, alpha) = if pass.is_normalized() {
                        (RGBSpectrum::splat(normalized(*pass, buffer, x, y, range)), 1.0)
                    } else if *pass == PassId::DebugAaSamples {
                        (RGBSpectrum::splat(self.combined.samples(x, y) as Float / max_samples), 1.0)
                    } else if pass.is_mask() {
                        let m = buffer.color(x, y).r();
                        if self.mask.only {
                            (RGBSpectrum::splat(if m >= 0.5 { 1.0 } else { 0.0 }), 1.0)
                        } else {
                            (combined[(x, y)] * m, combined.alpha(x, y))
                        }
                    } else {
                        (buffer.color(x, y), buffer.alpha(x, y))
                    };
                    image[(x, y)] = value;
                    image.set_alpha(x, y, alpha);
                }
            }
            channels.push(FilmChannel { channel: *channel, pass: *pass, image });
        }

        Film { width: self.width, height: self.height, combined, channels }
    }
}

/// Coverage-weighted rescale of a `-norm` pass into [0, 1]. Depth maps
/// near to 1 and far to 0; indices map the smallest to 0.
fn normalized(pass: PassId, buffer: &PixelBuffer, x: usize, y: usize, range: Option<(Float, Float)>) -> Float {
    let weight = buffer.weight(x, y);
    let hits = buffer.alpha_sum(x, y);
    let (min, max) = match range {
        Some(range) if weight != 0.0 && hits / weight > 0.0 => range,
        _ => return 0.0,
    };
    let raw = buffer.color_sum(x, y).r() / hits;
    let coverage = hits / weight;
    let span = max - min;
    let value = if pass == PassId::ZDepthNorm {
        if span > 0.0 { 1.0 - (raw - min) / span } else { 1.0 }
    } else if span > 0.0 {
        (raw - min) / span
    } else if max > 0.0 {
        raw / max
    } else {
        0.0
    };
    (value * coverage).max(0.0).min(1.0)
}
