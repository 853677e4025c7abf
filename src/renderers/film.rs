// Copyright @yucwang 2026

use crate::core::passes::{ExternalChannel, PassId};
use crate::math::bitmap::Bitmap;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub index: usize,
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Tile {
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

/// One tile's work for one AA pass.
#[derive(Debug, Clone)]
pub struct TileTask {
    pub tile: Tile,
    pub pass: u32,
    pub samples: u32,
    /// Tile-local noise estimates of the previous evaluation, empty in the
    /// first pass. Values above 1 are over the threshold.
    pub noise: Vec<Float>,
    /// Tile-local resample marks. `None` samples every pixel.
    pub marks: Option<Vec<bool>>,
}

impl TileTask {
    pub fn wants(&self, x: usize, y: usize) -> bool {
        match self.marks.as_ref() {
            Some(marks) => marks[(x - self.tile.x0) + self.tile.width() * (y - self.tile.y0)],
            None => true,
        }
    }
}

/// Weighted sample sums for one channel.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    color: Vec<RGBSpectrum>,
    alpha: Vec<Float>,
    weight: Vec<Float>,
    samples: Vec<u32>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let n = width * height;
        Self {
            width,
            height,
            color: vec![RGBSpectrum::default(); n],
            alpha: vec![0.0; n],
            weight: vec![0.0; n],
            samples: vec![0; n],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        x + self.width * y
    }

    pub fn add_sample(&mut self, x: usize, y: usize, color: RGBSpectrum, alpha: Float, weight: Float) {
        let i = self.offset(x, y);
        self.color[i] += color * weight;
        self.alpha[i] += alpha * weight;
        self.weight[i] += weight;
        self.samples[i] += 1;
    }

    /// Adds `other` with its origin at (`x0`, `y0`).
    pub fn merge(&mut self, other: &PixelBuffer, x0: usize, y0: usize) {
        for y in 0..other.height {
            for x in 0..other.width {
                let src = other.offset(x, y);
                let dst = self.offset(x0 + x, y0 + y);
                self.color[dst] += other.color[src];
                self.alpha[dst] += other.alpha[src];
                self.weight[dst] += other.weight[src];
                self.samples[dst] += other.samples[src];
            }
        }
    }

    pub fn color_sum(&self, x: usize, y: usize) -> RGBSpectrum {
        self.color[self.offset(x, y)]
    }

    pub fn alpha_sum(&self, x: usize, y: usize) -> Float {
        self.alpha[self.offset(x, y)]
    }

    pub fn weight(&self, x: usize, y: usize) -> Float {
        self.weight[self.offset(x, y)]
    }

    pub fn samples(&self, x: usize, y: usize) -> u32 {
        self.samples[self.offset(x, y)]
    }

    /// Filter-weighted mean color. Weights carry the filter's sign, so the
    /// sum may be negative; a zero sum resolves to black.
    pub fn color(&self, x: usize, y: usize) -> RGBSpectrum {
        let i = self.offset(x, y);
        if self.weight[i] != 0.0 {
            let c = self.color[i] / self.weight[i];
            RGBSpectrum::new(c.r().max(0.0), c.g().max(0.0), c.b().max(0.0))
        } else {
            RGBSpectrum::default()
        }
    }

    pub fn alpha(&self, x: usize, y: usize) -> Float {
        let i = self.offset(x, y);
        if self.weight[i] != 0.0 {
            (self.alpha[i] / self.weight[i]).max(0.0)
        } else {
            0.0
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.samples.iter().map(|&s| s as u64).sum()
    }

    pub fn max_samples(&self) -> u32 {
        self.samples.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct FilmChannel {
    pub channel: ExternalChannel,
    pub pass: PassId,
    pub image: Bitmap,
}

/// Finished render: the combined image plus one bitmap per active channel.
#[derive(Debug, Clone)]
pub struct Film {
    pub width: usize,
    pub height: usize,
    pub combined: Bitmap,
    pub channels: Vec<FilmChannel>,
}

impl Film {
    pub fn channel(&self, channel: ExternalChannel) -> Option<&FilmChannel> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}
