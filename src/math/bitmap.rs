// Copyright 2020 @TwoCookingMice

use super::spectrum::RGBSpectrum;
use super::constants::Float;

use std::ops;
use std::vec::Vec;

/// Row-major RGB + alpha image.
#[derive(Debug, Clone)]
pub struct Bitmap {
    data: Vec<RGBSpectrum>,
    alpha: Vec<Float>,
    height: usize,
    width: usize
}

impl ops::Index<(usize, usize)> for Bitmap {
    type Output = RGBSpectrum;

    fn index(&self, index: (usize, usize)) -> &RGBSpectrum {
        &self.data[index.0 + self.width * index.1]
    }
}

impl ops::IndexMut<(usize, usize)> for Bitmap {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut RGBSpectrum {
        &mut self.data[index.0 + self.width * index.1]
    }
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        let pixel_number = width * height;
        Self { data: vec![RGBSpectrum::default(); pixel_number],
               alpha: vec![1.0; pixel_number],
               width,
               height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn alpha(&self, x: usize, y: usize) -> Float {
        self.alpha[x + self.width * y]
    }

    pub fn set_alpha(&mut self, x: usize, y: usize, a: Float) {
        self.alpha[x + self.width * y] = a;
    }

    pub fn pixels(&self) -> &[RGBSpectrum] {
        &self.data
    }
}

/* Test for Bitmap */
#[cfg(test)]
mod tests {
    use super::Bitmap;
    use super::RGBSpectrum;

    #[test]
    fn test_bitmap_basic_functions() {
        let mut bitmap = Bitmap::new(256usize, 128usize);
        assert_eq!(bitmap.width(), 256);
        assert_eq!(bitmap.height(), 128);

        bitmap[(5, 6)] = RGBSpectrum::new(1.0, 0.5, 0.6);
        assert_eq!(bitmap[(5, 6)].r(), 1.0);
        assert_eq!(bitmap[(2, 6)].r(), 0.0);
        assert_eq!(bitmap.alpha(5, 6), 1.0);
        assert_eq!(bitmap.pixels()[5 + 256 * 6].g(), 0.5);
        bitmap.set_alpha(5, 6, 0.25);
        assert_eq!(bitmap.alpha(5, 6), 0.25);
    }
}
