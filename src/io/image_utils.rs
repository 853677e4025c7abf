// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::settings::ImageFormat;
use crate::math::bitmap::Bitmap;
use crate::math::constants::Float;

use image::codecs::hdr::HdrEncoder;
use image::{ColorType, ImageFormat as EncodedFormat, Rgb};
use std::fs::File;
use std::io::BufWriter;

/// Display encoding applied to LDR outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdrEncoding {
    pub gamma: Float,
    pub premultiply: bool,
    pub alpha: bool,
}

impl LdrEncoding {
    fn encode(&self, v: Float) -> u8 {
        let v = v.max(0.0).min(1.0);
        let v = if self.gamma > 0.0 && self.gamma != 1.0 { v.powf(1.0 / self.gamma) } else { v };
        (v * 255.0 + 0.5) as u8
    }
}

/// Packs a bitmap into interleaved 8-bit RGB or RGBA bytes.
pub fn to_ldr_bytes(image: &Bitmap, encoding: &LdrEncoding) -> Vec<u8> {
    let channels = if encoding.alpha { 4 } else { 3 };
    let mut bytes = Vec::with_capacity(image.width() * image.height() * channels);
    for y in 0..image.height() {
        for x in 0..image.width() {
            let alpha = image.alpha(x, y).max(0.0).min(1.0);
            let mut c = image[(x, y)];
            if encoding.alpha && encoding.premultiply {
                c = c * alpha;
            }
            bytes.push(encoding.encode(c.r()));
            bytes.push(encoding.encode(c.g()));
            bytes.push(encoding.encode(c.b()));
            if encoding.alpha {
                bytes.push((alpha * 255.0 + 0.5) as u8);
            }
        }
    }
    bytes
}

fn encoded_format(format: ImageFormat) -> Option<EncodedFormat> {
    match format {
        ImageFormat::Png => Some(EncodedFormat::Png),
        ImageFormat::Targa => Some(EncodedFormat::Tga),
        ImageFormat::Jpeg => Some(EncodedFormat::Jpeg),
        ImageFormat::Tiff => Some(EncodedFormat::Tiff),
        ImageFormat::OpenExr | ImageFormat::Hdr => None,
    }
}

/// Writes an 8-bit image. Formats without alpha drop the alpha channel.
pub fn write_ldr_image(image: &Bitmap, format: ImageFormat, gamma: Float, premultiply: bool,
                       file_path: &str) -> RenderResult<()> {
    let encoded = encoded_format(format)
        .ok_or_else(|| RenderError::config("img_output", format.extension(), "not an 8-bit image format"))?;
    log::info!("Writing {} image: {}.", format.extension(), file_path);

    let encoding = LdrEncoding { gamma, premultiply, alpha: format.has_alpha() };
    let bytes = to_ldr_bytes(image, &encoding);
    let color = if encoding.alpha { ColorType::Rgba8 } else { ColorType::Rgb8 };
    image::save_buffer_with_format(file_path, &bytes, image.width() as u32, image.height() as u32, color, encoded)
        .map_err(|e| RenderError::io_message(file_path, e))
}

/// Writes linear radiance as a Radiance HDR file.
pub fn write_hdr_image(image: &Bitmap, file_path: &str) -> RenderResult<()> {
    log::info!("Writing HDR image: {}.", file_path);
    let file = File::create(file_path).map_err(|e| RenderError::io(file_path, e))?;
    let pixels: Vec<Rgb<f32>> = image.pixels().iter().map(|c| Rgb([c.r(), c.g(), c.b()])).collect();
    HdrEncoder::new(BufWriter::new(file))
        .encode(&pixels, image.width(), image.height())
        .map_err(|e| RenderError::io_message(file_path, e))
}
