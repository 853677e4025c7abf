/* Copyright 2020 @TwoCookingMice */

use crate::core::error::{RenderError, RenderResult};
use crate::math::bitmap::Bitmap;

use exr::prelude::*;

// Write one RGBA image to an EXR file
pub fn write_rgba_exr(image: &Bitmap, file_path: &str) -> RenderResult<()> {
    log::info!("Writing OpenEXR image: {}.", file_path);
    let width = image.width();
    write_rgba_file(file_path, width, image.height(), |x, y| {
        let c = image[(x, y)];
        (c.r(), c.g(), c.b(), image.alpha(x, y))
    })
    .map_err(|e| RenderError::io_message(file_path, e))
}

fn rgba_layer(name: &str, image: &Bitmap) -> Layer<AnyChannels<FlatSamples>> {
    let pixels = image.pixels();
    let component = |i: usize| FlatSamples::F32(pixels.iter().map(|c| c[i]).collect());
    let alpha = FlatSamples::F32(
        (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .map(|(x, y)| image.alpha(x, y))
            .collect(),
    );
    let channels = AnyChannels::sort(
        vec![
            AnyChannel::new("R", component(0)),
            AnyChannel::new("G", component(1)),
            AnyChannel::new("B", component(2)),
            AnyChannel::new("A", alpha),
        ]
        .into(),
    );
    Layer::new(
        (image.width(), image.height()),
        LayerAttributes::named(name),
        Encoding::FAST_LOSSLESS,
        channels,
    )
}

// Write named RGBA layers into one multi-layer EXR file
pub fn write_multilayer_exr(layers: &[(&str, &Bitmap)], file_path: &str) -> RenderResult<()> {
    let (width, height) = match layers.first() {
        Some((_, image)) => (image.width(), image.height()),
        None => return Err(RenderError::io_message(file_path, "no layers to write")),
    };
    log::info!("Writing multi-layer OpenEXR image with {} layers: {}.", layers.len(), file_path);

    let layers: Vec<_> = layers.iter().map(|(name, image)| rgba_layer(name, image)).collect();
    let image = Image::from_layers(ImageAttributes::new(IntegerBounds::from_dimensions((width, height))), layers);
    image.write().to_file(file_path).map_err(|e| RenderError::io_message(file_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::spectrum::RGBSpectrum;

    fn gradient(width: usize, height: usize) -> Bitmap {
        let mut image = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image[(x, y)] = RGBSpectrum::new(x as f32, y as f32, 0.5);
                image.set_alpha(x, y, if x == 0 { 0.0 } else { 1.0 });
            }
        }
        image
    }

    #[test]
    fn test_write_rgba() {
        let path = std::env::temp_dir().join("yafcore_exr_rgba_test.exr");
        let path = path.to_string_lossy().to_string();
        write_rgba_exr(&gradient(6, 4), &path).unwrap();

        let loaded = read_first_rgba_layer_from_file(
            &path,
            |resolution, _| vec![(0.0f32, 0.0f32, 0.0f32, 0.0f32); resolution.width() * resolution.height()],
            |pixels, position, (r, g, b, a): (f32, f32, f32, f32)| {
                pixels[position.y() * 6 + position.x()] = (r, g, b, a);
            },
        )
        .unwrap();
        let pixels = loaded.layer_data.channel_data.pixels;
        assert_eq!(pixels[2 * 6 + 3], (3.0, 2.0, 0.5, 1.0));
        assert_eq!(pixels[6].3, 0.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_write_multilayer() {
        let path = std::env::temp_dir().join("yafcore_exr_multilayer_test.exr");
        let path = path.to_string_lossy().to_string();
        let combined = gradient(4, 4);
        let depth = Bitmap::new(4, 4);
        write_multilayer_exr(&[("Combined", &combined), ("Depth", &depth)], &path).unwrap();

        let image = read_all_flat_layers_from_file(&path).unwrap();
        assert_eq!(image.layer_data.len(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_empty_layer_list_fails() {
        assert!(write_multilayer_exr(&[], "unused.exr").is_err());
    }
}
