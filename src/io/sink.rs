// Copyright @yucwang 2026

use crate::core::error::RenderResult;
use crate::core::scene_loader::PropertyBlocks;
use crate::core::settings::{ImageFormat, RenderSettings};
use crate::io::exr_utils::{write_multilayer_exr, write_rgba_exr};
use crate::io::image_utils::{write_hdr_image, write_ldr_image};
use crate::io::xml_export::export_document;
use crate::math::bitmap::Bitmap;
use crate::renderers::film::{Film, PixelBuffer, Tile};

use std::path::Path;

/// Receives render progress and the finished film.
pub trait OutputSink {
    /// `combined` holds this tile's contribution of the current pass,
    /// in tile-local coordinates.
    fn tile_done(&mut self, _tile: &Tile, _combined: &PixelBuffer) -> RenderResult<()> {
        Ok(())
    }

    /// Pixels selected for resampling in `pass`, row-major with `width`
    /// pixels per row.
    fn marked_pixels(&mut self, _pass: u32, _width: usize, _marks: &[bool]) -> RenderResult<()> {
        Ok(())
    }

    fn finish(&mut self, film: &Film, settings: &RenderSettings) -> RenderResult<()>;
}

/// Writes the film to image files.
pub struct ImageFileSink {
    stem: String,
    written: Vec<String>,
}

impl ImageFileSink {
    /// A trailing extension on `path` is replaced by the one of the
    /// configured format.
    pub fn new(path: &str) -> Self {
        let p = Path::new(path);
        let stem = match p.extension() {
            Some(_) => p.with_extension("").to_string_lossy().to_string(),
            None => path.to_string(),
        };
        Self { stem, written: Vec::new() }
    }

    pub fn written(&self) -> &[String] {
        &self.written
    }

    fn file_name(&self, suffix: Option<&str>, format: ImageFormat) -> String {
        match suffix {
            Some(label) => format!("{}_{}.{}", self.stem, label, format.extension()),
            None => format!("{}.{}", self.stem, format.extension()),
        }
    }

    fn write_image(&mut self, image: &Bitmap, suffix: Option<&str>, settings: &RenderSettings) -> RenderResult<()> {
        let format = settings.output.format;
        let path = self.file_name(suffix, format);
        match format {
            ImageFormat::OpenExr => write_rgba_exr(image, &path)?,
            ImageFormat::Hdr => write_hdr_image(image, &path)?,
            _ => write_ldr_image(image, format, settings.gamma, settings.premultiply, &path)?,
        }
        self.written.push(path);
        Ok(())
    }
}

fn opaque(image: &Bitmap) -> Bitmap {
    let mut image = image.clone();
    for y in 0..image.height() {
        for x in 0..image.width() {
            image.set_alpha(x, y, 1.0);
        }
    }
    image
}

impl OutputSink for ImageFileSink {
    fn finish(&mut self, film: &Film, settings: &RenderSettings) -> RenderResult<()> {
        let combined = if settings.transparent_background { film.combined.clone() } else { opaque(&film.combined) };

        if settings.output.multilayer && settings.output.format == ImageFormat::OpenExr && !film.channels.is_empty() {
            let mut layers: Vec<(&str, &Bitmap)> = vec![("Combined", &combined)];
            layers.extend(film.channels.iter().map(|c| (c.channel.label(), &c.image)));
            let path = self.file_name(None, ImageFormat::OpenExr);
            write_multilayer_exr(&layers, &path)?;
            self.written.push(path);
            return Ok(());
        }

        self.write_image(&combined, None, settings)?;
        for channel in film.channels.iter() {
            self.write_image(&channel.image, Some(channel.channel.label()), settings)?;
        }
        Ok(())
    }
}

/// Keeps the images in memory, standing in for a host-managed framebuffer.
pub struct FramebufferSink {
    preview: PixelBuffer,
    tiles_done: usize,
    marks: Option<(u32, Vec<bool>)>,
    film: Option<Film>,
}

impl FramebufferSink {
    pub fn new(width: usize, height: usize) -> Self {
        Self { preview: PixelBuffer::new(width, height), tiles_done: 0, marks: None, film: None }
    }

    /// Running combined image, updated as tiles finish.
    pub fn preview(&self) -> &PixelBuffer {
        &self.preview
    }

    pub fn tiles_done(&self) -> usize {
        self.tiles_done
    }

    /// Latest resample selection with its pass number.
    pub fn marks(&self) -> Option<(u32, &[bool])> {
        self.marks.as_ref().map(|(pass, marks)| (*pass, marks.as_slice()))
    }

    pub fn film(&self) -> Option<&Film> {
        self.film.as_ref()
    }
}

impl OutputSink for FramebufferSink {
    fn tile_done(&mut self, tile: &Tile, combined: &PixelBuffer) -> RenderResult<()> {
        self.preview.merge(combined, tile.x0, tile.y0);
        self.tiles_done += 1;
        Ok(())
    }

    fn marked_pixels(&mut self, pass: u32, _width: usize, marks: &[bool]) -> RenderResult<()> {
        self.marks = Some((pass, marks.to_vec()));
        Ok(())
    }

    fn finish(&mut self, film: &Film, _settings: &RenderSettings) -> RenderResult<()> {
        self.film = Some(film.clone());
        Ok(())
    }
}

/// Writes the render configuration as a scene document instead of images.
pub struct XmlExportSink {
    blocks: PropertyBlocks,
    path: String,
}

impl XmlExportSink {
    pub fn new(blocks: PropertyBlocks, path: &str) -> Self {
        Self { blocks, path: path.to_string() }
    }

    pub fn export(&self) -> RenderResult<()> {
        export_document(&self.blocks, &self.path)
    }
}

impl OutputSink for XmlExportSink {
    fn finish(&mut self, _film: &Film, _settings: &RenderSettings) -> RenderResult<()> {
        self.export()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::passes::{ExternalChannel, PassId};
    use crate::core::properties::PropertyValue;
    use crate::math::spectrum::RGBSpectrum;
    use crate::renderers::film::FilmChannel;

    fn temp_stem(name: &str) -> String {
        std::env::temp_dir().join(name).to_string_lossy().to_string()
    }

    fn film() -> Film {
        let mut combined = Bitmap::new(4, 2);
        combined[(1, 1)] = RGBSpectrum::splat(0.5);
        combined.set_alpha(0, 0, 0.0);
        Film {
            width: 4,
            height: 2,
            combined,
            channels: vec![FilmChannel {
                channel: ExternalChannel::Depth,
                pass: PassId::ZDepthNorm,
                image: Bitmap::new(4, 2),
            }],
        }
    }

    #[test]
    fn test_file_per_channel() {
        let stem = temp_stem("yafcore_sink_channels");
        let mut sink = ImageFileSink::new(&format!("{}.png", stem));
        sink.finish(&film(), &RenderSettings::default()).unwrap();

        let expected = vec![format!("{}.png", stem), format!("{}_Depth.png", stem)];
        assert_eq!(sink.written(), expected.as_slice());
        for path in expected.iter() {
            assert!(Path::new(path).exists());
            let _ = std::fs::remove_file(path);
        }
    }

    #[test]
    fn test_opaque_unless_transparent_background() {
        let stem = temp_stem("yafcore_sink_alpha");
        let mut settings = RenderSettings::default();
        settings.premultiply = false;
        let mut sink = ImageFileSink::new(&stem);
        sink.finish(&film(), &settings).unwrap();
        let loaded = image::open(format!("{}.png", stem)).unwrap().to_rgba8();
        assert_eq!(loaded.get_pixel(0, 0).0[3], 255);

        settings.transparent_background = true;
        sink.finish(&film(), &settings).unwrap();
        let loaded = image::open(format!("{}.png", stem)).unwrap().to_rgba8();
        assert_eq!(loaded.get_pixel(0, 0).0[3], 0);
        for path in sink.written() {
            let _ = std::fs::remove_file(path);
        }
    }

    #[test]
    fn test_multilayer_exr() {
        let stem = temp_stem("yafcore_sink_multilayer");
        let mut settings = RenderSettings::default();
        settings.output.format = ImageFormat::OpenExr;
        settings.output.multilayer = true;
        let mut sink = ImageFileSink::new(&stem);
        sink.finish(&film(), &settings).unwrap();
        assert_eq!(sink.written().len(), 1);

        let image = exr::prelude::read_all_flat_layers_from_file(&sink.written()[0]).unwrap();
        assert_eq!(image.layer_data.len(), 2);
        let _ = std::fs::remove_file(&sink.written()[0]);
    }

    #[test]
    fn test_framebuffer_merges_tiles() {
        let mut sink = FramebufferSink::new(4, 4);
        let tile = Tile { index: 3, x0: 2, y0: 2, x1: 4, y1: 4 };
        let mut local = PixelBuffer::new(2, 2);
        local.add_sample(1, 1, RGBSpectrum::splat(2.0), 1.0, 1.0);
        sink.tile_done(&tile, &local).unwrap();
        sink.tile_done(&tile, &local).unwrap();
        sink.marked_pixels(1, 4, &[true; 16]).unwrap();

        assert_eq!(sink.tiles_done(), 2);
        assert_eq!(sink.preview().samples(3, 3), 2);
        assert!((sink.preview().color(3, 3).g() - 2.0).abs() < 1e-6);
        assert_eq!(sink.marks().map(|(pass, m)| (pass, m.len())), Some((1, 16)));

        assert!(sink.film().is_none());
        sink.finish(&film(), &RenderSettings::default()).unwrap();
        assert_eq!(sink.film().map(|f| f.width), Some(4));
    }

    #[test]
    fn test_xml_export_sink() {
        let path = temp_stem("yafcore_sink_export.xml");
        let mut blocks = PropertyBlocks::default();
        blocks.render.set("gs_tile_size", PropertyValue::Integer(16));
        let mut sink = XmlExportSink::new(blocks, &path);
        sink.finish(&film(), &RenderSettings::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("gs_tile_size"));
        let _ = std::fs::remove_file(&path);
    }
}
