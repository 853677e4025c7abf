// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::properties::Properties;
use crate::math::aabb::AABB;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threads {
    Auto,
    Fixed(usize),
}

impl Threads {
    pub fn resolve(&self) -> RenderResult<usize> {
        match *self {
            Threads::Auto => Ok(std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)),
            Threads::Fixed(0) => Err(RenderError::config("gs_threads", 0, "at least one thread is required")),
            Threads::Fixed(n) => Ok(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrder {
    Linear,
    Random,
}

impl FromStr for TileOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(TileOrder::Linear),
            "random" => Ok(TileOrder::Random),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiasMode {
    Auto,
    Value(Float),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaySettings {
    pub keep_transparency: bool,
    /// Accepted for compatibility. There are no bump or normal maps to keep.
    pub keep_normals: bool,
    pub oren_nayar: bool,
    pub sigma: Float,
    pub color: RGBSpectrum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    File,
    IntoHost,
    Xml,
}

impl FromStr for OutputMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(OutputMethod::File),
            "into_blender" => Ok(OutputMethod::IntoHost),
            "xml" => Ok(OutputMethod::Xml),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Targa,
    Jpeg,
    Tiff,
    OpenExr,
    Hdr,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Targa => "tga",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Tiff => "tif",
            ImageFormat::OpenExr => "exr",
            ImageFormat::Hdr => "hdr",
        }
    }

    pub fn is_hdr(&self) -> bool {
        matches!(self, ImageFormat::OpenExr | ImageFormat::Hdr)
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, ImageFormat::Png | ImageFormat::Targa | ImageFormat::Tiff | ImageFormat::OpenExr)
    }
}

impl FromStr for ImageFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PNG" => Ok(ImageFormat::Png),
            "TARGA" => Ok(ImageFormat::Targa),
            "JPEG" => Ok(ImageFormat::Jpeg),
            "TIFF" => Ok(ImageFormat::Tiff),
            "OPEN_EXR" => Ok(ImageFormat::OpenExr),
            "HDR" => Ok(ImageFormat::Hdr),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub method: OutputMethod,
    pub format: ImageFormat,
    pub multilayer: bool,
}

/// General render settings. Built once before rendering and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub threads: Threads,
    pub ray_depth: u32,
    pub shadow_depth: u32,
    pub transparent_shadows: bool,
    pub tile_size: u32,
    pub tile_order: TileOrder,
    pub gamma: Float,
    pub gamma_input: Float,
    pub shadow_bias: BiasMode,
    pub min_ray_dist: BiasMode,
    pub clay: Option<ClaySettings>,
    pub transparent_background: bool,
    pub transparent_refraction: bool,
    pub premultiply: bool,
    pub show_sampled_pixels: bool,
    pub verbose: bool,
    pub custom_string: String,
    pub seed: u64,
    pub output: OutputSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            threads: Threads::Auto,
            ray_depth: 2,
            shadow_depth: 2,
            transparent_shadows: false,
            tile_size: 32,
            tile_order: TileOrder::Random,
            gamma: 1.0,
            gamma_input: 1.0,
            shadow_bias: BiasMode::Auto,
            min_ray_dist: BiasMode::Auto,
            clay: None,
            transparent_background: false,
            transparent_refraction: true,
            premultiply: true,
            show_sampled_pixels: true,
            verbose: true,
            custom_string: String::new(),
            seed: 0,
            output: OutputSettings {
                method: OutputMethod::IntoHost,
                format: ImageFormat::Png,
                multilayer: false,
            },
        }
    }
}

impl RenderSettings {
    pub fn from_properties(props: &Properties) -> RenderResult<Self> {
        let threads = if props.boolean("gs_auto_threads", true)? {
            Threads::Auto
        } else {
            let n = props.integer("gs_threads", 1, 0..=4096)?;
            if n == 0 {
                return Err(RenderError::config("gs_threads", n, "at least one thread is required"));
            }
            Threads::Fixed(n as usize)
        };

        let tile_size = props.integer("gs_tile_size", 32, 0..=1024)?;
        if tile_size == 0 {
            return Err(RenderError::config("gs_tile_size", tile_size, "tile size must be positive"));
        }

        let shadow_bias = if props.boolean("adv_auto_shadow_bias_enabled", true)? {
            BiasMode::Auto
        } else {
            BiasMode::Value(props.float("adv_shadow_bias_value", 0.0005, 1e-8..=1e4)?)
        };
        let min_ray_dist = if props.boolean("adv_auto_min_raydist_enabled", true)? {
            BiasMode::Auto
        } else {
            BiasMode::Value(props.float("adv_min_raydist_value", 0.00005, 1e-8..=1e4)?)
        };

        let clay = if props.boolean("gs_clay_render", false)? {
            Some(ClaySettings {
                keep_transparency: props.boolean("gs_clay_render_keep_transparency", false)?,
                keep_normals: props.boolean("gs_clay_render_keep_normals", false)?,
                oren_nayar: props.boolean("gs_clay_oren_nayar", true)?,
                sigma: props.float("gs_clay_sigma", 0.3, 0.0..=1.0)?,
                color: props.rgb("gs_clay_col", RGBSpectrum::splat(0.5), 0.0..=1.0)?,
            })
        } else {
            None
        };

        let seed = props.integer("gs_seed", 0, 0..=i64::MAX)? as u64;

        Ok(Self {
            threads,
            ray_depth: props.integer("gs_ray_depth", 2, 0..=64)? as u32,
            shadow_depth: props.integer("gs_shadow_depth", 2, 0..=64)? as u32,
            transparent_shadows: props.boolean("gs_transp_shad", false)?,
            tile_size: tile_size as u32,
            tile_order: props.choice("gs_tile_order", "random", &["linear", "random"])?,
            gamma: props.float("gs_gamma", 1.0, 0.0..=5.0)?,
            gamma_input: props.float("gs_gamma_input", 1.0, 0.0..=5.0)?,
            shadow_bias,
            min_ray_dist,
            clay,
            transparent_background: props.boolean("bg_transp", false)?,
            transparent_refraction: props.boolean("bg_transp_refract", true)?,
            premultiply: props.boolean("gs_premult", true)?,
            show_sampled_pixels: props.boolean("gs_show_sam_pix", true)?,
            verbose: props.boolean("gs_verbose", true)?,
            custom_string: props.string("gs_custom_string", "")?,
            seed,
            output: OutputSettings {
                method: props.choice("gs_type_render", "into_blender", &["file", "into_blender", "xml"])?,
                format: props.choice("img_output", "PNG", &["PNG", "TARGA", "JPEG", "TIFF", "OPEN_EXR", "HDR"])?,
                multilayer: props.boolean("img_multilayer", false)?,
            },
        })
    }

    /// Resolves the automatic bias values against the scene bounds.
    /// Quiet renders only report warnings and errors.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        }
    }

    pub fn trace_params(&self, bounds: &AABB) -> TraceParams {
        let diagonal = if bounds.is_valid() { bounds.diagonal().norm() } else { 0.0 };
        let auto_bias = 5e-4 * (diagonal / 10.0).max(1.0);
        let shadow_bias = match self.shadow_bias {
            BiasMode::Auto => auto_bias,
            BiasMode::Value(v) => v,
        };
        let min_ray_dist = match self.min_ray_dist {
            BiasMode::Auto => shadow_bias * 0.1,
            BiasMode::Value(v) => v,
        };
        TraceParams { shadow_bias, min_ray_dist, scene_diagonal: diagonal }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    pub shadow_bias: Float,
    pub min_ray_dist: Float,
    pub scene_diagonal: Float,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self { shadow_bias: 5e-4, min_ray_dist: 5e-5, scene_diagonal: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::properties::PropertyValue;
    use crate::math::constants::Vector3f;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::from_properties(&Properties::new()).unwrap();
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let props = Properties::new()
            .with("gs_auto_threads", PropertyValue::Boolean(false))
            .with("gs_threads", PropertyValue::Integer(0));
        match RenderSettings::from_properties(&props) {
            Err(RenderError::Config { parameter, .. }) => assert_eq!(parameter, "gs_threads"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(Threads::Fixed(0).resolve().is_err());
        assert_eq!(Threads::Fixed(3).resolve().unwrap(), 3);
        assert!(Threads::Auto.resolve().unwrap() >= 1);
    }

    #[test]
    fn test_verbose_selects_log_level() {
        assert_eq!(RenderSettings::default().log_level(), log::LevelFilter::Info);
        let props = Properties::new()
            .with("gs_verbose", PropertyValue::Boolean(false))
            .with("gs_custom_string", PropertyValue::Str("take 3".to_string()));
        let settings = RenderSettings::from_properties(&props).unwrap();
        assert_eq!(settings.log_level(), log::LevelFilter::Warn);
        assert_eq!(settings.custom_string, "take 3");
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let props = Properties::new().with("gs_tile_size", PropertyValue::Integer(0));
        assert!(RenderSettings::from_properties(&props).is_err());
    }

    #[test]
    fn test_unknown_output_format_rejected() {
        let props = Properties::new().with("img_output", PropertyValue::Str("BMP".to_string()));
        match RenderSettings::from_properties(&props) {
            Err(RenderError::Config { parameter, value, .. }) => {
                assert_eq!(parameter, "img_output");
                assert_eq!(value, "BMP");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_trace_params() {
        let bounds = AABB::new(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(100.0, 0.0, 0.0));
        let params = RenderSettings::default().trace_params(&bounds);
        assert!((params.shadow_bias - 5e-3).abs() < 1e-6);
        assert!((params.min_ray_dist - 5e-4).abs() < 1e-7);

        let mut settings = RenderSettings::default();
        settings.shadow_bias = BiasMode::Value(0.01);
        settings.min_ray_dist = BiasMode::Value(0.002);
        let params = settings.trace_params(&bounds);
        assert_eq!(params.shadow_bias, 0.01);
        assert_eq!(params.min_ray_dist, 0.002);
    }
}
