// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::passes::ColorLayers;
use crate::core::properties::Properties;
use crate::core::rng::LcgRng;
use crate::core::scene::Scene;
use crate::math::constants::Float;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausticPhotons {
    pub enabled: bool,
    pub photons: u32,
    pub mix: u32,
    pub depth: u32,
    pub radius: Float,
}

impl CausticPhotons {
    fn from_properties(props: &Properties, enabled: bool) -> RenderResult<Self> {
        Ok(Self {
            enabled,
            photons: props.integer("intg_photons", 500_000, 1..=100_000_000)? as u32,
            mix: props.integer("intg_caustic_mix", 100, 1..=10_000)? as u32,
            depth: props.integer("intg_caustic_depth", 10, 0..=50)? as u32,
            radius: props.float("intg_caustic_radius", 1.0, 1e-4..=100.0)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientOcclusion {
    pub samples: u32,
    pub distance: Float,
    pub color: RGBSpectrum,
}

impl Default for AmbientOcclusion {
    fn default() -> Self {
        Self { samples: 32, distance: 1.0, color: RGBSpectrum::splat(0.9) }
    }
}

impl AmbientOcclusion {
    pub fn from_properties(props: &Properties) -> RenderResult<Self> {
        Ok(Self {
            samples: props.integer("intg_AO_samples", 32, 1..=1000)? as u32,
            distance: props.float("intg_AO_distance", 1.0, 0.0..=10_000.0)?,
            color: props.rgb("intg_AO_color", RGBSpectrum::splat(0.9), 0.0..=1.0)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalGather {
    pub bounces: u32,
    pub samples: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausticMethod {
    None,
    Path,
    PathPhoton,
    Photon,
}

impl CausticMethod {
    /// Diffuse → specular → light paths are counted by the path tracer.
    pub fn traces_paths(&self) -> bool {
        matches!(self, CausticMethod::Path | CausticMethod::PathPhoton)
    }

    pub fn uses_photons(&self) -> bool {
        matches!(self, CausticMethod::Photon | CausticMethod::PathPhoton)
    }
}

impl FromStr for CausticMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(CausticMethod::None),
            "Path" => Ok(CausticMethod::Path),
            "Path+Photon" => Ok(CausticMethod::PathPhoton),
            "Photon" => Ok(CausticMethod::Photon),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugKind {
    N,
    DpDu,
    DpDv,
    Nu,
    Nv,
    DsDu,
    DsDv,
}

impl FromStr for DebugKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(DebugKind::N),
            "dPdU" => Ok(DebugKind::DpDu),
            "dPdV" => Ok(DebugKind::DpDv),
            "NU" => Ok(DebugKind::Nu),
            "NV" => Ok(DebugKind::Nv),
            "dSdU" => Ok(DebugKind::DsDu),
            "dSdV" => Ok(DebugKind::DsDv),
            _ => Err(()),
        }
    }
}

/// Lighting method and its parameters. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegratorConfig {
    DirectLighting {
        caustics: CausticPhotons,
        ao: Option<AmbientOcclusion>,
    },
    PhotonMapping {
        diffuse_photons: u32,
        caustic_photons: u32,
        bounces: u32,
        diffuse_radius: Float,
        caustic_radius: Float,
        search: u32,
        caustic_mix: u32,
        final_gather: Option<FinalGather>,
        show_map: bool,
    },
    PathTracing {
        path_samples: u32,
        bounces: u32,
        no_recursion: bool,
        caustic_method: CausticMethod,
        caustic: CausticPhotons,
    },
    Bidirectional {
        bounces: u32,
    },
    Sppm {
        photons: u32,
        pass_num: u32,
        bounces: u32,
        radius_factor: Float,
        photon_radius: Float,
        search: u32,
        initial_radius_estimate: bool,
    },
    Debug {
        kind: DebugKind,
        show_perturbed_normals: bool,
    },
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig::DirectLighting {
            caustics: CausticPhotons { enabled: false, photons: 500_000, mix: 100, depth: 10, radius: 1.0 },
            ao: None,
        }
    }
}

const LIGHT_METHODS: &[&str] = &["Direct Lighting", "Photon Mapping", "Pathtracing", "Debug", "Bidirectional", "SPPM"];

impl IntegratorConfig {
    pub fn from_properties(props: &Properties) -> RenderResult<Self> {
        let method = props.string("intg_light_method", "Direct Lighting")?;
        let bounces = || -> RenderResult<u32> { Ok(props.integer("intg_bounces", 4, 1..=i32::MAX as i64)? as u32) };
        let search = || -> RenderResult<u32> { Ok(props.integer("intg_search", 100, 1..=10_000)? as u32) };

        let config = match method.as_str() {
            "Direct Lighting" => {
                let ao = if props.boolean("intg_use_AO", false)? {
                    Some(AmbientOcclusion::from_properties(props)?)
                } else {
                    None
                };
                IntegratorConfig::DirectLighting {
                    caustics: CausticPhotons::from_properties(props, props.boolean("intg_use_caustics", false)?)?,
                    ao,
                }
            }
            "Photon Mapping" => {
                let final_gather = if props.boolean("intg_final_gather", true)? {
                    Some(FinalGather {
                        bounces: props.integer("intg_fg_bounces", 3, 1..=20)? as u32,
                        samples: props.integer("intg_fg_samples", 16, 1..=i32::MAX as i64)? as u32,
                    })
                } else {
                    None
                };
                IntegratorConfig::PhotonMapping {
                    diffuse_photons: props.integer("intg_photons", 500_000, 1..=100_000_000)? as u32,
                    caustic_photons: props.integer("intg_cPhotons", 500_000, 1..=i32::MAX as i64)? as u32,
                    bounces: bounces()?,
                    diffuse_radius: props.float("intg_diffuse_radius", 1.0, 1e-3..=Float::MAX)?,
                    caustic_radius: props.float("intg_caustic_radius", 1.0, 1e-4..=100.0)?,
                    search: search()?,
                    caustic_mix: props.integer("intg_caustic_mix", 100, 1..=10_000)? as u32,
                    final_gather,
                    show_map: props.boolean("intg_show_map", false)?,
                }
            }
            "Pathtracing" => {
                let caustic_method: CausticMethod =
                    props.choice("intg_caustic_method", "None", &["None", "Path", "Path+Photon", "Photon"])?;
                IntegratorConfig::PathTracing {
                    path_samples: props.integer("intg_path_samples", 32, 1..=i32::MAX as i64)? as u32,
                    bounces: bounces()?,
                    no_recursion: props.boolean("intg_no_recursion", false)?,
                    caustic_method,
                    caustic: CausticPhotons::from_properties(props, caustic_method.uses_photons())?,
                }
            }
            "Bidirectional" => IntegratorConfig::Bidirectional { bounces: bounces()? },
            "SPPM" => IntegratorConfig::Sppm {
                photons: props.integer("intg_photons", 500_000, 1..=100_000_000)? as u32,
                pass_num: props.integer("intg_pass_num", 1000, 1..=i32::MAX as i64)? as u32,
                bounces: bounces()?,
                radius_factor: props.float("intg_times", 1.0, 0.0..=Float::MAX)?,
                photon_radius: props.float("intg_photon_radius", 1.0, 0.0..=Float::MAX)?,
                search: search()?,
                initial_radius_estimate: props.boolean("intg_pm_ire", false)?,
            },
            "Debug" => IntegratorConfig::Debug {
                kind: props.choice("intg_debug_type", "dSdV", &["N", "dPdU", "dPdV", "NU", "NV", "dSdU", "dSdV"])?,
                show_perturbed_normals: props.boolean("intg_show_perturbed_normals", false)?,
            },
            other => {
                return Err(RenderError::config(
                    "intg_light_method",
                    other,
                    format!("expected one of: {}", LIGHT_METHODS.join(", ")),
                ))
            }
        };
        Ok(config)
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            IntegratorConfig::DirectLighting { .. } => "Direct Lighting",
            IntegratorConfig::PhotonMapping { .. } => "Photon Mapping",
            IntegratorConfig::PathTracing { .. } => "Pathtracing",
            IntegratorConfig::Bidirectional { .. } => "Bidirectional",
            IntegratorConfig::Sppm { .. } => "SPPM",
            IntegratorConfig::Debug { .. } => "Debug",
        }
    }
}

/// Per-sample inputs handed to an integrator by the sampler.
pub struct SampleContext<'a> {
    pub rng: &'a mut LcgRng,
    /// Compounded light sample multiplier of the current AA pass.
    pub light_multiplier: Float,
    /// Compounded indirect sample multiplier of the current AA pass.
    pub indirect_multiplier: Float,
    pub clamp_indirect: Float,
    pub pass: u32,
}

impl<'a> SampleContext<'a> {
    pub fn new(rng: &'a mut LcgRng) -> Self {
        Self { rng, light_multiplier: 1.0, indirect_multiplier: 1.0, clamp_indirect: 0.0, pass: 0 }
    }

    pub fn light_samples(&self, base: u32) -> u32 {
        ((base as Float * self.light_multiplier).round() as u32).max(1)
    }

    pub fn indirect_samples(&self, base: u32) -> u32 {
        ((base as Float * self.indirect_multiplier).round() as u32).max(1)
    }
}

/// Radiance estimate for one camera sample.
#[derive(Debug, Clone)]
pub struct RadianceSample {
    pub color: RGBSpectrum,
    pub alpha: Float,
    pub layers: ColorLayers,
}

impl RadianceSample {
    pub fn background(color: RGBSpectrum, alpha: Float) -> Self {
        Self { color, alpha, layers: ColorLayers::default() }
    }
}

pub trait Integrator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds integrator-wide structures (photon maps) before any tile is
    /// dispatched.
    fn preprocess(&mut self, scene: &Scene, threads: usize) -> RenderResult<()>;

    /// Called once before every sampling pass.
    fn prepare_pass(&mut self, _scene: &Scene, _pass: u32, _threads: usize) -> RenderResult<()> {
        Ok(())
    }

    fn estimate_radiance(&self, scene: &Scene, ray: &Ray3f, ctx: &mut SampleContext) -> RadianceSample;

    /// Fixed pass count for progressive integrators; every pixel is
    /// resampled in every pass.
    fn progressive_passes(&self) -> Option<u32> {
        None
    }
}
