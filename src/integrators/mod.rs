// Copyright @yucwang 2026

pub mod bidir;
pub mod common;
pub mod debug;
pub mod direct;
pub mod path;
pub mod photon;
pub mod photon_map;
pub mod sppm;

use crate::core::integrator::{Integrator, IntegratorConfig};
use crate::core::passes::RenderPassSelection;
use crate::core::settings::RenderSettings;

use self::bidir::BidirectionalIntegrator;
use self::common::Tracer;
use self::debug::DebugIntegrator;
use self::direct::DirectLightingIntegrator;
use self::path::PathIntegrator;
use self::photon::{PhotonMappingIntegrator, PhotonMappingParams};
use self::sppm::{SppmIntegrator, SppmParams};

/// Instantiates the integrator selected by `config`.
pub fn build_integrator(config: &IntegratorConfig, settings: &RenderSettings,
                        passes: &RenderPassSelection) -> Box<dyn Integrator> {
    let ao = match config {
        IntegratorConfig::DirectLighting { ao, .. } => *ao,
        _ => None,
    };
    let tracer = Tracer::new(settings, passes, ao);
    let seed = settings.seed;

    let integrator: Box<dyn Integrator> = match *config {
        IntegratorConfig::DirectLighting { caustics, ao } => {
            Box::new(DirectLightingIntegrator::new(tracer, caustics, ao, seed))
        }
        IntegratorConfig::PhotonMapping {
            diffuse_photons, caustic_photons, bounces, diffuse_radius, caustic_radius,
            search, caustic_mix, final_gather, show_map,
        } => Box::new(PhotonMappingIntegrator::new(
            tracer,
            PhotonMappingParams {
                diffuse_photons, caustic_photons, bounces, diffuse_radius, caustic_radius,
                search, caustic_mix, final_gather, show_map,
            },
            seed,
        )),
        IntegratorConfig::PathTracing { path_samples, bounces, no_recursion, caustic_method, caustic } => {
            Box::new(PathIntegrator::new(tracer, path_samples, bounces, no_recursion, caustic_method, caustic, seed))
        }
        IntegratorConfig::Bidirectional { bounces } => Box::new(BidirectionalIntegrator::new(tracer, bounces)),
        IntegratorConfig::Sppm {
            photons, pass_num, bounces, radius_factor, photon_radius, search, initial_radius_estimate,
        } => Box::new(SppmIntegrator::new(
            tracer,
            SppmParams { photons, pass_num, bounces, radius_factor, photon_radius, search, initial_radius_estimate },
            seed,
        )),
        IntegratorConfig::Debug { kind, show_perturbed_normals } => {
            Box::new(DebugIntegrator::new(tracer, kind, show_perturbed_normals))
        }
    };
    log::info!("Using integrator: {}.", integrator.name());
    integrator
}
