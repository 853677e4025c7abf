// Copyright @yucwang 2021

pub mod bsdf;
pub mod bvh;
pub mod emitter;
pub mod error;
pub mod integrator;
pub mod interaction;
pub mod passes;
pub mod properties;
pub mod rng;
pub mod sampling;
pub mod sensor;
pub mod scene;
pub mod scene_loader;
pub mod settings;
pub mod shape;
