// Copyright @yucwang 2026

pub mod lambertian_diffuse;
pub mod oren_nayar;
pub mod specular;
