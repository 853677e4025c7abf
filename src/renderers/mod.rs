// Copyright @yucwang 2026

pub mod adaptive;
pub mod compositor;
pub mod film;
pub mod renderer;
pub mod scheduler;
pub mod tiled;
