// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::rng::LcgRng;
use crate::core::settings::TileOrder;
use crate::renderers::film::Tile;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Completed,
    Aborted,
}

/// Splits the image into tiles and hands them to a pool of scoped workers.
pub struct TileScheduler {
    tiles: Vec<Tile>,
    threads: usize,
}

impl TileScheduler {
    pub fn new(width: usize, height: usize, tile_size: usize, order: TileOrder,
               threads: usize, seed: u64) -> RenderResult<Self> {
        if threads == 0 {
            return Err(RenderError::config("gs_threads", 0, "at least one thread is required"));
        }
        if tile_size == 0 {
            return Err(RenderError::config("gs_tile_size", 0, "tile size must be positive"));
        }

        let tiles_x = (width + tile_size - 1) / tile_size;
        let tiles_y = (height + tile_size - 1) / tile_size;
        let mut tiles = Vec::with_capacity(tiles_x * tiles_y);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_size;
                let y0 = ty * tile_size;
                tiles.push(Tile {
                    index: tiles.len(),
                    x0,
                    y0,
                    x1: (x0 + tile_size).min(width),
                    y1: (y0 + tile_size).min(height),
                });
            }
        }

        if order == TileOrder::Random {
            let mut rng = LcgRng::new(seed);
            for i in (1..tiles.len()).rev() {
                let j = rng.next_below(i + 1);
                tiles.swap(i, j);
            }
        }

        Ok(Self { tiles, threads })
    }

    /// Dispatch order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `work` on every tile and feeds the results to `collect` on the
    /// calling thread. The first error stops further dispatch and is
    /// returned. `cancel` is checked before each tile is picked up.
    pub fn dispatch<T, W, C>(&self, cancel: &AtomicBool, work: W, mut collect: C) -> RenderResult<RenderStatus>
    where
        T: Send,
        W: Fn(&Tile) -> RenderResult<T> + Sync,
        C: FnMut(&Tile, T) -> RenderResult<()>,
    {
        let next_tile = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let total = self.tiles.len();
        let (tx, rx) = mpsc::channel::<(usize, RenderResult<T>)>();
        let mut first_error: Option<RenderError> = None;

        thread::scope(|scope| {
            for _ in 0..self.threads.min(total.max(1)) {
                let tx = tx.clone();
                let next_tile = &next_tile;
                let stop = &stop;
                let work = &work;
                let tiles = &self.tiles;
                scope.spawn(move || loop {
                    if stop.load(Ordering::Relaxed) || cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let i = next_tile.fetch_add(1, Ordering::Relaxed);
                    if i >= total {
                        break;
                    }
                    let result = work(&tiles[i]);
                    if result.is_err() {
                        stop.store(true, Ordering::Relaxed);
                    }
                    if tx.send((i, result)).is_err() {
                        break;
                    }
                });
            }

            drop(tx);
            for (i, result) in rx {
                if first_error.is_some() {
                    continue;
                }
                let collected = result.and_then(|value| collect(&self.tiles[i], value));
                if let Err(err) = collected {
                    log::error!("Tile {} failed: {}", self.tiles[i].index, err);
                    stop.store(true, Ordering::Relaxed);
                    first_error = Some(err);
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }
        if cancel.load(Ordering::Relaxed) {
            return Ok(RenderStatus::Aborted);
        }
        Ok(RenderStatus::Completed)
    }
}
