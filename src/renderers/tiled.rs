// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::integrator::{Integrator, SampleContext};
use crate::core::passes::RenderPassSelection;
use crate::core::rng::LcgRng;
use crate::core::sampling::{clamp_sample, AASamplingConfig, FilterSampler, NoiseControlConfig};
use crate::core::scene::Scene;
use crate::core::sensor::Sensor;
use crate::core::settings::RenderSettings;
use crate::io::sink::OutputSink;
use crate::math::constants::{Float, Vector2f};
use crate::renderers::adaptive::{AdaptiveSampler, PassPlan};
use crate::renderers::compositor::{PassCompositor, TileAccumulator};
use crate::renderers::film::{Tile, TileTask};
use crate::renderers::scheduler::{RenderStatus, TileScheduler};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

pub use super::renderer::Renderer;

/// Tile-parallel renderer running the adaptive AA passes.
pub struct TiledRenderer {
    integrator: Box<dyn Integrator>,
    settings: RenderSettings,
    aa: AASamplingConfig,
    noise: NoiseControlConfig,
    passes: RenderPassSelection,
    camera_id: usize,
    cancel: Arc<AtomicBool>,
}

impl TiledRenderer {
    pub fn new(integrator: Box<dyn Integrator>, settings: RenderSettings, aa: AASamplingConfig,
               noise: NoiseControlConfig, passes: RenderPassSelection) -> Self {
        Self {
            integrator,
            settings,
            aa,
            noise,
            passes,
            camera_id: 0,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag stops the render at the next tile boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn task(tile: &Tile, plan: &PassPlan, noise: Option<&[Float]>, width: usize) -> TileTask {
        let local = |x: usize, y: usize| x + width * y;
        let marks = plan.marks.as_ref().map(|marks| tile.pixels().map(|(x, y)| marks[local(x, y)]).collect());
        let noise = noise
            .map(|n| tile.pixels().map(|(x, y)| n[local(x, y)]).collect())
            .unwrap_or_default();
        TileTask { tile: *tile, pass: plan.pass, samples: plan.samples, noise, marks }
    }
}

/// Per-pass inputs shared by every tile worker.
struct PassContext<'a> {
    scene: &'a Scene,
    camera: &'a dyn Sensor,
    integrator: &'a dyn Integrator,
    plan: &'a PassPlan,
    noise: &'a NoiseControlConfig,
    filter: &'a FilterSampler,
    seed: u64,
}

fn render_tile(ctx: &PassContext, task: &TileTask, mut acc: TileAccumulator) -> TileAccumulator {
    let (width, height) = (ctx.camera.width() as Float, ctx.camera.height() as Float);
    for (x, y) in task.tile.pixels() {
        if !task.wants(x, y) {
            continue;
        }
        let mut rng = LcgRng::for_pixel(ctx.seed, task.pass, x, y);
        let mut sample_ctx = SampleContext::new(&mut rng);
        sample_ctx.light_multiplier = ctx.plan.light_multiplier;
        sample_ctx.indirect_multiplier = ctx.plan.indirect_multiplier;
        sample_ctx.clamp_indirect = ctx.noise.clamp_indirect;
        sample_ctx.pass = task.pass;

        for _ in 0..task.samples {
            let (offset, weight) = ctx.filter.sample(&sample_ctx.rng.next_2d());
            let film = Vector2f::new((x as Float + 0.5 + offset.x) / width, (y as Float + 0.5 + offset.y) / height);
            let ray = ctx.camera.sample_ray(&film);
            let mut sample = ctx.integrator.estimate_radiance(ctx.scene, &ray, &mut sample_ctx);
            sample.color = clamp_sample(sample.color, ctx.noise.clamp_samples);
            acc.accumulate(x, y, &sample, weight);
        }
    }
    acc
}

impl Renderer for TiledRenderer {
    fn render(&mut self, scene: &Scene, sink: &mut dyn OutputSink) -> RenderResult<RenderStatus> {
        let camera = scene
            .camera(self.camera_id)
            .ok_or_else(|| RenderError::resource(format!("scene has no camera {}", self.camera_id)))?;
        let (width, height) = (camera.width(), camera.height());
        if width == 0 || height == 0 {
            return Err(RenderError::config("resolution", format!("{}x{}", width, height), "image must not be empty"));
        }
        let threads = self.settings.threads.resolve()?;
        let scheduler = TileScheduler::new(width, height, self.settings.tile_size as usize,
                                           self.settings.tile_order, threads, self.settings.seed)?;

        log::info!("Rendering {}x{} with {} on {} threads, {} tiles.",
                   width, height, self.integrator.name(), threads, scheduler.tiles().len());
        let start = Instant::now();
        self.integrator.preprocess(scene, threads)?;
        log::info!("Preprocess finished in {:.2?}.", start.elapsed());

        let filter = FilterSampler::new(&self.aa.filter);
        let mut compositor = PassCompositor::new(width, height, &self.passes);
        let mut sampler = AdaptiveSampler::new(self.aa, self.noise, self.integrator.progressive_passes());

        while let Some(plan) = sampler.next_pass() {
            self.integrator.prepare_pass(scene, plan.pass, threads)?;
            if self.settings.show_sampled_pixels {
                if let Some(marks) = plan.marks.as_ref() {
                    sink.marked_pixels(plan.pass, width, marks)?;
                }
            }
            match plan.marked() {
                Some(marked) => log::info!("AA pass {}/{}: {} samples on {} pixels.",
                                           plan.pass + 1, sampler.total_passes(), plan.samples, marked),
                None => log::info!("AA pass {}/{}: {} samples per pixel.",
                                   plan.pass + 1, sampler.total_passes(), plan.samples),
            }

            let progress = ProgressBar::new(scheduler.tiles().len() as u64);
            progress.set_style(
                ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tiles")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let pass_ctx = PassContext {
                scene,
                camera,
                integrator: self.integrator.as_ref(),
                plan: &plan,
                noise: &self.noise,
                filter: &filter,
                seed: self.settings.seed,
            };
            let compositor_ref = &compositor;
            let noise_ref = sampler.estimates();
            let mut finished: Vec<TileAccumulator> = Vec::new();
            let status = scheduler.dispatch(
                &self.cancel,
                |tile| {
                    let task = Self::task(tile, &plan, noise_ref, width);
                    Ok(render_tile(&pass_ctx, &task, compositor_ref.tile_accumulator(tile)))
                },
                |tile, acc| {
                    sink.tile_done(tile, acc.combined())?;
                    finished.push(acc);
                    progress.inc(1);
                    Ok(())
                },
            )?;
            progress.finish_and_clear();
            for acc in finished.iter() {
                compositor.merge(acc);
            }

            if status == RenderStatus::Aborted {
                log::warn!("Render aborted during AA pass {}.", plan.pass + 1);
                return Ok(RenderStatus::Aborted);
            }

            let marked = sampler.evaluate(compositor.combined());
            log::debug!("AA pass {} done, {} pixels left to resample.", plan.pass + 1, marked);
        }

        let film = compositor.finalize();
        sink.finish(&film, &self.settings)?;
        log::info!("Render finished in {:.2?} after {} passes.", start.elapsed(), sampler.passes_done());
        Ok(RenderStatus::Completed)
    }
}
