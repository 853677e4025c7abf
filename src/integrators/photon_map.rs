// Copyright @yucwang 2026

use crate::core::bsdf::BSDF;
use crate::core::error::{RenderError, RenderResult};
use crate::core::rng::{mix64, LcgRng};
use crate::core::scene::Scene;
use crate::core::settings::TraceParams;
use crate::math::constants::{Float, Vector3f, PI};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread;

/// Upper bound on the memory held by one photon map.
pub const PHOTON_MEMORY_BUDGET: usize = 2 << 30;

#[derive(Debug, Clone, Copy)]
pub struct Photon {
    pub position: Vector3f,
    /// Unit vector pointing back to where the photon came from.
    pub direction: Vector3f,
    pub power: RGBSpectrum,
    /// Landed without any prior scattering.
    pub direct: bool,
}

/// Which landings a shooting pass keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonKind {
    /// Light → specular+ → diffuse; tracing stops at the first diffuse hit.
    Caustic,
    /// Every diffuse landing except pure caustic paths.
    Diffuse,
    /// Every diffuse landing after at least one bounce.
    Global,
}

impl PhotonKind {
    fn stores(&self, bounces: u32, diffuse_bounces: u32) -> bool {
        match self {
            PhotonKind::Caustic => bounces >= 1 && diffuse_bounces == 0,
            PhotonKind::Diffuse => !(bounces >= 1 && diffuse_bounces == 0),
            PhotonKind::Global => bounces >= 1,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PhotonKind::Caustic => "caustic",
            PhotonKind::Diffuse => "diffuse",
            PhotonKind::Global => "global",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShootSettings {
    pub kind: PhotonKind,
    pub photons: u32,
    pub max_bounces: u32,
    pub seed: u64,
    pub threads: usize,
}

/// Balanced kd-tree over photons, stored implicitly: the node of a range
/// sits at the range midpoint.
pub struct PhotonMap {
    photons: Vec<Photon>,
    axes: Vec<u8>,
    emitted: u32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist2: Float,
    idx: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist2 == other.dist2
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2.partial_cmp(&other.dist2).unwrap_or(Ordering::Equal)
    }
}

impl PhotonMap {
    pub fn empty() -> Self {
        Self { photons: Vec::new(), axes: Vec::new(), emitted: 0 }
    }

    pub fn build(mut photons: Vec<Photon>, emitted: u32) -> Self {
        let mut axes = vec![0u8; photons.len()];
        let len = photons.len();
        balance(&mut photons, &mut axes, 0, len);
        Self { photons, axes, emitted }
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Up to `k` nearest photons within `max_dist2` of `p`, with squared
    /// distances. Unordered.
    pub fn nearest(&self, p: &Vector3f, k: usize, max_dist2: Float) -> Vec<(&Photon, Float)> {
        if self.photons.is_empty() || k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        let mut bound = max_dist2;
        self.search(p, k, 0, self.photons.len(), &mut heap, &mut bound);
        heap.into_iter().map(|c| (&self.photons[c.idx], c.dist2)).collect()
    }

    fn search(&self, p: &Vector3f, k: usize, lo: usize, hi: usize,
              heap: &mut BinaryHeap<Candidate>, bound: &mut Float) {
        if lo >= hi {
            return;
        }
        let mid = (lo + hi) / 2;
        let photon = &self.photons[mid];
        let axis = self.axes[mid] as usize;
        let delta = p[axis] - photon.position[axis];
        let (near, far) = if delta < 0.0 { ((lo, mid), (mid + 1, hi)) } else { ((mid + 1, hi), (lo, mid)) };

        self.search(p, k, near.0, near.1, heap, bound);

        let dist2 = (photon.position - p).norm_squared();
        if dist2 < *bound {
            heap.push(Candidate { dist2, idx: mid });
            if heap.len() > k {
                heap.pop();
            }
            if heap.len() == k {
                if let Some(top) = heap.peek() {
                    *bound = top.dist2;
                }
            }
        }

        if delta * delta < *bound {
            self.search(p, k, far.0, far.1, heap, bound);
        }
    }

    /// Reflected radiance toward `wo` from the photon density around `p`.
    /// The gather disk shrinks to the k-th photon once `k` are found.
    pub fn radiance(&self, p: &Vector3f, frame: &Frame, wo: &Vector3f, bsdf: &dyn BSDF,
                    k: usize, radius: Float, skip_direct: bool) -> RGBSpectrum {
        let max_dist2 = radius * radius;
        let found = self.nearest(p, k, max_dist2);
        if found.is_empty() {
            return RGBSpectrum::default();
        }
        let area_dist2 = if found.len() >= k {
            found.iter().fold(0.0 as Float, |acc, (_, d2)| acc.max(*d2))
        } else {
            max_dist2
        };
        if area_dist2 <= 0.0 {
            return RGBSpectrum::default();
        }

        let wo_local = frame.to_local(wo);
        let mut sum = RGBSpectrum::default();
        for (photon, _) in found.iter() {
            if skip_direct && photon.direct {
                continue;
            }
            let wi_local = frame.to_local(&photon.direction);
            sum += bsdf.eval(&wo_local, &wi_local).value * photon.power;
        }
        sum / (PI * area_dist2)
    }
}

fn balance(photons: &mut [Photon], axes: &mut [u8], lo: usize, hi: usize) {
    if hi - lo <= 1 {
        return;
    }
    let mut min = photons[lo].position;
    let mut max = min;
    for photon in &photons[lo..hi] {
        min = min.inf(&photon.position);
        max = max.sup(&photon.position);
    }
    let extent = max - min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };

    let mid = (lo + hi) / 2;
    photons[lo..hi].select_nth_unstable_by(mid - lo, |a, b| {
        a.position[axis].partial_cmp(&b.position[axis]).unwrap_or(Ordering::Equal)
    });
    axes[mid] = axis as u8;
    balance(photons, axes, lo, mid);
    balance(photons, axes, mid + 1, hi);
}

/// Shoots `settings.photons` photons across worker threads and builds the
/// map. Each worker owns a seeded stream, so the result does not depend on
/// scheduling.
pub fn shoot_photons(scene: &Scene, params: &TraceParams, settings: &ShootSettings) -> RenderResult<PhotonMap> {
    scene.require_emitters("photon mapping")?;
    let threads = settings.threads.max(1);
    let per_worker_budget = PHOTON_MEMORY_BUDGET / std::mem::size_of::<Photon>() / threads;

    log::info!("Shooting {} {} photons.", settings.photons, settings.kind.name());
    let results: Vec<RenderResult<Vec<Photon>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|worker| {
                let count = settings.photons as usize / threads
                    + if worker < settings.photons as usize % threads { 1 } else { 0 };
                scope.spawn(move || {
                    let mut rng = LcgRng::new(mix64(settings.seed ^ ((worker as u64 + 1) << 40)));
                    let mut stored = Vec::new();
                    for _ in 0..count {
                        trace_photon(scene, params, settings, &mut rng, &mut stored);
                        if stored.len() > per_worker_budget {
                            return Err(RenderError::resource(format!(
                                "{} photon map exceeds the memory budget of {} MiB",
                                settings.kind.name(),
                                PHOTON_MEMORY_BUDGET >> 20
                            )));
                        }
                    }
                    Ok(stored)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(RenderError::resource("photon worker panicked"))))
            .collect()
    });

    let mut photons = Vec::new();
    for result in results {
        photons.extend(result?);
    }
    log::info!("Stored {} {} photons.", photons.len(), settings.kind.name());
    Ok(PhotonMap::build(photons, settings.photons))
}

fn trace_photon(scene: &Scene, params: &TraceParams, settings: &ShootSettings,
                rng: &mut LcgRng, stored: &mut Vec<Photon>) {
    let (emitter_idx, pick_pdf) = match scene.sample_emitter(rng.next_f32()) {
        Some(pick) if pick.1 > 0.0 => pick,
        _ => return,
    };
    let u_pos = rng.next_2d();
    let u_dir = rng.next_2d();
    let emission = scene.emitters()[emitter_idx].sample_photon(&u_pos, &u_dir);
    let mut power = emission.power / (pick_pdf * settings.photons as Float);
    if power.is_black() || !power.is_finite() {
        return;
    }

    let mut ray = Ray3f::new(emission.ray.origin(), emission.ray.dir(), Some(params.shadow_bias), None);
    let mut bounces = 0u32;
    let mut diffuse_bounces = 0u32;
    loop {
        let hit = match scene.ray_intersection(&ray) {
            Some(hit) => hit,
            None => return,
        };
        let bsdf = match scene.material(&hit) {
            Some(bsdf) => bsdf,
            None => return,
        };
        let incoming = -ray.dir();

        if !bsdf.is_specular() {
            if settings.kind.stores(bounces, diffuse_bounces) {
                stored.push(Photon { position: hit.p(), direction: incoming, power, direct: bounces == 0 });
            }
            if settings.kind == PhotonKind::Caustic {
                return;
            }
        } else if settings.kind == PhotonKind::Caustic && diffuse_bounces > 0 {
            return;
        }

        if bounces >= settings.max_bounces {
            return;
        }
        let frame = hit.shading_frame();
        let wo = frame.to_local(&incoming);
        let record = match bsdf.sample(&wo, &rng.next_2d(), rng.next_f32()) {
            Some(record) => record,
            None => return,
        };
        if !record.lobe.is_specular() {
            diffuse_bounces += 1;
        }
        power *= record.weight;
        if power.is_black() {
            return;
        }
        let wi = frame.from_local(&record.wi);
        ray = Ray3f::new(hit.spawn_origin(&wi, params.shadow_bias), wi, Some(params.min_ray_dist), None);
        bounces += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::lambertian_diffuse::LambertianDiffuseBSDF;

    fn grid_photons() -> Vec<Photon> {
        let mut photons = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                photons.push(Photon {
                    position: Vector3f::new(i as Float, j as Float, 0.0),
                    direction: Vector3f::new(0.0, 0.0, 1.0),
                    power: RGBSpectrum::splat(1.0),
                    direct: (i + j) % 2 == 0,
                });
            }
        }
        photons
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let photons = grid_photons();
        let map = PhotonMap::build(photons.clone(), 100);
        let p = Vector3f::new(3.2, 4.7, 0.5);

        let mut expected: Vec<Float> = photons.iter().map(|ph| (ph.position - p).norm_squared()).collect();
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut found: Vec<Float> = map.nearest(&p, 5, 100.0).iter().map(|(_, d2)| *d2).collect();
        found.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(found.len(), 5);
        for (a, b) in found.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_nearest_respects_radius() {
        let map = PhotonMap::build(grid_photons(), 100);
        let found = map.nearest(&Vector3f::new(0.0, 0.0, 0.0), 50, 1.1 * 1.1);
        assert_eq!(found.len(), 3);
        assert!(PhotonMap::empty().nearest(&Vector3f::zeros(), 5, 1.0).is_empty());
    }

    #[test]
    fn test_radiance_density() {
        let map = PhotonMap::build(grid_photons(), 100);
        let bsdf = LambertianDiffuseBSDF::new(RGBSpectrum::splat(1.0));
        let frame = Frame::from_normal(&Vector3f::new(0.0, 0.0, 1.0));
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let p = Vector3f::new(5.0, 5.0, 0.0);

        // Radius 0.5 only captures the photon under p.
        let l = map.radiance(&p, &frame, &wo, &bsdf, 10, 0.5, false);
        let expected = 1.0 / PI / (PI * 0.25);
        assert!((l.r() - expected).abs() < 1e-3);

        // That photon is flagged direct.
        assert!(map.radiance(&p, &frame, &wo, &bsdf, 10, 0.5, true).is_black());
    }

    #[test]
    fn test_kind_storage_rules() {
        assert!(PhotonKind::Caustic.stores(1, 0));
        assert!(!PhotonKind::Caustic.stores(0, 0));
        assert!(PhotonKind::Diffuse.stores(0, 0));
        assert!(!PhotonKind::Diffuse.stores(2, 0));
        assert!(PhotonKind::Diffuse.stores(2, 1));
        assert!(!PhotonKind::Global.stores(0, 0));
        assert!(PhotonKind::Global.stores(1, 0));
    }
}
