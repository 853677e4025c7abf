// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

const SAH_BUCKETS: usize = 12;

#[derive(Clone)]
enum BVHNode {
    Leaf { bounds: AABB, start: usize, count: usize },
    Interior { bounds: AABB, left: usize, right: usize },
}

impl BVHNode {
    fn bounds(&self) -> &AABB {
        match self {
            BVHNode::Leaf { bounds, .. } => bounds,
            BVHNode::Interior { bounds, .. } => bounds,
        }
    }
}

/// Bounding volume hierarchy over object bounds. Primitive tests are
/// delegated to the caller through closures, so the tree never owns shapes.
pub struct BVH {
    nodes: Vec<BVHNode>,
    indices: Vec<usize>,
    max_leaf_size: usize,
}

struct BuildInput<'a> {
    bounds: &'a [AABB],
    centroids: Vec<Vector3f>,
}

impl BVH {
    pub fn new(prim_bounds: &[AABB]) -> RenderResult<Self> {
        Self::with_max_leaf_size(prim_bounds, 4)
    }

    pub fn with_max_leaf_size(prim_bounds: &[AABB], max_leaf_size: usize) -> RenderResult<Self> {
        for (idx, bounds) in prim_bounds.iter().enumerate() {
            if !bounds.is_finite() {
                return Err(RenderError::resource(format!(
                    "object {} has non-finite bounds, cannot build acceleration structure", idx
                )));
            }
        }

        let input = BuildInput {
            bounds: prim_bounds,
            centroids: prim_bounds.iter().map(|b| b.center()).collect(),
        };
        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * prim_bounds.len()),
            indices: (0..prim_bounds.len()).collect(),
            max_leaf_size: max_leaf_size.max(1),
        };
        if !bvh.indices.is_empty() {
            let count = bvh.indices.len();
            bvh.build(&input, 0, count);
        }
        log::debug!("BVH built: {} primitives, {} nodes.", prim_bounds.len(), bvh.nodes.len());
        Ok(bvh)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Closest hit reported by `hit_fn`, which returns the hit payload and
    /// its distance.
    pub fn ray_intersection<F, T>(&self, ray: &Ray3f, mut hit_fn: F) -> Option<(usize, T)>
    where
        F: FnMut(usize, &Ray3f) -> Option<(T, Float)>,
    {
        let mut closest: Option<(usize, T)> = None;
        let query = *ray;
        let mut ray = *ray;
        self.traverse(&query, |prim_idx| {
            if let Some((hit, t)) = hit_fn(prim_idx, &ray) {
                if ray.update(t) {
                    closest = Some((prim_idx, hit));
                }
            }
            false
        });
        closest
    }

    /// Any-hit query for shadow rays.
    pub fn ray_intersection_t<F>(&self, ray: &Ray3f, mut hit_fn: F) -> bool
    where
        F: FnMut(usize, &Ray3f) -> bool,
    {
        self.traverse(ray, |prim_idx| hit_fn(prim_idx, ray))
    }

    /// Visits the primitives of every leaf the ray overlaps until `visit`
    /// returns true.
    fn traverse<F: FnMut(usize) -> bool>(&self, ray: &Ray3f, mut visit: F) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds().ray_intersect(ray) {
                continue;
            }
            match *node {
                BVHNode::Leaf { start, count, .. } => {
                    for &prim_idx in &self.indices[start..start + count] {
                        if visit(prim_idx) {
                            return true;
                        }
                    }
                }
                BVHNode::Interior { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        false
    }

    fn build(&mut self, input: &BuildInput, start: usize, end: usize) -> usize {
        let mut bounds = AABB::default();
        let mut centroid_bounds = AABB::default();
        for &idx in &self.indices[start..end] {
            bounds.expand_by_aabb(&input.bounds[idx]);
            centroid_bounds.expand_by_point(&input.centroids[idx]);
        }

        let count = end - start;
        let node_idx = self.nodes.len();
        self.nodes.push(BVHNode::Leaf { bounds, start, count });
        if count <= self.max_leaf_size {
            return node_idx;
        }

        let axis = centroid_bounds.max_extent();
        let axis_min = centroid_bounds.p_min[axis];
        let extent = centroid_bounds.p_max[axis] - axis_min;
        if extent < 1e-6 {
            return node_idx;
        }
        let bucket_of = |c: &Vector3f| -> usize {
            (((c[axis] - axis_min) / extent * SAH_BUCKETS as Float) as usize).min(SAH_BUCKETS - 1)
        };

        let mut bucket_count = [0usize; SAH_BUCKETS];
        let mut bucket_bounds = [AABB::default(); SAH_BUCKETS];
        for &idx in &self.indices[start..end] {
            let b = bucket_of(&input.centroids[idx]);
            bucket_count[b] += 1;
            bucket_bounds[b].expand_by_aabb(&input.bounds[idx]);
        }

        let parent_area = bounds.surface_area().max(1e-6);
        let mut best = (Float::MAX, 0usize);
        for split in 0..SAH_BUCKETS - 1 {
            let side_cost = |range: std::ops::Range<usize>| -> Float {
                let mut b = AABB::default();
                let mut n = 0usize;
                for i in range {
                    n += bucket_count[i];
                    b.expand_by_aabb(&bucket_bounds[i]);
                }
                if n == 0 { 0.0 } else { n as Float * b.surface_area() }
            };
            let cost = 1.0 + (side_cost(0..split + 1) + side_cost(split + 1..SAH_BUCKETS)) / parent_area;
            if cost < best.0 {
                best = (cost, split);
            }
        }
        if best.0 >= count as Float {
            return node_idx;
        }

        let mut mid = start;
        for i in start..end {
            if bucket_of(&input.centroids[self.indices[i]]) <= best.1 {
                self.indices.swap(i, mid);
                mid += 1;
            }
        }
        if mid == start || mid == end {
            return node_idx;
        }

        let left = self.build(input, start, mid);
        let right = self.build(input, mid, end);
        self.nodes[node_idx] = BVHNode::Interior { bounds, left, right };
        node_idx
    }
}

#[cfg(test)]
mod tests {
    use super::BVH;
    use crate::core::shape::Shape;
    use crate::math::aabb::AABB;
    use crate::math::constants::{Float, Vector3f};
    use crate::math::ray::Ray3f;
    use crate::shapes::sphere::Sphere;

    fn build_spheres() -> Vec<Sphere> {
        (0..16).map(|i| Sphere::new(Vector3f::new(i as Float * 3.0, 0.0, 0.0), 1.0)).collect()
    }

    #[test]
    fn test_bvh_matches_brute_force() {
        let spheres = build_spheres();
        let bounds: Vec<AABB> = spheres.iter().map(|s| s.bounding_box()).collect();
        let bvh = BVH::new(&bounds).unwrap();
        assert!(bvh.node_count() > 1);

        for i in 0..16 {
            let origin = Vector3f::new(i as Float * 3.0 + 0.2, 0.1, 10.0);
            let ray = Ray3f::new(origin, Vector3f::new(0.0, 0.0, -1.0), None, None);
            let hit = bvh.ray_intersection(&ray, |idx, ray| {
                spheres[idx].ray_intersection(ray).map(|h| {
                    let t = h.t();
                    (t, t)
                })
            });
            let (idx, t) = hit.expect("expected a hit");
            assert_eq!(idx, i);

            let naive = spheres
                .iter()
                .filter_map(|s| s.ray_intersection(&ray).map(|h| h.t()))
                .fold(Float::MAX, Float::min);
            assert!((t - naive).abs() < 1e-4);
        }

        let miss = Ray3f::new(Vector3f::new(0.0, 50.0, 10.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(bvh.ray_intersection(&miss, |idx, ray| spheres[idx].ray_intersection(ray).map(|h| ((), h.t()))).is_none());
        assert!(!bvh.ray_intersection_t(&miss, |idx, ray| spheres[idx].ray_intersection_t(ray)));
    }

    #[test]
    fn test_non_finite_bounds_rejected() {
        let bounds = vec![AABB::new(Vector3f::zeros(), Vector3f::new(Float::INFINITY, 1.0, 1.0))];
        assert!(BVH::new(&bounds).is_err());
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = BVH::new(&[]).unwrap();
        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(bvh.ray_intersection(&ray, |_, _| Some(((), 1.0))).is_none());
    }
}
