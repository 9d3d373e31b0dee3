//! CPU ray casting against scene-graph geometry.
//!
//! Rays are built from normalized device coordinates and tested against the
//! triangles of renderable nodes. Hits are reported nearest first, measured
//! in world units from the ray origin.

use super::{Aabb, NodeId, SceneGraph};
use glam::{Mat4, Vec2, Vec3};

const EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Ray from `eye` through the point at `ndc` on the camera's mid-depth
    /// plane, given the inverse of the camera's view-projection matrix.
    pub fn through_ndc(ndc: Vec2, eye: Vec3, inverse_view_projection: Mat4) -> Self {
        let target = inverse_view_projection.project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        Self::new(eye, target - eye)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    fn transformed(&self, matrix: &Mat4) -> Self {
        let origin = matrix.transform_point3(self.origin);
        let direction = matrix.transform_vector3(self.direction);
        Self::new(origin, direction)
    }

    /// Slab test; true when the ray enters the box in front of its origin.
    pub fn hits_aabb(&self, aabb: &Aabb) -> bool {
        let inv = self.direction.recip();
        let t1 = (aabb.min - self.origin) * inv;
        let t2 = (aabb.max - self.origin) * inv;
        let t_near = t1.min(t2).max_element();
        let t_far = t1.max(t2).min_element();
        t_far >= t_near.max(0.0)
    }

    /// Möller–Trumbore. Returns the ray parameter of the hit.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3, cull_back: bool) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let h = self.direction.cross(edge2);
        let det = edge1.dot(h);
        if cull_back && det < EPSILON {
            return None;
        }
        if det.abs() < EPSILON {
            return None;
        }
        let f = 1.0 / det;
        let s = self.origin - a;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = f * self.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = f * edge2.dot(q);
        (t > EPSILON).then_some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Nearest hit of `ray` on a single node's own geometry, if it has any.
pub fn intersect_node(graph: &SceneGraph, id: NodeId, ray: &Ray) -> Option<Intersection> {
    let node = graph.node(id);
    let mesh = node.mesh.as_ref()?;
    let world = graph.world_matrix(id);
    if !ray.hits_aabb(&mesh.bounds.transformed(&world)) {
        return None;
    }
    let cull_back = !node
        .standard_material()
        .map_or(false, |material| material.double_sided);
    let local_ray = ray.transformed(&world.inverse());

    mesh.triangles()
        .filter_map(|[a, b, c]| local_ray.intersect_triangle(a, b, c, cull_back))
        .map(|t| {
            let point = world.transform_point3(local_ray.at(t));
            Intersection {
                node: id,
                distance: point.distance(ray.origin),
                point,
            }
        })
        .min_by(|l, r| l.distance.total_cmp(&r.distance))
}

/// Tests every object in `objects` (and, when `recursive`, everything below
/// it). Invisible subtrees are skipped. Results are sorted nearest first.
pub fn intersect_objects(
    graph: &SceneGraph,
    objects: &[NodeId],
    ray: &Ray,
    recursive: bool,
) -> Vec<Intersection> {
    let mut hits = Vec::new();
    for &object in objects {
        if !graph.is_visible(object) {
            continue;
        }
        if recursive {
            collect_visible(graph, object, ray, &mut hits);
        } else if let Some(hit) = intersect_node(graph, object, ray) {
            hits.push(hit);
        }
    }
    hits.sort_by(|l, r| l.distance.total_cmp(&r.distance));
    hits
}

fn collect_visible(graph: &SceneGraph, id: NodeId, ray: &Ray, hits: &mut Vec<Intersection>) {
    let node = graph.node(id);
    if !node.visible {
        return;
    }
    if let Some(hit) = intersect_node(graph, id, ray) {
        hits.push(hit);
    }
    for &child in &node.children {
        collect_visible(graph, child, ray, hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_support::quad_at;
    use crate::scene::{Node, SourceMaterial, StandardMaterial};

    fn forward_ray() -> Ray {
        Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z)
    }

    #[test]
    fn triangle_hit_reports_distance() {
        let ray = forward_ray();
        let t = ray.intersect_triangle(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            true,
        );
        assert_eq!(t, Some(10.0));
    }

    #[test]
    fn back_face_is_culled_only_when_requested() {
        let ray = forward_ray();
        let (a, b, c) = (
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
        );
        assert_eq!(ray.intersect_triangle(a, b, c, true), None);
        assert_eq!(ray.intersect_triangle(a, b, c, false), Some(10.0));
    }

    #[test]
    fn aabb_behind_origin_is_missed() {
        let ray = forward_ray();
        let ahead = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let behind = Aabb {
            min: Vec3::new(-1.0, -1.0, 11.0),
            max: Vec3::new(1.0, 1.0, 12.0),
        };
        assert!(ray.hits_aabb(&ahead));
        assert!(!ray.hits_aabb(&behind));
    }

    #[test]
    fn hits_are_sorted_nearest_first() {
        let mut graph = SceneGraph::new();
        let far = graph.add_root(quad_at("far", Vec3::new(0.0, 0.0, -2.0), 1.0));
        let near = graph.add_root(quad_at("near", Vec3::new(0.0, 0.0, 2.0), 1.0));
        let hits = intersect_objects(&graph, &[far, near], &forward_ray(), true);
        let order: Vec<NodeId> = hits.iter().map(|hit| hit.node).collect();
        assert_eq!(order, vec![near, far]);
        assert!((hits[0].distance - 8.0).abs() < 1e-5);
    }

    #[test]
    fn recursive_query_reaches_children() {
        let mut graph = SceneGraph::new();
        let group = graph.add_root(Node::new("group"));
        let child = graph.add_child(group, quad_at("child", Vec3::ZERO, 1.0));
        let ray = forward_ray();
        assert!(intersect_objects(&graph, &[group], &ray, false).is_empty());
        let hits = intersect_objects(&graph, &[group], &ray, true);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node, child);
    }

    #[test]
    fn invisible_nodes_are_skipped() {
        let mut graph = SceneGraph::new();
        let part = graph.add_root(quad_at("part", Vec3::ZERO, 1.0));
        graph.node_mut(part).visible = false;
        assert!(intersect_objects(&graph, &[part], &forward_ray(), true).is_empty());
    }

    #[test]
    fn double_sided_material_is_hit_from_behind() {
        let mut graph = SceneGraph::new();
        let part = graph.add_root(quad_at("part", Vec3::ZERO, 1.0));
        let from_behind = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        assert!(intersect_objects(&graph, &[part], &from_behind, true).is_empty());

        graph.node_mut(part).material = Some(SourceMaterial::Standard(StandardMaterial {
            double_sided: true,
            ..StandardMaterial::default()
        }));
        assert_eq!(
            intersect_objects(&graph, &[part], &from_behind, true).len(),
            1
        );
    }

    #[test]
    fn scaled_node_reports_world_distance() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("root").with_transform(crate::scene::Transform {
            scale: Vec3::splat(0.05),
            ..Default::default()
        }));
        let part = graph.add_child(root, quad_at("part", Vec3::new(0.0, 0.0, 20.0), 10.0));
        let hits = intersect_objects(&graph, &[part], &forward_ray(), true);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 9.0).abs() < 1e-4);
    }
}
