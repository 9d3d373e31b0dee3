use super::uniforms::ObjectUniforms;
use crate::scene::{NodeId, SceneGraph};
use glam::Vec3;
use std::cmp::Ordering;

/// One renderable node, resolved for the current frame.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub node: NodeId,
    pub uniforms: ObjectUniforms,
    /// Squared distance from the camera to the world-space bounds center.
    pub depth: f32,
    pub blended: bool,
    pub double_sided: bool,
    pub cast_shadow: bool,
}

/// Frame draw list: opaque items front to back, then blended items back to
/// front. Invisible nodes and nodes without a canonical material are skipped.
#[derive(Debug, Default)]
pub struct DrawList {
    pub opaque: Vec<DrawItem>,
    pub blended: Vec<DrawItem>,
}

impl DrawList {
    pub fn collect(graph: &SceneGraph, camera_position: Vec3) -> Self {
        let mut list = Self::default();
        for id in graph.node_ids() {
            let node = graph.node(id);
            let (Some(mesh), Some(material)) = (&node.mesh, node.standard_material()) else {
                continue;
            };
            if !graph.is_visible(id) {
                continue;
            }
            let model = graph.world_matrix(id);
            let center = mesh.bounds.transformed(&model).center();
            let item = DrawItem {
                node: id,
                uniforms: ObjectUniforms::new(model, material, node.receive_shadow),
                depth: center.distance_squared(camera_position),
                blended: material.transparent,
                double_sided: material.double_sided,
                cast_shadow: node.cast_shadow,
            };
            if item.blended {
                list.blended.push(item);
            } else {
                list.opaque.push(item);
            }
        }
        list.opaque.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(Ordering::Equal));
        list.blended.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(Ordering::Equal));
        list
    }

    pub fn shadow_casters(&self) -> impl Iterator<Item = &DrawItem> {
        self.opaque
            .iter()
            .chain(self.blended.iter())
            .filter(|item| item.cast_shadow)
    }
}
