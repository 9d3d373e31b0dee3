use crate::config::IsolationConfig;
use crate::scene::material::{color_from_hex, BLACK};
use crate::scene::raycast::{intersect_objects, Ray};
use crate::scene::{NodeId, SceneGraph};
use glam::Vec2;

pub const UNNAMED_PART: &str = "Unnamed part";
/// Children of this node are all reported as the board itself.
pub const MERGED_PARENT: &str = "flight_controller_pcb";

/// Name a part is registered under, given its own name and its parent's.
pub fn normalize_part_name(own: &str, parent: Option<&str>) -> String {
    if parent == Some(MERGED_PARENT) {
        MERGED_PARENT.to_string()
    } else if own.is_empty() {
        UNNAMED_PART.to_string()
    } else {
        own.to_string()
    }
}

/// Maps a pointer position in physical pixels to normalized device
/// coordinates, with +Y up.
pub fn pointer_to_ndc(px: f32, py: f32, width: u32, height: u32) -> Vec2 {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    Vec2::new(px / width * 2.0 - 1.0, -(py / height) * 2.0 + 1.0)
}

/// Selectable parts in traversal order. Filled once after the model loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartsRegistry {
    parts: Vec<NodeId>,
}

impl PartsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: NodeId) {
        self.parts.push(id);
    }

    pub fn parts(&self) -> &[NodeId] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Nearest node hit by `ray` among the registered parts and their
    /// descendants.
    pub fn pick(&self, graph: &SceneGraph, ray: &Ray) -> Option<NodeId> {
        intersect_objects(graph, &self.parts, ray, true)
            .first()
            .map(|hit| hit.node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    Isolated(NodeId),
}

impl Selection {
    pub fn selected(&self) -> Option<NodeId> {
        match self {
            Self::Idle => None,
            Self::Isolated(id) => Some(*id),
        }
    }
}

/// Highlights `selected` and fades every other registered part.
pub fn apply_isolation(
    graph: &mut SceneGraph,
    registry: &PartsRegistry,
    selected: NodeId,
    config: &IsolationConfig,
) {
    let highlight = color_from_hex(config.highlight_emissive);
    for &part in registry.parts() {
        let Some(material) = graph.node_mut(part).standard_material_mut() else {
            continue;
        };
        if part == selected {
            material.transparent = false;
            material.opacity = 1.0;
            material.emissive = highlight;
        } else {
            material.transparent = true;
            material.opacity = config.dimmed_opacity;
            material.emissive = BLACK;
        }
    }
}

/// Returns every registered part to its opaque, unlit state.
pub fn reset_isolation(graph: &mut SceneGraph, registry: &PartsRegistry) {
    for &part in registry.parts() {
        if let Some(material) = graph.node_mut(part).standard_material_mut() {
            material.transparent = false;
            material.opacity = 1.0;
            material.emissive = BLACK;
        }
    }
}
