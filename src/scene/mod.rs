pub mod material;
pub mod raycast;

use glam::{Mat4, Quat, Vec3};

pub use material::{SourceMaterial, StandardMaterial};

/// Index of a node inside a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of a decoded texture inside a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let first = Vec3::from(*points.first()?);
        let (min, max) = points.iter().fold((first, first), |(min, max), p| {
            let p = Vec3::from(*p);
            (min.min(p), max.max(p))
        });
        Some(Self { min, max })
    }

    /// Bounds of this box after transforming its eight corners.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            let p = matrix.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Triangle geometry owned by a renderable node, in node-local space.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl MeshData {
    /// Builds a mesh, filling in flat normals and zero uvs when absent.
    /// Returns `None` for meshes without vertices.
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Option<Vec<[f32; 3]>>,
        uvs: Option<Vec<[f32; 2]>>,
        indices: Option<Vec<u32>>,
    ) -> Option<Self> {
        let bounds = Aabb::from_points(&positions)?;
        let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());
        let normals = match normals {
            Some(normals) if normals.len() == positions.len() => normals,
            _ => flat_normals(&positions, &indices),
        };
        let uvs = match uvs {
            Some(uvs) if uvs.len() == positions.len() => uvs,
            _ => vec![[0.0, 0.0]; positions.len()],
        };
        Some(Self {
            positions,
            normals,
            uvs,
            indices,
            bounds,
        })
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(move |tri| {
            let a = self.positions.get(tri[0] as usize)?;
            let b = self.positions.get(tri[1] as usize)?;
            let c = self.positions.get(tri[2] as usize)?;
            Some([Vec3::from(*a), Vec3::from(*b), Vec3::from(*c)])
        })
    }
}

fn flat_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let (pa, pb, pc) = (
            Vec3::from(positions[a]),
            Vec3::from(positions[b]),
            Vec3::from(positions[c]),
        );
        let n = (pb - pa).cross(pc - pa);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            let n = if n == Vec3::ZERO { Vec3::Y } else { n };
            n.to_array()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    pub visible: bool,
    pub mesh: Option<MeshData>,
    pub material: Option<SourceMaterial>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform::default(),
            visible: true,
            mesh: None,
            material: None,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn with_mesh(mut self, mesh: MeshData, material: SourceMaterial) -> Self {
        self.mesh = Some(mesh);
        self.material = Some(material);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_renderable(&self) -> bool {
        self.mesh.is_some()
    }

    /// Canonical material of a renderable node, once normalization ran.
    pub fn standard_material(&self) -> Option<&StandardMaterial> {
        match &self.material {
            Some(SourceMaterial::Standard(material)) => Some(material),
            _ => None,
        }
    }

    pub fn standard_material_mut(&mut self) -> Option<&mut StandardMaterial> {
        match &mut self.material {
            Some(SourceMaterial::Standard(material)) => Some(material),
            _ => None,
        }
    }
}

/// Arena-backed node hierarchy. Nodes are never removed during a session.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    pub textures: Vec<TextureData>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_root(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { parent: None, ..node });
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            ..node
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let node = self.node(id);
        let local = node.transform.matrix();
        match node.parent {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }

    /// A node is drawn only when it and all of its ancestors are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.visible && node.parent.map_or(true, |parent| self.is_visible(parent))
    }

    /// Pre-order walk of the subtree rooted at `root`, parents before children.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.node(id).children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Moves every node and texture of `other` into this graph, keeping its
    /// hierarchy. Returns the new ids of the grafted roots.
    pub fn graft(&mut self, other: SceneGraph) -> Vec<NodeId> {
        let node_offset = self.nodes.len();
        let texture_offset = self.textures.len();
        self.textures.extend(other.textures);
        let remap = |id: NodeId| NodeId(id.0 + node_offset);
        for mut node in other.nodes {
            node.parent = node.parent.map(remap);
            node.children = node.children.into_iter().map(remap).collect();
            if let Some(material) = &mut node.material {
                material.offset_textures(texture_offset);
            }
            self.nodes.push(node);
        }
        let roots: Vec<NodeId> = other.roots.into_iter().map(remap).collect();
        self.roots.extend(roots.iter().copied());
        roots
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::quad_mesh;
    use super::*;

    #[test]
    fn world_matrix_composes_parent_transforms() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("root").with_transform(Transform {
            translation: Vec3::new(0.0, 1.0, 0.0),
            scale: Vec3::splat(2.0),
            ..Transform::default()
        }));
        let child = graph.add_child(
            root,
            Node::new("child").with_transform(Transform {
                translation: Vec3::new(1.0, 0.0, 0.0),
                ..Transform::default()
            }),
        );
        let p = graph.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn descendants_are_pre_order() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("root"));
        let a = graph.add_child(root, Node::new("a"));
        let a1 = graph.add_child(a, Node::new("a1"));
        let b = graph.add_child(root, Node::new("b"));
        assert_eq!(graph.descendants(root), vec![root, a, a1, b]);
    }

    #[test]
    fn hidden_ancestor_hides_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("root"));
        let child = graph.add_child(root, Node::new("child"));
        assert!(graph.is_visible(child));
        graph.node_mut(root).visible = false;
        assert!(!graph.is_visible(child));
    }

    #[test]
    fn mesh_without_normals_gets_flat_normals() {
        let mesh = quad_mesh(0.5);
        assert!(mesh
            .normals
            .iter()
            .all(|n| (Vec3::from(*n) - Vec3::Z).length() < 1e-6));
        assert_eq!(mesh.triangles().count(), 2);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        assert!(MeshData::new(Vec::new(), None, None, None).is_none());
    }

    #[test]
    fn graft_remaps_parents_and_textures() {
        let mut main = SceneGraph::new();
        main.add_root(Node::new("existing"));
        main.add_texture(TextureData {
            width: 1,
            height: 1,
            rgba8: vec![0; 4],
        });

        let mut other = SceneGraph::new();
        let tex = other.add_texture(TextureData {
            width: 1,
            height: 1,
            rgba8: vec![255; 4],
        });
        let root = other.add_root(Node::new("model"));
        other.add_child(
            root,
            Node::new("part").with_mesh(
                quad_mesh(1.0),
                SourceMaterial::Standard(StandardMaterial {
                    map: Some(tex),
                    ..StandardMaterial::default()
                }),
            ),
        );

        let roots = main.graft(other);
        assert_eq!(roots, vec![NodeId(1)]);
        let part = main.node(NodeId(2));
        assert_eq!(part.parent, Some(NodeId(1)));
        assert_eq!(
            part.standard_material().and_then(|m| m.map),
            Some(TextureId(1))
        );
    }
}
