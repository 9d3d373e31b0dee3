use super::AssetError;
use crate::scene::{
    MeshData, Node, NodeId, SceneGraph, SourceMaterial, StandardMaterial, TextureData, TextureId,
    Transform,
};
use glam::{Quat, Vec3};
use gltf::image::Format;
use gltf::material::AlphaMode;
use gltf::mesh::Mode;
use std::path::Path;

/// A decoded model: its own scene graph with a single root group.
#[derive(Debug)]
pub struct ModelAsset {
    pub name: String,
    pub graph: SceneGraph,
    pub root: NodeId,
}

/// Node names the way web loaders store them: whitespace becomes `_` and
/// the characters `[ ] . : /` are dropped.
pub fn sanitize_node_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | '.' | ':' | '/'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Imports a `.glb` or `.gltf` document. External buffers and images are
/// resolved next to `path`.
pub fn import_gltf(bytes: &[u8], path: &Path) -> Result<ModelAsset, AssetError> {
    let gltf_error = |source| AssetError::Gltf {
        path: path.display().to_string(),
        source,
    };
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).map_err(gltf_error)?;
    let base = path.parent();
    let buffers = gltf::import_buffers(&document, base, blob).map_err(gltf_error)?;
    let images = gltf::import_images(&document, base, &buffers).map_err(gltf_error)?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::NoScene {
            path: path.display().to_string(),
        })?;

    let mut graph = SceneGraph::new();
    for image in &images {
        graph.add_texture(texture_from_image(image));
    }

    let root_name = scene.name().map(sanitize_node_name).unwrap_or_else(|| "Scene".to_string());
    let root = graph.add_root(Node::new(root_name));
    let mut importer = Importer {
        graph: &mut graph,
        buffers: &buffers,
    };
    for node in scene.nodes() {
        importer.import_node(root, &node);
    }

    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("model")
        .to_string();
    log::info!(
        "Imported {}: {} nodes, {} textures",
        name,
        graph.len(),
        graph.textures.len()
    );
    Ok(ModelAsset { name, graph, root })
}

struct Importer<'a> {
    graph: &'a mut SceneGraph,
    buffers: &'a [gltf::buffer::Data],
}

impl Importer<'_> {
    fn import_node(&mut self, parent: NodeId, node: &gltf::Node) {
        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from(scale),
        };
        let mesh = node.mesh();
        let name = node
            .name()
            .or_else(|| mesh.as_ref().and_then(|mesh| mesh.name()))
            .map(sanitize_node_name)
            .unwrap_or_default();

        let primitives: Vec<(MeshData, SourceMaterial)> = mesh
            .iter()
            .flat_map(|mesh| mesh.primitives())
            .filter_map(|primitive| self.read_primitive(&primitive))
            .collect();

        let id = match <[_; 1]>::try_from(primitives) {
            Ok([(mesh_data, material)]) => self.graph.add_child(
                parent,
                Node::new(name)
                    .with_transform(transform)
                    .with_mesh(mesh_data, material),
            ),
            Err(primitives) => {
                let group = self
                    .graph
                    .add_child(parent, Node::new(name.clone()).with_transform(transform));
                for (index, (mesh_data, material)) in primitives.into_iter().enumerate() {
                    self.graph.add_child(
                        group,
                        Node::new(format!("{}_{}", name, index)).with_mesh(mesh_data, material),
                    );
                }
                group
            }
        };

        for child in node.children() {
            self.import_node(id, &child);
        }
    }

    fn read_primitive(&self, primitive: &gltf::Primitive) -> Option<(MeshData, SourceMaterial)> {
        if primitive.mode() != Mode::Triangles {
            log::debug!("Skipping primitive with mode {:?}", primitive.mode());
            return None;
        }
        let reader = primitive.reader(|buffer| {
            self.buffers.get(buffer.index()).map(|data| data.0.as_slice())
        });
        let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
        let normals = reader.read_normals().map(|normals| normals.collect());
        let uvs = reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().collect());
        let indices = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect());
        let mesh = MeshData::new(positions, normals, uvs, indices)?;
        Some((mesh, convert_material(&primitive.material())))
    }
}

fn convert_material(material: &gltf::Material) -> SourceMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let map = pbr
        .base_color_texture()
        .map(|info| TextureId(info.texture().source().index()));

    if material.unlit() {
        return SourceMaterial::Unlit {
            color: Some([r, g, b]),
            map,
        };
    }

    let transparent = material.alpha_mode() == AlphaMode::Blend;
    SourceMaterial::Standard(StandardMaterial {
        color: [r, g, b],
        map,
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: material.emissive_factor(),
        opacity: if transparent { a } else { 1.0 },
        transparent,
        double_sided: material.double_sided(),
    })
}

fn texture_from_image(image: &gltf::image::Data) -> TextureData {
    let pixels = &image.pixels;
    let rgba8: Vec<u8> = match image.format {
        Format::R8 => pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        Format::R8G8 => pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8G8B8 => pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8B8A8 => pixels.clone(),
        Format::R16 => wide_to_rgba8(pixels, 2, 1, |c| c[1]),
        Format::R16G16 => wide_to_rgba8(pixels, 2, 2, |c| c[1]),
        Format::R16G16B16 => wide_to_rgba8(pixels, 2, 3, |c| c[1]),
        Format::R16G16B16A16 => wide_to_rgba8(pixels, 2, 4, |c| c[1]),
        Format::R32G32B32FLOAT => wide_to_rgba8(pixels, 4, 3, float_to_u8),
        Format::R32G32B32A32FLOAT => wide_to_rgba8(pixels, 4, 4, float_to_u8),
    };
    TextureData {
        width: image.width,
        height: image.height,
        rgba8,
    }
}

fn float_to_u8(bytes: &[u8]) -> u8 {
    let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Expands pixels with `channels` components of `width` bytes each to RGBA8.
fn wide_to_rgba8(pixels: &[u8], width: usize, channels: usize, to_u8: fn(&[u8]) -> u8) -> Vec<u8> {
    pixels
        .chunks_exact(width * channels)
        .flat_map(|pixel| {
            let mut out = [0, 0, 0, 255];
            for (channel, component) in pixel.chunks_exact(width).enumerate() {
                out[channel] = to_u8(component);
            }
            if channels == 1 {
                out[1] = out[0];
                out[2] = out[0];
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_JSON: &str = r#"{
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_materials_unlit"],
        "scene": 0,
        "scenes": [{ "name": "Scene", "nodes": [0] }],
        "nodes": [
            { "name": "frame", "mesh": 0, "children": [1] },
            { "name": "motor 1", "mesh": 1, "translation": [0.0, 2.0, 0.0] }
        ],
        "meshes": [
            { "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] },
            { "primitives": [
                { "attributes": { "POSITION": 0 }, "indices": 1 },
                { "attributes": { "POSITION": 0 }, "indices": 1, "material": 1 }
            ] }
        ],
        "materials": [
            {
                "name": "flat",
                "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] },
                "extensions": { "KHR_materials_unlit": {} }
            },
            {
                "name": "glass",
                "doubleSided": true,
                "alphaMode": "BLEND",
                "pbrMetallicRoughness": {
                    "baseColorFactor": [0.0, 0.0, 1.0, 0.5],
                    "metallicFactor": 0.3,
                    "roughnessFactor": 0.4
                }
            }
        ],
        "buffers": [{ "byteLength": 60 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 48, "target": 34962 },
            { "buffer": 0, "byteOffset": 48, "byteLength": 12, "target": 34963 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
                "min": [-1.0, -1.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 6, "type": "SCALAR" }
        ]
    }"#;

    fn quad_bin() -> Vec<u8> {
        let mut bin = Vec::new();
        for p in [[-1.0f32, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]] {
            for v in p {
                bin.extend_from_slice(&v.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2, 0, 2, 3] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin
    }

    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    fn find(graph: &SceneGraph, name: &str) -> NodeId {
        graph
            .node_ids()
            .find(|id| graph.node(*id).name == name)
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    #[test]
    fn sanitize_matches_loader_conventions() {
        assert_eq!(sanitize_node_name("motor 1"), "motor_1");
        assert_eq!(sanitize_node_name("a.b:c/d[e]"), "abcde");
        assert_eq!(sanitize_node_name("tab\there"), "tab_here");
        assert_eq!(sanitize_node_name("flight_controller_pcb"), "flight_controller_pcb");
    }

    #[test]
    fn imports_hierarchy_materials_and_geometry() {
        let bytes = glb(QUAD_JSON, &quad_bin());
        let model = import_gltf(&bytes, Path::new("drone.glb")).unwrap();
        let graph = &model.graph;
        assert_eq!(model.name, "drone.glb");
        assert_eq!(graph.node(model.root).name, "Scene");
        assert_eq!(graph.len(), 5);

        let frame = find(graph, "frame");
        assert_eq!(graph.node(frame).parent, Some(model.root));
        assert_eq!(
            graph.node(frame).material,
            Some(SourceMaterial::Unlit {
                color: Some([1.0, 0.0, 0.0]),
                map: None,
            })
        );
        let mesh = graph.node(frame).mesh.as_ref().unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);

        let motor = find(graph, "motor_1");
        assert!(!graph.node(motor).is_renderable());
        assert_eq!(graph.node(motor).parent, Some(frame));
        assert_eq!(graph.node(motor).transform.translation, Vec3::new(0.0, 2.0, 0.0));

        let plain = find(graph, "motor_1_0");
        let glass = find(graph, "motor_1_1");
        assert_eq!(graph.node(plain).parent, Some(motor));
        let plain_material = graph.node(plain).standard_material().unwrap();
        assert_eq!(plain_material.metalness, 1.0);
        assert!(!plain_material.transparent);

        let glass_material = graph.node(glass).standard_material().unwrap();
        assert!(glass_material.transparent);
        assert!(glass_material.double_sided);
        assert_eq!(glass_material.opacity, 0.5);
        assert_eq!(glass_material.metalness, 0.3);
    }

    #[test]
    fn imported_model_prepares_into_registry() {
        let bytes = glb(QUAD_JSON, &quad_bin());
        let mut model = import_gltf(&bytes, Path::new("drone.glb")).unwrap();
        let registry = crate::assets::prepare_model(&mut model.graph, model.root);
        let names: Vec<&str> = registry
            .parts()
            .iter()
            .map(|id| model.graph.node(*id).name.as_str())
            .collect();
        assert_eq!(names, vec!["frame", "motor_1_0", "motor_1_1"]);
        assert!(registry
            .parts()
            .iter()
            .all(|id| model.graph.node(*id).standard_material().is_some()));
    }

    #[test]
    fn grey_and_float_images_expand_to_rgba8() {
        let grey = gltf::image::Data {
            pixels: vec![10, 200],
            format: Format::R8,
            width: 2,
            height: 1,
        };
        assert_eq!(texture_from_image(&grey).rgba8, vec![10, 10, 10, 255, 200, 200, 200, 255]);

        let mut pixels = Vec::new();
        for v in [1.0f32, 0.0, 2.0] {
            pixels.extend_from_slice(&v.to_le_bytes());
        }
        let float = gltf::image::Data {
            pixels,
            format: Format::R32G32B32FLOAT,
            width: 1,
            height: 1,
        };
        assert_eq!(texture_from_image(&float).rgba8, vec![255, 0, 255, 255]);
    }

    #[test]
    fn document_without_scene_is_rejected() {
        let json = r#"{ "asset": { "version": "2.0" } }"#;
        let err = import_gltf(json.as_bytes(), Path::new("empty.gltf")).unwrap_err();
        assert!(matches!(err, AssetError::NoScene { .. }));
    }
}
