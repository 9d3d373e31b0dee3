mod environment;
mod gltf_import;

pub use environment::{decode_environment, EnvironmentMap, HdrImage};
pub use gltf_import::{import_gltf, ModelAsset};

use crate::interaction::{normalize_part_name, PartsRegistry};
use crate::scene::{NodeId, SceneGraph, SourceMaterial};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use winit::event_loop::EventLoopProxy;

const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF {path} contains no scene")]
    NoScene { path: String },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} has zero size")]
    EmptyImage { path: String },
}

/// Completion and progress notifications from the loader threads. Each load
/// ends with exactly one `*Loaded` or `*Failed` event.
#[derive(Debug)]
pub enum LoadEvent {
    EnvironmentLoaded(EnvironmentMap),
    EnvironmentFailed(AssetError),
    ModelProgress(f32),
    ModelLoaded(ModelAsset),
    ModelFailed(AssetError),
}

/// Where loader threads hand their results to.
pub trait LoadSink: Send + 'static {
    /// Returns false once the receiving side is gone.
    fn deliver(&self, event: LoadEvent) -> bool;
}

impl LoadSink for EventLoopProxy<LoadEvent> {
    fn deliver(&self, event: LoadEvent) -> bool {
        self.send_event(event).is_ok()
    }
}

impl LoadSink for mpsc::Sender<LoadEvent> {
    fn deliver(&self, event: LoadEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Reads a whole file in fixed-size chunks, reporting the loaded fraction
/// after every chunk.
pub fn read_with_progress(
    path: &Path,
    mut on_progress: impl FnMut(f32),
) -> Result<Vec<u8>, AssetError> {
    let read_error = |source| AssetError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_error)?;
    let total = file.metadata().map_err(read_error)?.len() as usize;
    let mut bytes = Vec::with_capacity(total);
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = file.read(&mut chunk).map_err(read_error)?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        if total > 0 {
            on_progress((bytes.len() as f32 / total as f32).min(1.0));
        }
    }
    if total == 0 {
        on_progress(1.0);
    }
    Ok(bytes)
}

pub fn load_model(path: &Path, on_progress: impl FnMut(f32)) -> Result<ModelAsset, AssetError> {
    let bytes = read_with_progress(path, on_progress)?;
    import_gltf(&bytes, path)
}

pub fn load_environment(path: &Path) -> Result<EnvironmentMap, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    decode_environment(&bytes, path)
}

pub fn spawn_model_load(path: PathBuf, sink: impl LoadSink) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("model-loader".to_string())
        .spawn(move || {
            log::info!("Loading model {}", path.display());
            let result = load_model(&path, |fraction| {
                log::info!("loading {:.0}%", fraction * 100.0);
                sink.deliver(LoadEvent::ModelProgress(fraction));
            });
            let event = match result {
                Ok(model) => LoadEvent::ModelLoaded(model),
                Err(err) => LoadEvent::ModelFailed(err),
            };
            if !sink.deliver(event) {
                log::warn!("Model load finished after the viewer closed");
            }
        })
}

pub fn spawn_environment_load(
    path: PathBuf,
    sink: impl LoadSink,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("environment-loader".to_string())
        .spawn(move || {
            log::info!("Loading environment {}", path.display());
            let event = match load_environment(&path) {
                Ok(environment) => LoadEvent::EnvironmentLoaded(environment),
                Err(err) => LoadEvent::EnvironmentFailed(err),
            };
            if !sink.deliver(event) {
                log::warn!("Environment load finished after the viewer closed");
            }
        })
}

/// One pass over a freshly loaded model: canonical materials, shadows on,
/// normalized names. Returns the selectable parts in visit order.
pub fn prepare_model(graph: &mut SceneGraph, root: NodeId) -> PartsRegistry {
    let mut registry = PartsRegistry::new();
    for id in graph.descendants(root) {
        if !graph.node(id).is_renderable() {
            continue;
        }
        let parent_name = graph.node(id).parent.map(|parent| graph.node(parent).name.clone());
        let node = graph.node_mut(id);

        let material = node
            .material
            .take()
            .unwrap_or_else(|| SourceMaterial::Standard(Default::default()));
        if !material.is_standard() {
            log::info!(
                "Replacing material for {} ({})",
                node.name,
                material.kind_name()
            );
        }
        node.material = Some(SourceMaterial::Standard(material.normalize()));

        node.cast_shadow = true;
        node.receive_shadow = true;
        node.name = normalize_part_name(&node.name, parent_name.as_deref());
        registry.register(id);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{MERGED_PARENT, UNNAMED_PART};
    use crate::scene::test_support::quad_mesh;
    use crate::scene::Node;

    fn temp_file(tag: &str, bytes: &[u8]) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "drone_viewer_{}_{}_{}",
            tag,
            std::process::id(),
            nonce
        ));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn part(name: &str, material: SourceMaterial) -> Node {
        Node::new(name).with_mesh(quad_mesh(1.0), material)
    }

    #[test]
    fn progress_reaches_one_and_keeps_bytes() {
        let payload: Vec<u8> = (0..(READ_CHUNK_BYTES * 2 + 17)).map(|i| i as u8).collect();
        let path = temp_file("progress", &payload);
        let mut reports = Vec::new();
        let bytes = read_with_progress(&path, |fraction| reports.push(fraction)).unwrap();
        assert_eq!(bytes, payload);
        assert!(reports.len() >= 3);
        assert!(reports.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(reports.last().copied(), Some(1.0));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("drone_viewer_definitely_missing.glb");
        let err = read_with_progress(&path, |_| {}).unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }

    #[test]
    fn failed_model_load_sends_one_failure_event() {
        let (sender, receiver) = mpsc::channel();
        let path = std::env::temp_dir().join("drone_viewer_missing_model.glb");
        spawn_model_load(path, sender).unwrap().join().unwrap();
        let events: Vec<LoadEvent> = receiver.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LoadEvent::ModelFailed(AssetError::Read { .. })));
    }

    #[test]
    fn invalid_model_bytes_are_a_gltf_error() {
        let path = temp_file("garbage.glb", b"definitely not a gltf file");
        let (sender, receiver) = mpsc::channel();
        spawn_model_load(path.clone(), sender).unwrap().join().unwrap();
        let events: Vec<LoadEvent> = receiver.try_iter().collect();
        assert!(matches!(events[0], LoadEvent::ModelProgress(_)));
        assert!(matches!(
            events.last(),
            Some(LoadEvent::ModelFailed(AssetError::Gltf { .. }))
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn prepare_normalizes_materials_shadows_and_names() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("Scene"));
        let unnamed = graph.add_child(
            root,
            part(
                "",
                SourceMaterial::Unlit {
                    color: Some([0.5, 0.5, 0.5]),
                    map: None,
                },
            ),
        );
        let group = graph.add_child(root, Node::new("group"));
        let battery = graph.add_child(
            group,
            part("battery", SourceMaterial::Standard(Default::default())),
        );

        let registry = prepare_model(&mut graph, root);
        assert_eq!(registry.parts(), &[unnamed, battery]);
        assert_eq!(graph.node(unnamed).name, UNNAMED_PART);
        assert_eq!(graph.node(battery).name, "battery");

        let replaced = graph.node(unnamed).standard_material().unwrap();
        assert_eq!(replaced.color, [0.5, 0.5, 0.5]);
        assert_eq!(replaced.metalness, 0.2);
        assert_eq!(replaced.roughness, 0.6);
        for id in registry.parts() {
            assert!(graph.node(*id).cast_shadow);
            assert!(graph.node(*id).receive_shadow);
        }
        assert!(!graph.node(group).cast_shadow);
    }

    #[test]
    fn pcb_name_cascades_through_renderable_children() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("Scene"));
        let pcb = graph.add_child(
            root,
            part(MERGED_PARENT, SourceMaterial::Standard(Default::default())),
        );
        let chip = graph.add_child(pcb, part("chip", SourceMaterial::Standard(Default::default())));
        let pin = graph.add_child(chip, part("", SourceMaterial::Standard(Default::default())));

        let registry = prepare_model(&mut graph, root);
        assert_eq!(registry.len(), 3);
        for id in [pcb, chip, pin] {
            assert_eq!(graph.node(id).name, MERGED_PARENT);
        }
    }
}
