use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "DRONE_VIEWER_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything the viewer needs to set up a session. Every field has a
/// default, so a config file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    pub lights: LightConfig,
    pub model: ModelPlacement,
    pub isolation: IsolationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 3],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Drone Viewer".to_string(),
            width: 1280,
            height: 720,
            clear_color: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub model_path: String,
    pub environment_path: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_path: "public/drone_model_texturedv6.glb".to_string(),
            environment_path: "public/hdri/example.exr".to_string(),
        }
    }
}

impl AssetConfig {
    pub fn model_path(&self) -> PathBuf {
        resolve_asset_path(&self.model_path)
    }

    pub fn environment_path(&self) -> PathBuf {
        resolve_asset_path(&self.environment_path)
    }
}

/// Relative asset paths resolve against the crate root.
pub fn resolve_asset_path(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 45.0,
            near: 1.0,
            far: 1000.0,
            position: [4.0, 5.0, 11.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub target: [f32; 3],
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            enable_pan: false,
            min_distance: 5.0,
            max_distance: 20.0,
            min_polar_angle: 0.5,
            max_polar_angle: 1.5,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            target: [0.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub spot: SpotLightConfig,
    pub ambient: AmbientLightConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotLightConfig {
    pub color: u32,
    pub intensity: f32,
    pub distance: f32,
    pub angle: f32,
    pub penumbra: f32,
    pub decay: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub cast_shadow: bool,
    pub shadow_bias: f32,
    pub shadow_map_size: u32,
}

impl Default for SpotLightConfig {
    fn default() -> Self {
        Self {
            color: 0xFFFFFF,
            intensity: 3000.0,
            distance: 100.0,
            angle: 0.22,
            penumbra: 1.0,
            decay: 2.0,
            position: [0.0, 25.0, 0.0],
            target: [0.0, 0.0, 0.0],
            cast_shadow: true,
            shadow_bias: -0.0001,
            shadow_map_size: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLightConfig {
    pub color: u32,
    pub intensity: f32,
}

impl Default for AmbientLightConfig {
    fn default() -> Self {
        Self {
            color: 0xFFFFFF,
            intensity: 1.5,
        }
    }
}

/// Where the loaded model is placed in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPlacement {
    pub position: [f32; 3],
    pub scale: f32,
}

impl Default for ModelPlacement {
    fn default() -> Self {
        Self {
            position: [0.0, 1.05, -1.0],
            scale: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// sRGB hex of the glow given to the selected part.
    pub highlight_emissive: u32,
    pub dimmed_opacity: f32,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            highlight_emissive: 0x444444,
            dimmed_opacity: 0.1,
        }
    }
}

impl ViewerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Loads the config named by the first CLI argument or by
    /// `DRONE_VIEWER_CONFIG`. Falls back to defaults when neither is set or
    /// the file cannot be read.
    pub fn from_args_or_env() -> Self {
        let path = std::env::args_os()
            .nth(1)
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        let Some(path) = path else {
            log::info!("No config given; using built-in defaults");
            return Self::default();
        };
        match Self::load_from_file(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!(
                    "Failed to load config {}: {}; using built-in defaults",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!(
            "drone_viewer_{}_{}_{}.json",
            tag,
            std::process::id(),
            nonce
        ));
        path
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let json = r#"{ "orbit": { "auto_rotate": true }, "model": { "scale": 0.1 } }"#;
        let config: ViewerConfig = serde_json::from_str(json).unwrap();
        assert!(config.orbit.auto_rotate);
        assert_eq!(config.orbit.min_distance, 5.0);
        assert_eq!(config.model.scale, 0.1);
        assert_eq!(config.model.position, [0.0, 1.05, -1.0]);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn empty_object_is_the_default_config() {
        let config: ViewerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn save_then_load_via_file() {
        let mut config = ViewerConfig::default();
        config.assets.model_path = "models/other.glb".to_string();
        config.isolation.dimmed_opacity = 0.25;
        let path = temp_path("roundtrip");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = ViewerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ViewerConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ViewerConfig::load_from_file(&temp_path("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn relative_asset_paths_resolve_against_crate_root() {
        let assets = AssetConfig::default();
        assert!(assets.model_path().is_absolute());
        assert!(assets.model_path().ends_with("public/drone_model_texturedv6.glb"));
        let absolute = std::env::temp_dir().join("model.glb");
        assert_eq!(
            resolve_asset_path(absolute.to_str().unwrap()),
            absolute
        );
    }
}
