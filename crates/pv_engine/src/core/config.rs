//! # Viewer Configuration
//!
//! Configuration structures for the window, the Vulkan backend and the assets the
//! viewer loads. Every structure has a `Default` carrying the built-in constants, so
//! the viewer runs with no configuration file at all.
//!
//! ## Configuration Categories
//!
//! - **Window Config**: title and initial size
//! - **Render Config**: application metadata, validation layers, shader paths
//! - **Asset Config**: mesh and texture locations
//! - **Application Config**: the aggregate loaded from TOML or RON

use serde::{Serialize, Deserialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Initial window width in pixels
pub const DEFAULT_WINDOW_WIDTH: u32 = 800;

/// Initial window height in pixels
pub const DEFAULT_WINDOW_HEIGHT: u32 = 600;

/// Window title
pub const DEFAULT_WINDOW_TITLE: &str = "PV Vulkan Renderer";

/// Compiled vertex shader file name
pub const DEFAULT_VERTEX_SHADER: &str = "model.vert.spv";

/// Compiled fragment shader file name
pub const DEFAULT_FRAGMENT_SHADER: &str = "model.frag.spv";

/// Mesh loaded at startup
pub const DEFAULT_MODEL_PATH: &str = "resources/models/model.obj";

/// Texture loaded at startup
pub const DEFAULT_TEXTURE_PATH: &str = "resources/textures/texture.png";

/// # Shader Configuration
///
/// Locations of the one fixed vertex/fragment SPIR-V pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the build output directory first, then a few locations that make sense
    /// when the binary is started from somewhere other than the workspace root.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "../target/shaders/",
            "../../target/shaders/",
            "shaders/",
        ];

        let find = |file: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{dir}{file}"))
                .find(|candidate| Path::new(candidate).exists())
        };

        Self {
            vertex_shader_path: find(base_vertex)
                .unwrap_or_else(|| format!("{}{base_vertex}", shader_dirs[0])),
            fragment_shader_path: find(base_fragment)
                .unwrap_or_else(|| format!("{}{base_fragment}", shader_dirs[0])),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("Shader not found: {path}")));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl WindowConfig {
    /// Set the window title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the initial window size
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_WINDOW_TITLE.to_string(),
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

/// # Vulkan Renderer Configuration
///
/// Configuration specific to the Vulkan backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulkanRendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            shaders: ShaderConfig::default(),
            enable_validation: None,
        }
    }

    /// Set application version
    #[must_use]
    pub const fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Enable or disable validation layers
    #[must_use]
    pub const fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be requested
    ///
    /// Validation is only ever compiled into debug builds.
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.enable_validation.unwrap_or(true)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }
        self.shaders.validate()
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_TITLE)
    }
}

/// # Asset Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Wavefront OBJ file holding the displayed mesh
    pub model_path: String,
    /// Image file sampled by the fragment shader
    pub texture_path: String,
}

impl AssetConfig {
    /// Set the model path
    #[must_use]
    pub fn with_model(mut self, path: impl Into<String>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Set the texture path
    #[must_use]
    pub fn with_texture(mut self, path: impl Into<String>) -> Self {
        self.texture_path = path.into();
        self
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            texture_path: DEFAULT_TEXTURE_PATH.to_string(),
        }
    }
}

/// # Application Configuration
///
/// Everything the viewer needs to start. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Vulkan backend settings
    pub renderer: VulkanRendererConfig,
    /// Asset locations
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// Set the fallback log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Log level to hand to the logger, `info` when unset
    pub fn effective_log_level(&self) -> &str {
        if self.log_level.is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;
        self.renderer.validate()
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults_match_builtin_constants() {
        let config = ApplicationConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.assets.model_path, DEFAULT_MODEL_PATH);
        assert_eq!(config.assets.texture_path, DEFAULT_TEXTURE_PATH);
        assert!(config.renderer.shaders.vertex_shader_path.ends_with(DEFAULT_VERTEX_SHADER));
        assert!(config.renderer.shaders.fragment_shader_path.ends_with(DEFAULT_FRAGMENT_SHADER));
        assert_eq!(config.effective_log_level(), "info");
    }

    #[test]
    fn test_window_validation_rejects_zero_size() {
        let config = WindowConfig::default().with_size(0, 600);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(WindowConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_shader_fails_validation() {
        let shaders = ShaderConfig::new("does/not/exist.vert.spv", "does/not/exist.frag.spv");
        assert!(shaders.validate().is_err());

        let renderer = VulkanRendererConfig::new("").with_shaders(shaders);
        assert!(renderer.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "config.toml");
        let config = ApplicationConfig::default()
            .with_log_level("debug");
        let config = ApplicationConfig {
            window: config.window.clone().with_title("Round Trip").with_size(1024, 768),
            assets: AssetConfig::default().with_model("cube.obj"),
            ..config
        };

        config.save_to_file(&path).unwrap();
        let loaded = ApplicationConfig::load_from_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "partial.ron");
        std::fs::write(&path, "(log_level: \"warn\")").unwrap();
        let loaded = ApplicationConfig::load_from_file(&path).unwrap();

        assert_eq!(loaded.log_level, "warn");
        assert_eq!(loaded.window, WindowConfig::default());
        assert_eq!(loaded.assets, AssetConfig::default());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "config.json");
        std::fs::write(&path, "{}").unwrap();
        let result = ApplicationConfig::load_from_file(&path);

        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
