// ABOUTME: Configuration loader - discovers project, user, and runtime layers.
// ABOUTME: Missing files are skipped; unreadable or malformed ones fail fast.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::partial::ConfigLayer;
use crate::agent::Layer;
use crate::error::ConfigError;

/// Directory (under a project root or the user config dir) holding definitions.
pub const CONFIG_DIR: &str = ".delegate";

/// File name of an agent definition document.
pub const AGENTS_FILE: &str = "agents.json";

/// Discovers and loads agent definition layers.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Path of the project-level definitions under `root`.
    pub fn project_path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(AGENTS_FILE)
    }

    /// Path of the user-level definitions, if the platform has a config dir.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("delegate").join(AGENTS_FILE))
    }

    /// Load a definition file. Returns `Ok(None)` if it does not exist.
    pub fn load_file(layer: Layer, path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no agent definitions file");
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        ConfigLayer::from_json(layer, path.display().to_string(), &content).map(Some)
    }

    /// Load a runtime layer from inline JSON or from a path to a JSON file.
    ///
    /// A value naming an existing file is read; anything else is parsed as JSON.
    pub fn load_runtime(value: &str) -> Result<ConfigLayer, ConfigError> {
        let path = Path::new(value);
        if path.is_file() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            return ConfigLayer::from_json(Layer::Runtime, path.display().to_string(), &content);
        }
        ConfigLayer::from_json(Layer::Runtime, "runtime", value)
    }

    /// Discover every configured layer, highest precedence first.
    pub fn discover(
        project_root: Option<&Path>,
        user_path: Option<&Path>,
        runtime: Option<&str>,
    ) -> Result<Vec<ConfigLayer>, ConfigError> {
        let mut layers = Vec::new();
        if let Some(runtime) = runtime {
            layers.push(Self::load_runtime(runtime)?);
        }
        if let Some(root) = project_root {
            if let Some(layer) = Self::load_file(Layer::Project, &Self::project_path(root))? {
                layers.push(layer);
            }
        }
        if let Some(path) = user_path {
            if let Some(layer) = Self::load_file(Layer::User, path)? {
                layers.push(layer);
            }
        }
        Ok(layers)
    }
}
