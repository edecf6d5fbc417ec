//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/plankifier/config.toml` (user config)
//! 2. `./plankifier.toml` (project-local, or in the chosen work directory)
//! 3. An explicit `--config` file
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ConfigError, PlankifierConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "plankifier.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "plankifier";

/// Environment variable to override the user config directory.
const CONFIG_DIR_ENV: &str = "PLANKIFIER_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: PlankifierConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., malformed optional layers).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration with explicit control over every layer.
///
/// `config_dir` overrides both `PLANKIFIER_CONFIG_DIR` and the platform default.
/// `explicit` is loaded last; unlike the discovered layers, a missing or
/// malformed explicit file is an error.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = PlankifierConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if let Some(path) = explicit {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        });
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<PlankifierConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    PlankifierConfig::from_toml(&contents)
}

/// Get the user config file path.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for plankifier.
///
/// Checks `PLANKIFIER_CONFIG_DIR` first, then falls back to the platform
/// default (`~/.config/plankifier` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(
    config: &mut PlankifierConfig,
    path: &Path,
    warnings: &mut Vec<String>,
) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            debug!(path = %path.display(), "loaded config layer");
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[workflow]
name = "plankton-night-run"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.workflow().name, "plankton-night-run");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/plankifier.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path()), None)
                .unwrap();
        assert_eq!(loaded.config, PlankifierConfig::new());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_config_layered_merge() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        let explicit_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[sites]
execution_site = "user-pool"

[planner]
cleanup = "none"
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join("plankifier.toml"),
            r#"
[sites]
execution_site = "project-pool"
"#,
        )
        .unwrap();
        let explicit = explicit_dir.path().join("override.toml");
        fs::write(
            &explicit,
            r#"
[count]
output = "explicit.txt"
"#,
        )
        .unwrap();

        let loaded = load_config_with_options(
            Some(project_dir.path()),
            Some(user_dir.path()),
            Some(&explicit),
        )
        .unwrap();

        assert_eq!(loaded.config.sites().execution_site, "project-pool");
        assert_eq!(loaded.config.planner().cleanup, crate::CleanupMode::None);
        assert_eq!(loaded.config.count().output, "explicit.txt");
        assert_eq!(loaded.loaded_from().len(), 3);
    }

    #[test]
    fn test_malformed_layer_warns_but_continues() {
        let project_dir = TempDir::new().unwrap();
        let user_dir = TempDir::new().unwrap();
        fs::write(project_dir.path().join("plankifier.toml"), "not valid {{{{").unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path()), None)
                .unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let project_dir = TempDir::new().unwrap();
        let user_dir = TempDir::new().unwrap();
        let missing = project_dir.path().join("missing.toml");

        let err = load_config_with_options(
            Some(project_dir.path()),
            Some(user_dir.path()),
            Some(&missing),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
