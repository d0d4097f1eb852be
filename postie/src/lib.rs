//! Settings for the `postie` command.

use std::path::{Path, PathBuf};

use postie_common::config::{SenderConfig, ServerCredentials};
use serde::Deserialize;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "POSTIE_CONFIG";

/// Locations tried, in order, when neither `--config` nor [`CONFIG_ENV`]
/// is given.
pub const DEFAULT_PATHS: [&str; 2] = ["./postie.config.ron", "/etc/postie/postie.config.ron"];

/// Contents of `postie.config.ron`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server: ServerCredentials,
    #[serde(default)]
    pub sender: SenderConfig,
    /// Sender address used when `--from` is not given.
    #[serde(default)]
    pub from: Option<String>,
}

impl Settings {
    /// Reads and parses a settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid RON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
    }

    /// The envelope sender: the override, else the configured default, else
    /// the login.
    #[must_use]
    pub fn sender_address(&self, from: Option<&str>) -> String {
        from.or(self.from.as_deref())
            .unwrap_or(&self.server.login)
            .to_string()
    }
}

/// Find the settings file using the following precedence:
/// 1. `--config`
/// 2. `POSTIE_CONFIG` environment variable
/// 3. each of `candidates`, in order
///
/// # Errors
///
/// Returns an error if an explicitly named file does not exist, or if none
/// of the candidates do.
pub fn find_config_file(
    explicit: Option<PathBuf>,
    env: Option<String>,
    candidates: &[&str],
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Some(env_path) = env {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("{CONFIG_ENV} points to non-existent file: {}", path.display());
    }

    if let Some(path) = candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
    {
        return Ok(path);
    }

    let paths_tried = candidates
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - --config\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}
