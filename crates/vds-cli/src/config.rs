use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vds_fs::{LoadConfig, SaveConfig};

/// Store root used when neither a flag nor the config file names one.
pub const DEFAULT_STORE: &str = ".vds";

/// Signing key file name inside the store root.
pub const DEFAULT_KEY_FILE: &str = "signing.key";

/// Settings read from `--config`.
///
/// ```toml
/// store = "/data/vds"
/// key_file = "/home/me/.vds.key"
///
/// [save]
/// wrap_directory = false
/// reject_invalid = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub store: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub save: SaveConfig,
    pub load: LoadConfig,
}

impl CliConfig {
    /// Read `path`, or fall back to defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// The flag wins over the file, the file over the default.
    pub fn store_root(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.store.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE))
    }

    pub fn key_path(&self, flag: Option<&Path>, store_root: &Path) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.key_file.clone())
            .unwrap_or_else(|| store_root.join(DEFAULT_KEY_FILE))
    }
}
