use serde::{Deserialize, Serialize};
use vds_store::BatchOptions;

/// Settings for one save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Ask the store to retain every object the save writes.
    pub pin: bool,
    /// Wrap the written files in a directory object. The returned address
    /// then names `dataset.json` inside that directory.
    pub wrap_directory: bool,
    /// Chunks buffered per analyzer before the body reader waits.
    pub pipe_capacity: usize,
    /// Bytes read from the body per chunk.
    pub chunk_size: usize,
    /// Fail the save when any entry fails schema validation.
    pub reject_invalid: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            pin: true,
            wrap_directory: true,
            pipe_capacity: 16,
            chunk_size: 64 * 1024,
            reject_invalid: false,
        }
    }
}

impl SaveConfig {
    pub fn with_pin(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    pub fn with_wrap_directory(mut self, wrap: bool) -> Self {
        self.wrap_directory = wrap;
        self
    }

    pub fn with_reject_invalid(mut self, reject: bool) -> Self {
        self.reject_invalid = reject;
        self
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            pin: self.pin,
            wrap_directory: self.wrap_directory,
        }
    }
}

/// Settings for reading top-level documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Extra attempts after a read that fails or returns no bytes.
    pub empty_read_retries: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            empty_read_retries: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SaveConfig::default();
        assert!(cfg.pin && cfg.wrap_directory);
        assert_eq!(cfg.pipe_capacity, 16);
        assert_eq!(cfg.chunk_size, 65536);
        assert!(!cfg.reject_invalid);
        assert_eq!(LoadConfig::default().empty_read_retries, 1);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: SaveConfig = toml::from_str("pin = false\nchunk_size = 1024\n").unwrap();
        assert!(!cfg.pin);
        assert_eq!(cfg.chunk_size, 1024);
        assert!(cfg.wrap_directory);
        assert_eq!(
            cfg.batch_options(),
            BatchOptions {
                pin: false,
                wrap_directory: true
            }
        );
    }
}
