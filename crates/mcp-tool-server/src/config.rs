//! Tool server configuration

use std::path::PathBuf;

/// Tool server configuration
#[derive(Clone, Debug)]
pub struct ToolServerConfig {
    /// Directory `read_file` is confined to
    pub root: PathBuf,

    /// Largest file `read_file` will return
    pub max_file_bytes: u64,
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            max_file_bytes: 1024 * 1024,
        }
    }
}

impl ToolServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: std::env::var("TOOL_SERVER_ROOT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map_or(defaults.root, PathBuf::from),
            max_file_bytes: std::env::var("TOOL_SERVER_MAX_FILE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_file_bytes),
        }
    }
}
