//! Viewer Configuration
//!
//! Every field has a default, so an empty file (or none at all) is a
//! valid configuration. The file path comes from `FOS_VIZ_CONFIG`.

use anyhow::{Context, Result};
use fos_display::{CompletionMode, PixelFormat, UpdaterConfig};
use fos_render::CellMetrics;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "FOS_VIZ_CONFIG";

const DEFAULT_COLUMNS: u32 = 80;
const DEFAULT_ROWS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,

    /// Where the transport listens
    pub socket_path: PathBuf,

    /// Force 24-bit color on or off; detected from `COLORTERM` when unset
    pub true_color: Option<bool>,

    /// Terminal size in cells; `COLUMNS`/`LINES` when unset
    pub columns: Option<u32>,
    pub rows: Option<u32>,

    /// Surface pixels per terminal cell
    pub cell: CellMetrics,

    pub pixel_format: PixelFormat,
    pub completion: CompletionMode,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            socket_path: default_socket_path(),
            true_color: None,
            columns: None,
            rows: None,
            cell: CellMetrics::default(),
            pixel_format: PixelFormat::default(),
            completion: CompletionMode::default(),
        }
    }
}

impl ViewerConfig {
    /// Load from `FOS_VIZ_CONFIG`, or defaults when it is unset
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn updater(&self) -> UpdaterConfig {
        UpdaterConfig {
            pixel_format: self.pixel_format,
            completion: self.completion,
        }
    }

    /// Terminal size in cells, falling back to the environment then 80x24
    pub fn grid_size(&self) -> (u32, u32) {
        let columns = self
            .columns
            .or_else(|| env_u32("COLUMNS"))
            .unwrap_or(DEFAULT_COLUMNS);
        let rows = self.rows.or_else(|| env_u32("LINES")).unwrap_or(DEFAULT_ROWS);
        (columns, rows)
    }

    pub fn true_color(&self) -> bool {
        self.true_color.unwrap_or_else(fos_render::detect_true_color)
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("fos-viz.sock")
}
