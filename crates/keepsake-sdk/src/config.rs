//! `keepsake.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use keepsake_docstore::DEFAULT_CAPACITY;
use keepsake_export::{ExportOptions, DEFAULT_ITEM_TIMEOUT, DEFAULT_SIZE_BUDGET};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaStoreConfig {
    /// When false the binary store reports itself unavailable and new media
    /// is held for the current session only.
    pub enabled: bool,
}

impl Default for MediaStoreConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub size_budget: u64,
    pub item_timeout_ms: u64,
    /// Directory that bundled asset paths (`assets/...`) resolve against.
    pub asset_root: Option<PathBuf>,
    pub title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            size_budget: DEFAULT_SIZE_BUDGET,
            item_timeout_ms: DEFAULT_ITEM_TIMEOUT.as_millis() as u64,
            asset_root: None,
            title: "Our Story".to_string(),
        }
    }
}

/// Runtime configuration. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsakeConfig {
    /// Root of both stores.
    pub data_dir: PathBuf,
    /// Byte ceiling of the structured document store.
    pub document_store_capacity: u64,
    pub media_store: MediaStoreConfig,
    pub export: ExportConfig,
}

impl Default for KeepsakeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".keepsake"),
            document_store_capacity: DEFAULT_CAPACITY,
            media_store: MediaStoreConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl KeepsakeConfig {
    pub const FILE_NAME: &'static str = "keepsake.toml";

    /// Defaults rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> SdkResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Directory of the binary object store.
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    /// File backing the structured document store.
    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            size_budget: self.export.size_budget,
            item_timeout: Duration::from_millis(self.export.item_timeout_ms),
            title: self.export.title.clone(),
        }
    }
}
