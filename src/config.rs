// Pipeline configuration
// Loaded from an optional JSON file; every field has a default so a partial
// file (or no file) is valid. CLI flags override what is loaded here.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_FILENAME, DEFAULT_CONFIDENCE, DEFAULT_IOU, DEFAULT_MODEL_PATH, DEFAULT_STATIC_PREFIX,
    DEFAULT_WORKSPACE, TRANSCODE_TIMEOUT_SECS,
};
use crate::error::{PpeWatchError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Root holding uploads/ and output/.
    pub workspace: PathBuf,
    /// Prefix for video locators handed to the web layer.
    pub static_prefix: String,
    pub model_path: PathBuf,
    /// Class-id -> label JSON for the model. Defaults to `<model>.labels.json`.
    pub labels_path: Option<PathBuf>,
    pub confidence: f32,
    pub iou: f32,
    pub transcode_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            static_prefix: DEFAULT_STATIC_PREFIX.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: None,
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
            transcode_timeout_secs: TRANSCODE_TIMEOUT_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PpeWatchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&raw)
            .map_err(|e| PpeWatchError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, else the per-user config file if present,
    /// else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                log::debug!("Using config {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(PpeWatchError::Config(format!(
                "confidence must be within 0..=1, got {}",
                self.confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.iou) {
            return Err(PpeWatchError::Config(format!(
                "iou must be within 0..=1, got {}",
                self.iou
            )));
        }
        if self.transcode_timeout_secs == 0 {
            return Err(PpeWatchError::Config(
                "transcodeTimeoutSecs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolved_labels_path(&self) -> PathBuf {
        self.labels_path
            .clone()
            .unwrap_or_else(|| self.model_path.with_extension("labels.json"))
    }
}

/// Per-user config location, e.g. ~/.config/ppe-watch/config.json on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ppe-watch").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}
