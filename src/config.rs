//! Export configuration
//!
//! Every field has a default so a config file only needs to name what it
//! changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::ClassifierConfig;
use crate::theme::{Rgb, FALLBACK_BACKGROUND};
use crate::{Error, Result};

/// Configuration for the export pipeline
///
/// # Examples
///
/// ```
/// let cfg = greentext_export::ExportConfig::from_json_str(r#"{ "capture_width": 600 }"#).unwrap();
/// assert_eq!(cfg.capture_width, 600);
/// assert_eq!(cfg.dismiss_key, "Escape");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Width of the captured post in CSS px
    pub capture_width: u32,
    /// Maximum device pixels a single capture may allocate
    pub max_pixels: u64,
    /// Origin of the page hosting the post (enables cross-origin taint checks)
    pub page_origin: Option<String>,
    /// Background for unknown theme ids
    pub fallback_background: Rgb,
    /// Filename stem used when the post's first line is empty
    pub filename_fallback: String,
    /// Maximum length of the sanitized filename stem
    pub filename_stem_limit: usize,
    /// Directory receiving direct downloads
    pub download_dir: PathBuf,
    /// Key that dismisses the preview overlay
    pub dismiss_key: String,
    /// Caption shown under the preview
    pub instruction_text: String,
    /// Label of the overlay close control
    pub close_label: String,
    /// User-facing message on a failed export
    pub failure_message: String,
    /// Timeout for re-fetching embedded images
    pub fetch_timeout_ms: u64,
    /// User agent sent when re-fetching embedded images
    pub fetch_user_agent: String,
    pub classifier: ClassifierConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            capture_width: 480,
            max_pixels: 40_000_000,
            page_origin: None,
            fallback_background: FALLBACK_BACKGROUND,
            filename_fallback: "greentext".to_string(),
            filename_stem_limit: 20,
            download_dir: PathBuf::from("."),
            dismiss_key: "Escape".to_string(),
            instruction_text: "Press and hold the image to save it".to_string(),
            close_label: "Close".to_string(),
            failure_message: "Error saving image. Please try again.".to_string(),
            fetch_timeout_ms: 15_000,
            fetch_user_agent: concat!("greentext-export/", env!("CARGO_PKG_VERSION")).to_string(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ExportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture_width == 0 {
            return Err(Error::ConfigError("capture_width must be positive".into()));
        }
        if self.max_pixels == 0 {
            return Err(Error::ConfigError("max_pixels must be positive".into()));
        }
        if self.filename_stem_limit == 0 {
            return Err(Error::ConfigError("filename_stem_limit must be positive".into()));
        }
        if self.dismiss_key.is_empty() {
            return Err(Error::ConfigError("dismiss_key must not be empty".into()));
        }
        Ok(())
    }
}
