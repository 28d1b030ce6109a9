//! Greentext Export
//!
//! Captures a rendered greentext post as a PNG and hands it to the user in
//! the way the runtime supports: a direct download where programmatic saves
//! work, or a full-viewport "press and hold to save" overlay where they don't.
//!
//! # Pipeline
//!
//! - **ThemeRegistry** resolves the theme's concrete background color
//! - **PlatformClassifier** decides between download and overlay
//! - **CaptureEngine** rasterizes the post subtree over that background
//! - **DeliveryStrategy** saves the file or shows the overlay
//! - **ExportController** serializes exports behind a busy flag
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use greentext_export::{
//!     compose::PostDraft, DirectoryDownloads, Environment, ExportConfig, ExportController,
//!     ExportRequest, MemoryDocument, ThemeRegistry,
//! };
//! use scraper::{Html, Selector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig::default();
//! let themes = ThemeRegistry::new();
//! let draft = PostDraft::default();
//! let html = Html::parse_fragment(&draft.render_markup(themes.get("classic").unwrap()));
//! let post = Selector::parse(".post").unwrap();
//! let node = html.select(&post).next().unwrap();
//!
//! let controller = ExportController::new(
//!     &config,
//!     greentext_export::new_capture_engine(&config)?,
//!     DirectoryDownloads::new(&config.download_dir),
//!     Rc::new(MemoryDocument::new()),
//! );
//! let outcome = controller
//!     .export_post(
//!         ExportRequest { node, theme_id: "classic", text: &draft.body, pixel_ratio: 2.0 },
//!         &Environment::desktop(),
//!     )
//!     .await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{CaptureFault, Error, Result};

pub mod config;
pub use config::ExportConfig;

// Board themes and background resolution
pub mod theme;
pub use theme::{Rgb, ThemeDefinition, ThemeRegistry};

// Download-capability heuristics
pub mod platform;
pub use platform::{Environment, PlatformClassifier, Verdict};

// Rasterization of a post subtree
pub mod capture;
pub use capture::{Capture, CaptureEngine, CaptureOptions, CaptureSettings, CapturedImage, Encoding, ImagePayload};

// Direct download and overlay preview
pub mod delivery;
pub use delivery::{
    DeliveryStrategy, DirectoryDownloads, DownloadSink, MemoryDocument, OverlayEvent, OverlayHost, OverlayPreview,
};

pub mod controller;
pub use controller::{Clock, ExportController, ExportOutcome, ExportRequest, LogNotifier, Notifier, SystemClock};

// Draft-to-markup composer
pub mod compose;

/// Create a capture engine with the default image source.
///
/// With the `http` feature (default) remote images embedded in a post are
/// re-fetched over HTTP; without it only `data:` images are rendered.
#[cfg(feature = "http")]
pub fn new_capture_engine(config: &ExportConfig) -> Result<CaptureEngine<impl capture::images::ImageSource>> {
    let images = capture::images::HttpImages::new(&config.fetch_user_agent, config.fetch_timeout_ms)?;
    Ok(CaptureEngine::new(images, CaptureSettings::from_config(config)?))
}

#[cfg(not(feature = "http"))]
pub fn new_capture_engine(config: &ExportConfig) -> Result<CaptureEngine<impl capture::images::ImageSource>> {
    Ok(CaptureEngine::new(capture::images::OfflineImages, CaptureSettings::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_default_config() {
        let engine = new_capture_engine(&ExportConfig::default()).expect("engine");
        assert_eq!(engine.settings().width, 480);
        assert!(engine.settings().page_origin.is_none());
    }
}
