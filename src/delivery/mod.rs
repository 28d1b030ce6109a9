//! Delivery of a captured image: direct download or overlay preview

pub mod download;
pub mod filename;
pub mod overlay;

pub use download::{DirectoryDownloads, DownloadSink, DownloadTrigger};
pub use filename::{derive_filename, FilenamePolicy};
pub use overlay::{MemoryDocument, OverlayEvent, OverlayHost, OverlayOptions, OverlayPhase, OverlayPreview};

use crate::capture::Encoding;
use crate::platform::Verdict;

/// Delivery flow, chosen once per export from the platform verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    DirectDownload,
    OverlayPreview,
}

impl DeliveryStrategy {
    pub fn for_verdict(verdict: Verdict) -> Self {
        if verdict.restricted_download {
            DeliveryStrategy::OverlayPreview
        } else {
            DeliveryStrategy::DirectDownload
        }
    }

    /// Encoding the capture step should produce for this flow
    pub fn encoding(self) -> Encoding {
        match self {
            DeliveryStrategy::DirectDownload => Encoding::DataUri,
            DeliveryStrategy::OverlayPreview => Encoding::Blob,
        }
    }
}
