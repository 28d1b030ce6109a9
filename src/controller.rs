//! Export orchestration
//!
//! [`ExportController`] runs one export at a time per view: theme and
//! platform are resolved once, the post is captured, a filename derived and
//! the image delivered. A second call while one is in flight is ignored.

use std::cell::{Cell, RefCell};
use std::time::{SystemTime, UNIX_EPOCH};

use scraper::ElementRef;

use crate::capture::images::{decode_data_uri, encode_data_uri};
use crate::capture::{Capture, CaptureOptions, ImagePayload};
use crate::delivery::overlay::{ObjectUrl, OverlayEvent, OverlayHost, OverlayOptions, OverlayPreview};
use crate::delivery::{DeliveryStrategy, DownloadSink, DownloadTrigger, FilenamePolicy};
use crate::platform::{Environment, PlatformClassifier};
use crate::theme::ThemeRegistry;
use crate::{Error, ExportConfig, Result};

/// Shows the single user-facing message for a failed export
pub trait Notifier {
    fn notify(&self, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for std::rc::Rc<T> {
    fn notify(&self, message: &str) {
        (**self).notify(message)
    }
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        log::error!("{}", message);
    }
}

/// Source of export timestamps (ms since the Unix epoch)
pub trait Clock {
    fn now_millis(&self) -> u64;
}

impl<F: Fn() -> u64> Clock for F {
    fn now_millis(&self) -> u64 {
        self()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// One export call's inputs. The node stays owned by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub node: ElementRef<'a>,
    pub theme_id: &'a str,
    /// Current post body; only its first line is used, for the filename
    pub text: &'a str,
    pub pixel_ratio: f32,
}

#[derive(Debug)]
pub enum ExportOutcome {
    /// A save trigger fired
    Downloaded { filename: String },
    /// The overlay is showing the image
    Previewed { filename: String, object_url: ObjectUrl },
    /// Another export was in flight
    Ignored,
    Failed(Error),
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Downloaded { .. } | ExportOutcome::Previewed { .. })
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            ExportOutcome::Downloaded { filename } | ExportOutcome::Previewed { filename, .. } => Some(filename.as_str()),
            _ => None,
        }
    }
}

/// Holds the busy flag for the lifetime of one export, including when the
/// export future is dropped early
struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct ExportController<C, D, H: OverlayHost> {
    themes: ThemeRegistry,
    classifier: PlatformClassifier,
    filenames: FilenamePolicy,
    capture: C,
    downloads: D,
    overlay: RefCell<OverlayPreview<H>>,
    notifier: Box<dyn Notifier>,
    clock: Box<dyn Clock>,
    failure_message: String,
    busy: Cell<bool>,
}

impl<C: Capture, D: DownloadSink, H: OverlayHost> ExportController<C, D, H> {
    pub fn new(config: &ExportConfig, capture: C, downloads: D, host: H) -> Self {
        Self {
            themes: ThemeRegistry::with_fallback(config.fallback_background),
            classifier: PlatformClassifier::new(config.classifier.clone()),
            filenames: FilenamePolicy::new(config.filename_fallback.clone(), config.filename_stem_limit),
            capture,
            downloads,
            overlay: RefCell::new(OverlayPreview::new(host, OverlayOptions::from_config(config))),
            notifier: Box::new(LogNotifier),
            clock: Box::new(SystemClock),
            failure_message: config.failure_message.clone(),
            busy: Cell::new(false),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Capture `request.node` and deliver it for the runtime described by `env`.
    pub async fn export_post(&self, request: ExportRequest<'_>, env: &Environment) -> ExportOutcome {
        if self.busy.get() {
            log::debug!("export already in flight, ignoring request");
            return ExportOutcome::Ignored;
        }
        let _busy = BusyGuard::acquire(&self.busy);

        match self.run(request, env).await {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("export failed: {}", err);
                self.notifier.notify(&self.failure_message);
                ExportOutcome::Failed(err)
            }
        }
    }

    async fn run(&self, request: ExportRequest<'_>, env: &Environment) -> Result<ExportOutcome> {
        let timestamp = self.clock.now_millis();
        let background = self.themes.resolve_background(request.theme_id);
        let strategy = DeliveryStrategy::for_verdict(self.classifier.classify_env(env));
        log::debug!("exporting with theme '{}' background {} via {:?}", request.theme_id, background, strategy);

        let options = CaptureOptions::new(background, request.pixel_ratio, strategy.encoding());
        let image = self.capture.capture(request.node, &options).await?;
        let filename = self.filenames.derive(request.text, request.theme_id, timestamp);

        match strategy {
            DeliveryStrategy::DirectDownload => {
                let href = match image.payload {
                    ImagePayload::DataUri(uri) => uri,
                    ImagePayload::Blob(bytes) => encode_data_uri("image/png", &bytes),
                };
                DownloadTrigger::new(filename.clone(), href).fire(&self.downloads)?;
                log::info!("download triggered: {}", filename);
                Ok(ExportOutcome::Downloaded { filename })
            }
            DeliveryStrategy::OverlayPreview => {
                let bytes = match image.payload {
                    ImagePayload::Blob(bytes) => bytes,
                    ImagePayload::DataUri(uri) => {
                        decode_data_uri(&uri).map_err(|e| Error::DeliveryFailure(e.to_string()))?.1
                    }
                };
                let object_url = self.overlay.borrow_mut().show(&bytes)?;
                log::info!("preview shown for {}", filename);
                Ok(ExportOutcome::Previewed { filename, object_url })
            }
        }
    }

    /// Route a key press or click to the overlay; true if it was dismissed
    pub fn dispatch_overlay_event(&self, event: &OverlayEvent) -> bool {
        self.overlay.borrow_mut().dispatch(event)
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay.borrow().is_visible()
    }

    /// Image element of the visible overlay, for routing clicks
    pub fn overlay_image(&self) -> Option<crate::delivery::overlay::ElementId> {
        self.overlay.borrow().image_element()
    }

    /// The hosting view is going away; tears down any visible overlay
    pub fn unmount(&self) {
        self.overlay.borrow_mut().unmount();
    }
}
