//! Capture engine: rasterize a post subtree into a PNG
//!
//! A capture copies the subtree into a [`layout::PostSnapshot`] when the call
//! is made, loads embedded images (fresh, never from cache), lays the post
//! out, paints it over an explicit background and encodes PNG. Any failure
//! is reported once as [`Error::CaptureFailure`]; nothing is retried.

pub mod images;
pub mod layout;
pub mod paint;
pub mod raster;

use std::collections::HashMap;

use futures::future::{FutureExt, LocalBoxFuture};
use scraper::ElementRef;
use url::Url;

use crate::error::CaptureFault;
use crate::theme::Rgb;
use crate::{Error, ExportConfig, Result};
use images::{DecodedImage, ImageSource};
use layout::PostSnapshot;

/// Encoded PNG plus its pixel size
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

/// How the encoded image is handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `data:image/png;base64,...` for download triggers
    DataUri,
    /// Raw PNG bytes for object-URL backed previews
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    DataUri(String),
    Blob(Vec<u8>),
}

/// Result of a successful capture
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub payload: ImagePayload,
    pub width: u32,
    pub height: u32,
    /// Canvas fill actually used
    pub background: Rgb,
}

/// Per-call capture parameters
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub background: Rgb,
    /// Device pixels per CSS px
    pub pixel_ratio: f32,
    /// Re-fetch remote images with a unique query parameter
    pub cache_bust: bool,
    pub encoding: Encoding,
}

impl CaptureOptions {
    pub fn new(background: Rgb, pixel_ratio: f32, encoding: Encoding) -> Self {
        Self { background, pixel_ratio, cache_bust: true, encoding }
    }
}

/// Anything that can rasterize a post subtree.
///
/// The subtree must be read before the returned future is first polled.
pub trait Capture {
    fn capture<'a>(&'a self, node: ElementRef<'a>, options: &'a CaptureOptions) -> LocalBoxFuture<'a, Result<CapturedImage>>;
}

impl<T: Capture + ?Sized> Capture for std::rc::Rc<T> {
    fn capture<'a>(&'a self, node: ElementRef<'a>, options: &'a CaptureOptions) -> LocalBoxFuture<'a, Result<CapturedImage>> {
        (**self).capture(node, options)
    }
}

/// Layout limits shared by every capture
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Column width in CSS px
    pub width: u32,
    /// Upper bound on device pixels per capture
    pub max_pixels: u64,
    /// Origin of the page hosting the post; enables taint checks
    pub page_origin: Option<Url>,
}

impl CaptureSettings {
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let page_origin = config
            .page_origin
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::ConfigError(format!("invalid page_origin: {}", e)))?;
        Ok(Self { width: config.capture_width, max_pixels: config.max_pixels, page_origin })
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let cfg = ExportConfig::default();
        Self { width: cfg.capture_width, max_pixels: cfg.max_pixels, page_origin: None }
    }
}

/// The built-in rasterizer
pub struct CaptureEngine<S> {
    images: S,
    settings: CaptureSettings,
}

impl<S: ImageSource> CaptureEngine<S> {
    pub fn new(images: S, settings: CaptureSettings) -> Self {
        Self { images, settings }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    async fn load_images(&self, snapshot: &PostSnapshot, cache_bust: bool) -> std::result::Result<HashMap<String, DecodedImage>, CaptureFault> {
        let mut loaded = HashMap::new();
        for (src, cross_origin) in snapshot.images() {
            if loaded.contains_key(src) {
                continue;
            }
            let image = if src.starts_with("data:") {
                let (mime, bytes) = images::decode_data_uri(src)?;
                if !mime.starts_with("image/") {
                    return Err(CaptureFault::ImageLoad { url: mime, reason: "not an image".into() });
                }
                images::decode_image(src, &bytes)?
            } else {
                let page = self.settings.page_origin.as_ref();
                let url = images::resolve_src(src, page)?;
                images::check_origin(&url, page, cross_origin)?;
                let url = if cache_bust { images::cache_bust_url(&url) } else { url };
                log::debug!("fetching embedded image {}", url);
                let bytes = self
                    .images
                    .fetch(url.as_str())
                    .await
                    .map_err(|reason| CaptureFault::ImageLoad { url: src.to_string(), reason })?;
                images::decode_image(src, &bytes)?
            };
            loaded.insert(src.to_string(), image);
        }
        Ok(loaded)
    }

    async fn render(&self, snapshot: PostSnapshot, options: &CaptureOptions) -> Result<CapturedImage> {
        let scale = effective_ratio(options.pixel_ratio);
        let decoded = self.load_images(&snapshot, options.cache_bust).await?;
        let sizes = decoded.iter().map(|(k, v)| (k.clone(), (v.width, v.height))).collect();

        let post = layout::layout_post(&snapshot, self.settings.width, &sizes);
        let commands = paint::build_display_list(&post);
        let shot = raster::rasterize(&commands, post.width, post.height, options.background, scale, self.settings.max_pixels, &decoded)?;
        log::debug!("captured {}x{} px ({} bytes) at ratio {}", shot.width, shot.height, shot.png_data.len(), scale);

        let payload = match options.encoding {
            Encoding::DataUri => ImagePayload::DataUri(images::encode_data_uri("image/png", &shot.png_data)),
            Encoding::Blob => ImagePayload::Blob(shot.png_data),
        };
        Ok(CapturedImage { payload, width: shot.width, height: shot.height, background: options.background })
    }
}

impl<S: ImageSource> Capture for CaptureEngine<S> {
    fn capture<'a>(&'a self, node: ElementRef<'a>, options: &'a CaptureOptions) -> LocalBoxFuture<'a, Result<CapturedImage>> {
        let snapshot = PostSnapshot::from_element(node);
        self.render(snapshot, options).boxed_local()
    }
}

/// Non-finite or non-positive ratios render at 1x
fn effective_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        log::warn!("invalid pixel ratio {}, rendering at 1x", ratio);
        1.0
    }
}
