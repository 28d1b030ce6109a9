//! Embedded image loading
//!
//! Remote images are always re-fetched through an [`ImageSource`] with a
//! cache-busting query parameter; `data:` images are decoded in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use futures::future::{FutureExt, LocalBoxFuture};
use url::Url;

use crate::error::CaptureFault;

/// Query parameter appended to remote image URLs
pub const CACHE_BUST_PARAM: &str = "cacheBust";

/// Decoded 8-bit RGBA pixels
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let i = ((y * self.width + x) * 4) as usize;
        (self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3])
    }
}

/// Fetches raw image bytes for a fully resolved URL
pub trait ImageSource {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, String>>;
}

impl<T: ImageSource + ?Sized> ImageSource for std::rc::Rc<T> {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, String>> {
        (**self).fetch(url)
    }
}

/// Source that refuses every remote image (only `data:` images render)
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineImages;

impl ImageSource for OfflineImages {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, String>> {
        let msg = format!("network access disabled for {}", url);
        async move { Err(msg) }.boxed_local()
    }
}

/// HTTP-backed image source
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpImages {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpImages {
    pub fn new(user_agent: &str, timeout_ms: u64) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| crate::Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl ImageSource for HttpImages {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, String>> {
        use reqwest::header::{CACHE_CONTROL, PRAGMA};

        async move {
            let res = self
                .client
                .get(url)
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache")
                .send()
                .await
                .map_err(|e| format!("HTTP GET failed: {}", e))?
                .error_for_status()
                .map_err(|e| e.to_string())?;
            let body = res.bytes().await.map_err(|e| format!("Failed to read response body: {}", e))?;
            Ok(body.to_vec())
        }
        .boxed_local()
    }
}

static BUST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Append a unique `cacheBust` parameter so intermediaries cannot serve a stale copy
pub fn cache_bust_url(url: &Url) -> Url {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = BUST_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut busted = url.clone();
    busted
        .query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &format!("{}{}", millis, seq));
    busted
}

/// Resolve an `img src` against the page origin
pub fn resolve_src(src: &str, page_origin: Option<&Url>) -> Result<Url, CaptureFault> {
    let parsed = match page_origin {
        Some(base) => base.join(src),
        None => Url::parse(src),
    };
    parsed.map_err(|e| CaptureFault::ImageLoad { url: src.to_string(), reason: e.to_string() })
}

/// A cross-origin image without CORS opt-in taints the canvas
pub fn check_origin(src: &Url, page_origin: Option<&Url>, cross_origin: bool) -> Result<(), CaptureFault> {
    match page_origin {
        Some(page) if !cross_origin && src.origin() != page.origin() => Err(CaptureFault::Tainted(src.to_string())),
        _ => Ok(()),
    }
}

/// Split a base64 `data:` URI into `(mime, bytes)`
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), CaptureFault> {
    let fail = |reason: &str| CaptureFault::ImageLoad { url: abbreviate(uri), reason: reason.to_string() };
    let rest = uri.strip_prefix("data:").ok_or_else(|| fail("not a data URI"))?;
    let (meta, payload) = rest.split_once(',').ok_or_else(|| fail("missing payload"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| fail("only base64 data URIs are supported"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| fail(&e.to_string()))?;
    Ok((mime.to_ascii_lowercase(), bytes))
}

/// Encode bytes as a base64 `data:` URI
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn abbreviate(uri: &str) -> String {
    uri.chars().take(48).collect()
}

/// Decode fetched bytes in any format the `image` crate recognizes
pub fn decode_image(url: &str, bytes: &[u8]) -> Result<DecodedImage, CaptureFault> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CaptureFault::ImageLoad { url: abbreviate(url), reason: e.to_string() })?
        .to_rgba8();
    Ok(DecodedImage { width: img.width(), height: img.height(), rgba: img.into_raw() })
}
