//! Export filename derivation
//!
//! `<stem>_<theme>_<millis>.png`, where the stem comes from the first line
//! of the post body reduced to lowercase ASCII words joined by `_`.

/// Stand-in segments for a stem or theme id with nothing filename-safe in it
const DEFAULT_STEM: &str = "greentext";
const DEFAULT_THEME: &str = "theme";

/// Stem limits applied to the post's first line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenamePolicy {
    pub fallback: String,
    pub stem_limit: usize,
}

impl Default for FilenamePolicy {
    fn default() -> Self {
        Self { fallback: "greentext".to_string(), stem_limit: 20 }
    }
}

impl FilenamePolicy {
    pub fn new(fallback: impl Into<String>, stem_limit: usize) -> Self {
        Self { fallback: fallback.into(), stem_limit }
    }

    /// Filename for a post body exported with `theme_id` at `timestamp_ms`
    pub fn derive(&self, body: &str, theme_id: &str, timestamp_ms: u64) -> String {
        let first_line = body.lines().next().unwrap_or("");
        let mut stem = sanitize(first_line, Some(self.stem_limit));
        if stem.is_empty() {
            stem = sanitize(&self.fallback, Some(self.stem_limit));
        }
        if stem.is_empty() {
            stem = DEFAULT_STEM.to_string();
        }
        let mut theme = sanitize(theme_id, None);
        if theme.is_empty() {
            theme = DEFAULT_THEME.to_string();
        }
        format!("{}_{}_{}.png", stem, theme, timestamp_ms)
    }
}

/// Filename using the default policy
pub fn derive_filename(body: &str, theme_id: &str, timestamp_ms: u64) -> String {
    FilenamePolicy::default().derive(body, theme_id, timestamp_ms)
}

/// Lowercase, keep `[a-z0-9]`, collapse every other run into one `_`
/// (never leading or trailing), then cut to `limit` characters.
fn sanitize(seed: &str, limit: Option<usize>) -> String {
    let mut out = String::with_capacity(seed.len());
    let mut gap = false;
    for c in seed.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out.trim_end_matches('_').to_string()
}
