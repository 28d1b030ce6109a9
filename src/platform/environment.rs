//! Runtime signals used to pick a delivery flow

use serde::{Deserialize, Serialize};

/// Identification strings reported by the runtime the export runs in.
///
/// These mirror `navigator.userAgent`, `navigator.platform` and
/// `navigator.maxTouchPoints` and are only ever read by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub user_agent: String,
    pub platform: String,
    pub max_touch_points: u32,
}

impl Environment {
    pub fn new(user_agent: impl Into<String>, platform: impl Into<String>, max_touch_points: u32) -> Self {
        Self {
            user_agent: user_agent.into(),
            platform: platform.into(),
            max_touch_points,
        }
    }

    /// A conventional desktop browser without touch support
    pub fn desktop() -> Self {
        Self::new(
            "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0",
            "Linux x86_64",
            0,
        )
    }
}
