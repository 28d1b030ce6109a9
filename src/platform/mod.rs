//! Platform classification: can this runtime honor a programmatic download?
//!
//! The verdict is a heuristic over identification strings. It is kept
//! behind [`PlatformClassifier`] so callers and tests can feed synthetic
//! signals and so the token lists can change without touching the pipeline.

pub mod environment;

pub use environment::Environment;

use serde::{Deserialize, Serialize};

/// Result of classifying a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// The runtime ignores programmatic download triggers
    pub restricted_download: bool,
}

/// Token lists driving the classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Substrings of a user agent that identify handheld devices
    pub handheld_tokens: Vec<String>,
    /// Platform strings that handheld devices report while being touch-only
    pub desktop_touch_platforms: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            handheld_tokens: vec!["iPhone".into(), "iPad".into(), "iPod".into()],
            desktop_touch_platforms: vec!["MacIntel".into()],
        }
    }
}

/// Decides between direct download and the overlay preview
#[derive(Debug, Clone, Default)]
pub struct PlatformClassifier {
    config: ClassifierConfig,
}

impl PlatformClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify raw signals. Never fails; unknown agents are unrestricted.
    pub fn classify(&self, user_agent: &str, platform: &str, max_touch_points: u32) -> Verdict {
        let handheld = self
            .config
            .handheld_tokens
            .iter()
            .any(|t| !t.is_empty() && user_agent.contains(t.as_str()));

        let touch_desktop = max_touch_points > 0
            && self
                .config
                .desktop_touch_platforms
                .iter()
                .any(|p| p == platform);

        Verdict {
            restricted_download: handheld || touch_desktop,
        }
    }

    pub fn classify_env(&self, env: &Environment) -> Verdict {
        self.classify(&env.user_agent, &env.platform, env.max_touch_points)
    }
}
