//! Full-viewport preview for platforms that ignore download triggers
//!
//! [`OverlayPreview`] owns the only overlay instance. Every exit path
//! (dismiss key, image click, close control, `hide`, `unmount`, drop) runs
//! the same teardown, which revokes the object URL, removes the inserted
//! elements and removes the key listener. `show` tears down any previous
//! instance before building a new one.

pub mod host;

pub use host::{ElementId, ElementSpec, ListenerId, MemoryDocument, ObjectUrl, OverlayHost};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayOptions {
    pub dismiss_key: String,
    pub instruction_text: String,
    pub close_label: String,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        let cfg = crate::ExportConfig::default();
        Self::from_config(&cfg)
    }
}

impl OverlayOptions {
    pub fn from_config(config: &crate::ExportConfig) -> Self {
        Self {
            dismiss_key: config.dismiss_key.clone(),
            instruction_text: config.instruction_text.clone(),
            close_label: config.close_label.clone(),
        }
    }
}

/// Input events routed to a visible overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    Key(String),
    Click(ElementId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Hidden,
    Visible,
}

#[derive(Debug, Default)]
struct OverlayState {
    object_url: Option<ObjectUrl>,
    elements: Vec<ElementId>,
    image: Option<ElementId>,
    close: Option<ElementId>,
    listener: Option<ListenerId>,
}

impl OverlayState {
    fn dismisses_on_click(&self, id: ElementId) -> bool {
        self.image == Some(id) || self.close == Some(id)
    }
}

/// Release everything an overlay acquired, in reverse order of acquisition
fn teardown<H: OverlayHost>(host: &H, state: OverlayState) {
    if let Some(listener) = state.listener {
        host.remove_key_listener(listener);
    }
    for id in state.elements.into_iter().rev() {
        host.remove_element(id);
    }
    if let Some(url) = state.object_url {
        host.revoke_object_url(&url);
    }
}

/// Singleton overlay manager over an injected host
pub struct OverlayPreview<H: OverlayHost> {
    host: H,
    options: OverlayOptions,
    state: Option<OverlayState>,
}

impl<H: OverlayHost> OverlayPreview<H> {
    pub fn new(host: H, options: OverlayOptions) -> Self {
        Self { host, options, state: None }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn phase(&self) -> OverlayPhase {
        if self.state.is_some() {
            OverlayPhase::Visible
        } else {
            OverlayPhase::Hidden
        }
    }

    pub fn is_visible(&self) -> bool {
        self.phase() == OverlayPhase::Visible
    }

    pub fn object_url(&self) -> Option<&ObjectUrl> {
        self.state.as_ref().and_then(|s| s.object_url.as_ref())
    }

    pub fn image_element(&self) -> Option<ElementId> {
        self.state.as_ref().and_then(|s| s.image)
    }

    pub fn close_element(&self) -> Option<ElementId> {
        self.state.as_ref().and_then(|s| s.close)
    }

    /// Show `png` full-viewport, replacing any visible overlay.
    ///
    /// On failure nothing acquired by this call stays alive.
    pub fn show(&mut self, png: &[u8]) -> Result<ObjectUrl> {
        self.hide();
        let mut state = OverlayState::default();
        match self.build(&mut state, png) {
            Ok(url) => {
                log::debug!("overlay visible with {}", url.as_str());
                self.state = Some(state);
                Ok(url)
            }
            Err(e) => {
                teardown(&self.host, state);
                Err(e)
            }
        }
    }

    fn build(&self, state: &mut OverlayState, png: &[u8]) -> Result<ObjectUrl> {
        let url = self.host.create_object_url(png, "image/png")?;
        state.object_url = Some(url.clone());

        state.elements.push(self.host.append_element(ElementSpec::Backdrop)?);

        let image = self.host.append_element(ElementSpec::Image {
            src: url.as_str().to_string(),
            alt: "Greentext".to_string(),
        })?;
        state.elements.push(image);
        state.image = Some(image);

        state.elements.push(self.host.append_element(ElementSpec::Caption {
            text: self.options.instruction_text.clone(),
        })?);

        let close = self.host.append_element(ElementSpec::CloseButton {
            label: self.options.close_label.clone(),
        })?;
        state.elements.push(close);
        state.close = Some(close);

        state.listener = Some(self.host.add_key_listener(&self.options.dismiss_key)?);
        Ok(url)
    }

    /// Tear down the visible overlay, if any
    pub fn hide(&mut self) {
        if let Some(state) = self.state.take() {
            teardown(&self.host, state);
            log::debug!("overlay hidden");
        }
    }

    /// Route an input event; returns whether it dismissed the overlay
    pub fn dispatch(&mut self, event: &OverlayEvent) -> bool {
        let Some(state) = self.state.as_ref() else { return false };
        let dismiss = match event {
            OverlayEvent::Key(key) => *key == self.options.dismiss_key,
            OverlayEvent::Click(id) => state.dismisses_on_click(*id),
        };
        if dismiss {
            self.hide();
        }
        dismiss
    }

    /// The hosting view is going away
    pub fn unmount(&mut self) {
        self.hide();
    }
}

impl<H: OverlayHost> Drop for OverlayPreview<H> {
    fn drop(&mut self) {
        self.hide();
    }
}
