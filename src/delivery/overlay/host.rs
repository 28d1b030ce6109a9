//! Document capabilities the overlay needs, plus an in-memory document

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Handle to in-memory binary data, valid until revoked
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectUrl(pub String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Elements the overlay inserts into the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementSpec {
    /// Full-viewport dimmed layer
    Backdrop,
    Image { src: String, alt: String },
    Caption { text: String },
    CloseButton { label: String },
}

/// Injected document/window capabilities
pub trait OverlayHost {
    fn create_object_url(&self, data: &[u8], mime: &str) -> Result<ObjectUrl>;
    fn revoke_object_url(&self, url: &ObjectUrl);
    /// Insert an element at the top of the page
    fn append_element(&self, spec: ElementSpec) -> Result<ElementId>;
    fn remove_element(&self, id: ElementId);
    /// Listen for key presses of `key` on the window
    fn add_key_listener(&self, key: &str) -> Result<ListenerId>;
    fn remove_key_listener(&self, id: ListenerId);
}

impl<T: OverlayHost + ?Sized> OverlayHost for std::rc::Rc<T> {
    fn create_object_url(&self, data: &[u8], mime: &str) -> Result<ObjectUrl> {
        (**self).create_object_url(data, mime)
    }
    fn revoke_object_url(&self, url: &ObjectUrl) {
        (**self).revoke_object_url(url)
    }
    fn append_element(&self, spec: ElementSpec) -> Result<ElementId> {
        (**self).append_element(spec)
    }
    fn remove_element(&self, id: ElementId) {
        (**self).remove_element(id)
    }
    fn add_key_listener(&self, key: &str) -> Result<ListenerId> {
        (**self).add_key_listener(key)
    }
    fn remove_key_listener(&self, id: ListenerId) {
        (**self).remove_key_listener(id)
    }
}

#[derive(Debug, Default)]
struct DocState {
    next_id: u64,
    detached: bool,
    elements: BTreeMap<ElementId, ElementSpec>,
    blobs: BTreeMap<ObjectUrl, Vec<u8>>,
    revoked: BTreeSet<ObjectUrl>,
    listeners: BTreeMap<ListenerId, String>,
}

impl DocState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A page held in memory. Used headless and in tests to observe exactly
/// which elements, object URLs and listeners are alive.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    state: RefCell<DocState>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the overlay container being gone; appends fail until reattached
    pub fn detach(&self) {
        self.state.borrow_mut().detached = true;
    }

    pub fn attach(&self) {
        self.state.borrow_mut().detached = false;
    }

    pub fn elements(&self) -> Vec<(ElementId, ElementSpec)> {
        self.state.borrow().elements.iter().map(|(id, s)| (*id, s.clone())).collect()
    }

    pub fn element_count(&self) -> usize {
        self.state.borrow().elements.len()
    }

    pub fn image_count(&self) -> usize {
        self.state
            .borrow()
            .elements
            .values()
            .filter(|s| matches!(s, ElementSpec::Image { .. }))
            .count()
    }

    pub fn live_object_urls(&self) -> Vec<ObjectUrl> {
        self.state.borrow().blobs.keys().cloned().collect()
    }

    pub fn is_revoked(&self, url: &ObjectUrl) -> bool {
        self.state.borrow().revoked.contains(url)
    }

    /// Bytes behind a live object URL
    pub fn blob(&self, url: &ObjectUrl) -> Option<Vec<u8>> {
        self.state.borrow().blobs.get(url).cloned()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn listener_keys(&self) -> Vec<String> {
        self.state.borrow().listeners.values().cloned().collect()
    }
}

impl OverlayHost for MemoryDocument {
    fn create_object_url(&self, data: &[u8], mime: &str) -> Result<ObjectUrl> {
        let mut st = self.state.borrow_mut();
        let id = st.next();
        let url = ObjectUrl(format!("blob:memory/{}/{}", mime, id));
        st.blobs.insert(url.clone(), data.to_vec());
        Ok(url)
    }

    fn revoke_object_url(&self, url: &ObjectUrl) {
        let mut st = self.state.borrow_mut();
        if st.blobs.remove(url).is_some() {
            st.revoked.insert(url.clone());
        }
    }

    fn append_element(&self, spec: ElementSpec) -> Result<ElementId> {
        let mut st = self.state.borrow_mut();
        if st.detached {
            return Err(Error::DeliveryFailure("overlay container is detached from the page".into()));
        }
        let id = ElementId(st.next());
        st.elements.insert(id, spec);
        Ok(id)
    }

    fn remove_element(&self, id: ElementId) {
        self.state.borrow_mut().elements.remove(&id);
    }

    fn add_key_listener(&self, key: &str) -> Result<ListenerId> {
        let mut st = self.state.borrow_mut();
        let id = ListenerId(st.next());
        st.listeners.insert(id, key.to_string());
        Ok(id)
    }

    fn remove_key_listener(&self, id: ListenerId) {
        self.state.borrow_mut().listeners.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_are_tracked_until_revoked() {
        let doc = MemoryDocument::new();
        let url = doc.create_object_url(b"png", "image/png").unwrap();
        assert_eq!(doc.blob(&url).unwrap(), b"png");
        doc.revoke_object_url(&url);
        assert!(doc.live_object_urls().is_empty());
        assert!(doc.is_revoked(&url));
    }

    #[test]
    fn detached_document_rejects_elements() {
        let doc = MemoryDocument::new();
        doc.detach();
        assert!(doc.append_element(ElementSpec::Backdrop).unwrap_err().is_delivery_failure());
        doc.attach();
        assert!(doc.append_element(ElementSpec::Backdrop).is_ok());
        assert_eq!(doc.element_count(), 1);
    }
}
