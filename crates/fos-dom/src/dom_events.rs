//! DOM Events
//!
//! UI events dispatched to listeners installed on real nodes.

use std::rc::Rc;

use crate::NodeId;

/// Listener callback
///
/// Listeners are shared so dispatch can release the tree borrow before
/// running them; a listener is free to mutate the document.
pub type EventListener = Rc<dyn Fn(&mut DomEvent)>;

/// DOM event
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub event_type: Box<str>,
    pub target: NodeId,
    pub current_target: Option<NodeId>,
    /// Free-form payload (input value, key name, ...)
    pub detail: Option<String>,
    pub bubbles: bool,
    pub cancelable: bool,
    pub timestamp: f64,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    /// Create a bubbling, cancelable event
    pub fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            current_target: None,
            detail: None,
            bubbles: true,
            cancelable: true,
            timestamp: 0.0,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Attach a payload
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Disable bubbling
    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    /// Prevent default action
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// Stop propagation
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Check if default was prevented
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Check if propagation was stopped
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prevent_default() {
        let mut event = DomEvent::new("click", NodeId(5));
        assert!(event.bubbles);
        event.prevent_default();
        assert!(event.is_default_prevented());
    }

    #[test]
    fn test_stop_propagation() {
        let mut event = DomEvent::new("input", NodeId(1)).with_detail("abc").non_bubbling();
        assert!(!event.bubbles);
        assert_eq!(event.detail.as_deref(), Some("abc"));
        event.stop_propagation();
        assert!(event.is_propagation_stopped());
    }
}
