//! Document - High-level document API
//!
//! [`Document`] is a cheap, cloneable handle onto a shared [`DomTree`].
//! Every component of the view layer holds the same handle; borrows are
//! kept to the duration of a single call so listeners may freely write to
//! the document while an event is being dispatched.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::{DomEvent, DomResult, DomTree, EventListener, MutationRecord, NodeId};

/// HTML Document
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<DomTree>>,
    /// Cached reference to <html> element
    html_element: NodeId,
    /// Cached reference to <body> element
    body_element: NodeId,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("tree", &*self.tree.borrow())
            .field("body", &self.body_element)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with an `<html><head></head><body></body></html>` skeleton
    pub fn new() -> Self {
        let mut tree = DomTree::new();

        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");

        let root = tree.root();
        let built = tree.append_child(root, html)
            .and_then(|_| tree.append_child(html, head))
            .and_then(|_| tree.append_child(html, body));
        if let Err(err) = built {
            tracing::error!(%err, "failed to build document skeleton");
        }
        tree.take_records();

        Self {
            tree: Rc::new(RefCell::new(tree)),
            html_element: html,
            body_element: body,
        }
    }

    /// Whether two handles share the same tree
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn html(&self) -> NodeId {
        self.html_element
    }

    pub fn body(&self) -> NodeId {
        self.body_element
    }

    /// Borrow the tree for reading
    pub fn tree(&self) -> Ref<'_, DomTree> {
        self.tree.borrow()
    }

    /// Run a closure against the tree
    pub fn with_tree<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        f(&self.tree.borrow())
    }

    /// Run a closure against the mutable tree
    pub fn with_tree_mut<R>(&self, f: impl FnOnce(&mut DomTree) -> R) -> R {
        f(&mut self.tree_mut())
    }

    fn tree_mut(&self) -> RefMut<'_, DomTree> {
        self.tree.borrow_mut()
    }

    // Creation

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree_mut().create_element(tag)
    }

    pub fn create_text(&self, content: &str) -> NodeId {
        self.tree_mut().create_text(content)
    }

    pub fn create_fragment(&self) -> NodeId {
        self.tree_mut().create_fragment()
    }

    // Structure

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.tree_mut().append_child(parent, child)
    }

    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<NodeId> {
        self.tree_mut().insert_before(parent, child, reference)
    }

    pub fn insert_at(&self, parent: NodeId, child: NodeId, index: usize) -> DomResult<NodeId> {
        self.tree_mut().insert_at(parent, child, index)
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.tree_mut().remove_child(parent, child)
    }

    pub fn replace_child(&self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> DomResult<NodeId> {
        self.tree_mut().replace_child(parent, new_child, old_child)
    }

    pub fn detach(&self, child: NodeId) -> DomResult<()> {
        self.tree_mut().detach(child)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.borrow().parent(id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.tree.borrow().next_sibling(id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.borrow().child_ids(id)
    }

    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.tree.borrow().child_at(parent, index)
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.tree.borrow().is_connected(id)
    }

    // Content

    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.tree.borrow().tag_name(id).map(str::to_string)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.tree.borrow().attribute(id, name).map(str::to_string)
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        self.tree_mut().set_attribute(id, name, value)
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) -> DomResult<bool> {
        self.tree_mut().remove_attribute(id, name)
    }

    pub fn text(&self, id: NodeId) -> Option<String> {
        self.tree.borrow().text(id).map(str::to_string)
    }

    pub fn set_text(&self, id: NodeId, content: &str) -> DomResult<()> {
        self.tree_mut().set_text(id, content)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.tree.borrow().text_content(id)
    }

    pub fn to_html(&self, id: NodeId) -> String {
        self.tree.borrow().to_html(id)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        self.tree.borrow().inner_html(id)
    }

    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.tree_mut().take_records()
    }

    // Events

    pub fn add_event_listener(&self, id: NodeId, event_type: &str, listener: EventListener) -> bool {
        self.tree_mut().add_event_listener(id, event_type, listener)
    }

    pub fn remove_event_listener(&self, id: NodeId, event_type: &str) -> bool {
        self.tree_mut().remove_event_listener(id, event_type)
    }

    pub fn clear_event_listeners(&self, id: NodeId) -> usize {
        self.tree_mut().clear_event_listeners(id)
    }

    /// Drop the listeners of a whole subtree, typically once it is detached
    pub fn clear_subtree_listeners(&self, id: NodeId) -> usize {
        self.tree_mut().clear_subtree_listeners(id)
    }

    /// Installed listeners across the document
    pub fn listener_count(&self) -> usize {
        self.tree.borrow().listener_count()
    }

    pub fn has_listener(&self, id: NodeId, event_type: &str) -> bool {
        self.tree.borrow().has_listener(id, event_type)
    }

    /// Fire a default bubbling event of `event_type` at `target`
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> DomEvent {
        self.dispatch(DomEvent::new(event_type, target))
    }

    /// Dispatch an event along the target's ancestor path
    ///
    /// The path is computed up front; listeners see the tree released and
    /// may mutate it.
    pub fn dispatch(&self, mut event: DomEvent) -> DomEvent {
        let path = {
            let tree = self.tree.borrow();
            let mut path = Vec::new();
            let mut cur = Some(event.target);
            while let Some(id) = cur {
                path.push(id);
                if !event.bubbles {
                    break;
                }
                cur = tree.parent(id);
            }
            path
        };

        tracing::trace!(event = %event.event_type, target = %event.target, "dispatch");

        for node in path {
            let listener = self.tree.borrow().listener(node, &event.event_type);
            if let Some(listener) = listener {
                event.current_target = Some(node);
                listener(&mut event);
                if event.is_propagation_stopped() {
                    break;
                }
            }
        }
        event.current_target = None;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_skeleton() {
        let doc = Document::new();
        assert_eq!(doc.tag_name(doc.html()).as_deref(), Some("html"));
        assert_eq!(doc.tag_name(doc.body()).as_deref(), Some("body"));
        assert!(doc.is_connected(doc.body()));
        assert!(doc.take_records().is_empty());
    }

    #[test]
    fn test_handles_share_tree() {
        let doc = Document::new();
        let other = doc.clone();
        let p = other.create_element("p");
        other.append_child(doc.body(), p).unwrap();
        assert!(doc.ptr_eq(&other));
        assert_eq!(doc.children(doc.body()), vec![p]);
    }

    #[test]
    fn test_dispatch_bubbles() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let button = doc.create_element("button");
        doc.append_child(doc.body(), div).unwrap();
        doc.append_child(div, button).unwrap();

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        doc.add_event_listener(div, "click", Rc::new(move |e| {
            assert_eq!(e.current_target, Some(div));
            h.set(h.get() + 1);
        }));

        let event = doc.dispatch_event(button, "click");
        assert_eq!(hits.get(), 1);
        assert_eq!(event.current_target, None);

        doc.dispatch(DomEvent::new("click", button).non_bubbling());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_listener_may_mutate() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append_child(doc.body(), button).unwrap();

        let d = doc.clone();
        doc.add_event_listener(button, "click", Rc::new(move |e| {
            d.set_attribute(e.target, "data-clicked", "1").unwrap();
            e.stop_propagation();
        }));
        doc.dispatch_event(button, "click");
        assert_eq!(doc.attribute(button, "data-clicked").as_deref(), Some("1"));
    }
}
