//! Virtual nodes
//!
//! A [`VNode`] is a shared handle; the tree owns its children strongly and
//! its parent weakly. The real DOM node it renders to is referenced by id
//! only, so dropping a virtual tree never frees DOM nodes and a stale id can
//! never keep a DOM node alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use fos_dom::{Document, EventListener, NodeData, NodeId};
use fos_reactive::{Value, Watcher};

use crate::VSnapshot;

static NEXT_VNODE_ID: AtomicU64 = AtomicU64::new(1);

/// Node variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VKind {
    Element(Box<str>),
    Text(String),
    Fragment,
}

impl VKind {
    /// Same node type and tag; text content is not compared
    pub fn same_type(&self, other: &VKind) -> bool {
        match (self, other) {
            (VKind::Element(a), VKind::Element(b)) => a == b,
            (VKind::Text(_), VKind::Text(_)) | (VKind::Fragment, VKind::Fragment) => true,
            _ => false,
        }
    }
}

pub(crate) struct VNodeData {
    pub(crate) id: u64,
    pub(crate) kind: VKind,
    pub(crate) attrs: Vec<(Box<str>, String)>,
    pub(crate) children: Vec<VNode>,
    parent: Weak<RefCell<VNodeData>>,
    pub(crate) dom: Option<NodeId>,
    pub(crate) cache: bool,
    pub(crate) key: Option<String>,
    pub(crate) present: bool,
    pub(crate) events: Vec<(Box<str>, EventListener)>,
    watchers: Vec<Watcher>,
    teardown: Vec<Box<dyn FnOnce()>>,
    component: Option<Value>,
}

/// Virtual node handle
#[derive(Clone)]
pub struct VNode(Rc<RefCell<VNodeData>>);

impl std::fmt::Debug for VNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("VNode")
            .field("id", &data.id)
            .field("kind", &data.kind)
            .field("dom", &data.dom)
            .field("children", &data.children.len())
            .finish()
    }
}

/// Weak counterpart of [`VNode`]
#[derive(Clone, Default)]
pub struct WeakVNode(Weak<RefCell<VNodeData>>);

impl WeakVNode {
    pub fn upgrade(&self) -> Option<VNode> {
        VNode::from_weak(&self.0)
    }
}

impl std::fmt::Debug for WeakVNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(WeakVNode)")
    }
}

impl VNode {
    fn with_kind(kind: VKind) -> Self {
        Self(Rc::new(RefCell::new(VNodeData {
            id: NEXT_VNODE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            attrs: Vec::new(),
            children: Vec::new(),
            parent: Weak::new(),
            dom: None,
            cache: false,
            key: None,
            present: true,
            events: Vec::new(),
            watchers: Vec::new(),
            teardown: Vec::new(),
            component: None,
        })))
    }

    pub fn element(tag: &str) -> Self {
        Self::with_kind(VKind::Element(tag.to_ascii_lowercase().into()))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(VKind::Text(content.into()))
    }

    pub fn fragment() -> Self {
        Self::with_kind(VKind::Fragment)
    }

    /// Builder: add an attribute
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a child
    pub fn with_child(self, child: VNode) -> Self {
        self.append_child(&child);
        self
    }

    pub(crate) fn data(&self) -> std::cell::Ref<'_, VNodeData> {
        self.0.borrow()
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<VNodeData>> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_weak(weak: &Weak<RefCell<VNodeData>>) -> Option<VNode> {
        weak.upgrade().map(VNode)
    }

    /// Non-owning handle, for closures owned by the node itself
    pub fn weak(&self) -> WeakVNode {
        WeakVNode(self.downgrade())
    }

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn kind(&self) -> VKind {
        self.0.borrow().kind.clone()
    }

    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            VKind::Element(tag) => Some(tag.to_string()),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.borrow().kind, VKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.borrow().kind, VKind::Text(_))
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    pub fn text_value(&self) -> Option<String> {
        match &self.0.borrow().kind {
            VKind::Text(t) => Some(t.clone()),
            _ => None,
        }
    }

    /// Replace the content of a text node; ignored on other variants
    pub fn set_text(&self, content: &str) {
        if let VKind::Text(t) = &mut self.0.borrow_mut().kind {
            if t != content {
                *t = content.to_string();
            }
        }
    }

    /// Concatenated text of all present descendants
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            VKind::Text(t) => t.clone(),
            _ => data.children.iter()
                .filter(|c| c.is_present())
                .map(|c| c.text_content())
                .collect(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn attrs(&self) -> Vec<(String, String)> {
        self.0.borrow().attrs.iter()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect()
    }

    /// Set an attribute; names stay unique
    pub fn set_attr(&self, name: &str, value: &str) {
        let mut data = self.0.borrow_mut();
        match data.attrs.iter_mut().find(|(n, _)| &**n == name) {
            Some((_, v)) => {
                if v != value {
                    *v = value.to_string();
                }
            }
            None => data.attrs.push((name.into(), value.to_string())),
        }
    }

    pub fn remove_attr(&self, name: &str) -> Option<String> {
        let mut data = self.0.borrow_mut();
        let pos = data.attrs.iter().position(|(n, _)| &**n == name)?;
        Some(data.attrs.remove(pos).1)
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn children(&self) -> Vec<VNode> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn first_child(&self) -> Option<VNode> {
        self.0.borrow().children.first().cloned()
    }

    pub fn parent(&self) -> Option<VNode> {
        self.0.borrow().parent.upgrade().map(VNode)
    }

    /// Position among the parent's current children
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        data.children.iter().position(|c| c.ptr_eq(self))
    }

    /// Next sibling, derived from the parent's current child list
    pub fn next_sibling(&self) -> Option<VNode> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        let pos = data.children.iter().position(|c| c.ptr_eq(self))?;
        data.children.get(pos + 1).cloned()
    }

    fn detach_from_parent(child: &VNode) {
        if let Some(old) = child.parent() {
            old.0.borrow_mut().children.retain(|c| !c.ptr_eq(child));
        }
    }

    pub fn append_child(&self, child: &VNode) {
        Self::detach_from_parent(child);
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Insert at `index` (clamped)
    pub fn insert_child(&self, index: usize, child: &VNode) {
        Self::detach_from_parent(child);
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        let mut data = self.0.borrow_mut();
        let index = index.min(data.children.len());
        data.children.insert(index, child.clone());
    }

    pub fn remove_child(&self, child: &VNode) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.children.len();
        data.children.retain(|c| !c.ptr_eq(child));
        let removed = data.children.len() != before;
        drop(data);
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    /// Pre-order document traversal following the next-sibling relation
    pub fn walk(&self, mut f: impl FnMut(&VNode)) {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            f(&node);
            if let Some(child) = node.first_child() {
                current = Some(child);
                continue;
            }
            let mut n = node;
            current = loop {
                if n.ptr_eq(self) {
                    break None;
                }
                if let Some(next) = n.next_sibling() {
                    break Some(next);
                }
                match n.parent() {
                    Some(p) => n = p,
                    None => break None,
                }
            };
        }
    }

    /// All nodes of the subtree in document order
    pub fn descendants(&self) -> Vec<VNode> {
        let mut out = Vec::new();
        self.walk(|n| out.push(n.clone()));
        out
    }

    // ------------------------------------------------------------------
    // Rendering state
    // ------------------------------------------------------------------

    pub fn dom(&self) -> Option<NodeId> {
        self.0.borrow().dom
    }

    pub fn set_dom(&self, dom: Option<NodeId>) {
        self.0.borrow_mut().dom = dom;
    }

    /// Clear back-references of the whole subtree
    pub fn clear_dom(&self) {
        let children = {
            let mut data = self.0.borrow_mut();
            data.dom = None;
            data.children.clone()
        };
        for child in &children {
            child.clear_dom();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.dom().is_some()
    }

    pub fn cache(&self) -> bool {
        self.0.borrow().cache
    }

    pub fn set_cache(&self, cache: bool) {
        self.0.borrow_mut().cache = cache;
    }

    pub fn key(&self) -> Option<String> {
        self.0.borrow().key.clone()
    }

    pub fn set_key(&self, key: Option<String>) {
        self.0.borrow_mut().key = key;
    }

    /// Whether the node takes part in rendering (`false` while hidden)
    pub fn is_present(&self) -> bool {
        self.0.borrow().present
    }

    pub fn set_present(&self, present: bool) {
        self.0.borrow_mut().present = present;
    }

    /// Component action object registered for `:ref`
    pub fn component(&self) -> Option<Value> {
        self.0.borrow().component.clone()
    }

    pub fn set_component(&self, component: Option<Value>) {
        self.0.borrow_mut().component = component;
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    /// Register a listener installed whenever the node is rendered
    ///
    /// Returns `false` when the node already has one for `event_type`.
    pub fn add_listener(&self, event_type: &str, listener: EventListener) -> bool {
        let mut data = self.0.borrow_mut();
        if data.events.iter().any(|(t, _)| &**t == event_type) {
            return false;
        }
        data.events.push((event_type.into(), listener));
        true
    }

    pub fn listeners(&self) -> Vec<(String, EventListener)> {
        self.0.borrow().events.iter()
            .map(|(t, l)| (t.to_string(), l.clone()))
            .collect()
    }

    /// Keep a watcher alive for as long as the node is mounted
    pub fn own_watcher(&self, watcher: Watcher) {
        self.0.borrow_mut().watchers.push(watcher);
    }

    pub fn watcher_count(&self) -> usize {
        self.0.borrow().watchers.len()
    }

    /// Run `f` when the node is unmounted
    pub fn on_teardown(&self, f: impl FnOnce() + 'static) {
        self.0.borrow_mut().teardown.push(Box::new(f));
    }

    /// Stop every watcher and run teardown hooks for the whole subtree
    ///
    /// Back-references are cleared; the real DOM is left untouched.
    pub fn unmount(&self) {
        let (watchers, teardown, children) = {
            let mut data = self.0.borrow_mut();
            data.dom = None;
            (
                std::mem::take(&mut data.watchers),
                std::mem::take(&mut data.teardown),
                data.children.clone(),
            )
        };
        for watcher in &watchers {
            watcher.stop();
        }
        drop(watchers);
        for hook in teardown {
            hook();
        }
        for child in &children {
            child.unmount();
        }
    }

    // ------------------------------------------------------------------
    // Conversion
    // ------------------------------------------------------------------

    /// Structural deep clone used as a diff baseline
    pub fn snapshot(&self) -> VSnapshot {
        VSnapshot::capture(self)
    }

    /// Fresh copy of the subtree: new identities, nothing rendered or bound
    pub fn clone_tree(&self) -> VNode {
        let (copy, children) = {
            let data = self.0.borrow();
            let copy = VNode::with_kind(data.kind.clone());
            {
                let mut c = copy.0.borrow_mut();
                c.attrs = data.attrs.clone();
                c.cache = data.cache;
                c.key = data.key.clone();
                c.present = data.present;
            }
            (copy, data.children.clone())
        };
        for child in &children {
            copy.append_child(&child.clone_tree());
        }
        copy
    }

    /// Mirror an existing real subtree as a mounted virtual tree
    pub fn from_dom(document: &Document, id: NodeId) -> Option<VNode> {
        let node = document.with_tree(|tree| {
            tree.get(id).map(|n| match &n.data {
                NodeData::Element(e) => {
                    let v = VNode::element(&e.tag);
                    v.0.borrow_mut().attrs = e.attrs.iter()
                        .map(|a| (a.name.clone(), a.value.clone()))
                        .collect();
                    v
                }
                NodeData::Text(t) => VNode::text(t.content.clone()),
                NodeData::Fragment | NodeData::Document => VNode::fragment(),
            })
        })?;
        node.set_dom(Some(id));
        for child in document.children(id) {
            if let Some(v) = VNode::from_dom(document, child) {
                node.append_child(&v);
            }
        }
        Some(node)
    }
}
