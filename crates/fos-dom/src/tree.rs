//! DOM Tree (arena-based allocation)

use std::collections::{HashMap, HashSet};

use crate::{DomError, DomResult, EventListener, MutationRecord, Node, NodeData, NodeId};

/// Arena-based DOM tree
///
/// Nodes are never freed; a removed node simply becomes a detached root that
/// can be re-inserted later. Every successful write appends a
/// [`MutationRecord`], writes that would not change anything are skipped.
#[derive(Default)]
pub struct DomTree {
    nodes: Vec<Node>,
    /// One listener per (node, event type)
    listeners: HashMap<(NodeId, Box<str>), EventListener>,
    records: Vec<MutationRecord>,
}

impl std::fmt::Debug for DomTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomTree")
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .field("pending_records", &self.records.len())
            .finish()
    }
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        let mut tree = Self::default();
        tree.alloc(Node::document());
        tree
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.alloc(Node::text(content.to_string()))
    }

    /// Create a detached fragment container
    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(Node::fragment())
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.get_mut(id).ok_or(DomError::NotFound(id))
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent.option())
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.first_child.option())
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling.option())
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling.option())
    }

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// Child ids in order
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).map(|(child, _)| child).collect()
    }

    /// Child at `index`, if any
    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).nth(index).map(|(child, _)| child)
    }

    /// Position of `child` among its siblings
    pub fn index_of(&self, child: NodeId) -> Option<usize> {
        let parent = self.parent(child)?;
        self.children(parent).position(|(id, _)| id == child)
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    /// True when the node is reachable from the document node
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(NodeId::ROOT, id)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.as_element()).map(|e| &*e.tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.as_text())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id).and_then(|n| n.as_element()).and_then(|e| e.get_attr(name))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(text) = self.text(id) {
            out.push_str(text);
            return;
        }
        for (child, _) in self.children(id) {
            self.collect_text(child, out);
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if !self.node(parent)?.is_container() {
            return Err(DomError::InvalidNodeType { op: "insert", node: parent });
        }
        if matches!(self.node(child)?.data, NodeData::Document) {
            return Err(DomError::InvalidNodeType { op: "insert", node: child });
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    /// Unlink a node from its parent without recording anything
    fn unlink(&mut self, child: NodeId) {
        let (parent, prev, next) = match self.get(child) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };
        if !parent.is_valid() {
            return;
        }
        if let Some(p) = self.get_mut(prev) {
            p.next_sibling = next;
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = next;
        }
        if let Some(n) = self.get_mut(next) {
            n.prev_sibling = prev;
        } else if let Some(par) = self.get_mut(parent) {
            par.last_child = prev;
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = NodeId::NONE;
            c.prev_sibling = NodeId::NONE;
            c.next_sibling = NodeId::NONE;
        }
    }

    /// Link a detached node before `reference` (append when NONE)
    fn link(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        let prev = if reference.is_valid() {
            self.get(reference).map(|r| r.prev_sibling).unwrap_or(NodeId::NONE)
        } else {
            self.get(parent).map(|p| p.last_child).unwrap_or(NodeId::NONE)
        };
        if let Some(c) = self.get_mut(child) {
            c.parent = parent;
            c.prev_sibling = prev;
            c.next_sibling = reference;
        }
        if let Some(p) = self.get_mut(prev) {
            p.next_sibling = child;
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = child;
        }
        if let Some(r) = self.get_mut(reference) {
            r.prev_sibling = child;
        } else if let Some(par) = self.get_mut(parent) {
            par.last_child = child;
        }
    }

    /// Append a child node (moves it when already attached)
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (append when `None`)
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<NodeId> {
        self.check_insert(parent, child)?;
        let reference = reference.unwrap_or(NodeId::NONE);
        if reference.is_valid() && self.node(reference)?.parent != parent {
            return Err(DomError::NotAChild { parent, child: reference });
        }

        let (old_parent, old_next) = {
            let n = self.node(child)?;
            (n.parent, n.next_sibling)
        };
        if reference == child || (old_parent == parent && old_next == reference) {
            // Already in place
            return Ok(child);
        }

        self.unlink(child);
        self.link(parent, child, reference);

        if old_parent.is_valid() && old_parent != parent {
            self.records.push(MutationRecord::child_removed(old_parent, child));
        }
        self.records.push(MutationRecord::child_added(parent, child, old_parent == parent));
        Ok(child)
    }

    /// Insert `child` so that it ends up at `index` among the parent's children
    pub fn insert_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> DomResult<NodeId> {
        let reference = self.children(parent)
            .map(|(id, _)| id)
            .filter(|&id| id != child)
            .nth(index);
        self.insert_before(parent, child, reference)
    }

    /// Remove a child node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if self.node(child)?.parent != parent {
            return Err(DomError::NotAChild { parent, child });
        }
        self.unlink(child);
        self.records.push(MutationRecord::child_removed(parent, child));
        Ok(child)
    }

    /// Detach a node from wherever it is attached
    pub fn detach(&mut self, child: NodeId) -> DomResult<()> {
        match self.node(child)?.parent.option() {
            Some(parent) => self.remove_child(parent, child).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Replace `old_child` with `new_child`
    pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> DomResult<NodeId> {
        self.insert_before(parent, new_child, Some(old_child))?;
        self.remove_child(parent, old_child)
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Set an attribute; unchanged values are not written
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let elem = self.node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::InvalidNodeType { op: "set_attribute", node: id })?;
        if elem.get_attr(name) == Some(value) {
            return Ok(());
        }
        let old = elem.set_attr(name, value.to_string());
        self.records.push(MutationRecord::attribute(id, name, old));
        Ok(())
    }

    /// Remove an attribute, returning whether it existed
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<bool> {
        let elem = self.node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::InvalidNodeType { op: "remove_attribute", node: id })?;
        match elem.remove_attr(name) {
            Some(old) => {
                self.records.push(MutationRecord::attribute(id, name, Some(old)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set the value of a text node
    pub fn set_text(&mut self, id: NodeId, content: &str) -> DomResult<()> {
        let node = self.node_mut(id)?;
        let NodeData::Text(text) = &mut node.data else {
            return Err(DomError::InvalidNodeType { op: "set_text", node: id });
        };
        if text.content == content {
            return Ok(());
        }
        let old = std::mem::replace(&mut text.content, content.to_string());
        self.records.push(MutationRecord::character_data(id, old));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Listeners and records
    // ------------------------------------------------------------------

    /// Install a listener; a second listener for the same node and event
    /// type is ignored and `false` returned
    pub fn add_event_listener(&mut self, id: NodeId, event_type: &str, listener: EventListener) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let key = (id, Box::<str>::from(event_type));
        if self.listeners.contains_key(&key) {
            return false;
        }
        self.listeners.insert(key, listener);
        true
    }

    /// Remove the listener for one event type
    pub fn remove_event_listener(&mut self, id: NodeId, event_type: &str) -> bool {
        self.listeners.remove(&(id, Box::<str>::from(event_type))).is_some()
    }

    /// Remove every listener installed on a node
    pub fn clear_event_listeners(&mut self, id: NodeId) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|(node, _), _| *node != id);
        before - self.listeners.len()
    }

    /// Remove every listener installed on `id` or any of its descendants
    pub fn clear_subtree_listeners(&mut self, id: NodeId) -> usize {
        if self.listeners.is_empty() {
            return 0;
        }
        let mut subtree = HashSet::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if subtree.insert(node) {
                stack.extend(self.child_ids(node));
            }
        }
        let before = self.listeners.len();
        self.listeners.retain(|(node, _), _| !subtree.contains(node));
        before - self.listeners.len()
    }

    pub fn has_listener(&self, id: NodeId, event_type: &str) -> bool {
        self.listeners.contains_key(&(id, Box::<str>::from(event_type)))
    }

    pub fn listener(&self, id: NodeId, event_type: &str) -> Option<EventListener> {
        self.listeners.get(&(id, Box::<str>::from(event_type))).cloned()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Records accumulated since the last `take_records`
    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Take pending records
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize the subtree rooted at `id` as HTML
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Serialize only the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for (child, _) in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.data {
            NodeData::Text(t) => out.push_str(&escape(&t.content)),
            NodeData::Element(e) => {
                out.push('<');
                out.push_str(&e.tag);
                for attr in &e.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&escape(&attr.value));
                    out.push('"');
                }
                out.push('>');
                for (child, _) in self.children(id) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(&e.tag);
                out.push('>');
            }
            NodeData::Fragment | NodeData::Document => {
                for (child, _) in self.children(id) {
                    self.write_html(child, out);
                }
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Iterator over (id, node) child pairs
pub struct Children<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling.option();
        Some((id, node))
    }
}
