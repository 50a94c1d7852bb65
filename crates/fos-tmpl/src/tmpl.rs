//! Directive binder
//!
//! [`Tmpl::mount`] walks a virtual tree once and turns every directive into
//! watchers owned by the node that declared it:
//!
//! - `:if` toggles the node's presence; the parent is collected so the
//!   commit removes or re-inserts the real node.
//! - `:for` hides the declaring node and keeps it as a template; every item
//!   is a bound copy inserted after it, keyed by the item's value.
//! - `:on<event>` installs one listener that runs the handler inside its own
//!   transaction.
//! - `:ref` registers the node in the reference table.
//! - `:cache` marks the subtree as skipped by the diff.
//! - `{{ expr }}` in text and attribute values writes the rendered text back
//!   into the node.
//!
//! Every mutation goes through [`TransactionStack::with_node`], so writes
//! made while a transaction is open are batched into it and writes made
//! outside one are committed immediately.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fos_dom::{DomEvent, EventListener};
use fos_reactive::{ReactiveArray, Value, ViewModel, Watcher};
use fos_vdom::{render, PatchReport, TransactionStack, VKind, VNode};

use crate::expr::{self, evaluate, ForHeader, HandlerCall, Segment};
use crate::{ReferenceTable, Scope, TmplError, TmplResult};

const IF: &str = ":if";
const FOR: &str = ":for";
const REF: &str = ":ref";
const CACHE: &str = ":cache";
const ON: &str = ":on";
const INTERPOLATION: &str = "{{ }}";

/// Binder options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmplOptions {
    /// Render and attach a root that has no real node yet
    pub force_attach: bool,
    /// Render `undefined`/`null` interpolations as empty text
    pub empty_for_undefined: bool,
}

impl Default for TmplOptions {
    fn default() -> Self {
        Self { force_attach: true, empty_for_undefined: true }
    }
}

struct TmplInner {
    state: ViewModel,
    refs: ReferenceTable,
    stack: TransactionStack,
    options: TmplOptions,
}

/// Binds directives of a virtual tree to a state object
#[derive(Clone)]
pub struct Tmpl {
    inner: Rc<TmplInner>,
}

impl std::fmt::Debug for Tmpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tmpl")
            .field("options", &self.inner.options)
            .field("refs", &self.inner.refs)
            .finish()
    }
}

struct ForItem {
    key: String,
    node: VNode,
    locals: ViewModel,
}

struct ForBinding {
    header: ForHeader,
    scope: Scope,
    ref_name: Option<String>,
    /// `:ref` names declared inside the item template
    inner_refs: Vec<String>,
    items: RefCell<Vec<ForItem>>,
}

impl Tmpl {
    pub fn new(state: &ViewModel, refs: &ReferenceTable, stack: &TransactionStack, options: TmplOptions) -> Self {
        Self {
            inner: Rc::new(TmplInner {
                state: state.clone(),
                refs: refs.clone(),
                stack: stack.clone(),
                options,
            }),
        }
    }

    pub fn state(&self) -> &ViewModel {
        &self.inner.state
    }

    pub fn refs(&self) -> &ReferenceTable {
        &self.inner.refs
    }

    pub fn stack(&self) -> &TransactionStack {
        &self.inner.stack
    }

    pub fn options(&self) -> TmplOptions {
        self.inner.options
    }

    /// Bind every directive under `root` and commit the result
    ///
    /// With `force_attach`, a root without a real node is rendered and
    /// appended to the document body; otherwise only already-rendered parts
    /// are patched.
    pub fn mount(&self, root: &VNode, force_attach: bool) -> TmplResult<PatchReport> {
        for directive in [IF, FOR] {
            if root.attr(directive).is_some() {
                return Err(TmplError::MisplacedDirective { directive });
            }
        }

        let stack = &self.inner.stack;
        let tx = stack.start();
        stack.collect(root);
        self.bind(root, &Scope::new(&self.inner.state))?;

        if force_attach && root.dom().is_none() {
            let document = stack.document();
            let dom = render(document, root)?;
            document.append_child(document.body(), dom)?;
        }

        let report = tx.commit()?;
        tracing::debug!(
            root = root.id(),
            applied = report.applied,
            failed = report.failures.len(),
            "template mounted"
        );
        Ok(report)
    }

    fn bind(&self, node: &VNode, scope: &Scope) -> TmplResult<()> {
        match node.kind() {
            VKind::Text(content) => return self.bind_text(node, &content, scope),
            VKind::Element(_) => {
                if let Some(source) = node.remove_attr(FOR) {
                    return self.bind_for(node, &source, scope);
                }
                self.bind_element(node, scope)?;
            }
            VKind::Fragment => {}
        }
        for child in node.children() {
            self.bind(&child, scope)?;
        }
        Ok(())
    }

    fn bind_element(&self, node: &VNode, scope: &Scope) -> TmplResult<()> {
        if let Some(value) = node.remove_attr(CACHE) {
            node.set_cache(value.trim() != "false");
        }
        let ref_name = node.remove_attr(REF);
        if let Some(source) = node.remove_attr(IF) {
            self.bind_if(node, &source, scope)?;
        }

        for (name, value) in node.attrs() {
            if let Some(event) = name.strip_prefix(ON).filter(|e| !e.is_empty()) {
                node.remove_attr(&name);
                self.bind_on(node, event, &value, scope)?;
            } else if name.starts_with(':') {
                tracing::warn!(directive = %name, "unknown directive left in place");
            } else if expr::has_interpolation(&value) {
                let segments = expr::parse_interpolation(&value)
                    .map_err(|e| TmplError::parse(INTERPOLATION, &value, e))?;
                self.bind_attr(node, name, segments, scope);
            }
        }

        if let Some(name) = ref_name {
            self.bind_ref(node, &name, scope)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // :ref
    // ------------------------------------------------------------------

    fn bind_ref(&self, node: &VNode, name: &str, scope: &Scope) -> TmplResult<()> {
        if self.inner.state.has(name) {
            return Err(TmplError::RefConflict { name: name.to_string(), with: "a state property" });
        }
        let refs = &self.inner.refs;
        if scope.in_loop() {
            refs.push(name, node);
        } else if refs.is_taken(name, node) {
            return Err(TmplError::RefConflict { name: name.to_string(), with: "another reference" });
        } else {
            refs.set_single(name, node);
        }

        let table = refs.clone();
        let weak = node.weak();
        node.on_teardown(move || {
            if let Some(node) = weak.upgrade() {
                table.prune(&node);
            }
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // :if
    // ------------------------------------------------------------------

    fn bind_if(&self, node: &VNode, source: &str, scope: &Scope) -> TmplResult<()> {
        let condition = expr::parse_expression(source).map_err(|e| TmplError::parse(IF, source, e))?;
        let eval_scope = scope.clone();
        let stack = self.inner.stack.clone();
        let weak = node.weak();

        let watcher = Watcher::new(
            scope.context(),
            move || Value::Bool(evaluate(&condition, &eval_scope).truthy()),
            move |value, _| {
                let Some(node) = weak.upgrade() else { return };
                let present = value.truthy();
                if node.is_present() == present {
                    return;
                }
                tracing::trace!(node = node.id(), present, "conditional toggled");
                match node.parent() {
                    Some(parent) => stack.with_node(&parent, |_| node.set_present(present)),
                    None => node.set_present(present),
                }
            },
        );
        node.own_watcher(watcher);
        Ok(())
    }

    // ------------------------------------------------------------------
    // {{ }}
    // ------------------------------------------------------------------

    fn bind_text(&self, node: &VNode, content: &str, scope: &Scope) -> TmplResult<()> {
        if !expr::has_interpolation(content) {
            return Ok(());
        }
        let segments = expr::parse_interpolation(content)
            .map_err(|e| TmplError::parse(INTERPOLATION, content, e))?;
        let stack = self.inner.stack.clone();
        self.interpolate(node, segments, scope, move |node, text| {
            if node.text_value().as_deref() != Some(text) {
                stack.with_node(node, |n| n.set_text(text));
            }
        });
        Ok(())
    }

    fn bind_attr(&self, node: &VNode, name: String, segments: Vec<Segment>, scope: &Scope) {
        let stack = self.inner.stack.clone();
        self.interpolate(node, segments, scope, move |node, text| {
            if node.attr(&name).as_deref() != Some(text) {
                stack.with_node(node, |n| n.set_attr(&name, text));
            }
        });
    }

    /// One watcher per `{{ }}` occurrence; each re-renders the whole string
    fn interpolate(
        &self,
        node: &VNode,
        segments: Vec<Segment>,
        scope: &Scope,
        write: impl Fn(&VNode, &str) + 'static,
    ) {
        let empty_for_undefined = self.inner.options.empty_for_undefined;
        let parts: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(
            segments.iter()
                .map(|segment| match segment {
                    Segment::Text(text) => text.clone(),
                    Segment::Expr(_) => String::new(),
                })
                .collect(),
        ));
        let write = Rc::new(write);

        for (slot, segment) in segments.into_iter().enumerate() {
            let Segment::Expr(expression) = segment else { continue };
            let eval_scope = scope.clone();
            let parts = parts.clone();
            let write = write.clone();
            let weak = node.weak();
            let watcher = Watcher::new(
                scope.context(),
                move || evaluate(&expression, &eval_scope),
                move |value, _| {
                    let text = {
                        let mut parts = parts.borrow_mut();
                        parts[slot] = value.to_text(empty_for_undefined);
                        parts.concat()
                    };
                    if let Some(node) = weak.upgrade() {
                        (*write)(&node, &text);
                    }
                },
            );
            node.own_watcher(watcher);
        }
    }

    // ------------------------------------------------------------------
    // :on<event>
    // ------------------------------------------------------------------

    fn bind_on(&self, node: &VNode, event: &str, source: &str, scope: &Scope) -> TmplResult<()> {
        let HandlerCall { callee, arguments } = expr::parse_handler(source)
            .map_err(|e| TmplError::parse(&format!("{}{}", ON, event), source, e))?;

        // Arguments are tracked so they always reflect the current state
        let args: Rc<RefCell<Vec<Value>>> = Rc::default();
        let cache = args.clone();
        let eval_scope = scope.clone();
        let watcher = Watcher::new(
            scope.context(),
            move || Value::Array(arguments.iter().map(|a| evaluate(a, &eval_scope)).collect()),
            move |value, _| {
                *cache.borrow_mut() = value.as_array().map(ReactiveArray::to_vec).unwrap_or_default();
            },
        );
        node.own_watcher(watcher);

        let stack = self.inner.stack.downgrade();
        let handler_scope = scope.clone();
        let event_type = event.to_string();
        let listener: EventListener = Rc::new(move |dom_event: &mut DomEvent| {
            let Some(stack) = stack.upgrade() else { return };
            let handler = handler_scope.context().untracked(|| evaluate(&callee, &handler_scope));
            let Some(function) = handler.as_function().cloned() else {
                tracing::warn!(event = %event_type, found = handler.type_name(), "event handler is not a function");
                return;
            };
            let args = args.borrow().clone();
            let tx = stack.start();
            function.call(Some(&*dom_event), &args);
            if let Err(err) = tx.commit() {
                tracing::warn!(event = %event_type, error = %err, "event transaction failed");
            }
        });

        node.add_listener(event, listener.clone());
        if let Some(dom) = node.dom() {
            self.inner.stack.document().add_event_listener(dom, event, listener);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // :for
    // ------------------------------------------------------------------

    fn bind_for(&self, anchor: &VNode, source: &str, scope: &Scope) -> TmplResult<()> {
        let header = expr::parse_for(source).map_err(|e| TmplError::parse(FOR, source, e))?;
        let ref_name = anchor.remove_attr(REF);
        if let Some(name) = &ref_name {
            if self.inner.state.has(name) {
                return Err(TmplError::RefConflict { name: name.clone(), with: "a state property" });
            }
        }
        anchor.set_present(false);

        let mut inner_refs: Vec<String> = anchor.descendants().iter().filter_map(|n| n.attr(REF)).collect();
        inner_refs.sort();
        inner_refs.dedup();

        let binding = Rc::new(ForBinding {
            header,
            scope: scope.clone(),
            ref_name,
            inner_refs,
            items: RefCell::new(Vec::new()),
        });
        let eval_binding = binding.clone();
        let this = self.clone();
        let weak = anchor.weak();

        let watcher = Watcher::new(
            scope.context(),
            move || evaluate(&eval_binding.header.iterable, &eval_binding.scope),
            move |value, _| {
                let Some(anchor) = weak.upgrade() else { return };
                let Some(parent) = anchor.parent() else {
                    tracing::warn!(node = anchor.id(), "list template has no parent");
                    return;
                };
                let entries = entries_of(value);
                this.inner.stack.with_node(&parent, |parent| this.reconcile(parent, &anchor, &binding, entries));
            },
        );
        anchor.own_watcher(watcher);
        Ok(())
    }

    fn reconcile(&self, parent: &VNode, anchor: &VNode, binding: &ForBinding, entries: Vec<(Value, Value)>) {
        let mut previous: HashMap<String, ForItem> = binding.items.borrow_mut()
            .drain(..)
            .map(|item| (item.key.clone(), item))
            .collect();
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        let mut next = Vec::with_capacity(entries.len());

        for (value, index) in entries {
            let identity = identity_key(&value);
            let seen = occurrences.entry(identity.clone()).or_insert(0);
            let key = format!("{}#{}", identity, seen);
            *seen += 1;

            match previous.remove(&key) {
                Some(item) => {
                    if let Some(name) = &binding.header.index {
                        item.locals.set(name, index);
                    }
                    next.push(item);
                }
                None => match self.create_item(anchor, binding, key, value, index) {
                    Ok(item) => next.push(item),
                    Err(err) => tracing::error!(error = %err, "failed to bind list item"),
                },
            }
        }

        let removed = previous.len();
        for item in previous.into_values() {
            parent.remove_child(&item.node);
            item.node.unmount();
        }
        for item in &next {
            parent.remove_child(&item.node);
        }
        let start = anchor.index_in_parent().map_or(parent.child_count(), |i| i + 1);
        for (offset, item) in next.iter().enumerate() {
            parent.insert_child(start + offset, &item.node);
        }

        if let Some(name) = &binding.ref_name {
            let nodes: Vec<VNode> = next.iter().map(|item| item.node.clone()).collect();
            self.inner.refs.set_list(name, &nodes);
        }
        // Refs inside items were pushed in creation order
        if !binding.inner_refs.is_empty() {
            let nodes: Vec<VNode> = next.iter().map(|item| item.node.clone()).collect();
            for name in &binding.inner_refs {
                self.inner.refs.order_list(name, &nodes);
            }
        }
        tracing::trace!(items = next.len(), removed, "list reconciled");
        *binding.items.borrow_mut() = next;
    }

    fn create_item(&self, anchor: &VNode, binding: &ForBinding, key: String, value: Value, index: Value) -> TmplResult<ForItem> {
        let node = anchor.clone_tree();
        node.set_present(true);
        node.set_key(Some(key.clone()));

        let locals = ViewModel::new(binding.scope.context());
        locals.set(&binding.header.item, value);
        if let Some(name) = &binding.header.index {
            locals.set(name, index);
        }
        self.bind(&node, &binding.scope.child(&locals))?;
        Ok(ForItem { key, node, locals })
    }
}

/// `(item, index)` pairs of an iterable value
fn entries_of(value: &Value) -> Vec<(Value, Value)> {
    match value {
        Value::Array(array) => array.to_vec()
            .into_iter()
            .enumerate()
            .map(|(i, item)| (item, Value::from(i)))
            .collect(),
        Value::Object(object) => object.keys()
            .into_iter()
            .map(|key| (object.peek(&key), Value::from(key)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Key of an item: its value for primitives, its identity for containers
fn identity_key(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("b:{}", b),
        Value::Number(_) => format!("n:{}", value),
        Value::String(s) => format!("s:{}", s),
        Value::Array(array) => format!("a:{:x}", array.addr()),
        Value::Object(object) => format!("o:{:x}", object.addr()),
        Value::Function(_) => "fn".to_string(),
    }
}
