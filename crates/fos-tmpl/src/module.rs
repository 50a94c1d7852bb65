//! Module lifecycle
//!
//! A [`Module`] ties a state object, a reference table and a bound virtual
//! tree together. `mounted`, `query_updated` and `param_updated` hooks run
//! inside a transaction of their own, so every state write they make lands
//! in one commit; `unmount` tears the tree down.

use std::cell::{Cell, RefCell};

use fos_dom::{DomError, NodeId};
use fos_reactive::ViewModel;
use fos_vdom::{PatchReport, TransactionStack, VNode};

use crate::{Reference, ReferenceTable, Tmpl, TmplError, TmplOptions, TmplResult};

/// Lifecycle callback
pub type Hook = Box<dyn FnMut(&Module)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Mounted,
    QueryUpdated,
    ParamUpdated,
    Unmount,
}

/// Optional lifecycle hooks
#[derive(Default)]
pub struct Lifecycle {
    pub mounted: Option<Hook>,
    pub query_updated: Option<Hook>,
    pub param_updated: Option<Hook>,
    pub unmount: Option<Hook>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_mounted(mut self, hook: impl FnMut(&Module) + 'static) -> Self {
        self.mounted = Some(Box::new(hook));
        self
    }

    pub fn on_query_updated(mut self, hook: impl FnMut(&Module) + 'static) -> Self {
        self.query_updated = Some(Box::new(hook));
        self
    }

    pub fn on_param_updated(mut self, hook: impl FnMut(&Module) + 'static) -> Self {
        self.param_updated = Some(Box::new(hook));
        self
    }

    pub fn on_unmount(mut self, hook: impl FnMut(&Module) + 'static) -> Self {
        self.unmount = Some(Box::new(hook));
        self
    }

    fn slot(&mut self, stage: Stage) -> &mut Option<Hook> {
        match stage {
            Stage::Mounted => &mut self.mounted,
            Stage::QueryUpdated => &mut self.query_updated,
            Stage::ParamUpdated => &mut self.param_updated,
            Stage::Unmount => &mut self.unmount,
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("mounted", &self.mounted.is_some())
            .field("query_updated", &self.query_updated.is_some())
            .field("param_updated", &self.param_updated.is_some())
            .field("unmount", &self.unmount.is_some())
            .finish()
    }
}

/// A mounted template with its state and references
pub struct Module {
    state: ViewModel,
    refs: ReferenceTable,
    tmpl: Tmpl,
    root: VNode,
    stack: TransactionStack,
    lifecycle: RefCell<Lifecycle>,
    attached: Cell<bool>,
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("root", &self.root)
            .field("refs", &self.refs)
            .field("attached", &self.attached.get())
            .finish()
    }
}

impl Module {
    /// Bind `root` to `state`, mount it, then fire `mounted`
    pub fn new(
        stack: &TransactionStack,
        root: VNode,
        state: ViewModel,
        lifecycle: Lifecycle,
        options: TmplOptions,
    ) -> TmplResult<Self> {
        let refs = ReferenceTable::new();
        let tmpl = Tmpl::new(&state, &refs, stack, options);
        let module = Self {
            state,
            refs,
            tmpl,
            root,
            stack: stack.clone(),
            lifecycle: RefCell::new(lifecycle),
            attached: Cell::new(false),
        };

        module.tmpl.mount(&module.root, options.force_attach)?;
        module.attached.set(true);
        tracing::debug!(root = module.root.id(), "module mounted");

        module.mounted()?;
        Ok(module)
    }

    /// Bind an element already in the document in place
    pub fn from_dom(
        stack: &TransactionStack,
        element: NodeId,
        state: ViewModel,
        lifecycle: Lifecycle,
        options: TmplOptions,
    ) -> TmplResult<Self> {
        let root = VNode::from_dom(stack.document(), element).ok_or(TmplError::Dom(DomError::NotFound(element)))?;
        Self::new(stack, root, state, lifecycle, options)
    }

    pub fn state(&self) -> &ViewModel {
        &self.state
    }

    pub fn root(&self) -> &VNode {
        &self.root
    }

    pub fn tmpl(&self) -> &Tmpl {
        &self.tmpl
    }

    pub fn stack(&self) -> &TransactionStack {
        &self.stack
    }

    pub fn references(&self) -> &ReferenceTable {
        &self.refs
    }

    /// Resolve a `:ref` name; undefined when nothing live is behind it
    pub fn refs(&self, name: &str) -> Reference {
        self.refs.get(name)
    }

    pub fn is_mounted(&self) -> bool {
        self.attached.get()
    }

    pub fn mounted(&self) -> TmplResult<PatchReport> {
        self.fire(Stage::Mounted)
    }

    pub fn query_updated(&self) -> TmplResult<PatchReport> {
        self.fire(Stage::QueryUpdated)
    }

    pub fn param_updated(&self) -> TmplResult<PatchReport> {
        self.fire(Stage::ParamUpdated)
    }

    /// Run the `unmount` hook, stop every binding and detach the root
    pub fn unmount(&self) {
        if !self.attached.replace(false) {
            return;
        }
        self.run_hook(Stage::Unmount);

        let dom = self.root.dom();
        self.root.unmount();
        if let Some(dom) = dom {
            let document = self.stack.document();
            if let Err(err) = document.detach(dom) {
                tracing::warn!(error = %err, "failed to detach module root");
            }
            document.clear_subtree_listeners(dom);
        }
        self.refs.clear();
        tracing::debug!(root = self.root.id(), "module unmounted");
    }

    fn fire(&self, stage: Stage) -> TmplResult<PatchReport> {
        let tx = self.stack.start();
        self.run_hook(stage);
        Ok(tx.commit()?)
    }

    fn run_hook(&self, stage: Stage) {
        // Taken out while it runs so the hook may call back into the module
        let hook = self.lifecycle.borrow_mut().slot(stage).take();
        let Some(mut hook) = hook else { return };
        tracing::trace!(?stage, "lifecycle hook");
        hook(self);
        let mut lifecycle = self.lifecycle.borrow_mut();
        let slot = lifecycle.slot(stage);
        if slot.is_none() {
            *slot = Some(hook);
        }
    }
}
