//! View - owns the document, the reactive context and the transaction stack

use fos_dom::{Document, NodeId};
use fos_reactive::{ReactiveContext, ViewModel};
use fos_tmpl::{Lifecycle, Module, TmplResult};
use fos_vdom::{PatchReport, Transaction, TransactionError, TransactionStack, VNode};

use crate::Config;

/// Entry point tying a document to its modules
///
/// Every module mounted through one `View` shares its document, its
/// transaction stack and its reactive context.
#[derive(Debug, Clone)]
pub struct View {
    config: Config,
    document: Document,
    context: ReactiveContext,
    stack: TransactionStack,
}

impl Default for View {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl View {
    /// Create a view over a fresh document
    pub fn new(config: Config) -> Self {
        Self::with_document(config, Document::new())
    }

    /// Create a view over an existing document
    pub fn with_document(config: Config, document: Document) -> Self {
        let stack = TransactionStack::new(&document);
        stack.set_max_commit_passes(config.max_commit_passes);
        tracing::debug!(?config, "view created");
        Self {
            config,
            document,
            context: ReactiveContext::new(),
            stack,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn context(&self) -> &ReactiveContext {
        &self.context
    }

    pub fn stack(&self) -> &TransactionStack {
        &self.stack
    }

    /// Empty state object on this view's context
    pub fn state(&self) -> ViewModel {
        ViewModel::new(&self.context)
    }

    /// State object built from a JSON object
    pub fn state_from_json(&self, json: &serde_json::Value) -> ViewModel {
        ViewModel::from_json(&self.context, json)
    }

    /// Bind and mount a template tree
    pub fn mount(&self, root: VNode, state: ViewModel, lifecycle: Lifecycle) -> TmplResult<Module> {
        Module::new(&self.stack, root, state, lifecycle, self.config.tmpl_options())
    }

    /// Bind a subtree that is already in the document
    pub fn mount_in_place(&self, element: NodeId, state: ViewModel, lifecycle: Lifecycle) -> TmplResult<Module> {
        Module::from_dom(&self.stack, element, state, lifecycle, self.config.tmpl_options())
    }

    /// Open a transaction frame
    pub fn start(&self) -> Transaction {
        self.stack.start()
    }

    /// Run `f` with every write it makes batched into one commit
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<(R, PatchReport), TransactionError> {
        self.stack.run(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_reaches_stack() {
        let view = View::new(Config { max_commit_passes: 3, ..Config::default() });
        assert_eq!(view.config().max_commit_passes, 3);
        assert!(!view.stack().is_active());
        let tx = view.start();
        assert!(view.stack().is_active());
        tx.commit().unwrap();
    }

    #[test]
    fn test_states_share_context() {
        let view = View::default();
        let a = view.state();
        let b = view.state_from_json(&serde_json::json!({ "x": 1 }));
        assert!(a.context().ptr_eq(b.context()));
        assert_eq!(b.peek("x").to_number(), 1.0);
    }
}
