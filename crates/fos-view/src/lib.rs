//! fOS View
//!
//! A reactive view layer over a virtual DOM.
//!
//! State lives in [`ViewModel`]s whose reads are tracked by watchers;
//! directive-annotated [`VNode`] trees are bound to that state and every
//! DOM write is deferred into a transaction that diffs and patches once per
//! commit.
//!
//! # Example
//! ```rust,ignore
//! use fos_view::{Config, Lifecycle, View, VNode};
//!
//! let view = View::new(Config::default());
//! let state = view.state_from_json(&serde_json::json!({ "name": "world" }));
//! let root = VNode::element("p").with_child(VNode::text("hello {{ name }}"));
//! let module = view.mount(root, state, Lifecycle::new())?;
//! module.state().set("name", "fOS");
//! ```

mod config;
mod logging;
mod view;

pub use config::Config;
pub use logging::init_tracing;
pub use view::View;

pub use fos_dom::{Document, DomEvent, NodeId};
pub use fos_reactive::{Function, ReactiveArray, ReactiveContext, Value, ViewModel, Watcher};
pub use fos_tmpl::{Lifecycle, Module, RefTarget, Reference, TmplError, TmplOptions, TmplResult};
pub use fos_vdom::{PatchReport, Transaction, TransactionError, TransactionStack, VNode};

// Re-export sub-crates for advanced usage
pub use fos_dom as dom;
pub use fos_reactive as reactive;
pub use fos_vdom as vdom;
pub use fos_tmpl as tmpl;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
