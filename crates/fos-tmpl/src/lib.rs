//! fOS Tmpl - Directive binder
//!
//! Turns the `:`-prefixed attributes and `{{ }}` interpolations of a virtual
//! tree into reactive bindings against a [`ViewModel`](fos_reactive::ViewModel),
//! and wraps a bound tree in a [`Module`] with lifecycle hooks.
//!
//! Supported directives:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `:if="expr"` | node is present only while `expr` is truthy |
//! | `:for="item in list"` | one copy of the node per item, keyed by value |
//! | `:on<event>="handler(args)"` | DOM listener running in its own transaction |
//! | `:ref="name"` | exposes the node through [`Module::refs`] |
//! | `:cache` | subtree is skipped by the diff |
//! | `{{ expr }}` | text or attribute interpolation |

mod error;
pub mod expr;
mod module;
mod refs;
mod scope;
mod tmpl;

pub use error::{TmplError, TmplResult};
pub use expr::ParseError;
pub use module::{Hook, Lifecycle, Module};
pub use refs::{RefTarget, Reference, ReferenceTable};
pub use scope::Scope;
pub use tmpl::{Tmpl, TmplOptions};
