//! fOS VDOM - Virtual node tree
//!
//! Virtual nodes mirror the real DOM and carry directive state. Mutations
//! never touch the DOM directly: a node is first collected into the active
//! [`Transaction`], which snapshots it, and on commit every collected node is
//! diffed against its snapshot and the resulting [`PatchSet`] applied.

mod vnode;
mod snapshot;
mod diff;
mod patch;
mod transaction;

pub use vnode::{VKind, VNode, WeakVNode};
pub use snapshot::VSnapshot;
pub use diff::{diff, PatchOp, PatchSet};
pub use patch::{patch, render, PatchError, PatchReport};
pub use transaction::{
    Transaction, TransactionError, TransactionStack, WeakTransactionStack, DEFAULT_MAX_COMMIT_PASSES,
};
