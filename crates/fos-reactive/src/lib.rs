//! fOS Reactive - Dependency tracking
//!
//! Plain state becomes observable through a [`ViewModel`] accessor table.
//! A [`Watcher`] evaluates an expression while recording every property it
//! reads, subscribes to exactly those properties, and re-runs synchronously
//! whenever one of them is written.
//!
//! # Example
//!
//! ```
//! use fos_reactive::{ReactiveContext, ViewModel, Watcher, Value};
//! use std::{cell::RefCell, rc::Rc};
//!
//! let ctx = ReactiveContext::new();
//! let vm = ViewModel::new(&ctx);
//! vm.set("count", 1);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! let source = vm.clone();
//! let _watcher = Watcher::new(
//!     &ctx,
//!     move || source.get("count"),
//!     move |value, _old| log.borrow_mut().push(value.to_string()),
//! );
//!
//! vm.set("count", 2);
//! vm.set("count", 2);
//! assert_eq!(*seen.borrow(), vec!["1", "2"]);
//! ```

mod array;
mod context;
mod subscriber;
mod value;
mod view_model;

pub use array::ReactiveArray;
pub use context::ReactiveContext;
pub use subscriber::{Subscriber, Watcher};
pub use value::{Function, HandlerFn, Value};
pub use view_model::ViewModel;
