//! Name resolution for directive expressions
//!
//! A scope is a chain of view models. The root is the module state; every
//! `:for` item pushes a small model holding the loop variables. Lookups walk
//! inward-out and fall back to a tracked read on the root, so a name that is
//! not defined yet still reads as `undefined` and re-runs the watcher once it
//! is written.

use std::rc::Rc;

use fos_reactive::{ReactiveContext, Value, ViewModel};

struct Frame {
    locals: ViewModel,
    parent: Option<Scope>,
}

#[derive(Clone)]
pub struct Scope {
    frame: Rc<Frame>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("depth", &self.depth()).finish()
    }
}

impl Scope {
    pub fn new(root: &ViewModel) -> Self {
        Self {
            frame: Rc::new(Frame { locals: root.clone(), parent: None }),
        }
    }

    /// Nested scope whose own names shadow the outer ones
    pub fn child(&self, locals: &ViewModel) -> Self {
        Self {
            frame: Rc::new(Frame { locals: locals.clone(), parent: Some(self.clone()) }),
        }
    }

    pub fn locals(&self) -> &ViewModel {
        &self.frame.locals
    }

    pub fn context(&self) -> &ReactiveContext {
        self.frame.locals.context()
    }

    /// The module state at the bottom of the chain
    pub fn root(&self) -> &ViewModel {
        match &self.frame.parent {
            Some(parent) => parent.root(),
            None => &self.frame.locals,
        }
    }

    /// Number of nested frames above the root
    pub fn depth(&self) -> usize {
        self.frame.parent.as_ref().map(|p| p.depth() + 1).unwrap_or(0)
    }

    /// Whether the scope belongs to a `:for` item
    pub fn in_loop(&self) -> bool {
        self.frame.parent.is_some()
    }

    /// Tracked lookup of a free variable
    pub fn lookup(&self, name: &str) -> Value {
        match &self.frame.parent {
            Some(parent) if !self.frame.locals.contains(name) => parent.lookup(name),
            _ => self.frame.locals.get(name),
        }
    }
}
