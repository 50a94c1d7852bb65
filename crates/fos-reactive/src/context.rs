//! Active-watcher stack
//!
//! Recording is scoped: [`ReactiveContext::record`] pushes a frame, runs the
//! evaluation and pops the frame again through a guard, so an unwinding
//! evaluation never leaves a stale frame behind.

use std::cell::RefCell;
use std::rc::Rc;

use crate::Subscriber;

/// Dependencies collected by one evaluation
type Frame = Option<Rc<RefCell<Vec<Subscriber>>>>;

/// Shared handle onto the active-watcher stack
///
/// Every view model and watcher that should see each other must share a
/// context. Cloning yields another handle to the same stack.
#[derive(Clone, Default)]
pub struct ReactiveContext {
    stack: Rc<RefCell<Vec<Frame>>>,
}

impl std::fmt::Debug for ReactiveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("depth", &self.depth())
            .finish()
    }
}

struct FrameGuard<'a> {
    ctx: &'a ReactiveContext,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.ctx.stack.borrow_mut().pop();
    }
}

impl ReactiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, frame: Frame) -> FrameGuard<'_> {
        self.stack.borrow_mut().push(frame);
        FrameGuard { ctx: self }
    }

    /// Run `f` while recording every subscriber it touches
    pub fn record<R>(&self, f: impl FnOnce() -> R) -> (R, Vec<Subscriber>) {
        let deps = Rc::new(RefCell::new(Vec::new()));
        let result = {
            let _guard = self.push(Some(deps.clone()));
            f()
        };
        let deps = deps.borrow().clone();
        (result, deps)
    }

    /// Run `f` with tracking suspended
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.push(None);
        f()
    }

    /// Register `sub` with the innermost recording frame, if any
    pub fn track(&self, sub: &Subscriber) {
        let frame = match self.stack.borrow().last() {
            Some(Some(frame)) => frame.clone(),
            _ => return,
        };
        let mut deps = frame.borrow_mut();
        if !deps.iter().any(|d| d.ptr_eq(sub)) {
            deps.push(sub.clone());
        }
    }

    /// Whether reads are currently being recorded
    pub fn is_recording(&self) -> bool {
        matches!(self.stack.borrow().last(), Some(Some(_)))
    }

    /// Number of nested frames
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn ptr_eq(&self, other: &ReactiveContext) -> bool {
        Rc::ptr_eq(&self.stack, &other.stack)
    }
}
