//! Subscriber and Watcher primitives
//!
//! A [`Subscriber`] is the notification list of one observable property.
//! It holds its watchers weakly; a watcher is owned by whoever bound it
//! (normally a virtual node) and unsubscribes itself when stopped or dropped.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{ReactiveContext, Value};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Upper bound on re-runs requested while a watcher is already running
const MAX_REENTRANT_RUNS: usize = 100;

// ============================================================================
// Subscriber
// ============================================================================

struct SubscriberInner {
    id: u64,
    watchers: RefCell<Vec<Weak<WatcherInner>>>,
}

/// Notification list for one observable property
#[derive(Clone)]
pub struct Subscriber {
    inner: Rc<SubscriberInner>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("watchers", &self.len())
            .finish()
    }
}

impl Default for Subscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SubscriberInner {
                id: next_id(),
                watchers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Subscriber) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live watchers on the list
    pub fn len(&self) -> usize {
        self.inner.watchers.borrow().iter().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn subscribe(&self, watcher: &Rc<WatcherInner>) {
        let mut list = self.inner.watchers.borrow_mut();
        if !list.iter().any(|w| std::ptr::eq(w.as_ptr(), Rc::as_ptr(watcher))) {
            list.push(Rc::downgrade(watcher));
        }
    }

    fn unsubscribe(&self, watcher: &WatcherInner) {
        self.inner.watchers.borrow_mut()
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), watcher));
    }

    /// Run every subscribed watcher, in subscription order
    ///
    /// The list is snapshotted first: watchers re-subscribe while they run.
    pub fn notify(&self) {
        let watchers: Vec<Rc<WatcherInner>> = {
            let mut list = self.inner.watchers.borrow_mut();
            list.retain(|w| w.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        for watcher in watchers {
            watcher.run();
        }
    }
}

// ============================================================================
// Watcher
// ============================================================================

type ChangeFn = Box<dyn FnMut(&Value, &Value)>;

struct WatcherInner {
    id: u64,
    ctx: ReactiveContext,
    evaluate: Box<dyn Fn() -> Value>,
    on_change: RefCell<ChangeFn>,
    value: RefCell<Value>,
    deps: RefCell<Vec<Subscriber>>,
    active: Cell<bool>,
    running: Cell<bool>,
    pending: Cell<bool>,
    initialized: Cell<bool>,
    weak_self: Weak<WatcherInner>,
}

impl WatcherInner {
    fn run(&self) {
        if !self.active.get() {
            return;
        }
        if self.running.get() {
            self.pending.set(true);
            return;
        }
        self.running.set(true);
        let mut runs = 0;
        loop {
            self.pending.set(false);
            self.evaluate_once();
            runs += 1;
            if !self.pending.get() || !self.active.get() {
                break;
            }
            if runs >= MAX_REENTRANT_RUNS {
                tracing::warn!(watcher = self.id, runs, "watcher keeps invalidating itself; giving up");
                break;
            }
        }
        self.running.set(false);
    }

    fn evaluate_once(&self) {
        self.clear_deps();

        let (value, deps) = self.ctx.record(|| (self.evaluate)());
        if let Some(me) = self.weak_self.upgrade() {
            for dep in &deps {
                dep.subscribe(&me);
            }
        }
        tracing::trace!(watcher = self.id, deps = deps.len(), "watcher evaluated");
        *self.deps.borrow_mut() = deps;

        let old = self.value.replace(value.clone());
        let first = !self.initialized.replace(true);
        if first || !old.same(&value) || value.is_structured() {
            (self.on_change.borrow_mut())(&value, &old);
        }
    }

    fn clear_deps(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.unsubscribe(self);
        }
    }
}

/// Recomputes an expression whenever something it read changes
///
/// `on_change(new, old)` runs once with the initial value (old is
/// `Undefined`) and afterwards whenever a re-evaluation produces a different
/// value. Array and object values always count as changed since they are
/// mutated in place.
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("deps", &self.dependency_count())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

impl Watcher {
    pub fn new(
        ctx: &ReactiveContext,
        evaluate: impl Fn() -> Value + 'static,
        on_change: impl FnMut(&Value, &Value) + 'static,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak_self| WatcherInner {
            id: next_id(),
            ctx: ctx.clone(),
            evaluate: Box::new(evaluate),
            on_change: RefCell::new(Box::new(on_change)),
            value: RefCell::new(Value::Undefined),
            deps: RefCell::new(Vec::new()),
            active: Cell::new(true),
            running: Cell::new(false),
            pending: Cell::new(false),
            initialized: Cell::new(false),
            weak_self: weak_self.clone(),
        });
        inner.run();
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Last computed value
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Force a re-evaluation
    pub fn update(&self) {
        self.inner.run();
    }

    /// Number of properties read by the last evaluation
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Whether the last evaluation read `sub`
    pub fn depends_on(&self, sub: &Subscriber) -> bool {
        self.inner.deps.borrow().iter().any(|d| d.ptr_eq(sub))
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Unsubscribe from everything; the watcher never runs again
    pub fn stop(&self) {
        if self.inner.active.replace(false) {
            self.inner.clear_deps();
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ViewModel;

    #[test]
    fn test_initial_run_and_change() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("a", 1);

        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let src = vm.clone();
        let w = Watcher::new(&ctx, move || src.get("a"), move |_, _| c.set(c.get() + 1));
        assert_eq!(calls.get(), 1);
        assert_eq!(w.dependency_count(), 1);

        vm.set("a", 2);
        assert_eq!(calls.get(), 2);
        assert_eq!(w.value().to_string(), "2");
    }

    #[test]
    fn test_dependencies_replaced() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("flag", true);
        vm.set("x", 1);
        vm.set("y", 2);

        let src = vm.clone();
        let w = Watcher::new(
            &ctx,
            move || if src.get("flag").truthy() { src.get("x") } else { src.get("y") },
            |_, _| {},
        );
        assert_eq!(vm.subscriber_count("x"), 1);
        assert_eq!(vm.subscriber_count("y"), 0);

        vm.set("flag", false);
        assert_eq!(vm.subscriber_count("x"), 0);
        assert_eq!(vm.subscriber_count("y"), 1);
        assert_eq!(w.dependency_count(), 2);
    }

    #[test]
    fn test_stop_and_drop_unsubscribe() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("a", 1);

        let src = vm.clone();
        let w = Watcher::new(&ctx, move || src.get("a"), |_, _| {});
        assert_eq!(vm.subscriber_count("a"), 1);
        w.stop();
        assert_eq!(vm.subscriber_count("a"), 0);
        assert!(!w.is_active());

        let src = vm.clone();
        let w = Watcher::new(&ctx, move || src.get("a"), |_, _| {});
        assert_eq!(vm.subscriber_count("a"), 1);
        drop(w);
        assert_eq!(vm.subscriber_count("a"), 0);
    }

    #[test]
    fn test_self_invalidation_is_bounded() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("n", 0);

        let src = vm.clone();
        let sink = vm.clone();
        let _w = Watcher::new(
            &ctx,
            move || src.get("n"),
            move |v, _| {
                let n = v.as_number().unwrap_or(0.0);
                if n < 3.0 {
                    sink.set("n", n + 1.0);
                }
            },
        );
        assert_eq!(vm.peek("n").as_number(), Some(3.0));
    }
}
