//! Reactive state proxy
//!
//! Every property lives in an accessor table entry holding its value and its
//! [`Subscriber`]. `get` subscribes the active watcher, `set` notifies when
//! the value actually changed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{ReactiveContext, Subscriber, Value};

struct Property {
    value: Value,
    subs: Subscriber,
}

impl Property {
    fn new(value: Value) -> Self {
        Self { value, subs: Subscriber::new() }
    }
}

struct VmInner {
    ctx: ReactiveContext,
    props: RefCell<HashMap<String, Property>>,
}

/// Observable state object
///
/// Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct ViewModel {
    inner: Rc<VmInner>,
}

impl std::fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewModel")
            .field("keys", &self.keys())
            .finish()
    }
}

impl ViewModel {
    pub fn new(ctx: &ReactiveContext) -> Self {
        Self {
            inner: Rc::new(VmInner {
                ctx: ctx.clone(),
                props: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Build from a JSON object; non-object JSON yields an empty model
    pub fn from_json(ctx: &ReactiveContext, json: &serde_json::Value) -> Self {
        match Value::from_json(ctx, json) {
            Value::Object(vm) => vm,
            _ => Self::new(ctx),
        }
    }

    pub fn context(&self) -> &ReactiveContext {
        &self.inner.ctx
    }

    pub fn ptr_eq(&self, other: &ViewModel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the shared object, stable for its lifetime
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Tracked read
    ///
    /// Missing keys read as `Undefined`; inside a recording the entry is
    /// created so the read is still tracked and a later write notifies.
    pub fn get(&self, key: &str) -> Value {
        let recording = self.inner.ctx.is_recording();
        let (value, subs) = {
            let mut props = self.inner.props.borrow_mut();
            match props.get(key) {
                Some(prop) => (prop.value.clone(), prop.subs.clone()),
                None if recording => {
                    let prop = props.entry(key.to_string()).or_insert_with(|| Property::new(Value::Undefined));
                    (Value::Undefined, prop.subs.clone())
                }
                None => return Value::Undefined,
            }
        };
        if recording {
            self.inner.ctx.track(&subs);
            if let Value::Array(array) = &value {
                self.inner.ctx.track(array.subscriber());
            }
        }
        value
    }

    /// Untracked read
    pub fn peek(&self, key: &str) -> Value {
        self.inner.props.borrow().get(key).map(|p| p.value.clone()).unwrap_or_default()
    }

    /// Write; returns whether watchers were notified
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let subs = {
            let mut props = self.inner.props.borrow_mut();
            let prop = props.entry(key.to_string()).or_insert_with(|| Property::new(Value::Undefined));
            if prop.value.same(&value) {
                return false;
            }
            prop.value = value;
            prop.subs.clone()
        };
        tracing::trace!(key, watchers = subs.len(), "property changed");
        subs.notify();
        true
    }

    /// Whether the key holds a defined value
    pub fn has(&self, key: &str) -> bool {
        self.inner.props.borrow().get(key).is_some_and(|p| !p.value.is_undefined())
    }

    /// Whether an accessor entry exists for the key, whatever its value
    pub fn contains(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    /// Keys holding defined values, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.props.borrow()
            .iter()
            .filter(|(_, p)| !p.value.is_undefined())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Notification list of a key, if it exists yet
    pub fn subscriber(&self, key: &str) -> Option<Subscriber> {
        self.inner.props.borrow().get(key).map(|p| p.subs.clone())
    }

    /// Live watchers subscribed to a key
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscriber(key).map(|s| s.len()).unwrap_or(0)
    }

    /// Total live subscriptions across all keys
    pub fn total_subscriptions(&self) -> usize {
        self.inner.props.borrow().values().map(|p| p.subs.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReactiveArray, Watcher};
    use std::cell::Cell;

    fn counter(ctx: &ReactiveContext, vm: &ViewModel, key: &'static str) -> (Watcher, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let src = vm.clone();
        let w = Watcher::new(ctx, move || src.get(key), move |_, _| c.set(c.get() + 1));
        (w, calls)
    }

    #[test]
    fn test_equal_write_is_silent() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("a", "x");
        let (_w, calls) = counter(&ctx, &vm, "a");

        assert!(vm.set("a", "y"));
        assert!(!vm.set("a", "y"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_missing_key_is_tracked() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        assert!(vm.get("late").is_undefined());
        assert!(vm.subscriber("late").is_none());

        let (w, calls) = counter(&ctx, &vm, "late");
        assert!(w.value().is_undefined());
        assert_eq!(vm.subscriber_count("late"), 1);

        vm.set("late", 5);
        assert_eq!(calls.get(), 2);
        assert!(vm.has("late"));
    }

    #[test]
    fn test_array_mutation_notifies_property_watchers() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        let list = ReactiveArray::from_vec(vec![1.into(), 2.into()]);
        vm.set("list", list.clone());
        let (_w, calls) = counter(&ctx, &vm, "list");

        list.push(3);
        assert_eq!(calls.get(), 2);

        // Same array written back: no notification
        vm.set("list", list.clone());
        assert_eq!(calls.get(), 2);

        // Replaced array: old instance no longer observed
        vm.set("list", ReactiveArray::new());
        assert_eq!(calls.get(), 3);
        list.push(4);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_keys() {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("b", 1);
        vm.set("a", 2);
        assert_eq!(vm.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
