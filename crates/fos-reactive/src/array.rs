//! Reactive arrays
//!
//! Length-mutating operations notify the array's own subscriber, which every
//! watcher that read a property holding the array is subscribed to. Writes
//! to individual indices are not observed.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::{Subscriber, Value};

#[derive(Default)]
struct ArrayInner {
    items: RefCell<Vec<Value>>,
    subs: Subscriber,
}

/// Observable sequence
#[derive(Clone, Default)]
pub struct ReactiveArray {
    inner: Rc<ArrayInner>,
}

impl std::fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}

impl ReactiveArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(items),
                subs: Subscriber::new(),
            }),
        }
    }

    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn subscriber(&self) -> &Subscriber {
        &self.inner.subs
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the items
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Overwrite one slot without notifying
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        match self.inner.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let result = f(&mut self.inner.items.borrow_mut());
        tracing::trace!(op, len = self.len(), "array mutated");
        self.inner.subs.notify();
        result
    }

    /// Append; returns the new length
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate("push", |items| {
            items.push(value);
            items.len()
        })
    }

    pub fn pop(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        self.mutate("pop", |items| items.pop())
    }

    pub fn shift(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        self.mutate("shift", |items| Some(items.remove(0)))
    }

    /// Prepend; returns the new length
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate("unshift", |items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` items at `start` and insert `insert` in their place
    ///
    /// `start` and `delete_count` are clamped to the array bounds. Returns the
    /// removed items.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        self.mutate("splice", |items| {
            let start = start.min(items.len());
            let end = start + delete_count.min(items.len() - start);
            items.splice(start..end, insert).collect()
        })
    }

    pub fn reverse(&self) {
        self.mutate("reverse", |items| items.reverse())
    }

    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.mutate("sort", |items| items.sort_by(|a, b| compare(a, b)))
    }

    /// Sort with the default value ordering
    pub fn sort(&self) {
        self.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal))
    }

    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }
        self.mutate("clear", |items| items.clear())
    }
}

impl From<Vec<Value>> for ReactiveArray {
    fn from(items: Vec<Value>) -> Self {
        Self::from_vec(items)
    }
}

impl FromIterator<Value> for ReactiveArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(array: &ReactiveArray) -> Vec<String> {
        array.to_vec().iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_splice() {
        let array: ReactiveArray = ["a", "b", "c"].into_iter().map(Value::from).collect();
        let removed = array.splice(1, 1, vec![]);
        assert_eq!(removed.len(), 1);
        assert_eq!(strings(&array), vec!["a", "c"]);

        array.splice(10, 5, vec!["z".into()]);
        assert_eq!(strings(&array), vec!["a", "c", "z"]);

        array.splice(0, 0, vec!["y".into()]);
        assert_eq!(strings(&array), vec!["y", "a", "c", "z"]);
    }

    #[test]
    fn test_queue_ops() {
        let array = ReactiveArray::new();
        assert_eq!(array.push(1), 1);
        assert_eq!(array.unshift(0), 2);
        assert_eq!(array.shift().map(|v| v.to_string()), Some("0".into()));
        assert_eq!(array.pop().map(|v| v.to_string()), Some("1".into()));
        assert!(array.pop().is_none());
    }

    #[test]
    fn test_sort_and_reverse() {
        let array: ReactiveArray = [3, 1, 2].into_iter().map(Value::from).collect();
        array.sort();
        assert_eq!(strings(&array), vec!["1", "2", "3"]);
        array.reverse();
        assert_eq!(strings(&array), vec!["3", "2", "1"]);
    }
}
