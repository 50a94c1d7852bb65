//! Dynamic state values
//!
//! Primitives compare by value; arrays, objects and functions compare by
//! identity, which is what the equality guard on property writes relies on.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use fos_dom::DomEvent;

use crate::{ReactiveArray, ReactiveContext, ViewModel};

/// Signature of a callable state value
///
/// Event handlers receive the triggering event first; calls made from
/// plain expressions pass `None`.
pub type HandlerFn = dyn Fn(Option<&DomEvent>, &[Value]) -> Value;

/// Callable value
#[derive(Clone)]
pub struct Function(Rc<HandlerFn>);

impl Function {
    pub fn new(f: impl Fn(Option<&DomEvent>, &[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: Option<&DomEvent>, args: &[Value]) -> Value {
        (self.0)(event, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

/// State value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ReactiveArray),
    Object(ViewModel),
    Function(Function),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Arrays and objects: mutated in place, never equal to "themselves before"
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness of the value
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Identity-or-value equality used by the write guard
    ///
    /// `NaN` is the same as `NaN`, so repeated `NaN` writes stay silent.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Loose equality (`==`): `null == undefined`, numeric strings compare as numbers
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    /// Strict equality (`===`)
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same(other),
        }
    }

    /// Numeric conversion; `NaN` when not convertible
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Number(n) => *n,
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() { 0.0 } else { s.parse().unwrap_or(f64::NAN) }
            }
            _ => f64::NAN,
        }
    }

    /// Number payload, without conversion
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ViewModel> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Text used by interpolation; `undefined` and `null` optionally render empty
    pub fn to_text(&self, empty_for_nullish: bool) -> String {
        if empty_for_nullish && self.is_nullish() {
            String::new()
        } else {
            self.to_string()
        }
    }

    /// Ordering used by relational operators and default sorting
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }

    /// Build a value from JSON; objects become view models sharing `ctx`
    pub fn from_json(ctx: &ReactiveContext, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => Value::Array(ReactiveArray::from_vec(
                items.iter().map(|item| Value::from_json(ctx, item)).collect(),
            )),
            serde_json::Value::Object(map) => {
                let vm = ViewModel::new(ctx);
                for (key, item) in map {
                    vm.set(key, Value::from_json(ctx, item));
                }
                Value::Object(vm)
            }
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == n.trunc() && n.abs() < 1e21 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Array(a) => {
                for (i, item) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(_) => f.write_str("function"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(a) => f.debug_list().entries(a.to_vec()).finish(),
            Value::Object(o) => f.debug_set().entries(o.keys()).finish(),
            other => write!(f, "{}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<ReactiveArray> for Value {
    fn from(a: ReactiveArray) -> Self {
        Value::Array(a)
    }
}

impl From<ViewModel> for Value {
    fn from(o: ViewModel) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn test_same() {
        assert!(Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(!Value::from(1).same(&Value::from("1")));

        let a = ReactiveArray::new();
        assert!(Value::from(a.clone()).same(&Value::from(a)));
        assert!(!Value::from(ReactiveArray::new()).same(&Value::from(ReactiveArray::new())));
    }

    #[test]
    fn test_truthy() {
        assert!(!Value::from(0).truthy());
        assert!(!Value::from("").truthy());
        assert!(!Value::Undefined.truthy());
        assert!(Value::from(1).truthy());
        assert!(Value::from(ReactiveArray::new()).truthy());
    }

    #[test]
    fn test_loose_eq() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::from(1).loose_eq(&Value::from("1")));
        assert!(!Value::from(1).strict_eq(&Value::from("1")));
        assert!(!Value::Null.loose_eq(&Value::from(0)));
    }

    #[test]
    fn test_from_json() {
        let ctx = ReactiveContext::new();
        let json = serde_json::json!({ "name": "a", "list": [1, 2], "nested": { "x": null } });
        let value = Value::from_json(&ctx, &json);
        let vm = value.as_object().unwrap();
        assert_eq!(vm.peek("name").as_str(), Some("a"));
        assert_eq!(vm.peek("list").to_string(), "1,2");
        assert!(vm.peek("nested").as_object().unwrap().peek("x").is_nullish());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Undefined.to_text(true), "");
        assert_eq!(Value::Undefined.to_text(false), "undefined");
    }
}
