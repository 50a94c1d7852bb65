//! Expression evaluation
//!
//! Evaluation never fails: unknown names, member access on non-objects and
//! calls of non-functions all produce `undefined`. Every name and property
//! read goes through the view models, so evaluating inside a watcher records
//! exactly the properties the expression touched.

use fos_reactive::{ReactiveArray, Value};

use super::ast::{BinaryOp, Expr, ExprKind, LiteralValue, LogicalOp, UnaryOp};
use crate::Scope;

pub fn evaluate(expr: &Expr, scope: &Scope) -> Value {
    match &expr.kind {
        ExprKind::Literal(literal) => literal_value(literal),
        ExprKind::Identifier(name) => scope.lookup(name),
        ExprKind::Array(items) => {
            Value::Array(ReactiveArray::from_vec(items.iter().map(|e| evaluate(e, scope)).collect()))
        }
        ExprKind::Member { object, property } => member(&evaluate(object, scope), property),
        ExprKind::Index { object, index } => {
            let object = evaluate(object, scope);
            let index = evaluate(index, scope);
            index_value(&object, &index)
        }
        ExprKind::Unary { operator, argument } => unary(*operator, evaluate(argument, scope)),
        ExprKind::Binary { operator, left, right } => {
            let left = evaluate(left, scope);
            let right = evaluate(right, scope);
            binary(*operator, &left, &right)
        }
        ExprKind::Logical { operator, left, right } => {
            let left = evaluate(left, scope);
            let short_circuit = match operator {
                LogicalOp::And => !left.truthy(),
                LogicalOp::Or => left.truthy(),
                LogicalOp::Nullish => !left.is_nullish(),
            };
            if short_circuit { left } else { evaluate(right, scope) }
        }
        ExprKind::Conditional { test, consequent, alternate } => {
            if evaluate(test, scope).truthy() {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        ExprKind::Call { callee, arguments } => {
            let callee = evaluate(callee, scope);
            let args: Vec<Value> = arguments.iter().map(|a| evaluate(a, scope)).collect();
            match callee.as_function() {
                Some(function) => function.call(None, &args),
                None => Value::Undefined,
            }
        }
    }
}

fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::from(&**s),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Null => Value::Null,
        LiteralValue::Undefined => Value::Undefined,
    }
}

/// `object.property`
pub fn member(object: &Value, property: &str) -> Value {
    match object {
        Value::Object(vm) => vm.get(property),
        Value::Array(array) if property == "length" => Value::from(array.len()),
        Value::String(s) if property == "length" => Value::from(s.chars().count()),
        _ => Value::Undefined,
    }
}

fn index_value(object: &Value, index: &Value) -> Value {
    match object {
        Value::Array(array) => match as_index(index) {
            Some(i) => array.get(i).unwrap_or_default(),
            None => member(object, &index.to_string()),
        },
        Value::String(s) => match as_index(index) {
            Some(i) => s.chars().nth(i).map(|c| Value::from(c.to_string())).unwrap_or_default(),
            None => member(object, &index.to_string()),
        },
        _ => member(object, &index.to_string()),
    }
}

fn as_index(index: &Value) -> Option<usize> {
    let n = index.as_number().or_else(|| index.as_str().and_then(|s| s.parse().ok()))?;
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn unary(operator: UnaryOp, argument: Value) -> Value {
    match operator {
        UnaryOp::Not => Value::Bool(!argument.truthy()),
        UnaryOp::Minus => Value::Number(-argument.to_number()),
        UnaryOp::Plus => Value::Number(argument.to_number()),
        UnaryOp::Typeof => Value::from(match argument {
            Value::Null | Value::Array(_) => "object",
            ref other => other.type_name(),
        }),
    }
}

fn binary(operator: BinaryOp, left: &Value, right: &Value) -> Value {
    use std::cmp::Ordering;

    match operator {
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => Value::from(format!("{}{}", left, right)),
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(left.compare(right) == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Gt => Value::Bool(left.compare(right) == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(left.compare(right), Some(Ordering::Greater | Ordering::Equal))),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use fos_reactive::{Function, ReactiveContext, ViewModel};

    fn state() -> (ReactiveContext, ViewModel) {
        let ctx = ReactiveContext::new();
        let json = serde_json::json!({
            "n": 2,
            "name": "amaple",
            "list": ["a", "b", "c"],
            "user": { "age": 30, "tags": [1, 2] },
            "empty": null
        });
        let vm = ViewModel::from_json(&ctx, &json);
        (ctx, vm)
    }

    fn eval(src: &str, vm: &ViewModel) -> Value {
        evaluate(&parse_expression(src).unwrap(), &Scope::new(vm))
    }

    #[test]
    fn test_arithmetic_and_strings() {
        let (_, vm) = state();
        assert_eq!(eval("n * 3 + 1", &vm).to_string(), "7");
        assert_eq!(eval("name + '-' + n", &vm).to_string(), "amaple-2");
        assert_eq!(eval("7 % n", &vm).to_string(), "1");
        assert_eq!(eval("-n", &vm).to_string(), "-2");
    }

    #[test]
    fn test_members_and_indexes() {
        let (_, vm) = state();
        assert_eq!(eval("list.length", &vm).to_string(), "3");
        assert_eq!(eval("list[1]", &vm).to_string(), "b");
        assert_eq!(eval("user.age", &vm).to_string(), "30");
        assert_eq!(eval("user['tags'][0]", &vm).to_string(), "1");
        assert_eq!(eval("name.length", &vm).to_string(), "6");
        assert!(eval("user.missing.deeper", &vm).is_undefined());
        assert!(eval("list[9]", &vm).is_undefined());
    }

    #[test]
    fn test_logic_and_comparison() {
        let (_, vm) = state();
        assert_eq!(eval("n > 1 && name", &vm).to_string(), "amaple");
        assert_eq!(eval("empty || 'fallback'", &vm).to_string(), "fallback");
        assert_eq!(eval("empty ?? 'd'", &vm).to_string(), "d");
        assert_eq!(eval("0 ?? 'd'", &vm).to_string(), "0");
        assert_eq!(eval("n == '2'", &vm).to_string(), "true");
        assert_eq!(eval("n === '2'", &vm).to_string(), "false");
        assert_eq!(eval("n >= 2 ? 'big' : 'small'", &vm).to_string(), "big");
        assert_eq!(eval("typeof list", &vm).to_string(), "object");
        assert_eq!(eval("typeof missing", &vm).to_string(), "undefined");
    }

    #[test]
    fn test_calls() {
        let (_, vm) = state();
        vm.set("double", Function::new(|_, args| {
            Value::Number(args.first().map(Value::to_number).unwrap_or(0.0) * 2.0)
        }));
        assert_eq!(eval("double(n + 1)", &vm).to_string(), "6");
        assert!(eval("name(1)", &vm).is_undefined());
    }

    #[test]
    fn test_tracks_exactly_what_is_read() {
        let (ctx, vm) = state();
        let expr = parse_expression("n > 5 ? name : user.age").unwrap();
        let scope = Scope::new(&vm);
        let (value, deps) = ctx.record(|| evaluate(&expr, &scope));
        assert_eq!(value.to_string(), "30");
        // n, user and user.age; the untaken branch is not read
        assert_eq!(deps.len(), 3);
    }
}
