//! Integration tests - Full pipeline from state write to patched document
//!
//! Tests the complete workflow: state → watcher → transaction → diff → DOM

use std::cell::Cell;
use std::rc::Rc;

use fos_view::{Config, Function, Lifecycle, Module, NodeId, Reference, VNode, Value, View};
use proptest::prelude::*;

fn todo_template() -> VNode {
    VNode::element("section")
        .with_child(
            VNode::element("h1")
                .with_attr("class", "title {{ done == total ? 'complete' : 'open' }}")
                .with_child(VNode::text("{{ done }}/{{ total }}")),
        )
        .with_child(
            VNode::element("ul").with_attr(":ref", "list").with_child(
                VNode::element("li")
                    .with_attr(":for", "(todo, i) in todos")
                    .with_attr(":ref", "rows")
                    .with_attr(":onclick", "toggle(i)")
                    .with_child(VNode::text("{{ todo }}")),
            ),
        )
        .with_child(
            VNode::element("p")
                .with_attr(":if", "total == 0")
                .with_child(VNode::text("nothing to do")),
        )
}

fn texts(view: &View, parent: NodeId) -> Vec<String> {
    let doc = view.document();
    doc.children(parent).into_iter().map(|c| doc.text_content(c)).collect()
}

fn install_actions(module: &Module) {
    let state = module.state().clone();
    module.state().set(
        "toggle",
        Function::new(move |_, args| {
            let done = state.peek("done").to_number();
            let index = args.first().map(Value::to_number).unwrap_or(-1.0);
            if index >= 0.0 {
                state.set("done", done + 1.0);
            }
            Value::Undefined
        }),
    );
}

// ============================================================================
// END-TO-END
// ============================================================================

#[test]
fn test_todo_module() {
    let view = View::default();
    let state = view.state_from_json(&serde_json::json!({
        "todos": ["write", "test"],
        "done": 0,
        "total": 2,
    }));
    let module = view.mount(todo_template(), state, Lifecycle::new()).unwrap();
    install_actions(&module);

    let doc = view.document();
    let section = module.root().dom().unwrap();
    assert_eq!(doc.parent(section), Some(doc.body()));

    let h1 = doc.children(section)[0];
    assert_eq!(doc.text_content(h1), "0/2");
    assert_eq!(doc.attribute(h1, "class").as_deref(), Some("title open"));
    assert_eq!(doc.children(section).len(), 2);

    let ul = module.refs("list").node().unwrap();
    assert_eq!(texts(&view, ul), vec!["write", "test"]);
    assert_eq!(module.refs("rows").len(), 2);

    for row in doc.children(ul) {
        doc.dispatch_event(row, "click");
    }
    assert_eq!(doc.text_content(h1), "2/2");
    assert_eq!(doc.attribute(h1, "class").as_deref(), Some("title complete"));
}

#[test]
fn test_batch_commits_once() {
    let view = View::default();
    let state = view.state_from_json(&serde_json::json!({ "todos": [], "done": 0, "total": 0 }));
    let module = view.mount(todo_template(), state, Lifecycle::new()).unwrap();
    let doc = view.document();
    let section = module.root().dom().unwrap();
    assert_eq!(doc.text_content(doc.children(section)[2]), "nothing to do");

    let todos = module.state().peek("todos").as_array().cloned().unwrap();
    let commits = view.stack().commit_count();
    let (_, report) = view
        .batch(|| {
            todos.push("a");
            todos.push("b");
            todos.push("c");
            module.state().set("total", 3);
        })
        .unwrap();

    assert_eq!(view.stack().commit_count(), commits + 1);
    assert!(report.failures.is_empty());
    assert_eq!(doc.children(section).len(), 2);
    let ul = module.refs("list").node().unwrap();
    assert_eq!(texts(&view, ul), vec!["a", "b", "c"]);
    assert!(matches!(module.refs("rows"), Reference::List(ref rows) if rows.len() == 3));
}

#[test]
fn test_lifecycle_round_trip() {
    let view = View::default();
    let state = view.state_from_json(&serde_json::json!({ "todos": [], "done": 0, "total": 0 }));
    let queries = Rc::new(Cell::new(0));
    let q = queries.clone();
    let lifecycle = Lifecycle::new()
        .on_mounted(|module| {
            let todos = module.state().peek("todos").as_array().cloned();
            if let Some(todos) = todos {
                todos.push("loaded");
            }
            module.state().set("total", 1);
        })
        .on_query_updated(move |_| q.set(q.get() + 1));

    let module = view.mount(todo_template(), state, lifecycle).unwrap();
    let doc = view.document();
    let section = module.root().dom().unwrap();
    let ul = module.refs("list").node().unwrap();
    assert_eq!(texts(&view, ul), vec!["loaded"]);
    assert!(matches!(module.refs("rows"), Reference::Single(_)));

    module.query_updated().unwrap();
    assert_eq!(queries.get(), 1);

    module.unmount();
    assert!(!doc.is_connected(section));
    assert!(module.refs("list").is_undefined());
    assert!(module.refs("rows").is_undefined());
    assert_eq!(module.state().total_subscriptions(), 0);
}

#[test]
fn test_mount_in_place() {
    let view = View::default();
    let doc = view.document();
    let label = doc.create_element("label");
    doc.set_attribute(label, "title", "{{ hint }}").unwrap();
    let text = doc.create_text("{{ count }} items");
    doc.append_child(label, text).unwrap();
    doc.append_child(doc.body(), label).unwrap();

    let state = view.state_from_json(&serde_json::json!({ "count": 3, "hint": "total" }));
    let module = view.mount_in_place(label, state, Lifecycle::new()).unwrap();
    assert_eq!(doc.text_content(label), "3 items");
    assert_eq!(doc.attribute(label, "title").as_deref(), Some("total"));

    module.state().set("count", 4);
    assert_eq!(doc.text(text).as_deref(), Some("4 items"));
}

#[test]
fn test_without_force_attach() {
    let view = View::new(Config { force_attach: false, ..Config::default() });
    let state = view.state_from_json(&serde_json::json!({ "todos": [], "done": 0, "total": 0 }));
    let module = view.mount(todo_template(), state, Lifecycle::new()).unwrap();
    assert!(module.root().dom().is_none());
    assert!(view.document().children(view.document().body()).is_empty());
}

#[test]
fn test_config_file() {
    let path = std::env::temp_dir().join(format!("fos-view-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "empty_for_undefined": false, "max_commit_passes": 4 }"#).unwrap();
    let config = Config::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.max_commit_passes, 4);
    let view = View::new(config);
    let state = view.state();
    let module = view
        .mount(VNode::element("p").with_child(VNode::text("[{{ missing }}]")), state, Lifecycle::new())
        .unwrap();
    assert_eq!(view.document().text_content(module.root().dom().unwrap()), "[undefined]");
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[derive(Debug, Clone)]
enum ListOp {
    Push(&'static str),
    Pop,
    Shift,
    Unshift(&'static str),
    Splice(usize, usize, &'static str),
    Reverse,
    Sort,
    Clear,
}

fn word() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["a", "b", "c", "d"])
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        word().prop_map(ListOp::Push),
        Just(ListOp::Pop),
        Just(ListOp::Shift),
        word().prop_map(ListOp::Unshift),
        (0usize..6, 0usize..3, word()).prop_map(|(s, d, w)| ListOp::Splice(s, d, w)),
        Just(ListOp::Reverse),
        Just(ListOp::Sort),
        Just(ListOp::Clear),
    ]
}

proptest! {
    #[test]
    fn test_list_mirrors_state(
        initial in prop::collection::vec(word(), 0..5),
        ops in prop::collection::vec(list_op(), 1..12),
    ) {
        let view = View::default();
        let state = view.state_from_json(&serde_json::json!({ "items": initial }));
        let root = VNode::element("ol").with_child(
            VNode::element("li").with_attr(":for", "x in items").with_child(VNode::text("{{ x }}")),
        );
        let module = view.mount(root, state, Lifecycle::new()).unwrap();
        let ol = module.root().dom().unwrap();
        let items = module.state().peek("items").as_array().cloned().unwrap();

        for op in ops {
            match op {
                ListOp::Push(w) => { items.push(w); }
                ListOp::Pop => { items.pop(); }
                ListOp::Shift => { items.shift(); }
                ListOp::Unshift(w) => { items.unshift(w); }
                ListOp::Splice(s, d, w) => { items.splice(s, d, vec![Value::from(w)]); }
                ListOp::Reverse => items.reverse(),
                ListOp::Sort => items.sort(),
                ListOp::Clear => items.clear(),
            }
            let expected: Vec<String> = items.to_vec().iter().map(|v| v.to_text(true)).collect();
            prop_assert_eq!(texts(&view, ol), expected);
        }
    }
}
