//! Property tests for the reactivity layer

use std::cell::Cell;
use std::rc::Rc;

use fos_reactive::{ReactiveArray, ReactiveContext, Value, ViewModel, Watcher};
use proptest::prelude::*;

const KEYS: [&str; 5] = ["a", "b", "c", "d", "e"];

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i32..5).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::from),
    ]
}

// ============================================================================
// Equal writes
// ============================================================================

proptest! {
    #[test]
    fn test_repeated_write_notifies_at_most_once(first in value_strategy(), second in value_strategy()) {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        vm.set("k", first.clone());

        let calls = Rc::new(Cell::new(0usize));
        let c = calls.clone();
        let src = vm.clone();
        let _w = Watcher::new(&ctx, move || src.get("k"), move |_, _| c.set(c.get() + 1));
        let before = calls.get();

        vm.set("k", second.clone());
        vm.set("k", second.clone());

        let expected = if first.same(&second) { 0 } else { 1 };
        prop_assert_eq!(calls.get() - before, expected);
    }
}

// ============================================================================
// Dependency sets
// ============================================================================

proptest! {
    #[test]
    fn test_dependencies_match_last_reads(
        rounds in prop::collection::vec(prop::collection::vec(0usize..KEYS.len(), 0..5), 1..6)
    ) {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        for key in KEYS {
            vm.set(key, 0);
        }
        vm.set("round", 0);

        let plan = Rc::new(rounds.clone());
        let src = vm.clone();
        let reads = plan.clone();
        let watcher = Watcher::new(
            &ctx,
            move || {
                let round = src.get("round").to_number() as usize;
                for &k in &reads[round] {
                    src.get(KEYS[k]);
                }
                Value::Undefined
            },
            |_, _| {},
        );

        for (round, read) in rounds.iter().enumerate() {
            vm.set("round", round);
            // "round" itself is always read
            let mut expected: Vec<usize> = read.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(watcher.dependency_count(), expected.len() + 1);
            for (k, key) in KEYS.iter().enumerate() {
                let sub = vm.subscriber(key).unwrap();
                prop_assert_eq!(watcher.depends_on(&sub), expected.contains(&k));
                prop_assert_eq!(sub.len(), usize::from(expected.contains(&k)));
            }
        }
    }
}

// ============================================================================
// Array mutations
// ============================================================================

proptest! {
    #[test]
    fn test_every_length_change_notifies(ops in prop::collection::vec(0u8..4, 1..20)) {
        let ctx = ReactiveContext::new();
        let vm = ViewModel::new(&ctx);
        let list = ReactiveArray::new();
        vm.set("list", list.clone());

        let lens = Rc::new(std::cell::RefCell::new(Vec::new()));
        let l = lens.clone();
        let src = vm.clone();
        let _w = Watcher::new(
            &ctx,
            move || src.get("list"),
            move |v, _| l.borrow_mut().push(v.as_array().map(|a| a.len()).unwrap_or(0)),
        );

        let mut expected = vec![0];
        for op in ops {
            let before = list.len();
            match op {
                0 => { list.push(1); }
                1 => { list.unshift(2); }
                2 => { list.pop(); }
                _ => { list.shift(); }
            }
            if list.len() != before {
                expected.push(list.len());
            }
        }
        prop_assert_eq!(&*lens.borrow(), &expected);
    }
}
