#![allow(missing_docs)]

use proptest::prelude::*;
use quarry::query::{ColumnSelector, ColumnSet};

const FIELDS: &[&str] = &["id", "name", "total", "status", "createdAt"];
const SCHEMAS: &[&str] = &["Customer", "Order", "Order#2"];

#[derive(Debug, Clone)]
enum Op {
    Add(usize, usize),
    Remove(prop::sample::Index),
    Reorder(Vec<prop::sample::Index>),
    Group(Vec<prop::sample::Index>),
    ClearGroup,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..FIELDS.len(), 0..SCHEMAS.len()).prop_map(|(f, s)| Op::Add(f, s)),
        2 => any::<prop::sample::Index>().prop_map(Op::Remove),
        2 => prop::collection::vec(any::<prop::sample::Index>(), 0..6).prop_map(Op::Reorder),
        2 => prop::collection::vec(any::<prop::sample::Index>(), 0..4).prop_map(Op::Group),
        1 => Just(Op::ClearGroup),
    ]
}

fn selectors(set: &ColumnSet) -> Vec<ColumnSelector> {
    set.iter().map(ColumnSelector::from).collect()
}

/// Picks distinct columns by index, keeping first occurrences.
fn pick(set: &ColumnSet, indices: &[prop::sample::Index]) -> Vec<ColumnSelector> {
    let all = selectors(set);
    let mut picked: Vec<ColumnSelector> = Vec::new();
    for index in indices {
        let candidate = all[index.index(all.len())].clone();
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }
    picked
}

fn apply(set: &mut ColumnSet, op: &Op) {
    match op {
        Op::Add(field, schema) => {
            let _ = set.add(FIELDS[*field], SCHEMAS[*schema]);
        }
        Op::Remove(index) if !set.is_empty() => {
            let victim = selectors(set)[index.index(set.len())].clone();
            set.remove(victim).unwrap();
        }
        Op::Reorder(indices) if !set.is_empty() => {
            // Rotate by the first index so reorders are real permutations.
            let mut order = selectors(set);
            let shift = indices.first().map_or(0, |i| i.index(order.len()));
            order.rotate_left(shift);
            if indices.len() % 2 == 1 {
                order.reverse();
            }
            set.reorder_select(order).unwrap();
        }
        Op::Group(indices) if !set.is_empty() => {
            let group = pick(set, indices);
            set.set_group(group).unwrap();
        }
        Op::ClearGroup => set.clear_group(),
        _ => {}
    }
}

proptest! {
    #[test]
    fn select_order_stays_dense(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut set = ColumnSet::new();
        for op in &ops {
            apply(&mut set, op);
            let mut orders: Vec<u32> = set.iter().map(|c| c.select_order).collect();
            orders.sort_unstable();
            let expected: Vec<u32> = (1..=set.len() as u32).collect();
            prop_assert_eq!(orders, expected);
            prop_assert!(set.check_invariants().is_ok());
        }
    }

    #[test]
    fn group_order_only_covers_present_columns(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut set = ColumnSet::new();
        for op in &ops {
            let grouped_before: Vec<ColumnSelector> =
                set.grouped().into_iter().map(ColumnSelector::from).collect();
            let removed = match op {
                Op::Remove(index) if !set.is_empty() => {
                    Some(selectors(&set)[index.index(set.len())].clone())
                }
                _ => None,
            };
            apply(&mut set, op);

            let grouped: Vec<ColumnSelector> =
                set.grouped().into_iter().map(ColumnSelector::from).collect();
            let orders: Vec<u32> = set.grouped().iter().filter_map(|c| c.group_order).collect();
            let expected: Vec<u32> = (0..orders.len() as u32).collect();
            prop_assert_eq!(orders, expected);

            if let Some(removed) = removed {
                prop_assert!(!grouped.contains(&removed));
                let survivors: Vec<ColumnSelector> = grouped_before
                    .into_iter()
                    .filter(|selector| selector != &removed)
                    .collect();
                prop_assert_eq!(grouped, survivors);
            }
        }
    }

    #[test]
    fn failed_reorders_leave_the_set_untouched(
        ops in prop::collection::vec(arb_op(), 1..20),
        drop_last in any::<bool>(),
    ) {
        let mut set = ColumnSet::new();
        for op in &ops {
            apply(&mut set, op);
        }
        prop_assume!(!set.is_empty());
        let before = set.clone();

        let mut request = selectors(&set);
        if drop_last {
            request.pop();
        } else {
            let first = request[0].clone();
            request.push(first);
        }
        prop_assert!(set.reorder_select(request).is_err());
        prop_assert_eq!(set, before);
    }
}

#[test]
fn duplicate_adds_are_rejected() {
    let mut set = ColumnSet::new();
    assert_eq!(set.add("total", "Order").unwrap(), 1);
    assert_eq!(set.add("total", "Order#2").unwrap(), 2);
    let err = set.add("total", "Order").unwrap_err();
    assert_eq!(err.code(), "DuplicateColumn");
    assert_eq!(set.len(), 2);
}

#[test]
fn removing_a_grouped_column_closes_the_gap() {
    let mut set = ColumnSet::new();
    for field in ["id", "name", "total"] {
        set.add(field, "Order").unwrap();
    }
    set.set_group(["total", "id", "name"]).unwrap();
    set.remove("id").unwrap();

    let grouped: Vec<(&str, Option<u32>)> = set
        .grouped()
        .into_iter()
        .map(|c| (c.field_id.as_str(), c.group_order))
        .collect();
    assert_eq!(grouped, [("total", Some(0)), ("name", Some(1))]);
    let selects: Vec<(&str, u32)> = set
        .iter()
        .map(|c| (c.field_id.as_str(), c.select_order))
        .collect();
    assert_eq!(selects, [("name", 1), ("total", 2)]);
}
