//! Property-based tests for sift using proptest.

use proptest::prelude::*;
use sift::{field, lit, param, row, Datum, Expr, Filter, Lambda, Record, WireFilter};

// ============================================================================
// Test helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Record)]
struct Item {
    #[sift(Number)]
    value: i64,
    #[sift(String)]
    name: String,
    #[sift(Bool)]
    active: bool,
    #[sift(Number)]
    seq: usize,
}

fn items_strategy() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec((-50i64..50, "[a-c]{1,2}", any::<bool>()), 0..60).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(seq, (value, name, active))| Item {
                value,
                name,
                active,
                seq,
            })
            .collect()
    })
}

fn escaped_text() -> impl Strategy<Value = String> {
    "[a-c\"\\\\\n\t ]{0,4}"
}

/// Literals of every kind the grammar can carry.
fn number_literal() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (-60i64..60).prop_map(Expr::from),
        (-60.0f64..60.0).prop_map(Expr::from),
        prop_oneof![0u64..60, Just(u64::MAX)].prop_map(Expr::from),
    ]
}

/// Grammar-representable predicates over `Item`.
fn predicate_strategy() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        number_literal().prop_map(|n| field("value").gt(n)),
        number_literal().prop_map(|n| field("value").le(n)),
        "[a-c]{1,2}".prop_map(|s| field("name").eq(s)),
        escaped_text().prop_map(|s| field("name").ne(s)),
        "[a-c]".prop_map(|s| field("name").starts_with(s)),
        "[A-C]".prop_map(|s| field("name").to_upper().contains(s)),
        "[a-c]".prop_map(|s| field("name").to_lower().ends_with(s)),
        (0i64..3).prop_map(|n| field("name").length().gt(n)),
        any::<bool>().prop_map(|b| field("active").eq(b)),
        Just(field("name").eq(lit(Datum::Null))),
        Just(field("name").is_null().not()),
        prop_oneof![Just("^a"), Just("b+$"), Just("a|c")]
            .prop_map(|p| field("name").matches(p).unwrap()),
        prop::collection::vec(-50i64..50, 1..40).prop_map(|values| {
            let mut terms = values.into_iter().map(|v| field("value").eq(v));
            let first = terms.next().unwrap();
            terms.fold(first, |acc, term| acc.or(term))
        }),
    ];
    leaf.prop_recursive(6, 48, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
            inner.prop_map(Expr::not),
        ]
    })
}

fn projection_strategy() -> impl Strategy<Value = Lambda> {
    prop_oneof![
        Just(Lambda::of(field("seq"))),
        Just(Lambda::of(row([
            ("v", field("value")),
            ("n", field("name").to_upper()),
        ]))),
        (-60i64..60).prop_map(|n| Lambda::of(row([
            ("big", field("value").gt(n)),
            ("seq", field("seq")),
        ]))),
    ]
}

fn grouping_strategy() -> impl Strategy<Value = Lambda> {
    prop_oneof![
        Just(Lambda::of(field("active"))),
        Just(Lambda::of(row([
            ("a", field("active")),
            ("first", field("name").starts_with("a")),
        ]))),
    ]
}

fn filter_strategy() -> impl Strategy<Value = Filter> {
    (
        prop::collection::vec(predicate_strategy(), 0..3),
        prop::option::of(0..3u8),
        prop::option::of(any::<bool>()),
        prop::option::of(0i64..20),
        prop::option::of(0i64..20),
        prop::option::of(projection_strategy()),
        prop::option::of(grouping_strategy()),
    )
        .prop_map(|(predicates, order, then, skip, top, select, group)| {
            let mut builder = Filter::builder();
            for p in predicates {
                builder = builder.filter(Lambda::of(p));
            }
            builder = match order {
                Some(0) => builder.order_by(Lambda::of(field("name"))),
                Some(1) => builder.order_by_descending(Lambda::of(field("value"))),
                Some(_) => builder.order_by(Lambda::of(field("name").length())),
                None => builder,
            };
            builder = match then {
                Some(true) => builder.then_by_descending(Lambda::of(field("seq"))),
                Some(false) => builder.then_by(Lambda::of(field("active"))),
                None => builder,
            };
            if let Some(projection) = select {
                builder = builder.select(projection);
            }
            if let Some(key) = group {
                builder = builder.group_by(key);
            }
            builder.skip_opt(skip).top_opt(top).build().unwrap()
        })
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Serializing and decoding yields an equal filter.
    #[test]
    fn wire_round_trip(filter in filter_strategy()) {
        let json = filter.serialize().unwrap().to_json().unwrap();
        let back = WireFilter::from_json(&json).unwrap().decode::<Item>().unwrap();
        prop_assert_eq!(&back, &filter);
        prop_assert_eq!(back.to_key().unwrap(), filter.to_key().unwrap());
    }

    /// A decoded filter behaves exactly like the original.
    #[test]
    fn decoded_filter_gives_same_results(filter in filter_strategy(), items in items_strategy()) {
        let back = filter.serialize().unwrap().decode_untyped().unwrap();
        prop_assert_eq!(filter.apply(&items).unwrap(), back.apply(&items).unwrap());
        if filter.default_projection().is_some() {
            prop_assert_eq!(
                filter.select(&items, None).unwrap(),
                back.select(&items, None).unwrap()
            );
        }
        if filter.default_grouping().is_some() {
            prop_assert_eq!(
                filter.group(&items, None).unwrap(),
                back.group(&items, None).unwrap()
            );
        }
    }

    /// Swapping two distinct operations changes the key.
    #[test]
    fn key_is_order_sensitive(a in 0i64..100, b in 0i64..100) {
        let first = Filter::builder().skip(a).top(b).build().unwrap();
        let second = Filter::builder().top(b).skip(a).build().unwrap();
        prop_assert_ne!(first.to_key().unwrap(), second.to_key().unwrap());
        prop_assert_eq!(first.apply_iter(0..200i64).unwrap(), second.apply_iter(0..200i64).unwrap());
    }

    /// Skip always runs before Top, whatever the declaration order.
    #[test]
    fn paging_is_skip_then_top(n in 0usize..50, skip in 0i64..60, top in 0i64..60) {
        let items: Vec<usize> = (0..n).collect();
        let filter = Filter::builder().top(top).skip(skip).build().unwrap();
        let expected: Vec<usize> = items.iter().copied().skip(skip as usize).take(top as usize).collect();
        prop_assert_eq!(filter.apply_iter(items).unwrap(), expected);
    }

    /// Several Where operations behave as their conjunction.
    #[test]
    fn where_clauses_are_conjunctive(
        items in items_strategy(),
        a in predicate_strategy(),
        b in predicate_strategy(),
    ) {
        let separate = Filter::builder()
            .filter(Lambda::of(a.clone()))
            .filter(Lambda::of(b.clone()))
            .build()
            .unwrap();
        let combined = Filter::builder().filter(Lambda::of(a.and(b))).build().unwrap();
        prop_assert_eq!(separate.apply(&items).unwrap(), combined.apply(&items).unwrap());
    }

    /// Filtering never grows the collection and keeps source order.
    #[test]
    fn where_preserves_source_order(items in items_strategy(), p in predicate_strategy()) {
        let filter = Filter::builder().filter(Lambda::of(p)).build().unwrap();
        let out = filter.apply(&items).unwrap();
        prop_assert!(out.len() <= items.len());
        prop_assert!(out.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    /// Multi-key ordering is stable: equal keys keep source order.
    #[test]
    fn multi_key_sort_is_stable(items in items_strategy()) {
        let filter = Filter::builder()
            .order_by(Lambda::of(field("active")))
            .then_by_descending(Lambda::of(field("name")))
            .build()
            .unwrap();
        let out = filter.apply(&items).unwrap();

        let mut expected: Vec<&Item> = items.iter().collect();
        expected.sort_by(|a, b| a.active.cmp(&b.active).then_with(|| b.name.cmp(&a.name)));
        prop_assert_eq!(out, expected);
    }

    /// Sorting a permutation of numbers yields them in order.
    #[test]
    fn order_by_sorts_numbers(mut values in prop::collection::vec(any::<i64>(), 0..100)) {
        let filter = Filter::builder().order_by(Lambda::of(param())).build().unwrap();
        let out = filter.apply_iter(values.clone()).unwrap();
        values.sort();
        prop_assert_eq!(out, values);
    }
}

#[test]
fn paging_example() {
    let filter = Filter::builder().skip(3).top(2).build().unwrap();
    assert_eq!(filter.apply_iter(0..10).unwrap(), vec![3, 4]);
}
