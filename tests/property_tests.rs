//! Property tests for frame set operations, downsampling and query
//! normalization.

use kgtk_browser::assemble::downsample;
use kgtk_browser::frame::{row, Frame, Row};
use kgtk_browser::search::strip_glob;
use kgtk_browser::Error;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn cell() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        4 => "[a-c]{1,2}".prop_map(Some),
    ]
}

fn rows(arity: usize) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(prop::collection::vec(cell(), arity), 0..12)
        .prop_map(|rows| rows.into_iter().map(|r| row(r)).collect())
}

fn frame(arity: usize, rows: Vec<Row>) -> Frame {
    let columns: Vec<String> = (0..arity).map(|i| format!("c{i}")).collect();
    Frame::new(columns, rows).unwrap()
}

proptest! {
    #[test]
    fn union_is_duplicate_free_and_complete(a in rows(2), b in rows(2), c in rows(2)) {
        let (fa, fb, fc) = (frame(2, a.clone()), frame(2, b.clone()), frame(2, c.clone()));
        let u = fa.union([Some(&fb), None, Some(&fc)]).unwrap();

        let mut seen = std::collections::HashSet::new();
        for r in u.rows() {
            prop_assert!(seen.insert(r.clone()), "repeated row {:?}", r);
        }
        for r in a.iter().chain(&b).chain(&c) {
            prop_assert!(seen.contains(r));
        }
    }

    #[test]
    fn union_keeps_first_occurrence_order(a in rows(2), b in rows(2)) {
        let u = frame(2, a.clone()).union([Some(&frame(2, b.clone()))]).unwrap();
        let mut expected: Vec<Row> = Vec::new();
        for r in a.into_iter().chain(b) {
            if !expected.contains(&r) {
                expected.push(r);
            }
        }
        prop_assert_eq!(u.rows(), expected.as_slice());
    }

    #[test]
    fn nested_union_equals_flat_union(a in rows(2), b in rows(2), c in rows(2)) {
        let (fa, fb, fc) = (frame(2, a), frame(2, b), frame(2, c));
        let nested = fa.union([Some(&fb)]).unwrap().union([Some(&fc)]).unwrap();
        let flat = fa.union([Some(&fb), Some(&fc)]).unwrap();
        prop_assert_eq!(nested, flat);
    }

    #[test]
    fn union_of_mismatched_arity_fails(a in rows(2), b in rows(3)) {
        let err = frame(2, a).union([Some(&frame(3, b))]).unwrap_err();
        let is_incompatible = matches!(err, Error::IncompatibleFrame { expected: 2, got: 3 });
        prop_assert!(is_incompatible);
    }

    #[test]
    fn drop_duplicates_is_idempotent(a in rows(3)) {
        let once = frame(3, a).drop_duplicates();
        let twice = once.clone().drop_duplicates();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn drop_nulls_leaves_no_nulls(a in rows(2)) {
        let f = frame(2, a).drop_nulls();
        prop_assert!(f.rows().iter().all(|r| r.iter().all(Option::is_some)));
    }

    #[test]
    fn downsample_caps_and_keeps_order(len in 0usize..60, max in 0usize..20, seed in any::<u64>()) {
        let mut items: Vec<usize> = (0..len).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        downsample(&mut items, max, &mut rng);

        if max == 0 {
            prop_assert_eq!(items.len(), len);
        } else {
            prop_assert_eq!(items.len(), len.min(max));
        }
        prop_assert!(items.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn stripped_queries_have_no_glob_characters(q in ".{0,20}") {
        let stripped = strip_glob(&q);
        prop_assert!(!stripped.contains(['*', '[', '?']));
        prop_assert!(stripped.chars().count() <= q.chars().count());
    }
}
