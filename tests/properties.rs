use std::cmp::Ordering;

use proptest::prelude::*;
use sdk_convert::condition::{from_condition, is_encodable, parse_condition, to_condition};
use sdk_convert::{DimensionVector, SemanticVersion};

fn dimensions() -> impl Strategy<Value = DimensionVector> {
    proptest::collection::btree_map("[A-Za-z_][A-Za-z0-9_]{0,10}", "[A-Za-z0-9 ._'|-]{0,10}", 0..5)
        .prop_map(|map| map.into_iter().collect())
}

fn version() -> impl Strategy<Value = String> {
    (
        "[vV]?[0-9]{1,3}(\\.[0-9]{1,3}){0,2}",
        proptest::option::of("[a-z0-9.]{1,6}"),
        proptest::option::of("[a-z0-9.]{1,6}"),
    )
        .prop_map(|(core, pre, build)| {
            let mut text = core;
            if let Some(pre) = pre {
                text.push('-');
                text.push_str(&pre);
            }
            if let Some(build) = build {
                text.push('+');
                text.push_str(&build);
            }
            text
        })
}

proptest! {
    #[test]
    fn prop_condition_round_trip(dims in dimensions()) {
        let decoded = from_condition(&to_condition(&dims));
        if is_encodable(&dims) {
            prop_assert_eq!(decoded, Some(dims));
        } else {
            prop_assert!(dims.values().any(|v| v.contains('|')));
            prop_assert_ne!(decoded, Some(dims));
        }
    }

    #[test]
    fn prop_arbitrary_conditions_never_panic(text in "\\PC{0,40}") {
        let _ = from_condition(&text);
        let _ = parse_condition(&text);
    }

    #[test]
    fn prop_unquoted_conditions_fail(name in "[A-Za-z]{1,8}", value in "[A-Za-z0-9]{1,8}") {
        let condition = format!("$({name})=='{value}'");
        prop_assert_eq!(from_condition(&condition), None);
    }

    #[test]
    fn prop_version_compare_is_antisymmetric(a in version(), b in version()) {
        let a = SemanticVersion::parse(&a).unwrap();
        let b = SemanticVersion::parse(&b).unwrap();
        prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
        prop_assert_eq!(a.compare(&a), Ordering::Equal);
    }

    #[test]
    fn prop_version_parse_never_panics(text in "\\PC{0,20}") {
        let _ = SemanticVersion::parse(&text);
    }
}

#[test]
fn empty_vector_is_unconditional() {
    assert_eq!(to_condition(&DimensionVector::new()), "");
    assert_eq!(from_condition("   "), Some(DimensionVector::new()));
}

#[test]
fn malformed_conditions_fail() {
    for condition in [
        "'$(Configuration)'",
        "=='Debug'",
        "'$(Configuration)|$(Platform)'=='Debug'",
        "'$(Configuration)'=='Debug|AnyCPU'",
        "'Configuration'=='Debug'",
        "'$()'=='Debug'",
        "'$(A$(B))'=='x'",
    ] {
        assert_eq!(from_condition(condition), None, "{condition}");
    }
}
