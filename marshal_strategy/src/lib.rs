use marshal::{
    number::Number,
    vecmap::{ObjectList, ObjectMap},
    Value,
};
use num_bigint::BigInt;
use num_traits::Num;
use proptest::prelude::*;

/// arbitrary integer wider than 64 bits, for use with proptest
pub fn arb_bigint() -> impl Strategy<Value = BigInt> {
    "-?1[0-1]{64,100}".prop_map(|n| -> BigInt { BigInt::from_str_radix(&n, 2).unwrap() })
}

/// arbitrary number that reads back as itself when its kind is not known:
/// `Int`, `Long` or a finite `Double`
pub fn arb_number() -> impl Strategy<Value = Number> {
    prop_oneof![
        any::<i32>().prop_map(Number::from),
        any::<i64>().prop_map(Number::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Number::from),
    ]
}

/// arbitrary map key that is also a valid XML name
pub fn arb_key() -> impl Strategy<Value = String> { "[a-zA-Z][a-zA-Z0-9_.-]{0,8}" }

/// arbitrary map key, including ones no format can use unquoted
pub fn arb_any_key() -> impl Strategy<Value = String> {
    prop_oneof![arb_key(), "[a-z ,=()&'~<>\"@]{0,6}"]
}

/// arbitrary string, weighted towards the characters each format treats specially
pub fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        "[ a-z0-9,=()&'~<>\"@%+.\\-\\\\\n\t]{0,12}",
        Just("null".to_owned()),
        Just("true".to_owned()),
        Just(String::new()),
        any::<i64>().prop_map(|i| i.to_string()),
    ]
}

/// arbitrary dynamic value for use with proptest
pub fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        arb_number().prop_map(Value::Number),
        arb_text().prop_map(Value::Text),
    ];
    leaf.prop_recursive(
        8,  // max depth
        64, // max nodes
        10, // max items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(|v| Value::List(ObjectList::from(v))),
                prop::collection::btree_map(arb_any_key(), inner, 0..10).prop_map(|m| Value::Map(ObjectMap::from(m)))
            ]
        },
    )
}

/// arbitrary map of dynamic values, the only top level URL-encoding reads back unchanged
pub fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(arb_key(), arb_value(), 0..8).prop_map(|m| Value::Map(ObjectMap::from(m)))
}
