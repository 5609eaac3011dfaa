use marshal::{prelude::*, Value};
use marshal_strategy::*;
use proptest::prelude::*;

/// Converts a `serde_json` tree, whose maps are sorted by key.
fn from_serde(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::from(i),
            (None, Some(f)) => Value::from(f),
            _ => panic!("unrepresentable number {}", n),
        },
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(a) => a.iter().map(from_serde).collect::<ObjectList>().into(),
        serde_json::Value::Object(o) => o
            .iter()
            .map(|(k, v)| (k.as_str(), from_serde(v)))
            .collect::<ObjectMap>()
            .into(),
    }
}

/// Sorts every map by key, for comparison with `serde_json` trees.
fn sorted(v: &Value) -> Value {
    match v {
        Value::List(l) => l.iter().map(sorted).collect::<ObjectList>().into(),
        Value::Map(m) => {
            let mut entries: Vec<(&str, Value)> = m.iter().map(|(k, v)| (k.as_str(), sorted(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            entries.into_iter().collect::<ObjectMap>().into()
        }
        other => other.clone(),
    }
}

fn round_trip(format: Format, v: &Value) {
    let text = to_string(format, v).unwrap();
    let back: Value = from_str(format, &text).unwrap_or_else(|e| panic!("{} failed to parse: {}", text, e));
    if back != *v {
        panic!("Tried {}\n {:?}\n as \n{}\n got \n{:?}\n", format, v, text, back)
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 500, ..ProptestConfig::default() })]

    #[test]
    fn json(v in arb_value()) { round_trip(Format::Json, &v) }

    #[test]
    fn xml(v in arb_value()) { round_trip(Format::Xml, &v) }

    #[test]
    fn uon(v in arb_value()) { round_trip(Format::Uon, &v) }

    #[test]
    fn url_encoding(v in arb_object()) { round_trip(Format::UrlEncoding, &v) }

    #[test]
    fn pretty_output_reads_the_same(v in arb_value()) {
        let store = PropertyStore::builder().set(SERIALIZER_USE_WHITESPACE, true).build();
        for &format in &[Format::Json, Format::Xml] {
            let text = Serializer::new(format, store.clone()).unwrap().to_string(&v).unwrap();
            let back = Parser::new(format, PropertyStore::empty()).unwrap().parse_value(&text).unwrap();
            prop_assert_eq!(&back, &v);
        }
    }

    #[test]
    fn serde_json_reads_our_json(v in arb_value()) {
        let text = to_string(Format::Json, &v).unwrap();
        let theirs: serde_json::Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(from_serde(&theirs), sorted(&v));
    }

    #[test]
    fn we_read_serde_json(v in arb_value()) {
        let theirs: serde_json::Value = serde_json::from_str(&to_string(Format::Json, &v).unwrap()).unwrap();
        let back: Value = from_str(Format::Json, &serde_json::to_string(&theirs).unwrap()).unwrap();
        prop_assert_eq!(back, sorted(&v));
    }

    #[test]
    fn typed_maps(m in prop::collection::btree_map(arb_key(), any::<i64>(), 0..10)) {
        for &format in &[Format::Json, Format::Xml, Format::Uon, Format::UrlEncoding] {
            let text = to_string(format, &m).unwrap();
            let back: std::collections::BTreeMap<String, i64> = from_str(format, &text).unwrap();
            prop_assert_eq!(&back, &m);
        }
    }
}
