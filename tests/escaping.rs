use marshal::{
    encoding::{json, uon, xml},
    prelude::*,
};
use proptest::prelude::*;

#[test]
fn json_strings() {
    assert_eq!(json::escape("a\"b\\c\n\u{1}", '"'), "a\\\"b\\\\c\\n\\u0001");
    assert_eq!(json::escape("it's", '\''), "it\\'s");
    assert_eq!(json::unescape("\\ud83d\\ude00").unwrap(), "\u{1F600}");
    assert!(json::unescape("\\ud83d").is_err());
    assert_eq!(
        to_string(Format::Json, &"</tag>\t".to_owned()).unwrap(),
        "\"</tag>\\t\""
    );
}

#[test]
fn xml_text() {
    assert_eq!(xml::escape("<a & b>", false), "&lt;a &amp; b&gt;");
    assert_eq!(xml::unescape("&#65;&#x42;&quot;&apos;").unwrap(), "AB\"'");
    assert!(xml::unescape("&bogus;").is_err());
    assert_eq!(
        from_str::<String>(Format::Xml, "<string><![CDATA[<raw> & ]]>tail</string>").unwrap(),
        "<raw> & tail"
    );
}

#[test]
fn uon_strings() {
    for (s, quoted) in &[
        ("", "''"),
        ("true", "'true'"),
        ("12", "'12'"),
        ("a,b", "'a,b'"),
        ("don't", "'don~'t'"),
        ("~", "'~~'"),
        (" pad", "' pad'"),
    ] {
        assert_eq!(uon::quote(s), *quoted);
        assert_eq!(to_string(Format::Uon, &s.to_string()).unwrap(), *quoted);
        assert_eq!(from_str::<String>(Format::Uon, quoted).unwrap(), *s);
    }
    assert_eq!(to_string(Format::UrlEncoding, &"a b&c".to_owned()).unwrap(), "_value='a+b%26c'");
}

#[test]
fn percent_decoded_text_is_literal() {
    // `%2C` is a comma: data, not a separator
    let v: Value = from_str(Format::UrlEncoding, "k=@(a%2Cb,c)").unwrap();
    let items: Vec<&str> = v
        .get("k")
        .and_then(Value::as_list)
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(items, vec!["a,b", "c"]);

    // decoded digits stay text
    assert_eq!(from_str::<Value>(Format::UrlEncoding, "k=%31").unwrap().get("k"), Some(&Value::from("1")));
    assert_eq!(from_str::<Value>(Format::UrlEncoding, "k=1").unwrap().get("k"), Some(&Value::from(1)));
}

#[test]
fn without_char_encoding() {
    let store = PropertyStore::builder().set(UON_ENCODE_CHARS, false).build();
    let ser = Serializer::new(Format::UrlEncoding, store).unwrap();
    let m: ObjectMap = vec![("k", "a b")].into_iter().collect();
    assert_eq!(ser.to_string(&m).unwrap(), "k=a b");

    let store = PropertyStore::builder().set(UON_DECODE_CHARS, false).build();
    let parser = Parser::new(Format::UrlEncoding, store).unwrap();
    assert_eq!(parser.parse_value("k=a+b").unwrap().get("k"), Some(&Value::from("a+b")));
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 1_000, ..ProptestConfig::default() })]

    #[test]
    fn json_escape_inverts(s in any::<String>()) {
        prop_assert_eq!(json::unescape(&json::escape(&s, '"')).unwrap(), s.clone());
        prop_assert_eq!(json::unescape(&json::escape(&s, '\'')).unwrap(), s);
    }

    #[test]
    fn xml_escape_inverts(s in any::<String>(), attr in any::<bool>()) {
        prop_assert_eq!(xml::unescape(&xml::escape(&s, attr)).unwrap(), s);
    }

    #[test]
    fn percent_encoding_inverts(s in any::<String>()) {
        prop_assert_eq!(uon::decode(&uon::encode(&s)), s);
    }

    #[test]
    fn escaping_is_stable(s in any::<String>()) {
        // escaping the output again only escapes the escapes
        let once = json::escape(&s, '"').into_owned();
        prop_assert_eq!(json::unescape(&json::escape(&once, '"')).unwrap(), once);
    }

    #[test]
    fn quoted_strings_read_back(s in "[ -~]{0,16}") {
        for &format in &[Format::Json, Format::Xml, Format::Uon, Format::UrlEncoding] {
            let text = to_string(format, &s).unwrap();
            prop_assert_eq!(from_str::<String>(format, &text).unwrap(), s.clone());
        }
    }
}
