use marshal::prelude::*;
use std::{
    any::Any,
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

#[derive(Describe, Default, Debug, PartialEq, Clone)]
struct Bean {
    a: i32,
    b: i32,
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(String, String, usize, usize, Option<i32>)>>,
}

impl ParserListener for Recorder {
    fn on_unknown_property(&self, name: &str, type_name: &str, partial: &dyn Any, line: usize, column: usize) {
        let a = partial.downcast_ref::<Bean>().map(|b| b.a);
        self.seen
            .lock()
            .unwrap()
            .push((name.to_owned(), type_name.to_owned(), line, column, a));
    }
}

fn lenient() -> Arc<PropertyStore> {
    PropertyStore::builder()
        .set(BEAN_IGNORE_UNKNOWN_PROPERTIES, true)
        .build()
}

#[test]
fn unknown_property_reaches_listener() {
    let parser = Parser::new(Format::UrlEncoding, lenient()).unwrap();
    let recorder = Arc::new(Recorder::default());

    let bean: Bean = parser
        .create_session(SessionArgs::new().listener(recorder.clone()))
        .parse_str("a=1&unknown=3&b=2")
        .unwrap();

    assert_eq!(bean, Bean { a: 1, b: 2 });
    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![("unknown".to_owned(), "Bean".to_owned(), 1, 5, Some(1))]
    );
}

#[test]
fn unknown_property_is_an_error_by_default() {
    let e = Parser::new(Format::UrlEncoding, PropertyStore::empty())
        .unwrap()
        .parse_str::<Bean>("a=1&unknown=3&b=2")
        .unwrap_err();
    assert_eq!(
        e.kind,
        ParseErrorKind::UnknownProperty {
            name: "unknown".into(),
            type_name: "Bean".into(),
        }
    );
    assert_eq!((e.line(), e.column()), (1, 5));
}

static COUNTED: AtomicUsize = AtomicUsize::new(0);

struct Counter;

impl ParserListener for Counter {
    fn on_unknown_property(&self, _: &str, _: &str, _: &dyn Any, _: usize, _: usize) {
        COUNTED.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn listeners_named_in_the_store() {
    register_class("records.Counter", || Arc::new(Counter));
    let store = PropertyStore::builder()
        .set(BEAN_IGNORE_UNKNOWN_PROPERTIES, true)
        .set_class(PARSER_LISTENERS, "records.Counter")
        .build();
    let parser = Parser::new(Format::Json, store).unwrap();

    let bean: Bean = parser
        .parse_str(r#"{"a":1,"skipped":[1,{"deep":[2]}],"b":2}"#)
        .unwrap();
    assert_eq!(bean, Bean { a: 1, b: 2 });
    assert_eq!(COUNTED.load(Ordering::SeqCst), 1);

    let missing = PropertyStore::builder()
        .set_class(PARSER_LISTENERS, "records.NoSuchClass")
        .build();
    match Parser::new(Format::Json, missing) {
        Err(ConfigError::UnknownClass { class, .. }) => assert_eq!(class, "records.NoSuchClass"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

struct Panicky;

impl ParserListener for Panicky {
    fn on_unknown_property(&self, _: &str, _: &str, _: &dyn Any, _: usize, _: usize) { panic!("listener bug") }
}

#[test]
fn panicking_listener_does_not_abort_the_parse() {
    let parser = Parser::new(Format::Uon, lenient()).unwrap();
    let bean: Bean = parser
        .create_session(SessionArgs::new().listener(Arc::new(Panicky)))
        .parse_str("(a=1,x=@(1,2),b=2)")
        .unwrap();
    assert_eq!(bean, Bean { a: 1, b: 2 });
}

#[derive(Describe, Default, Debug, PartialEq)]
struct Account {
    #[marshal(required)]
    id: String,
    #[marshal(rename = "displayName")]
    display: Option<String>,
    #[marshal(ignore)]
    cache: Vec<u8>,
}

#[test]
fn attributes() {
    let acct = Account {
        id: "u1".into(),
        display: Some("Ada".into()),
        cache: vec![1, 2, 3],
    };
    assert_eq!(
        to_string(Format::Json, &acct).unwrap(),
        r#"{"id":"u1","displayName":"Ada"}"#
    );

    let back: Account = from_str(Format::Json, r#"{"id":"u1","displayName":"Ada"}"#).unwrap();
    assert_eq!(
        back,
        Account {
            cache: vec![],
            ..acct
        }
    );

    match from_str::<Account>(Format::Json, r#"{"displayName":"x"}"#) {
        Err(Error::Parse(e)) => {
            assert_eq!(
                e.kind,
                ParseErrorKind::MissingProperty {
                    name: "id".into(),
                    type_name: "Account".into(),
                }
            );
            assert_eq!(e.column(), 19);
        }
        other => panic!("unexpected {:?}", other),
    }

    // ignored fields are not properties at all
    assert!(from_str::<Account>(Format::Json, r#"{"id":"u1","cache":[]}"#).is_err());
}

#[derive(Describe, Default, Debug, PartialEq)]
struct Tagged {
    #[marshal(id)]
    id: u32,
    name: String,
}

#[test]
fn identity_properties_are_xml_attributes() {
    let t = Tagged {
        id: 7,
        name: "n".into(),
    };
    let xml = to_string(Format::Xml, &t).unwrap();
    assert_eq!(xml, r#"<object id="7"><name>n</name></object>"#);
    assert_eq!(from_str::<Tagged>(Format::Xml, &xml).unwrap(), t);

    // other formats write them as ordinary properties
    assert_eq!(to_string(Format::Json, &t).unwrap(), r#"{"id":7,"name":"n"}"#);
}

#[derive(Describe, Debug, PartialEq, Clone, Copy)]
enum Color {
    Red,
    #[marshal(rename = "GREEN")]
    Green,
}

#[derive(Describe, Default, Debug, PartialEq)]
struct Meters(f64);

#[derive(Describe, Default, Debug, PartialEq)]
struct Shape {
    color: Option<Color>,
    size: Meters,
    tags: BTreeMap<String, Color>,
    children: Vec<Shape>,
}

fn shape() -> Shape {
    let mut tags = BTreeMap::new();
    tags.insert("a b".to_owned(), Color::Red);
    Shape {
        color: Some(Color::Green),
        size: Meters(1.5),
        tags,
        children: vec![Shape {
            size: Meters(-2.0),
            ..Shape::default()
        }],
    }
}

#[test]
fn enums_and_newtypes() {
    assert_eq!(
        to_string(Format::Json, &shape()).unwrap(),
        r#"{"color":"GREEN","size":1.5,"tags":{"a b":"Red"},"children":[{"size":-2.0,"tags":{},"children":[]}]}"#
    );
    assert_eq!(
        to_string(Format::UrlEncoding, &shape()).unwrap(),
        "color=GREEN&size=1.5&tags=(a+b=Red)&children=@((size=-2.0,tags=(),children=@()))"
    );

    match from_str::<Shape>(Format::Json, r#"{"color":"Blue"}"#) {
        Err(Error::Parse(ParseError {
            kind: ParseErrorKind::Conversion { type_name, .. },
            position,
        })) => {
            assert_eq!(type_name, "Color");
            assert_eq!(position, Position::new(1, 10));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn records_round_trip_through_every_format() {
    for &format in &[Format::Json, Format::Xml, Format::Uon, Format::UrlEncoding] {
        let text = to_string(format, &shape()).unwrap();
        let back: Shape = from_str(format, &text).unwrap_or_else(|e| panic!("{} through {}: {}", text, format, e));
        assert_eq!(back, shape(), "{} through {}", text, format);
    }
}

#[test]
fn include_and_exclude() {
    let bean = Bean { a: 1, b: 2 };

    let exclude = PropertyStore::builder()
        .set(BEAN_EXCLUDE_PROPERTIES, vec![("Bean", "b")])
        .build();
    let ser = Serializer::new(Format::Json, exclude.clone()).unwrap();
    assert_eq!(ser.to_string(&bean).unwrap(), r#"{"a":1}"#);

    // excluded properties are unknown to the parser too
    let parser = Parser::new(Format::Json, exclude).unwrap();
    match parser.parse_str::<Bean>(r#"{"a":1,"b":2}"#) {
        Err(ParseError {
            kind: ParseErrorKind::UnknownProperty { name, .. },
            ..
        }) => assert_eq!(name, "b"),
        other => panic!("unexpected {:?}", other),
    }

    let include = PropertyStore::builder()
        .set(BEAN_INCLUDE_PROPERTIES, vec![("Bean", "b")])
        .build();
    let ser = Serializer::new(Format::Json, include).unwrap();
    assert_eq!(ser.to_string(&bean).unwrap(), r#"{"b":2}"#);

    let bad = PropertyStore::builder()
        .set(BEAN_INCLUDE_PROPERTIES, 3)
        .build();
    assert!(Serializer::new(Format::Json, bad).is_err());
}

#[test]
fn parser_options() {
    let shallow = PropertyStore::builder().set(PARSER_MAX_DEPTH, 2).build();
    let parser = Parser::new(Format::Json, shallow).unwrap();
    assert_eq!(parser.parse_str::<Vec<Vec<i32>>>("[[1]]").unwrap(), vec![vec![1]]);
    assert_eq!(
        parser.parse_str::<Vec<Vec<Vec<i32>>>>("[[[1]]]").unwrap_err().kind,
        ParseErrorKind::DepthExceeded(2)
    );
    assert_eq!(
        parser.parse_value("[[[1]]]").unwrap_err().kind,
        ParseErrorKind::DepthExceeded(2)
    );

    let trimming = PropertyStore::builder().set(PARSER_TRIM_STRINGS, true).build();
    let parser = Parser::new(Format::Json, trimming).unwrap();
    let m: BTreeMap<String, String> = parser.parse_str(r#"{" k ":" v "}"#).unwrap();
    assert_eq!(m.get("k").map(String::as_str), Some("v"));
}

#[test]
fn shape_mismatches() {
    let e = from_str::<Bean>(Format::Json, "null").unwrap_err();
    match e {
        Error::Parse(ParseError {
            kind: ParseErrorKind::Unparseable { type_name, found },
            ..
        }) => {
            assert_eq!(type_name, "Bean");
            assert_eq!(found, "null");
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(from_str::<i32>(Format::Json, "null").is_err());
    assert_eq!(from_str::<Option<i32>>(Format::Json, "null").unwrap(), None);
    assert!(from_str::<Vec<i32>>(Format::Json, r#""x""#).is_err());
}

#[test]
fn maps_are_not_sequences() {
    for &(format, text) in &[(Format::Json, r#"{"x":1,"y":2}"#), (Format::Uon, "(x=1,y=2)")] {
        match from_str::<Vec<i32>>(format, text) {
            Err(Error::Parse(ParseError {
                kind: ParseErrorKind::Unparseable { found, .. },
                position,
            })) => {
                assert_eq!(found, "a map");
                assert_eq!(position, Position::new(1, 1));
            }
            other => panic!("{} through {}: unexpected {:?}", text, format, other),
        }
    }

    // indexed keys stand for a sequence only at the top level of URL-encoding
    assert_eq!(from_str::<Vec<i32>>(Format::UrlEncoding, "0=1&1=2").unwrap(), vec![1, 2]);
    assert_eq!(to_string(Format::UrlEncoding, &vec![1, 2]).unwrap(), "0=1&1=2");
    assert!(from_str::<Vec<i32>>(Format::UrlEncoding, "0=1&2=2").is_err());
    assert!(from_str::<Vec<i32>>(Format::UrlEncoding, "a=1").is_err());
    assert!(from_str::<Vec<Vec<i32>>>(Format::UrlEncoding, "0=(0=1)").is_err());
    assert_eq!(
        from_str::<Vec<Vec<i32>>>(Format::UrlEncoding, "0=@(1)").unwrap(),
        vec![vec![1]]
    );
}
