#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use marshal::prelude::*;

const N_ARR: usize = 10;
const N_MAP: usize = 10;
const N_BIG_ARR: usize = 2000;

#[derive(Describe, Default, Clone)]
struct Row {
    id: u64,
    name: String,
    score: f64,
    tags: Vec<String>,
}

fn rows() -> Vec<Row> {
    (0..N_BIG_ARR as u64)
        .map(|id| Row {
            id,
            name: format!("row {}", id),
            score: id as f64 / 7.0,
            tags: vec!["a".into(), "b,c".into()],
        })
        .collect()
}

fn big_value() -> Value {
    let v0: ObjectList = (0..N_ARR).map(|i| Value::from(i as i64)).collect();
    let m: ObjectMap = (0..N_MAP)
        .map(|i| (format!("key{}", i), Value::from(v0.clone())))
        .collect();
    std::iter::repeat(m).map(Value::from).take(N_ARR).collect::<ObjectList>().into()
}

fn bench_ser(c: &mut Criterion) {
    let rows = rows();
    for &format in &[Format::Json, Format::Xml, Format::Uon, Format::UrlEncoding] {
        let ser = Serializer::new(format, PropertyStore::empty()).unwrap();
        let len = ser.to_string(&rows).unwrap().len();
        c.bench_function(
            &format!("Serializing {} records as {}, output size of {} bytes", N_BIG_ARR, format, len),
            |b| b.iter(|| ser.to_string(black_box(&rows)).unwrap()),
        );
    }
}

fn bench_parse(c: &mut Criterion) {
    let rows = rows();
    for &format in &[Format::Json, Format::Xml, Format::Uon, Format::UrlEncoding] {
        let text = to_string(format, &rows).unwrap();
        let parser = Parser::new(format, PropertyStore::empty()).unwrap();
        c.bench_function(
            &format!("Parsing {} records from {}, input size of {} bytes", N_BIG_ARR, format, text.len()),
            |b| b.iter(|| parser.parse_str::<Vec<Row>>(black_box(&text)).unwrap()),
        );
    }
}

fn bench_dynamic(c: &mut Criterion) {
    let v = big_value();
    let text = to_string(Format::Json, &v).unwrap();
    c.bench_function(
        &format!("Parsing a dynamic value, input size of {} bytes", text.len()),
        |b| b.iter(|| from_str::<Value>(Format::Json, black_box(&text)).unwrap()),
    );
}

fn bench_describe(c: &mut Criterion) {
    c.bench_function("Looking up a cached descriptor", |b| b.iter(|| describe::<Vec<Row>>()));
}

criterion_group!(benches, bench_ser, bench_parse, bench_dynamic, bench_describe);
criterion_main!(benches);
