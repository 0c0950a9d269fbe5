use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use edithist::{
    codec::{decode, encode},
    config::HistoryConfig,
    document::{Document, Value, keys},
    export::write_document,
    migrate::{Migrator, priority::BuiltinPriorities},
    parse::parse_document,
};

const OPS: &[&str] = &["exposure", "colorin", "tonecurve", "sharpen", "colorbalance"];

fn v1_doc(entries: usize) -> Document {
    let ops: Vec<&str> = (0..entries).map(|i| OPS[i % OPS.len()]).collect();
    let params: Vec<String> = (0..entries)
        .map(|i| encode(&vec![i as u8; 256], false))
        .collect();
    let mut doc = Document::new();
    doc.set_text(keys::SCHEMA_VERSION, "1");
    doc.set(keys::V1_OPERATION, Value::seq(ops.iter().copied()));
    doc.set(keys::V1_MOD_VERSION, Value::seq(ops.iter().map(|_| "3")));
    doc.set(keys::V1_PARAMS, Value::seq(params));
    doc.set(
        keys::V1_MULTI_PRIORITY,
        Value::seq((0..entries).map(|i| (i / OPS.len()).to_string())),
    );
    doc
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let blob: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 251) as u8).collect();
    for compress in [false, true] {
        let text = encode(&blob, compress);
        group.bench_with_input(BenchmarkId::new("encode", compress), &compress, |b, &compress| {
            b.iter(|| encode(&blob, compress));
        });
        group.bench_with_input(BenchmarkId::new("decode", compress), &text, |b, text| {
            b.iter(|| decode(text).expect("decode"));
        });
    }
    group.finish();
}

fn bench_migrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_migrate_write");
    let config = HistoryConfig::default();
    for n in [10usize, 100, 1000] {
        let doc = v1_doc(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &doc, |b, doc| {
            b.iter(|| {
                let parsed = parse_document(doc).expect("parse");
                let (stack, _) = Migrator::new(&BuiltinPriorities, &config).migrate(parsed);
                write_document(&stack, &config)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_codec, bench_migrate);
criterion_main!(benches);
