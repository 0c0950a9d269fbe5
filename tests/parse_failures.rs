use edithist::{
    config::HistoryConfig,
    document::{Document, DocumentError, keys},
    migrate::priority::BuiltinPriorities,
    parse::{ParseError, parse_document},
    persist::{StackStore, sqlite::SqliteHistoryStore},
    pipeline::{PipelineError, import_document},
};

fn v2_entry(doc: &mut Document, index: usize, op: &str, params: Option<&str>) {
    let key = |field: &str| format!("{}[{index}]/{field}", keys::HISTORY);
    doc.set_text(key("operation"), op);
    doc.set_text(key("modversion"), "1");
    doc.set_text(key("enabled"), "1");
    if let Some(params) = params {
        doc.set_text(key("params"), params);
    }
}

fn v2_doc(entries: &[(&str, Option<&str>)]) -> Document {
    let mut doc = Document::new();
    doc.set_text(keys::SCHEMA_VERSION, "2");
    for (i, (op, params)) in entries.iter().enumerate() {
        v2_entry(&mut doc, i + 1, op, *params);
    }
    doc
}

#[test]
fn one_incomplete_entry_rejects_whole_stack() {
    let doc = v2_doc(&[
        ("exposure", Some("00")),
        ("colorin", None),
        ("sharpen", Some("01")),
    ]);
    match parse_document(&doc) {
        Err(ParseError::IncompleteHistory {
            schema_version,
            invalid,
            total,
            first_entry,
            field,
        }) => {
            assert_eq!(schema_version, 2);
            assert_eq!((invalid, total, first_entry), (1, 3, 2));
            assert_eq!(field, "params");
        }
        other => panic!("expected incomplete history, got {other:?}"),
    }
}

#[test]
fn undecodable_required_blob_counts_as_missing() {
    let doc = v2_doc(&[("exposure", Some("00")), ("colorin", Some("not-hex"))]);
    assert!(matches!(
        parse_document(&doc),
        Err(ParseError::IncompleteHistory { field: "params", .. })
    ));
}

#[test]
fn undecodable_optional_blob_is_dropped() {
    let mut doc = v2_doc(&[("exposure", Some("00"))]);
    doc.set_text(format!("{}[1]/blendop_params", keys::HISTORY), "zz");
    let parsed = parse_document(&doc).expect("parse");
    assert_eq!(parsed.entries.len(), 1);
    assert_eq!(parsed.entries[0].blend_params, None);
    assert_eq!(parsed.entries[0].blend_version, 1);
}

#[test]
fn unknown_schema_versions_fail() {
    let mut doc = v2_doc(&[("exposure", Some("00"))]);
    doc.set_text(keys::SCHEMA_VERSION, "4");
    assert!(matches!(parse_document(&doc), Err(ParseError::UnsupportedSchema(4))));
    doc.set_text(keys::SCHEMA_VERSION, "0");
    assert!(matches!(parse_document(&doc), Err(ParseError::UnsupportedSchema(0))));
    doc.set_text(keys::SCHEMA_VERSION, "three");
    assert!(matches!(parse_document(&doc), Err(ParseError::InvalidValue { .. })));
}

#[test]
fn malformed_index_fails_the_document() {
    let mut doc = v2_doc(&[("exposure", Some("00"))]);
    doc.set_text(format!("{}[2/operation", keys::HISTORY), "colorin");
    assert!(matches!(
        parse_document(&doc),
        Err(ParseError::Document(DocumentError::MalformedIndex { .. }))
    ));
}

#[test]
fn failed_import_leaves_stored_history_untouched() {
    let mut store = SqliteHistoryStore::open_in_memory().expect("open sqlite");
    let good = v2_doc(&[("exposure", Some("00")), ("colorin", Some("01"))]);
    import_document(&mut store, 3, &good, &BuiltinPriorities, &HistoryConfig::default())
        .expect("import good");
    let before = store.load_stack(3).expect("load");

    let bad = v2_doc(&[("exposure", Some("00")), ("colorin", None), ("sharpen", Some("02"))]);
    let err = import_document(&mut store, 3, &bad, &BuiltinPriorities, &HistoryConfig::default())
        .expect_err("must fail");
    assert!(matches!(err, PipelineError::Parse { subject: 3, .. }));
    assert!(err.to_string().contains("subject 3"));

    assert_eq!(store.load_stack(3).expect("load"), before);
    assert_eq!(store.history_count(3).expect("count"), 2);
}
