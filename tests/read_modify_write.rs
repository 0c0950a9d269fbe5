use proptest::prelude::*;
use tempfile::TempDir;

use edithist::{
    codec::CompressionPolicy,
    config::HistoryConfig,
    document::{Document, Value, keys},
    export::{format_order_key, write_document},
    migrate::{Migrator, priority::BuiltinPriorities},
    parse::parse_document,
    persist::{StackStore, sqlite::SqliteHistoryStore},
    pipeline::{export_sidecar, export_subject, import_sidecar},
    stack::{EditHistoryStack, GroupMember, HistoryEntry, MaskEntry, MaskType, ParsedMasks},
    types::CURRENT_SCHEMA_VERSION,
};

fn current_stack() -> EditHistoryStack {
    let group_points: Vec<u8> = [21, 22]
        .iter()
        .flat_map(|&id| {
            GroupMember {
                mask_id: id,
                parent_id: 20,
                state: 1,
                opacity: 0.5,
            }
            .encode()
        })
        .collect();
    let mut group = MaskEntry::new(20, MaskType(MaskType::GROUP), group_points, 2);
    group.mask_name = "grp".to_string();
    group.sequence_num = 3;
    let mut a = MaskEntry::new(21, MaskType(MaskType::ELLIPSE), vec![3; 40], 1);
    a.sequence_num = 3;
    a.source = (0..200u8).collect();
    let b = MaskEntry::new(22, MaskType(MaskType::BRUSH), (0..255u8).cycle().take(900).collect(), 30);

    let mut exposure = HistoryEntry::new("exposure", 6, vec![0u8; 300]);
    exposure.num = 1;
    exposure.order_key = 12.000_123_456_789_1;
    exposure.blend_params = Some(vec![7; 420]);
    exposure.blend_version = 11;
    exposure.multi_priority = 1;
    exposure.multi_name = "second".to_string();
    let mut manager = HistoryEntry::mask_manager(9.0);
    manager.num = 0;
    let mut curve = HistoryEntry::new("tonecurve", 5, vec![1, 2, 3]);
    curve.num = 2;
    curve.enabled = false;
    curve.order_key = 44.5;

    EditHistoryStack {
        iop_order_version: 1,
        history_end: 2,
        entries: vec![manager, exposure, curve],
        masks: vec![a, b, group],
    }
}

fn assert_same_stack(left: &EditHistoryStack, right: &EditHistoryStack) {
    assert_eq!(left.iop_order_version, right.iop_order_version);
    assert_eq!(left.history_end, right.history_end);
    assert_eq!(left.masks, right.masks);
    assert_eq!(left.entries.len(), right.entries.len());
    for (l, r) in left.entries.iter().zip(&right.entries) {
        assert!((l.order_key - r.order_key).abs() < 1e-12, "{} vs {}", l.order_key, r.order_key);
        let mut r = r.clone();
        r.order_key = l.order_key;
        assert_eq!(l, &r);
    }
}

fn round_trip(stack: &EditHistoryStack, config: &HistoryConfig) -> EditHistoryStack {
    let doc = write_document(stack, config);
    let parsed = parse_document(&doc).expect("parse");
    assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
    assert!(matches!(parsed.masks, ParsedMasks::Ordered(_)));
    let (migrated, report) = Migrator::new(&BuiltinPriorities, config).migrate(parsed);
    assert!(report.is_clean());
    assert!(!report.inserted_mask_manager);
    migrated
}

#[test]
fn current_schema_round_trips_under_every_policy() {
    let stack = current_stack();
    for compression in [
        CompressionPolicy::Never,
        CompressionPolicy::LargeOnly { threshold: 100 },
        CompressionPolicy::Always,
    ] {
        let config = HistoryConfig {
            compression,
            ..HistoryConfig::default()
        };
        assert_same_stack(&stack, &round_trip(&stack, &config));
    }
}

#[test]
fn repeated_cycles_do_not_drift() {
    let config = HistoryConfig::default();
    let first = round_trip(&current_stack(), &config);
    let second = round_trip(&first, &config);
    assert_eq!(first, second);
    assert_eq!(write_document(&first, &config), write_document(&second, &config));
}

#[test]
fn writer_emits_current_indexed_layout() {
    let doc = write_document(&current_stack(), &HistoryConfig::default());
    assert_eq!(doc.find_text(keys::SCHEMA_VERSION), Some("3"));
    assert_eq!(
        doc.find_text(&format!("{}[2]/iop_order", keys::HISTORY)),
        Some(format_order_key(12.000_123_456_789_1).as_str())
    );
    assert_eq!(doc.find_text(&format!("{}[1]/blendop_params", keys::HISTORY)), None);
    assert_eq!(doc.find_text(&format!("{}[3]/mask_num", keys::MASKS_HISTORY)), Some("3"));
    assert!(doc.iter().all(|(_, value)| matches!(value, Value::Text(_))));
}

#[test]
fn sidecar_upgrade_keeps_unrelated_metadata() {
    let tmp = TempDir::new().expect("tmp");
    let legacy_path = tmp.path().join("legacy.json");
    let out_path = tmp.path().join("out.json");

    let mut legacy = Document::new();
    legacy.set_text(keys::SCHEMA_VERSION, "1");
    legacy.set(keys::V1_OPERATION, Value::seq(["exposure", "exposure"]));
    legacy.set(keys::V1_MOD_VERSION, Value::seq(["6", "6"]));
    legacy.set(keys::V1_PARAMS, Value::seq(["0011", "2233"]));
    legacy.set(keys::V1_MULTI_PRIORITY, Value::seq(["1", "0"]));
    legacy.save_json(&legacy_path).expect("save legacy");

    let mut existing = Document::new();
    existing.set_text("Xmp.dc.title", "harbour");
    existing.set(keys::V1_OPERATION, Value::seq(["stale"]));
    existing.save_json(&out_path).expect("save existing");

    let config = HistoryConfig::default();
    let mut store = SqliteHistoryStore::open_in_memory().expect("open sqlite");
    import_sidecar(&mut store, 4, &legacy_path, &BuiltinPriorities, &config).expect("import");
    assert!(export_sidecar(&store, 4, &out_path, &config).expect("export"));
    assert!(!export_sidecar(&store, 5, tmp.path().join("none.json"), &config).expect("export"));

    let written = Document::load_json(&out_path).expect("load");
    assert_eq!(written.find_text("Xmp.dc.title"), Some("harbour"));
    assert!(written.find(keys::V1_OPERATION).is_none());

    let parsed = parse_document(&written).expect("parse");
    assert_eq!(parsed.entries.len(), 2);
    assert!(parsed.entries[0].order_key < parsed.entries[1].order_key);
    assert_eq!(parsed.entries[1].params, vec![0x22, 0x33]);

    let exported = export_subject(&store, 4, &config).expect("export").expect("stored");
    let stored = store.load_stack(4).expect("load").expect("stored");
    assert_eq!(exported, write_document(&stored, &config));
}

fn indexed_pairs(params: &[Vec<u8>]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (i, p) in params.iter().enumerate() {
        let key = |field: &str| format!("{}[{}]/{field}", keys::HISTORY, i + 1);
        pairs.push((key("operation"), format!("op{i}")));
        pairs.push((key("modversion"), "1".to_string()));
        pairs.push((key("params"), edithist::codec::encode(p, false)));
        pairs.push((key("multi_priority"), i.to_string()));
    }
    pairs
}

fn shuffled_document() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<(String, String)>)> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..12).prop_flat_map(|params| {
        let pairs = indexed_pairs(&params);
        (Just(params), Just(pairs).prop_shuffle())
    })
}

proptest! {
    #[test]
    fn key_arrival_order_does_not_matter((params, pairs) in shuffled_document()) {
        let mut doc = Document::new();
        doc.set_text(keys::SCHEMA_VERSION, "2");
        for (key, value) in pairs {
            doc.set_text(key, value);
        }
        let parsed = parse_document(&doc).expect("parse");
        prop_assert_eq!(parsed.entries.len(), params.len());
        for (i, (entry, p)) in parsed.entries.iter().zip(&params).enumerate() {
            prop_assert_eq!(&entry.operation, &format!("op{i}"));
            prop_assert_eq!(&entry.params, p);
            prop_assert_eq!(entry.num as usize, i);
        }
    }
}
