//! Canonical document writer.
//!
//! Output is always the current schema in indexed-path form, whatever
//! version the stack was originally read from.

use crate::{
    codec,
    config::HistoryConfig,
    document::{
        Document,
        keys::{self, field},
    },
    stack::{EditHistoryStack, HistoryEntry, MaskEntry},
    types::{CURRENT_SCHEMA_VERSION, ORDER_KEY_DECIMALS},
};

/// Writes `stack` into a fresh document.
pub fn write_document(stack: &EditHistoryStack, config: &HistoryConfig) -> Document {
    let mut doc = Document::new();
    write_into(&mut doc, stack, config);
    doc
}

/// Replaces the history keys of `doc` with `stack`, leaving other keys alone.
pub fn write_into(doc: &mut Document, stack: &EditHistoryStack, config: &HistoryConfig) {
    let removed = doc.erase_history_keys();
    if removed > 0 {
        tracing::trace!(removed, "erased previous history keys");
    }

    doc.set_text(keys::SCHEMA_VERSION, CURRENT_SCHEMA_VERSION.to_string());
    doc.set_text(keys::IOP_ORDER_VERSION, stack.iop_order_version.to_string());
    doc.set_text(keys::HISTORY_END, stack.effective_history_end().to_string());

    let blob = |bytes: &[u8]| {
        codec::encode_with_level(
            bytes,
            config.compression.should_compress(bytes.len()),
            config.compression_level,
        )
    };

    for (i, entry) in stack.entries.iter().enumerate() {
        write_entry(doc, i + 1, entry, &blob);
    }
    for (i, mask) in stack.masks.iter().enumerate() {
        write_mask(doc, i + 1, mask, &blob);
    }
}

/// Fixed-point rendering precise enough that repeated read-write cycles
/// do not drift.
pub fn format_order_key(key: f64) -> String {
    format!("{key:.prec$}", prec = ORDER_KEY_DECIMALS)
}

fn write_entry(doc: &mut Document, index: usize, entry: &HistoryEntry, blob: &impl Fn(&[u8]) -> String) {
    let mut put = |name: &str, value: String| {
        doc.set_text(format!("{}[{index}]/{name}", keys::HISTORY), value);
    };
    put(field::NUM, entry.num.to_string());
    put(field::OPERATION, entry.operation.clone());
    put(field::ENABLED, u8::from(entry.enabled).to_string());
    put(field::MOD_VERSION, entry.mod_version.to_string());
    put(field::PARAMS, blob(&entry.params));
    put(field::MULTI_NAME, entry.multi_name.clone());
    put(field::MULTI_PRIORITY, entry.multi_priority.to_string());
    put(field::BLEND_VERSION, entry.blend_version.to_string());
    if let Some(blend) = &entry.blend_params {
        put(field::BLEND_PARAMS, blob(blend));
    }
    put(field::ORDER_KEY, format_order_key(entry.order_key));
}

fn write_mask(doc: &mut Document, index: usize, mask: &MaskEntry, blob: &impl Fn(&[u8]) -> String) {
    let mut put = |name: &str, value: String| {
        doc.set_text(format!("{}[{index}]/{name}", keys::MASKS_HISTORY), value);
    };
    put(field::MASK_NUM, mask.sequence_num.to_string());
    put(field::MASK_ID, mask.mask_id.to_string());
    put(field::MASK_TYPE, mask.mask_type.0.to_string());
    put(field::MASK_NAME, mask.mask_name.clone());
    put(field::MASK_VERSION, mask.mask_version.to_string());
    put(field::MASK_POINTS, blob(&mask.points));
    put(field::MASK_COUNT, mask.member_count.to_string());
    put(field::MASK_SOURCE, blob(&mask.source));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_keys_keep_thirteen_decimals() {
        assert_eq!(format_order_key(12.0), "12.0000000000000");
        assert_eq!(format_order_key(-1.0), "-1.0000000000000");
        assert_eq!(format_order_key(1.0 / 3.0), "0.3333333333333");
        assert_eq!(format_order_key(1e15 + 0.5), "1000000000000000.5000000000000");
    }

    #[test]
    fn rewriting_drops_legacy_keys_only() {
        let mut doc = Document::new();
        doc.set_text("Xmp.dc.title", "keep me");
        doc.set(keys::V1_OPERATION, crate::document::Value::seq(["exposure"]));
        doc.set_text(format!("{}[9]/operation", keys::HISTORY), "stale");

        write_into(&mut doc, &EditHistoryStack::empty(1), &HistoryConfig::default());

        assert_eq!(doc.find_text("Xmp.dc.title"), Some("keep me"));
        assert!(doc.find(keys::V1_OPERATION).is_none());
        assert_eq!(doc.find_array(keys::HISTORY).count(), 0);
        assert_eq!(doc.find_text(keys::SCHEMA_VERSION), Some("3"));
    }
}
