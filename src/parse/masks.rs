use crate::{
    codec,
    document::{
        ArrayKind, Document,
        keys::{self, field},
        reader::{ArrayLayout, Record, read_records},
    },
    stack::{LegacyMasks, MaskEntry, MaskType, ParsedMasks},
    types::DEFAULT_MASK_NAME,
};

use super::{ParseError, parse_int};

/// Parses the mask set of a schema `schema_version` document.
///
/// Masks are optional: an unreadable legacy mask set yields an empty set.
/// A malformed schema 3 mask array still fails the document.
pub fn parse_masks(doc: &Document, schema_version: u32) -> Result<ParsedMasks, ParseError> {
    if schema_version < 3 {
        return Ok(ParsedMasks::Legacy(parse_legacy(doc)));
    }

    let records = read_records(doc, ArrayLayout::Indexed { base: keys::MASKS_HISTORY })?;
    let mut masks = Vec::new();
    for record in records {
        let Some(sequence_num) = record.get(field::MASK_NUM).and_then(parse_int) else {
            tracing::warn!(entry = record.index(), "mask without sequence number dropped");
            continue;
        };
        if let Some(mut mask) = mask_from_record(&record) {
            mask.sequence_num = sequence_num;
            masks.push(mask);
        }
    }
    Ok(ParsedMasks::Ordered(masks))
}

fn parse_legacy(doc: &Document) -> LegacyMasks {
    if let Some(&(_, missing)) = keys::LEGACY_MASK_FIELDS
        .iter()
        .find(|(_, key)| doc.find(key).is_none())
    {
        if missing != keys::MASK_ID {
            tracing::debug!(key = missing, "incomplete legacy mask arrays, ignoring masks");
        }
        return LegacyMasks::default();
    }

    let layout = |kind| ArrayLayout::Parallel {
        fields: keys::LEGACY_MASK_FIELDS,
        kind,
    };
    let records = match read_records(doc, layout(ArrayKind::Seq))
        .or_else(|_| read_records(doc, layout(ArrayKind::Bag)))
    {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(error = %err, "unreadable legacy mask arrays, ignoring masks");
            return LegacyMasks::default();
        }
    };

    let mut masks = LegacyMasks::default();
    for record in records {
        let Some(mask) = mask_from_record(&record) else {
            continue;
        };
        let mask_id = mask.mask_id;
        if !masks.insert(mask) {
            tracing::warn!(mask_id, "duplicate legacy mask id, keeping first");
        }
    }
    masks
}

fn mask_from_record(record: &Record<'_>) -> Option<MaskEntry> {
    let parsed = (|| {
        let mask_id = record.get(field::MASK_ID).and_then(parse_int)?;
        let mask_type = record
            .get(field::MASK_TYPE)
            .and_then(|raw| raw.trim().parse::<u32>().ok())?;
        let mask_version = record.get(field::MASK_VERSION).and_then(parse_int)?;
        let points = record.get(field::MASK_POINTS).and_then(|t| codec::decode(t).ok())?;
        let member_count = record.get(field::MASK_COUNT).and_then(parse_int)?;
        let source = match record.get(field::MASK_SOURCE) {
            Some(text) => codec::decode(text).ok()?,
            None => Vec::new(),
        };
        let mask_name = record
            .get(field::MASK_NAME)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_MASK_NAME)
            .to_string();
        Some(MaskEntry {
            mask_id,
            mask_type: MaskType(mask_type),
            mask_name,
            mask_version,
            points,
            source,
            member_count,
            sequence_num: 0,
        })
    })();

    if parsed.is_none() {
        tracing::warn!(entry = record.index(), "mask with missing or undecodable fields dropped");
    }
    parsed
}
