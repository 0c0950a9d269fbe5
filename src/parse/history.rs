use hashbrown::HashMap;

use crate::{
    codec,
    document::{
        ArrayKind, Document,
        keys::{self, field},
        reader::{ArrayLayout, Record, Records, read_records},
    },
    stack::HistoryEntry,
    types::ORDER_KEY_UNSET,
};

use super::{ParseError, parse_bool, parse_int};

/// Parses the history array of a schema `schema_version` document.
pub fn parse_history(doc: &Document, schema_version: u32) -> Result<Vec<HistoryEntry>, ParseError> {
    match schema_version {
        1 => {
            let mut entries = collect_entries(open_v1(doc)?, schema_version)?;
            invert_multi_priorities(&mut entries);
            Ok(entries)
        }
        2 | 3 => {
            let records = read_records(doc, ArrayLayout::Indexed { base: keys::HISTORY })?;
            let mut entries = collect_entries(records, schema_version)?;
            entries.sort_by_key(|e| e.num);
            Ok(entries)
        }
        other => Err(ParseError::UnsupportedSchema(other.into())),
    }
}

/// Schema 1 arrays were written as sequences, except by a few writers that
/// used bags; sequences are tried first.
fn open_v1(doc: &Document) -> Result<Records<'_>, ParseError> {
    let layout = |kind| ArrayLayout::Parallel {
        fields: keys::V1_HISTORY_FIELDS,
        kind,
    };
    match read_records(doc, layout(ArrayKind::Seq)) {
        Ok(records) => Ok(records),
        Err(seq_err) => match read_records(doc, layout(ArrayKind::Bag)) {
            Ok(records) => {
                tracing::debug!(error = %seq_err, "schema 1 history stored as bag");
                Ok(records)
            }
            Err(_) => Err(seq_err.into()),
        },
    }
}

fn collect_entries(records: Records<'_>, schema_version: u32) -> Result<Vec<HistoryEntry>, ParseError> {
    let mut entries = Vec::new();
    let mut total = 0usize;
    let mut invalid = 0usize;
    let mut first_invalid = None;

    for (position, record) in records.enumerate() {
        total += 1;
        match entry_from_record(&record, position, schema_version) {
            Ok(entry) => entries.push(entry),
            Err(field) => {
                invalid += 1;
                first_invalid.get_or_insert((record.index(), field));
            }
        }
    }

    if let Some((first_entry, field)) = first_invalid {
        tracing::error!(
            schema_version,
            invalid,
            total,
            first_entry,
            field,
            "history stack rejected: entries missing required fields"
        );
        return Err(ParseError::IncompleteHistory {
            schema_version,
            invalid,
            total,
            first_entry,
            field,
        });
    }
    Ok(entries)
}

/// Builds one entry, or names the first required field that is missing.
fn entry_from_record(
    record: &Record<'_>,
    position: usize,
    schema_version: u32,
) -> Result<HistoryEntry, &'static str> {
    let operation = record
        .get(field::OPERATION)
        .filter(|op| !op.is_empty())
        .ok_or(field::OPERATION)?;
    let mod_version = record
        .get(field::MOD_VERSION)
        .and_then(parse_int)
        .ok_or(field::MOD_VERSION)?;
    let params = record
        .get(field::PARAMS)
        .and_then(|text| decode_blob(record, field::PARAMS, text))
        .ok_or(field::PARAMS)?;

    let blend_params = record
        .get(field::BLEND_PARAMS)
        .and_then(|text| decode_blob(record, field::BLEND_PARAMS, text));
    let num = match record.get(field::NUM).filter(|_| schema_version >= 3) {
        Some(raw) => raw.trim().parse().ok().unwrap_or_else(|| {
            tracing::warn!(entry = record.index(), value = raw, "invalid history num, using position");
            position as u32
        }),
        None => position as u32,
    };
    let order_key = if schema_version >= 2 {
        record
            .get(field::ORDER_KEY)
            .map(|raw| parse_order_key(record, raw))
            .unwrap_or(ORDER_KEY_UNSET)
    } else {
        ORDER_KEY_UNSET
    };

    Ok(HistoryEntry {
        num,
        operation: operation.to_string(),
        mod_version,
        enabled: record.get(field::ENABLED).and_then(parse_bool).unwrap_or(true),
        params,
        blend_params,
        blend_version: record.get(field::BLEND_VERSION).and_then(parse_int).unwrap_or(1),
        multi_priority: record.get(field::MULTI_PRIORITY).and_then(parse_int).unwrap_or(0),
        multi_name: record.get(field::MULTI_NAME).unwrap_or_default().to_string(),
        order_key,
    })
}

fn decode_blob(record: &Record<'_>, field: &str, text: &str) -> Option<Vec<u8>> {
    codec::decode(text)
        .map_err(|err| {
            tracing::warn!(entry = record.index(), field, error = %err, "undecodable history blob");
        })
        .ok()
}

fn parse_order_key(record: &Record<'_>, raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(key) if key.is_finite() => key,
        _ => {
            tracing::warn!(entry = record.index(), value = raw, "invalid order key, will recompute");
            ORDER_KEY_UNSET
        }
    }
}

/// Schema 1 ranks instances of one operation in descending order; turn that
/// into an ascending rank using the maximum over the complete stack.
fn invert_multi_priorities(entries: &mut [HistoryEntry]) {
    let mut max_by_op: HashMap<&str, i32> = HashMap::new();
    for entry in entries.iter() {
        let max = max_by_op.entry(entry.operation.as_str()).or_insert(entry.multi_priority);
        *max = (*max).max(entry.multi_priority);
    }
    let max_by_op: HashMap<String, i32> = max_by_op
        .into_iter()
        .map(|(op, max)| (op.to_string(), max))
        .collect();
    for entry in entries.iter_mut() {
        if let Some(max) = max_by_op.get(entry.operation.as_str()) {
            entry.multi_priority = max - entry.multi_priority;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: &str, mp: i32) -> HistoryEntry {
        HistoryEntry {
            multi_priority: mp,
            ..HistoryEntry::new(op, 1, vec![])
        }
    }

    #[test]
    fn inversion_uses_max_of_whole_stack() {
        let mut entries = vec![entry("a", 0), entry("a", 3), entry("b", 5), entry("a", 1)];
        invert_multi_priorities(&mut entries);
        let ranks: Vec<_> = entries.iter().map(|e| e.multi_priority).collect();
        assert_eq!(ranks, [3, 0, 0, 2]);
    }
}
