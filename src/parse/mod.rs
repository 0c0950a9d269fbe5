//! Version-dispatching document parser.

/// History stack parsing.
pub mod history;
/// Mask set parsing.
pub mod masks;

use crate::{
    document::{Document, DocumentError, keys},
    stack::ParsedStack,
};

/// Reasons a document is rejected as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Schema version outside 1..=3.
    #[error("unsupported schema version {0}")]
    UnsupportedSchema(i64),
    /// A scalar key that does not parse.
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// Text found.
        value: String,
    },
    /// Some history entries lack required fields.
    #[error(
        "{invalid} of {total} history entries in schema v{schema_version} document are unusable \
         (first: entry {first_entry} lacks `{field}`)"
    )]
    IncompleteHistory {
        /// Schema version of the document.
        schema_version: u32,
        /// Entries that could not be built.
        invalid: usize,
        /// Entries in the document.
        total: usize,
        /// 1-based index of the first unusable entry.
        first_entry: usize,
        /// First missing or undecodable field of that entry.
        field: &'static str,
    },
    /// Structural document problem.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Parses a whole document into a stack of its own schema version.
///
/// Fails as a unit: no partial stack is ever returned.
pub fn parse_document(doc: &Document) -> Result<ParsedStack, ParseError> {
    let schema_version = schema_version(doc)?;
    let entries = history::parse_history(doc, schema_version)?;
    let masks = masks::parse_masks(doc, schema_version)?;
    let iop_order_version = optional_scalar::<u32>(doc, keys::IOP_ORDER_VERSION)?;
    let history_end = optional_scalar::<u32>(doc, keys::HISTORY_END)?;

    tracing::debug!(
        schema_version,
        entries = entries.len(),
        masks = masks.len(),
        ?history_end,
        "parsed history document"
    );

    Ok(ParsedStack {
        schema_version,
        iop_order_version,
        history_end,
        entries,
        masks,
    })
}

/// Reads the document schema version; documents without one are schema 1.
pub fn schema_version(doc: &Document) -> Result<u32, ParseError> {
    let Some(raw) = doc.find_text(keys::SCHEMA_VERSION) else {
        return Ok(1);
    };
    let version: i64 = raw.trim().parse().map_err(|_| ParseError::InvalidValue {
        key: keys::SCHEMA_VERSION.to_string(),
        value: raw.to_string(),
    })?;
    match version {
        1..=3 => Ok(version as u32),
        other => Err(ParseError::UnsupportedSchema(other)),
    }
}

fn optional_scalar<T: std::str::FromStr>(doc: &Document, key: &str) -> Result<Option<T>, ParseError> {
    let Some(raw) = doc.find_text(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ParseError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

pub(crate) fn parse_int(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}
