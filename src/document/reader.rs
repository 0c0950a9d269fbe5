//! Uniform record access over the two array encodings.
//!
//! Parsers ask for a [`Records`] iterator and only deal with field
//! semantics; which physical layout the document used stays in here.

use std::collections::{BTreeMap, btree_map};

use hashbrown::HashMap;

use super::{ArrayKind, Document, DocumentError, Value};

/// Physical layout of one logical array.
#[derive(Debug, Clone, Copy)]
pub enum ArrayLayout<'a> {
    /// Sibling keys each holding one column; `fields` maps field name to
    /// document key and its first pair decides the element count.
    Parallel {
        /// `(field, key)` pairs.
        fields: &'a [(&'a str, &'a str)],
        /// Container kind required of the primary key.
        kind: ArrayKind,
    },
    /// `base[n]/field` keys, 1-based.
    Indexed {
        /// Array key before the `[`.
        base: &'a str,
    },
}

/// One logical array element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record<'a> {
    index: usize,
    fields: HashMap<&'a str, &'a str>,
}

impl<'a> Record<'a> {
    /// 1-based position in the source array.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Text of `field`, if the element has it.
    pub fn get(&self, field: &str) -> Option<&'a str> {
        self.fields.get(field).copied()
    }

    /// Whether the element has `field`.
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// Iterator over the records of one array.
pub struct Records<'a> {
    inner: RecordsInner<'a>,
}

enum RecordsInner<'a> {
    Columns {
        columns: Vec<(&'a str, Option<&'a [String]>)>,
        next: usize,
        len: usize,
    },
    Grouped(btree_map::IntoValues<usize, Record<'a>>),
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        match &mut self.inner {
            RecordsInner::Columns { columns, next, len } => {
                if *next >= *len {
                    return None;
                }
                let i = *next;
                *next += 1;
                let fields = columns
                    .iter()
                    .filter_map(|(field, column)| {
                        column.and_then(|items| items.get(i)).map(|v| (*field, v.as_str()))
                    })
                    .collect();
                Some(Record {
                    index: i + 1,
                    fields,
                })
            }
            RecordsInner::Grouped(values) => values.next(),
        }
    }
}

/// Opens the array described by `layout`.
///
/// Every structural problem fails the whole array.
pub fn read_records<'a>(
    doc: &'a Document,
    layout: ArrayLayout<'a>,
) -> Result<Records<'a>, DocumentError> {
    let inner = match layout {
        ArrayLayout::Parallel { fields, kind } => read_columns(doc, fields, kind)?,
        ArrayLayout::Indexed { base } => read_grouped(doc, base)?,
    };
    Ok(Records { inner })
}

fn read_columns<'a>(
    doc: &'a Document,
    fields: &'a [(&'a str, &'a str)],
    kind: ArrayKind,
) -> Result<RecordsInner<'a>, DocumentError> {
    let Some(&(_, primary_key)) = fields.first() else {
        return Ok(RecordsInner::Columns {
            columns: Vec::new(),
            next: 0,
            len: 0,
        });
    };

    let len = match doc.find(primary_key) {
        None => 0,
        Some(Value::Array { kind: found, items }) if *found == kind => items.len(),
        Some(Value::Array { .. }) => {
            return Err(DocumentError::WrongContainer {
                key: primary_key.to_string(),
                expected: kind,
            });
        }
        Some(Value::Text(_)) => {
            return Err(DocumentError::NotAnArray {
                key: primary_key.to_string(),
            });
        }
    };

    let mut columns = Vec::with_capacity(fields.len());
    for &(field, key) in fields {
        let column = match doc.find(key) {
            None => None,
            Some(Value::Array { items, .. }) if items.len() == len => Some(items.as_slice()),
            Some(Value::Array { items, .. }) => {
                return Err(DocumentError::LengthMismatch {
                    key: key.to_string(),
                    expected: len,
                    actual: items.len(),
                });
            }
            Some(Value::Text(_)) => {
                return Err(DocumentError::NotAnArray {
                    key: key.to_string(),
                });
            }
        };
        columns.push((field, column));
    }

    Ok(RecordsInner::Columns {
        columns,
        next: 0,
        len,
    })
}

fn read_grouped<'a>(doc: &'a Document, base: &'a str) -> Result<RecordsInner<'a>, DocumentError> {
    let mut grouped: BTreeMap<usize, Record<'a>> = BTreeMap::new();
    for item in doc.find_array(base) {
        let item = item?;
        let record = grouped.entry(item.index).or_insert_with(|| Record {
            index: item.index,
            fields: HashMap::new(),
        });
        if record.fields.insert(item.field, item.value).is_some() {
            tracing::warn!(base, index = item.index, field = item.field, "duplicate array field, keeping last");
        }
    }
    Ok(RecordsInner::Grouped(grouped.into_values()))
}
