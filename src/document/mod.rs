//! Flat key/value metadata document and its sidecar form.

/// Document key names.
pub mod keys;
/// Versioned array reader.
pub mod reader;

use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Structural problems of a document and sidecar I/O failures.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// An indexed-path key that does not parse.
    #[error("malformed array key `{key}`: {reason}")]
    MalformedIndex {
        /// Offending key.
        key: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A parallel array shorter or longer than its primary array.
    #[error("array `{key}` has {actual} elements, expected {expected}")]
    LengthMismatch {
        /// Offending key.
        key: String,
        /// Length of the primary array.
        expected: usize,
        /// Length found.
        actual: usize,
    },
    /// Primary array stored in the other container kind.
    #[error("array `{key}` is not stored as {expected:?}")]
    WrongContainer {
        /// Offending key.
        key: String,
        /// Kind that was asked for.
        expected: ArrayKind,
    },
    /// Text found where an array is expected.
    #[error("key `{key}` holds text where an array is expected")]
    NotAnArray {
        /// Offending key.
        key: String,
    },
    /// Sidecar is not valid JSON.
    #[error("sidecar json: {0}")]
    Json(#[from] serde_json::Error),
    /// Sidecar could not be read or written.
    #[error("sidecar io: {0}")]
    Io(#[from] std::io::Error),
}

/// Container kind of a legacy array value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayKind {
    /// Ordered sequence.
    Seq,
    /// Unordered bag, written by some historical writers instead of `Seq`.
    Bag,
}

/// Value stored under one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Scalar text.
    Text(String),
    /// Legacy array container.
    Array {
        /// Container kind.
        kind: ArrayKind,
        /// Elements in stored order.
        items: Vec<String>,
    },
}

impl Value {
    /// Sequence of `items`.
    pub fn seq<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array {
            kind: ArrayKind::Seq,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Bag of `items`.
    pub fn bag<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array {
            kind: ArrayKind::Bag,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// The text of a scalar value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Array { .. } => None,
        }
    }
}

/// One element of an indexed-path array: `base[index]/field = value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayItem<'a> {
    /// 1-based element index.
    pub index: usize,
    /// Field path after the `/`.
    pub field: &'a str,
    /// Element text.
    pub value: &'a str,
}

/// Ordered key/value document. Keys are unique; insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, Value)>", into = "Vec<(String, Value)>")]
pub struct Document {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl From<Vec<(String, Value)>> for Document {
    fn from(entries: Vec<(String, Value)>) -> Self {
        let mut doc = Self::default();
        for (key, value) in entries {
            doc.set(key, value);
        }
        doc
    }
}

impl From<Document> for Vec<(String, Value)> {
    fn from(doc: Document) -> Self {
        doc.entries
    }
}

impl Document {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`.
    pub fn find(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    /// Text stored under `key`; `None` for arrays.
    pub fn find_text(&self, key: &str) -> Option<&str> {
        self.find(key).and_then(Value::as_text)
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&idx) => self.entries[idx].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Sets a scalar text value.
    pub fn set_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.set(key, Value::Text(text.into()));
    }

    /// Removes `key`; returns whether it was present.
    pub fn erase(&mut self, key: &str) -> bool {
        self.retain(|k| k != key) > 0
    }

    /// Removes every key starting with `prefix`; returns how many were removed.
    pub fn erase_prefix(&mut self, prefix: &str) -> usize {
        self.retain(|k| !k.starts_with(prefix))
    }

    /// Removes all history and mask keys of every schema version.
    pub fn erase_history_keys(&mut self) -> usize {
        let mut removed = 0;
        for key in keys::SCALAR_KEYS.iter().chain(keys::LEGACY_ARRAY_KEYS) {
            removed += usize::from(self.erase(key));
        }
        removed += self.erase_prefix(&format!("{}[", keys::HISTORY));
        removed += self.erase_prefix(&format!("{}[", keys::MASKS_HISTORY));
        removed
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys and values in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Elements of the indexed-path array `base`, in document order.
    ///
    /// Fails on the first key under `base[` with a malformed index.
    pub fn find_array<'a>(
        &'a self,
        base: &'a str,
    ) -> impl Iterator<Item = Result<ArrayItem<'a>, DocumentError>> + 'a {
        self.entries.iter().filter_map(move |(key, value)| {
            let rest = key.strip_prefix(base)?.strip_prefix('[')?;
            Some(parse_array_item(key, rest, value))
        })
    }

    /// Parses the sidecar JSON form.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Renders the sidecar JSON form.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a JSON sidecar file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Writes a JSON sidecar file, replacing any existing one.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| keep(k));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.index.clear();
            for (idx, (k, _)) in self.entries.iter().enumerate() {
                self.index.insert(k.clone(), idx);
            }
        }
        removed
    }
}

fn parse_array_item<'a>(
    key: &'a str,
    rest: &'a str,
    value: &'a Value,
) -> Result<ArrayItem<'a>, DocumentError> {
    let malformed = |reason| DocumentError::MalformedIndex {
        key: key.to_string(),
        reason,
    };
    let (digits, tail) = rest.split_once(']').ok_or_else(|| malformed("missing `]`"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("index is not a number"));
    }
    let index: usize = digits.parse().map_err(|_| malformed("index out of range"))?;
    if index == 0 {
        return Err(malformed("indices start at 1"));
    }
    let field = tail
        .strip_prefix('/')
        .filter(|f| !f.is_empty())
        .ok_or_else(|| malformed("missing field path"))?;
    let value = value.as_text().ok_or_else(|| malformed("element is not text"))?;
    Ok(ArrayItem { index, field, value })
}
