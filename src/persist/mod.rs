/// SQLite-backed [`StackStore`].
pub mod sqlite;

use crate::{stack::EditHistoryStack, types::SubjectId};

/// Store failures; any of them leaves the subject's rows untouched.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Storage-level error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The stack broke a storage invariant.
    #[error("invalid stack: {0}")]
    InvalidStack(String),
}

/// Result alias for store operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Relational home of each subject's history and masks.
pub trait StackStore {
    /// Atomically replaces every history and mask row of `subject`.
    fn replace_stack(&mut self, subject: SubjectId, stack: &EditHistoryStack) -> PersistResult<()>;
    /// Reads back the stored stack, `None` when nothing is stored.
    fn load_stack(&self, subject: SubjectId) -> PersistResult<Option<EditHistoryStack>>;
    /// Removes every row of `subject`.
    fn clear_subject(&mut self, _subject: SubjectId) -> PersistResult<()> {
        Ok(())
    }
}

/// Checks done inside the write transaction, before any row is inserted.
///
/// `num` must strictly increase but may have gaps; schema 3 stacks keep the
/// values their document carried.
pub(crate) fn validate_stack(stack: &EditHistoryStack) -> PersistResult<()> {
    for pair in stack.entries.windows(2) {
        if pair[0].num >= pair[1].num {
            return Err(PersistError::InvalidStack(format!(
                "history num {} follows {}",
                pair[1].num, pair[0].num
            )));
        }
    }
    if let Some(entry) = stack.entries.iter().find(|e| e.operation.is_empty()) {
        return Err(PersistError::InvalidStack(format!(
            "history entry {} has no operation",
            entry.num
        )));
    }
    let mut seen = hashbrown::HashSet::new();
    for mask in &stack.masks {
        if !seen.insert((mask.sequence_num, mask.mask_id)) {
            return Err(PersistError::InvalidStack(format!(
                "mask {} appears twice at sequence {}",
                mask.mask_id, mask.sequence_num
            )));
        }
    }
    Ok(())
}
