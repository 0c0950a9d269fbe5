//! Document to store and back, for one subject at a time.

use std::path::Path;

use crate::{
    config::HistoryConfig,
    document::{Document, DocumentError},
    export,
    migrate::{MigrationReport, Migrator, priority::PriorityTable},
    parse::{ParseError, parse_document},
    persist::{PersistError, StackStore},
    types::SubjectId,
};

/// Failures of an import or export, tagged with the subject.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The document was rejected; nothing was written.
    #[error("subject {subject}: {source}")]
    Parse {
        /// Subject being imported.
        subject: SubjectId,
        /// Parser error.
        #[source]
        source: ParseError,
    },
    /// The store failed.
    #[error("subject {subject}: {source}")]
    Persist {
        /// Subject being read or written.
        subject: SubjectId,
        /// Store error.
        #[source]
        source: PersistError,
    },
    /// Sidecar could not be read or written.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Parses, migrates, and stores the history carried by `doc`.
///
/// On error the subject's stored rows are left as they were.
pub fn import_document(
    store: &mut dyn StackStore,
    subject: SubjectId,
    doc: &Document,
    priorities: &dyn PriorityTable,
    config: &HistoryConfig,
) -> Result<MigrationReport, PipelineError> {
    let span = tracing::debug_span!("import_document", subject);
    let _enter = span.enter();

    let parsed = parse_document(doc).map_err(|source| {
        tracing::error!(subject, error = %source, "history document rejected");
        PipelineError::Parse { subject, source }
    })?;
    let (stack, report) = Migrator::new(priorities, config).migrate(parsed);
    store
        .replace_stack(subject, &stack)
        .map_err(|source| PipelineError::Persist { subject, source })?;
    tracing::info!(
        subject,
        entries = stack.entries.len(),
        masks = stack.masks.len(),
        "history imported"
    );
    Ok(report)
}

/// Imports a JSON sidecar file.
pub fn import_sidecar(
    store: &mut dyn StackStore,
    subject: SubjectId,
    path: impl AsRef<Path>,
    priorities: &dyn PriorityTable,
    config: &HistoryConfig,
) -> Result<MigrationReport, PipelineError> {
    let doc = Document::load_json(path)?;
    import_document(store, subject, &doc, priorities, config)
}

/// Renders the stored history of `subject`, or `None` when nothing is stored.
pub fn export_subject(
    store: &dyn StackStore,
    subject: SubjectId,
    config: &HistoryConfig,
) -> Result<Option<Document>, PipelineError> {
    let stack = store
        .load_stack(subject)
        .map_err(|source| PipelineError::Persist { subject, source })?;
    Ok(stack.map(|stack| export::write_document(&stack, config)))
}

/// Updates the history keys of the sidecar at `path`, creating it if needed.
/// Returns false when nothing is stored for `subject`.
pub fn export_sidecar(
    store: &dyn StackStore,
    subject: SubjectId,
    path: impl AsRef<Path>,
    config: &HistoryConfig,
) -> Result<bool, PipelineError> {
    let path = path.as_ref();
    let Some(stack) = store
        .load_stack(subject)
        .map_err(|source| PipelineError::Persist { subject, source })?
    else {
        return Ok(false);
    };
    let mut doc = if path.exists() {
        Document::load_json(path)?
    } else {
        Document::new()
    };
    export::write_into(&mut doc, &stack, config);
    doc.save_json(path)?;
    tracing::debug!(subject, path = %path.display(), "sidecar written");
    Ok(true)
}
