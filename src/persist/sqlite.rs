//! SQLite-backed history store.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use crate::{
    stack::{EditHistoryStack, HistoryEntry, MaskEntry, MaskType},
    types::SubjectId,
};

use super::{PersistResult, StackStore, validate_stack};

/// SQLite implementation of [`crate::persist::StackStore`].
pub struct SqliteHistoryStore {
    conn: Connection,
}

impl SqliteHistoryStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Stored `history_end` of `subject`.
    pub fn history_end(&self, subject: SubjectId) -> PersistResult<Option<u32>> {
        let end: Option<i64> = self
            .conn
            .query_row(
                "SELECT history_end FROM subjects WHERE id = ?1",
                params![subject],
                |row| row.get(0),
            )
            .optional()?;
        Ok(end.map(|v| v as u32))
    }

    /// Stored history rows of `subject`.
    pub fn history_count(&self, subject: SubjectId) -> PersistResult<usize> {
        count_rows(&self.conn, "history", subject)
    }

    /// Stored mask rows of `subject`.
    pub fn mask_count(&self, subject: SubjectId) -> PersistResult<usize> {
        count_rows(&self.conn, "masks_history", subject)
    }

    fn load_entries(&self, subject: SubjectId) -> PersistResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT num, operation, mod_version, enabled, params, blend_params, blend_version, \
             multi_priority, multi_name, order_key FROM history WHERE subject_id = ?1 ORDER BY num ASC",
        )?;
        let rows = stmt.query_map(params![subject], entry_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn load_masks(&self, subject: SubjectId) -> PersistResult<Vec<MaskEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT mask_id, mask_type, name, version, points, source, member_count, sequence_num \
             FROM masks_history WHERE subject_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![subject], mask_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl StackStore for SqliteHistoryStore {
    fn replace_stack(&mut self, subject: SubjectId, stack: &EditHistoryStack) -> PersistResult<()> {
        // Dropping the transaction on any early return rolls it back.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        delete_subject_rows(&tx, subject)?;
        validate_stack(stack)?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO masks_history(subject_id, position, sequence_num, mask_id, mask_type, \
                 name, version, points, member_count, source) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (position, mask) in stack.masks.iter().enumerate() {
                stmt.execute(params![
                    subject,
                    position as i64,
                    mask.sequence_num,
                    mask.mask_id,
                    i64::from(mask.mask_type.0),
                    mask.mask_name,
                    mask.mask_version,
                    mask.points,
                    mask.member_count,
                    mask.source,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO history(subject_id, num, operation, mod_version, enabled, params, \
                 blend_params, blend_version, multi_priority, multi_name, order_key) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for entry in &stack.entries {
                stmt.execute(params![
                    subject,
                    entry.num,
                    entry.operation,
                    entry.mod_version,
                    entry.enabled,
                    entry.params,
                    entry.blend_params,
                    entry.blend_version,
                    entry.multi_priority,
                    entry.multi_name,
                    entry.order_key,
                ])?;
            }
        }

        tx.execute(
            "INSERT INTO subjects(id, history_end, iop_order_version) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET history_end = excluded.history_end, \
             iop_order_version = excluded.iop_order_version",
            params![subject, stack.effective_history_end(), stack.iop_order_version],
        )?;
        tx.commit()?;

        tracing::debug!(
            subject,
            entries = stack.entries.len(),
            masks = stack.masks.len(),
            history_end = stack.effective_history_end(),
            "history stack stored"
        );
        Ok(())
    }

    fn load_stack(&self, subject: SubjectId) -> PersistResult<Option<EditHistoryStack>> {
        let header: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT history_end, iop_order_version FROM subjects WHERE id = ?1",
                params![subject],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((history_end, iop_order_version)) = header else {
            return Ok(None);
        };

        Ok(Some(EditHistoryStack {
            iop_order_version: iop_order_version as u32,
            history_end: history_end as u32,
            entries: self.load_entries(subject)?,
            masks: self.load_masks(subject)?,
        }))
    }

    fn clear_subject(&mut self, subject: SubjectId) -> PersistResult<()> {
        let tx = self.conn.transaction()?;
        delete_subject_rows(&tx, subject)?;
        tx.execute("DELETE FROM subjects WHERE id = ?1", params![subject])?;
        tx.commit()?;
        Ok(())
    }
}

fn delete_subject_rows(tx: &Transaction<'_>, subject: SubjectId) -> PersistResult<()> {
    tx.execute("DELETE FROM history WHERE subject_id = ?1", params![subject])?;
    tx.execute("DELETE FROM masks_history WHERE subject_id = ?1", params![subject])?;
    Ok(())
}

fn count_rows(conn: &Connection, table: &str, subject: SubjectId) -> PersistResult<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE subject_id = ?1"),
        params![subject],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        num: row.get(0)?,
        operation: row.get(1)?,
        mod_version: row.get(2)?,
        enabled: row.get(3)?,
        params: row.get(4)?,
        blend_params: row.get(5)?,
        blend_version: row.get(6)?,
        multi_priority: row.get(7)?,
        multi_name: row.get(8)?,
        order_key: row.get(9)?,
    })
}

fn mask_from_row(row: &Row<'_>) -> rusqlite::Result<MaskEntry> {
    let mask_type: i64 = row.get(1)?;
    Ok(MaskEntry {
        mask_id: row.get(0)?,
        mask_type: MaskType(mask_type as u32),
        mask_name: row.get(2)?,
        mask_version: row.get(3)?,
        points: row.get(4)?,
        source: row.get(5)?,
        member_count: row.get(6)?,
        sequence_num: row.get(7)?,
    })
}
