//! Upgrade of parsed stacks to the canonical schema.

/// Legacy mask group flattening.
pub mod groups;
/// Per-operation base priorities.
pub mod priority;

use crate::{
    config::HistoryConfig,
    stack::{EditHistoryStack, HistoryEntry, ParsedMasks, ParsedStack},
    types::{
        CURRENT_SCHEMA_VERSION, LEGACY_IOP_ORDER_VERSION, MASK_MANAGER_OP, MaskId,
        is_order_key_unset,
    },
};

use groups::{BlendMaskOffset, MaskLocator, resolve_groups};
use priority::PriorityTable;

/// Ranks from here on reach the next whole priority.
const RANK_SPAN: i32 = 1000;

/// Non-fatal findings of one migration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Operations whose order key could not be resolved.
    pub unresolved: Vec<String>,
    /// Operations with an instance rank of 1000 or more, whose keys may
    /// collide with the next operation's base priority.
    pub rank_overflow: Vec<String>,
    /// Legacy groups left out because their member records were malformed.
    pub skipped_groups: Vec<MaskId>,
    /// Unreferenced masks removed by the orphan policy.
    pub dropped_masks: Vec<MaskId>,
    /// Whether a mask manager entry was prepended.
    pub inserted_mask_manager: bool,
}

impl MigrationReport {
    /// True when every order key resolved inside its slot and no group was skipped.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.rank_overflow.is_empty() && self.skipped_groups.is_empty()
    }
}

/// Turns [`ParsedStack`]s of any schema into [`EditHistoryStack`]s.
pub struct Migrator<'a> {
    priorities: &'a dyn PriorityTable,
    locator: Box<dyn MaskLocator + 'a>,
    keep_orphan_masks: bool,
}

impl<'a> Migrator<'a> {
    /// Migrator using `priorities` and the mask settings of `config`.
    pub fn new(priorities: &'a dyn PriorityTable, config: &HistoryConfig) -> Self {
        Self {
            priorities,
            locator: Box::new(BlendMaskOffset(config.blend_mask_offset)),
            keep_orphan_masks: config.keep_orphan_masks,
        }
    }

    /// Replaces how blend params are searched for mask references.
    pub fn with_locator(mut self, locator: impl MaskLocator + 'a) -> Self {
        self.locator = Box::new(locator);
        self
    }

    /// Upgrades `parsed` and reports what could not be carried over cleanly.
    pub fn migrate(&self, parsed: ParsedStack) -> (EditHistoryStack, MigrationReport) {
        let mut report = MigrationReport::default();
        let legacy = parsed.schema_version < CURRENT_SCHEMA_VERSION;
        let iop_order_version = if legacy {
            LEGACY_IOP_ORDER_VERSION
        } else {
            parsed.iop_order_version.unwrap_or_else(|| {
                tracing::warn!("current schema document without iop order version, assuming legacy table");
                LEGACY_IOP_ORDER_VERSION
            })
        };

        let mut entries = parsed.entries;
        let entry_count = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        let mut history_end = parsed.history_end.unwrap_or(entry_count).min(entry_count);
        self.resolve_order_keys(&mut entries, iop_order_version, &mut report);

        let masks = match parsed.masks {
            ParsedMasks::Ordered(masks) => masks,
            ParsedMasks::Legacy(legacy_masks) => {
                let roots: Vec<MaskId> = entries
                    .iter()
                    .filter_map(|entry| self.locator.referenced_mask(entry))
                    .collect();
                let resolution = resolve_groups(&legacy_masks, roots, self.keep_orphan_masks);
                report.skipped_groups = resolution.skipped_groups;
                report.dropped_masks = resolution.dropped;
                resolution.masks
            }
        };

        if legacy {
            let has_manager = entries.iter().any(|e| e.operation == MASK_MANAGER_OP);
            if !masks.is_empty() && !has_manager {
                let order_key = self.base_priority(MASK_MANAGER_OP, iop_order_version, &mut report);
                entries.insert(0, HistoryEntry::mask_manager(order_key));
                report.inserted_mask_manager = true;
                if history_end > 0 {
                    history_end += 1;
                }
            }
            for (num, entry) in entries.iter_mut().enumerate() {
                entry.num = num as u32;
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                unresolved = ?report.unresolved,
                rank_overflow = ?report.rank_overflow,
                skipped_groups = ?report.skipped_groups,
                "history migrated with anomalies"
            );
        }
        tracing::debug!(
            schema_version = parsed.schema_version,
            iop_order_version,
            entries = entries.len(),
            masks = masks.len(),
            "history migrated"
        );

        (
            EditHistoryStack {
                iop_order_version,
                history_end,
                entries,
                masks,
            },
            report,
        )
    }

    /// Sentinel keys become `base + rank / 1000`, which keeps the instances
    /// of one operation clustered at its base and in rank order.
    fn resolve_order_keys(&self, entries: &mut [HistoryEntry], version: u32, report: &mut MigrationReport) {
        for entry in entries.iter_mut().filter(|e| is_order_key_unset(e.order_key)) {
            let base = self.base_priority(&entry.operation, version, report);
            if is_order_key_unset(base) {
                continue;
            }
            if entry.multi_priority.unsigned_abs() >= RANK_SPAN.unsigned_abs() {
                tracing::warn!(
                    operation = %entry.operation,
                    rank = entry.multi_priority,
                    "instance rank leaves the operation's priority slot"
                );
                if !report.rank_overflow.contains(&entry.operation) {
                    report.rank_overflow.push(entry.operation.clone());
                }
            }
            entry.order_key = base + f64::from(entry.multi_priority) / f64::from(RANK_SPAN);
        }
    }

    fn base_priority(&self, operation: &str, version: u32, report: &mut MigrationReport) -> f64 {
        match self.priorities.base_priority(operation, version) {
            Some(base) => base,
            None => {
                tracing::warn!(operation, iop_order_version = version, "no base priority, order key left unresolved");
                report.unresolved.push(operation.to_string());
                crate::types::ORDER_KEY_UNSET
            }
        }
    }
}
