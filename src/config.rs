//! Host-tunable behaviour of import and export.

use serde::{Deserialize, Serialize};

use crate::codec::CompressionPolicy;

/// Settings shared by the migrator and the document writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Which blobs the document writer compresses.
    pub compression: CompressionPolicy,
    /// zstd level for compressed blobs.
    pub compression_level: i32,
    /// Keep legacy masks no history entry references, unless they are
    /// pure clone sources.
    pub keep_orphan_masks: bool,
    /// Offset of the mask id inside blend params.
    pub blend_mask_offset: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            compression: CompressionPolicy::default(),
            compression_level: 3,
            keep_orphan_masks: true,
            blend_mask_offset: 24,
        }
    }
}
