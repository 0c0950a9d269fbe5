//! History entry, mask, and stack aggregate types.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_MASK_NAME, MASK_MANAGER_OP, MaskId, ORDER_KEY_UNSET};

/// One processing step of a history stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the stack.
    pub num: u32,
    /// Processing step kind.
    pub operation: String,
    /// Layout version of `params`.
    pub mod_version: i32,
    /// Whether the step is active.
    pub enabled: bool,
    /// Opaque step parameters.
    pub params: Vec<u8>,
    /// Opaque blending parameters, absent for steps that never blended.
    pub blend_params: Option<Vec<u8>>,
    /// Layout version of `blend_params`.
    pub blend_version: i32,
    /// Disambiguates instances of the same operation.
    pub multi_priority: i32,
    /// Display label of the instance.
    pub multi_name: String,
    /// Pipeline position; [`ORDER_KEY_UNSET`] until resolved.
    pub order_key: f64,
}

impl HistoryEntry {
    /// Builds an enabled entry with default optional fields.
    pub fn new(operation: impl Into<String>, mod_version: i32, params: Vec<u8>) -> Self {
        Self {
            num: 0,
            operation: operation.into(),
            mod_version,
            enabled: true,
            params,
            blend_params: None,
            blend_version: 1,
            multi_priority: 0,
            multi_name: String::new(),
            order_key: ORDER_KEY_UNSET,
        }
    }

    /// Synthetic disabled entry that owns the subject's masks.
    pub fn mask_manager(order_key: f64) -> Self {
        Self {
            enabled: false,
            order_key,
            ..Self::new(MASK_MANAGER_OP, 1, Vec::new())
        }
    }

    /// Byte length of `params`.
    pub fn params_len(&self) -> usize {
        self.params.len()
    }
}

/// Mask kind bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskType(pub u32);

impl MaskType {
    /// Circle shape.
    pub const CIRCLE: u32 = 1 << 0;
    /// Bezier path shape.
    pub const PATH: u32 = 1 << 1;
    /// Group of other masks.
    pub const GROUP: u32 = 1 << 2;
    /// Clone source.
    pub const CLONE: u32 = 1 << 3;
    /// Linear gradient.
    pub const GRADIENT: u32 = 1 << 4;
    /// Ellipse shape.
    pub const ELLIPSE: u32 = 1 << 5;
    /// Brush strokes.
    pub const BRUSH: u32 = 1 << 6;
    /// Also usable outside clone steps.
    pub const NON_CLONE: u32 = 1 << 7;

    /// Whether any bit of `flag` is set.
    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    /// Whether the mask groups other masks.
    pub fn is_group(self) -> bool {
        self.contains(Self::GROUP)
    }

    /// Clone-source shapes that only make sense bound to their retouch step.
    pub fn is_pure_clone(self) -> bool {
        self.contains(Self::CLONE) && !self.contains(Self::NON_CLONE)
    }
}

/// One geometric mask shape, or a group of other masks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskEntry {
    /// Identity within the subject's mask set.
    pub mask_id: MaskId,
    /// Shape kind flags.
    pub mask_type: MaskType,
    /// Display name.
    pub mask_name: String,
    /// Layout version of `points`.
    pub mask_version: i32,
    /// Shape geometry, or packed [`GroupMember`] records for groups.
    pub points: Vec<u8>,
    /// Auxiliary per-type geometry.
    pub source: Vec<u8>,
    /// Number of records packed in `points`.
    pub member_count: i32,
    /// Position among the subject's masks.
    pub sequence_num: i32,
}

impl MaskEntry {
    /// Mask with the default name, version 1, no source and sequence 0.
    pub fn new(mask_id: MaskId, mask_type: MaskType, points: Vec<u8>, member_count: i32) -> Self {
        Self {
            mask_id,
            mask_type,
            mask_name: DEFAULT_MASK_NAME.to_string(),
            mask_version: 1,
            points,
            source: Vec::new(),
            member_count,
            sequence_num: 0,
        }
    }

    /// Decodes group membership records.
    ///
    /// Returns `None` when `points` does not hold exactly `member_count`
    /// records.
    pub fn group_members(&self) -> Option<Vec<GroupMember>> {
        let count = usize::try_from(self.member_count).ok()?;
        if count.checked_mul(GroupMember::ENCODED_LEN)? != self.points.len() {
            return None;
        }
        Some(
            self.points
                .chunks_exact(GroupMember::ENCODED_LEN)
                .map(GroupMember::decode)
                .collect(),
        )
    }
}

/// Membership record packed in a group mask's `points`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMember {
    /// Member mask.
    pub mask_id: MaskId,
    /// Owning group.
    pub parent_id: MaskId,
    /// Combination mode flags.
    pub state: i32,
    /// Member opacity.
    pub opacity: f32,
}

impl GroupMember {
    /// Little-endian `i32, i32, i32, f32`.
    pub const ENCODED_LEN: usize = 16;

    fn decode(chunk: &[u8]) -> Self {
        let word = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&chunk[i * 4..i * 4 + 4]);
            b
        };
        Self {
            mask_id: i32::from_le_bytes(word(0)),
            parent_id: i32::from_le_bytes(word(1)),
            state: i32::from_le_bytes(word(2)),
            opacity: f32::from_le_bytes(word(3)),
        }
    }

    /// Packs the record into its wire form.
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..4].copy_from_slice(&self.mask_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.parent_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.state.to_le_bytes());
        out[12..16].copy_from_slice(&self.opacity.to_le_bytes());
        out
    }
}

/// Masks from a pre-v3 document: keyed by id, remembering encounter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyMasks {
    entries: Vec<MaskEntry>,
    by_id: HashMap<MaskId, usize>,
}

impl LegacyMasks {
    /// Adds `mask` unless its id is already present; returns whether it was added.
    pub fn insert(&mut self, mask: MaskEntry) -> bool {
        if self.by_id.contains_key(&mask.mask_id) {
            return false;
        }
        self.by_id.insert(mask.mask_id, self.entries.len());
        self.entries.push(mask);
        true
    }

    /// Mask with id `id`.
    pub fn get(&self, id: MaskId) -> Option<&MaskEntry> {
        self.by_id.get(&id).map(|&idx| &self.entries[idx])
    }

    /// Masks in document order.
    pub fn iter(&self) -> impl Iterator<Item = &MaskEntry> {
        self.entries.iter()
    }

    /// Number of masks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no masks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<MaskEntry> for LegacyMasks {
    fn from_iter<T: IntoIterator<Item = MaskEntry>>(iter: T) -> Self {
        let mut out = Self::default();
        for mask in iter {
            out.insert(mask);
        }
        out
    }
}

/// Mask set as it comes out of the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMasks {
    /// Hash-keyed set that still needs group resolution.
    Legacy(LegacyMasks),
    /// Already flattened in storage order.
    Ordered(Vec<MaskEntry>),
}

impl ParsedMasks {
    /// Number of masks.
    pub fn len(&self) -> usize {
        match self {
            Self::Legacy(masks) => masks.len(),
            Self::Ordered(masks) => masks.len(),
        }
    }

    /// Whether there are no masks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stack as read from a document, before migration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStack {
    /// Schema version of the source document.
    pub schema_version: u32,
    /// Priority table version, when the document carried one.
    pub iop_order_version: Option<u32>,
    /// Applied entry count, when the document carried one.
    pub history_end: Option<u32>,
    /// Entries sorted by `num`.
    pub entries: Vec<HistoryEntry>,
    /// Masks in the document's own form.
    pub masks: ParsedMasks,
}

/// Canonical stack: the only shape the store and the document writer accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditHistoryStack {
    /// Priority table used to resolve order keys.
    pub iop_order_version: u32,
    /// Number of entries applied; later entries are kept but inactive.
    pub history_end: u32,
    /// Entries sorted by `num`.
    pub entries: Vec<HistoryEntry>,
    /// Masks in storage order.
    pub masks: Vec<MaskEntry>,
}

impl EditHistoryStack {
    /// Stack without entries or masks.
    pub fn empty(iop_order_version: u32) -> Self {
        Self {
            iop_order_version,
            history_end: 0,
            entries: Vec::new(),
            masks: Vec::new(),
        }
    }

    /// `history_end` clamped to the number of entries.
    pub fn effective_history_end(&self) -> u32 {
        let len = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.history_end.min(len)
    }
}
