//! Flattening of legacy mask groups into storage order.

use hashbrown::HashSet;

use crate::{
    stack::{HistoryEntry, LegacyMasks, MaskEntry},
    types::MaskId,
};

const MAX_GROUP_DEPTH: usize = 64;

/// Finds the mask a history entry blends through.
pub trait MaskLocator {
    /// Mask id referenced by `entry`, if any.
    fn referenced_mask(&self, entry: &HistoryEntry) -> Option<MaskId>;
}

/// Reads a little-endian `i32` mask id at a fixed offset of the blend params.
/// Ids `<= 0` mean "no mask".
#[derive(Debug, Clone, Copy)]
pub struct BlendMaskOffset(pub usize);

impl MaskLocator for BlendMaskOffset {
    fn referenced_mask(&self, entry: &HistoryEntry) -> Option<MaskId> {
        let blend = entry.blend_params.as_deref()?;
        let raw = blend.get(self.0..self.0.checked_add(4)?)?;
        let id = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        (id > 0).then_some(id)
    }
}

/// Flattened masks plus what had to be left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupResolution {
    /// Masks in storage order, each id once.
    pub masks: Vec<MaskEntry>,
    /// Groups whose membership records did not match `member_count`.
    pub skipped_groups: Vec<MaskId>,
    /// Unreferenced masks not kept by the orphan policy.
    pub dropped: Vec<MaskId>,
}

struct Resolver<'a> {
    legacy: &'a LegacyMasks,
    emitted: HashSet<MaskId>,
    out: GroupResolution,
}

impl Resolver<'_> {
    /// Members before their group; every id is visited at most once.
    fn visit(&mut self, id: MaskId, depth: usize) {
        if !self.emitted.insert(id) {
            return;
        }
        let Some(mask) = self.legacy.get(id) else {
            tracing::warn!(mask_id = id, "referenced mask not found");
            return;
        };
        if mask.mask_type.is_group() {
            let members = match mask.group_members() {
                Some(members) if depth < MAX_GROUP_DEPTH => members,
                _ => {
                    tracing::warn!(
                        mask_id = id,
                        member_count = mask.member_count,
                        points_len = mask.points.len(),
                        depth,
                        "malformed mask group skipped"
                    );
                    self.out.skipped_groups.push(id);
                    return;
                }
            };
            for member in members {
                self.visit(member.mask_id, depth + 1);
            }
        }
        self.out.masks.push(mask.clone());
    }
}

/// Flattens the masks reachable from `roots`, then the orphans.
///
/// Orphans are kept when `keep_orphans` is set and they are not pure
/// clone-source shapes.
pub fn resolve_groups(
    legacy: &LegacyMasks,
    roots: impl IntoIterator<Item = MaskId>,
    keep_orphans: bool,
) -> GroupResolution {
    let mut resolver = Resolver {
        legacy,
        emitted: HashSet::new(),
        out: GroupResolution::default(),
    };
    for root in roots {
        resolver.visit(root, 0);
    }
    if keep_orphans {
        for mask in legacy.iter().filter(|m| !m.mask_type.is_pure_clone()) {
            resolver.visit(mask.mask_id, 0);
        }
    }
    // Drops are decided last: a kept orphan group may pull in a clone.
    let Resolver { emitted, mut out, .. } = resolver;
    out.dropped = legacy
        .iter()
        .map(|m| m.mask_id)
        .filter(|id| !emitted.contains(id))
        .collect();
    out
}
