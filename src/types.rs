//! Shared primitive IDs and schema constants.

/// Identifier of the image whose history is stored.
pub type SubjectId = i64;
/// Mask identity, unique within one subject's mask set.
pub type MaskId = i32;

/// Schema version emitted by the document writer.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;
/// Priority table in effect for every pre-v3 document.
pub const LEGACY_IOP_ORDER_VERSION: u32 = 1;
/// Marks an order key that must still be derived from the priority table.
pub const ORDER_KEY_UNSET: f64 = -1.0;
/// Fractional digits written for order keys.
pub const ORDER_KEY_DECIMALS: usize = 13;
/// Operation name of the synthetic entry owning the mask set.
///
/// Written with an underscore, like every other operation name stored in
/// the `operation` column.
pub const MASK_MANAGER_OP: &str = "mask_manager";
/// Name given to masks whose document carries none.
pub const DEFAULT_MASK_NAME: &str = "unnamed mask";

/// Returns true for the "not yet computed" order key.
pub fn is_order_key_unset(key: f64) -> bool {
    !key.is_finite() || key == ORDER_KEY_UNSET
}
