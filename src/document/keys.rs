//! Key names used in history documents.

/// Document schema version; absent means 1.
pub const SCHEMA_VERSION: &str = "Xmp.develop.schema_version";
/// Priority table version (schema 3).
pub const IOP_ORDER_VERSION: &str = "Xmp.develop.iop_order_version";
/// Number of applied history entries.
pub const HISTORY_END: &str = "Xmp.develop.history_end";

// Schema 1: one parallel array per field.
/// Operation names, one per entry.
pub const V1_OPERATION: &str = "Xmp.develop.history_operation";
/// Enabled flags.
pub const V1_ENABLED: &str = "Xmp.develop.history_enabled";
/// Parameter layout versions.
pub const V1_MOD_VERSION: &str = "Xmp.develop.history_modversion";
/// Encoded parameter blobs.
pub const V1_PARAMS: &str = "Xmp.develop.history_params";
/// Encoded blend parameter blobs.
pub const V1_BLEND_PARAMS: &str = "Xmp.develop.blendop_params";
/// Blend parameter layout versions.
pub const V1_BLEND_VERSION: &str = "Xmp.develop.blendop_version";
/// Instance priorities, descending in schema 1.
pub const V1_MULTI_PRIORITY: &str = "Xmp.develop.multi_priority";
/// Instance labels.
pub const V1_MULTI_NAME: &str = "Xmp.develop.multi_name";

// Schema 1 and 2 masks.
/// Mask ids.
pub const MASK_ID: &str = "Xmp.develop.mask_id";
/// Mask type flags.
pub const MASK_TYPE: &str = "Xmp.develop.mask_type";
/// Mask names.
pub const MASK_NAME: &str = "Xmp.develop.mask_name";
/// Mask layout versions.
pub const MASK_VERSION: &str = "Xmp.develop.mask_version";
/// Encoded mask geometry.
pub const MASK_POINTS: &str = "Xmp.develop.mask";
/// Point or member counts.
pub const MASK_COUNT: &str = "Xmp.develop.mask_nb";
/// Encoded auxiliary geometry.
pub const MASK_SOURCE: &str = "Xmp.develop.mask_src";

/// Indexed-path history array (schema 2 and 3).
pub const HISTORY: &str = "Xmp.develop.history";
/// Indexed-path mask array (schema 3).
pub const MASKS_HISTORY: &str = "Xmp.develop.masks_history";

/// Field names shared by every history layout.
pub mod field {
    /// Explicit stack position (schema 3).
    pub const NUM: &str = "num";
    /// Operation name.
    pub const OPERATION: &str = "operation";
    /// Enabled flag.
    pub const ENABLED: &str = "enabled";
    /// Parameter layout version.
    pub const MOD_VERSION: &str = "modversion";
    /// Encoded parameters.
    pub const PARAMS: &str = "params";
    /// Encoded blend parameters.
    pub const BLEND_PARAMS: &str = "blendop_params";
    /// Blend parameter layout version.
    pub const BLEND_VERSION: &str = "blendop_version";
    /// Instance priority.
    pub const MULTI_PRIORITY: &str = "multi_priority";
    /// Instance label.
    pub const MULTI_NAME: &str = "multi_name";
    /// Order key.
    pub const ORDER_KEY: &str = "iop_order";

    /// Mask sequence number.
    pub const MASK_NUM: &str = "mask_num";
    /// Mask id.
    pub const MASK_ID: &str = "mask_id";
    /// Mask type flags.
    pub const MASK_TYPE: &str = "mask_type";
    /// Mask name.
    pub const MASK_NAME: &str = "mask_name";
    /// Mask layout version.
    pub const MASK_VERSION: &str = "mask_version";
    /// Encoded mask geometry.
    pub const MASK_POINTS: &str = "mask_points";
    /// Point or member count.
    pub const MASK_COUNT: &str = "mask_nb";
    /// Encoded auxiliary geometry.
    pub const MASK_SOURCE: &str = "mask_src";
}

/// Schema 1 field to document key mapping, operation first.
pub const V1_HISTORY_FIELDS: &[(&str, &str)] = &[
    (field::OPERATION, V1_OPERATION),
    (field::ENABLED, V1_ENABLED),
    (field::MOD_VERSION, V1_MOD_VERSION),
    (field::PARAMS, V1_PARAMS),
    (field::BLEND_PARAMS, V1_BLEND_PARAMS),
    (field::BLEND_VERSION, V1_BLEND_VERSION),
    (field::MULTI_PRIORITY, V1_MULTI_PRIORITY),
    (field::MULTI_NAME, V1_MULTI_NAME),
];

/// Legacy mask field to document key mapping, id first.
pub const LEGACY_MASK_FIELDS: &[(&str, &str)] = &[
    (field::MASK_ID, MASK_ID),
    (field::MASK_TYPE, MASK_TYPE),
    (field::MASK_NAME, MASK_NAME),
    (field::MASK_VERSION, MASK_VERSION),
    (field::MASK_POINTS, MASK_POINTS),
    (field::MASK_COUNT, MASK_COUNT),
    (field::MASK_SOURCE, MASK_SOURCE),
];

/// Top-level scalar keys.
pub const SCALAR_KEYS: &[&str] = &[SCHEMA_VERSION, IOP_ORDER_VERSION, HISTORY_END];

/// Parallel array keys of schema 1 and 2 documents.
pub const LEGACY_ARRAY_KEYS: &[&str] = &[
    V1_OPERATION,
    V1_ENABLED,
    V1_MOD_VERSION,
    V1_PARAMS,
    V1_BLEND_PARAMS,
    V1_BLEND_VERSION,
    V1_MULTI_PRIORITY,
    V1_MULTI_NAME,
    MASK_ID,
    MASK_TYPE,
    MASK_NAME,
    MASK_VERSION,
    MASK_POINTS,
    MASK_COUNT,
    MASK_SOURCE,
];
