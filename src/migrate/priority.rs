//! Base pipeline priorities per operation.

use hashbrown::HashMap;

use crate::types::LEGACY_IOP_ORDER_VERSION;

/// Source of per-operation base priorities.
pub trait PriorityTable {
    /// Base priority of `operation` in table `table_version`, if known.
    fn base_priority(&self, operation: &str, table_version: u32) -> Option<f64>;
}

/// Pipeline order used by every document written before order keys existed.
const LEGACY_ORDER: &[&str] = &[
    "rawprepare",
    "invert",
    "temperature",
    "highlights",
    "cacorrect",
    "hotpixels",
    "rawdenoise",
    "demosaic",
    "mask_manager",
    "denoiseprofile",
    "tonemap",
    "exposure",
    "spots",
    "retouch",
    "lens",
    "ashift",
    "liquify",
    "rotatepixels",
    "scalepixels",
    "flip",
    "clipping",
    "crop",
    "graduatednd",
    "basecurve",
    "bilateral",
    "profile_gamma",
    "hazeremoval",
    "colorin",
    "basicadj",
    "colorreconstruct",
    "colorchecker",
    "defringe",
    "equalizer",
    "vibrance",
    "colorbalance",
    "colorize",
    "colortransfer",
    "colormapping",
    "channelmixer",
    "atrous",
    "lowlight",
    "colorcorrection",
    "colorcontrast",
    "tonecurve",
    "levels",
    "rgblevels",
    "rgbcurve",
    "shadhi",
    "zonesystem",
    "globaltonemap",
    "relight",
    "bilat",
    "denoise",
    "colisa",
    "sharpen",
    "clahe",
    "nlmeans",
    "velvia",
    "monochrome",
    "splittoning",
    "vignette",
    "watermark",
    "borders",
    "grain",
    "soften",
    "highpass",
    "lowpass",
    "bloom",
    "colorout",
    "dither",
    "finalscale",
    "overexposed",
    "rawoverexposed",
    "gamma",
];

/// Built-in tables. Only the legacy table is known.
#[derive(Debug, Clone, Default)]
pub struct BuiltinPriorities;

impl PriorityTable for BuiltinPriorities {
    fn base_priority(&self, operation: &str, table_version: u32) -> Option<f64> {
        if table_version != LEGACY_IOP_ORDER_VERSION {
            return None;
        }
        LEGACY_ORDER
            .iter()
            .position(|op| *op == operation)
            .map(|pos| (pos + 1) as f64)
    }
}

/// Explicit table for a single version, e.g. loaded by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticPriorities {
    version: u32,
    table: HashMap<String, f64>,
}

impl StaticPriorities {
    /// Table `version` holding the given `(operation, priority)` pairs.
    pub fn new<I, S>(version: u32, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            version,
            table: entries.into_iter().map(|(op, p)| (op.into(), p)).collect(),
        }
    }
}

impl PriorityTable for StaticPriorities {
    fn base_priority(&self, operation: &str, table_version: u32) -> Option<f64> {
        if table_version != self.version {
            return None;
        }
        self.table.get(operation).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_table_is_ordered_and_versioned() {
        let table = BuiltinPriorities;
        let demosaic = table.base_priority("demosaic", 1).unwrap();
        let exposure = table.base_priority("exposure", 1).unwrap();
        let manager = table.base_priority("mask_manager", 1).unwrap();
        assert!(demosaic < manager && manager < exposure);
        assert_eq!(table.base_priority("exposure", 2), None);
        assert_eq!(table.base_priority("no_such_step", 1), None);
    }
}
