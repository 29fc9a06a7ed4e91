//! Fill-level → status classification.

use crate::model::BinStatus;

/// Fill level (percent) at and above which a bin is `full` and raises an alert.
pub const FULL_THRESHOLD: f64 = 80.0;
/// Fill level (percent) at and above which a bin is at least `warning`.
pub const WARNING_THRESHOLD: f64 = 60.0;

/// Total over finite inputs; range checking belongs to the callers.
pub fn classify(fill_level: f64) -> BinStatus {
    if fill_level >= FULL_THRESHOLD {
        BinStatus::Full
    } else if fill_level >= WARNING_THRESHOLD {
        BinStatus::Warning
    } else {
        BinStatus::Normal
    }
}

pub fn requires_alert(fill_level: f64) -> bool {
    fill_level >= FULL_THRESHOLD
}
