//! Severity weighting table shared by the heatmap and buffer analyzers.

use crate::incident::Severity;

/// Weight given to anything outside the known severity labels.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Heatmap intensity for a severity.
pub const fn weight(severity: Severity) -> u32 {
    match severity {
        Severity::Low => 1,
        Severity::Medium => 2,
        Severity::High => 3,
        Severity::Critical => 4,
        Severity::Unrecognized => DEFAULT_WEIGHT,
    }
}

/// Severities that get a proximity buffer.
pub const fn is_high_priority(severity: Severity) -> bool {
    matches!(severity, Severity::High | Severity::Critical)
}
