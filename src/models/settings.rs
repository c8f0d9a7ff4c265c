use serde::{Deserialize, Serialize};

pub const DEFAULT_GAP_THRESHOLD_DAYS: i64 = 14;
pub const DEFAULT_RHYTHM_THRESHOLD: f64 = 0.30;
pub const DEFAULT_MIN_RHYTHM_WEEKS: usize = 4;
pub const DEFAULT_HOLIDAY_MARKER_THRESHOLD: usize = 1;
pub const DEFAULT_ACTOR: &str = "auto_resolve";

/// Tunables for detection and repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSettings {
    /// Silence between two planned weeks longer than this is a location gap.
    pub gap_threshold_days: i64,
    /// Rhythm inconsistency score above which a contract is flagged.
    pub rhythm_threshold: f64,
    /// Contracts with fewer planned weeks skip rhythm analysis.
    pub min_rhythm_weeks: usize,
    /// Company weeks with more holiday markers than this are flagged.
    pub holiday_marker_threshold: usize,
    pub default_actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Default for ConflictSettings {
    fn default() -> Self {
        Self {
            gap_threshold_days: DEFAULT_GAP_THRESHOLD_DAYS,
            rhythm_threshold: DEFAULT_RHYTHM_THRESHOLD,
            min_rhythm_weeks: DEFAULT_MIN_RHYTHM_WEEKS,
            holiday_marker_threshold: DEFAULT_HOLIDAY_MARKER_THRESHOLD,
            default_actor: DEFAULT_ACTOR.to_string(),
            updated_at: None,
        }
    }
}
