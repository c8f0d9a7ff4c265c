use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::calendar::{CalendarEntry, Location};
use crate::models::conflict::Conflict;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Actor recorded on created entries; falls back to the configured default.
    #[serde(default)]
    pub created_by: Option<String>,
    /// Plan repairs without touching the calendar.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResolutionAction {
    KeepBestDuplicate {
        week: u32,
        year: i32,
        kept: CalendarEntry,
        removed: Vec<i64>,
    },
    CreateMissingWeek {
        contract_id: String,
        week: u32,
        year: i32,
        location: Location,
        #[serde(skip_serializing_if = "Option::is_none")]
        entry_id: Option<i64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedConflict {
    pub applied: bool,
    #[serde(flatten)]
    pub action: ResolutionAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedResolution {
    pub conflict: Conflict,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolutionReport {
    pub resolved: Vec<ResolvedConflict>,
    pub failed: Vec<FailedResolution>,
    pub total_processed: usize,
}

impl ResolutionReport {
    pub fn record_resolved(&mut self, resolved: ResolvedConflict) {
        self.resolved.push(resolved);
        self.total_processed += 1;
    }

    pub fn record_failed(&mut self, conflict: Conflict, reason: impl Into<String>) {
        self.failed.push(FailedResolution {
            conflict,
            reason: reason.into(),
        });
        self.total_processed += 1;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    High,
    Medium,
    Low,
}

impl RecommendationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationPriority::High => "high",
            RecommendationPriority::Medium => "medium",
            RecommendationPriority::Low => "low",
        }
    }
}

impl fmt::Display for RecommendationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAction {
    ResolveDuplicates,
    CreateMissing,
    RegularizeRhythm,
    AdjustHolidays,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub action: RecommendationAction,
    pub message: String,
}
