use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::calendar::{CalendarEntry, DuplicateGroup};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    Duplicate,
    MissingWeek,
    LocationGap,
    HolidayLocation,
    RhythmInconsistency,
}

impl ConflictCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictCategory::Duplicate => "duplicate",
            ConflictCategory::MissingWeek => "missing_week",
            ConflictCategory::LocationGap => "location_gap",
            ConflictCategory::HolidayLocation => "holiday_location",
            ConflictCategory::RhythmInconsistency => "rhythm_inconsistency",
        }
    }
}

impl fmt::Display for ConflictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissingWeekConflict {
    pub contract_id: String,
    pub week: u32,
    pub year: i32,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationGapConflict {
    pub previous: CalendarEntry,
    pub next: CalendarEntry,
    pub gap_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HolidayConflict {
    pub entry: CalendarEntry,
    pub holiday_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RhythmAnalysis {
    pub total_weeks: usize,
    pub actual_transitions: usize,
    pub expected_transitions: usize,
    pub inconsistency_score: f64,
    pub center_weeks: usize,
    pub company_weeks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RhythmConflict {
    pub contract_id: String,
    pub declared_rhythm: String,
    pub analysis: RhythmAnalysis,
}

/// A detected calendar anomaly, one variant per category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    Duplicate(DuplicateGroup),
    MissingWeek(MissingWeekConflict),
    LocationGap(LocationGapConflict),
    HolidayLocation(HolidayConflict),
    RhythmInconsistency(RhythmConflict),
}

impl Conflict {
    pub fn category(&self) -> ConflictCategory {
        match self {
            Conflict::Duplicate(_) => ConflictCategory::Duplicate,
            Conflict::MissingWeek(_) => ConflictCategory::MissingWeek,
            Conflict::LocationGap(_) => ConflictCategory::LocationGap,
            Conflict::HolidayLocation(_) => ConflictCategory::HolidayLocation,
            Conflict::RhythmInconsistency(_) => ConflictCategory::RhythmInconsistency,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    None,
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    pub fn from_count(total: usize) -> Self {
        match total {
            0 => ConflictSeverity::None,
            1..=2 => ConflictSeverity::Low,
            3..=5 => ConflictSeverity::Medium,
            _ => ConflictSeverity::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::None => "none",
            ConflictSeverity::Low => "low",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::High => "high",
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConflictSet {
    pub duplicates: Vec<DuplicateGroup>,
    pub missing_weeks: Vec<MissingWeekConflict>,
    pub location_conflicts: Vec<LocationGapConflict>,
    pub holiday_conflicts: Vec<HolidayConflict>,
    pub rhythm_conflicts: Vec<RhythmConflict>,
}

impl ConflictSet {
    pub fn total(&self) -> usize {
        self.duplicates.len()
            + self.missing_weeks.len()
            + self.location_conflicts.len()
            + self.holiday_conflicts.len()
            + self.rhythm_conflicts.len()
    }

    /// All conflicts in detection order.
    pub fn to_conflicts(&self) -> Vec<Conflict> {
        let mut conflicts = Vec::with_capacity(self.total());
        conflicts.extend(self.duplicates.iter().cloned().map(Conflict::Duplicate));
        conflicts.extend(self.missing_weeks.iter().cloned().map(Conflict::MissingWeek));
        conflicts.extend(
            self.location_conflicts
                .iter()
                .cloned()
                .map(Conflict::LocationGap),
        );
        conflicts.extend(
            self.holiday_conflicts
                .iter()
                .cloned()
                .map(Conflict::HolidayLocation),
        );
        conflicts.extend(
            self.rhythm_conflicts
                .iter()
                .cloned()
                .map(Conflict::RhythmInconsistency),
        );
        conflicts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorFailure {
    pub detector: ConflictCategory,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictReport {
    pub student: String,
    pub conflicts: ConflictSet,
    pub total_conflicts: usize,
    pub severity: ConflictSeverity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detector_failures: Vec<DetectorFailure>,
}

impl ConflictReport {
    pub fn new(
        student: impl Into<String>,
        conflicts: ConflictSet,
        detector_failures: Vec<DetectorFailure>,
    ) -> Self {
        let total_conflicts = conflicts.total();
        Self {
            student: student.into(),
            conflicts,
            total_conflicts,
            severity: ConflictSeverity::from_count(total_conflicts),
            detector_failures,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.total_conflicts == 0
    }
}
