use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::calendar::{CalendarEntry, Contract, DuplicateGroup, Location};
use crate::models::conflict::{
    ConflictCategory, ConflictReport, ConflictSet, DetectorFailure, HolidayConflict,
    LocationGapConflict, MissingWeekConflict, RhythmConflict,
};
use crate::models::settings::ConflictSettings;
use crate::services::calendar_source::CalendarSource;
use crate::services::{rhythm_analyzer, week_utils};

const DETECTOR_COUNT: usize = 5;

/// Runs the five calendar detectors for one student and grades the result.
pub struct ConflictDetector {
    source: Arc<dyn CalendarSource>,
    settings: ConflictSettings,
}

impl ConflictDetector {
    pub fn new(source: Arc<dyn CalendarSource>, settings: ConflictSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &ConflictSettings {
        &self.settings
    }

    /// Detects every conflict category for `student_id`.
    ///
    /// A failing detector leaves its category empty and is listed in
    /// `detector_failures`; the call only fails when no detector could run.
    pub fn detect_all(&self, student_id: &str) -> AppResult<ConflictReport> {
        let mut log = FailureLog::default();
        let mut conflicts = ConflictSet::default();

        conflicts.duplicates =
            log.capture(ConflictCategory::Duplicate, self.detect_duplicates(student_id));

        match self.source.contracts_for_student(student_id) {
            Ok(contracts) => {
                conflicts.missing_weeks = log.capture(
                    ConflictCategory::MissingWeek,
                    self.detect_missing_weeks(student_id, &contracts),
                );
                conflicts.rhythm_conflicts = log.capture(
                    ConflictCategory::RhythmInconsistency,
                    self.detect_rhythm_conflicts(&contracts),
                );
            }
            Err(err) => log.capture_shared(
                &[
                    ConflictCategory::MissingWeek,
                    ConflictCategory::RhythmInconsistency,
                ],
                err,
            ),
        }

        match self.source.entries_for_student(student_id) {
            Ok(entries) => {
                conflicts.location_conflicts = self.detect_location_gaps(&entries);
                conflicts.holiday_conflicts = self.detect_holiday_conflicts(&entries);
            }
            Err(err) => log.capture_shared(
                &[
                    ConflictCategory::LocationGap,
                    ConflictCategory::HolidayLocation,
                ],
                err,
            ),
        }

        if log.failures.len() == DETECTOR_COUNT {
            if let Some(err) = log.first_error {
                return Err(err);
            }
        }

        let report = ConflictReport::new(student_id, conflicts, log.failures);
        info!(
            target: "app::conflict",
            student_id,
            total = report.total_conflicts,
            severity = %report.severity,
            failed_detectors = report.detector_failures.len(),
            "calendar conflict detection finished"
        );

        Ok(report)
    }

    pub fn detect_duplicates(&self, student_id: &str) -> AppResult<Vec<DuplicateGroup>> {
        let groups = self.source.find_duplicates(student_id)?;
        Ok(groups
            .into_iter()
            .filter(|group| group.entries.len() >= 2)
            .collect())
    }

    /// Expected contract weeks the student has no entry for.
    ///
    /// Planned weeks are taken across all of the student's contracts, and a
    /// week shared by overlapping contracts is reported once, against the
    /// first contract expecting it.
    pub fn detect_missing_weeks(
        &self,
        student_id: &str,
        contracts: &[Contract],
    ) -> AppResult<Vec<MissingWeekConflict>> {
        let mut covered: HashSet<(i32, u32)> = self
            .source
            .entries_for_student(student_id)?
            .iter()
            .map(CalendarEntry::week_key)
            .collect();
        let mut missing = Vec::new();

        for contract in contracts {
            for week in self.source.expected_weeks(contract)? {
                if !covered.insert((week.year, week.week)) {
                    continue;
                }
                missing.push(MissingWeekConflict {
                    contract_id: contract.id.clone(),
                    week: week.week,
                    year: week.year,
                    week_start: week.week_start,
                    week_end: week.week_end,
                });
            }
        }

        Ok(missing)
    }

    /// Consecutive planned weeks further apart than the gap threshold.
    pub fn detect_location_gaps(&self, entries: &[CalendarEntry]) -> Vec<LocationGapConflict> {
        let mut sorted: Vec<&CalendarEntry> = entries.iter().collect();
        sorted.sort_by_key(|entry| entry.week_key());

        sorted
            .windows(2)
            .filter_map(|pair| {
                let (previous, next) = (pair[0], pair[1]);
                let gap_days = week_utils::days_between_weeks(previous.week_key(), next.week_key())?;
                (gap_days > self.settings.gap_threshold_days).then(|| LocationGapConflict {
                    previous: previous.clone(),
                    next: next.clone(),
                    gap_days,
                })
            })
            .collect()
    }

    /// Company weeks carrying more holiday markers than the threshold.
    pub fn detect_holiday_conflicts(&self, entries: &[CalendarEntry]) -> Vec<HolidayConflict> {
        entries
            .iter()
            .filter(|entry| {
                entry.location == Location::Company
                    && entry.holidays.len() > self.settings.holiday_marker_threshold
            })
            .map(|entry| HolidayConflict {
                entry: entry.clone(),
                holiday_count: entry.holidays.len(),
            })
            .collect()
    }

    pub fn detect_rhythm_conflicts(&self, contracts: &[Contract]) -> AppResult<Vec<RhythmConflict>> {
        let mut conflicts = Vec::new();

        for contract in contracts {
            let entries = self.source.entries_for_contract(&contract.id)?;
            let locations = weekly_locations(&entries);

            if locations.len() < self.settings.min_rhythm_weeks {
                debug!(
                    target: "app::conflict",
                    contract_id = %contract.id,
                    weeks = locations.len(),
                    "not enough planned weeks for rhythm analysis"
                );
                continue;
            }

            let analysis = rhythm_analyzer::analyze(&locations);
            if analysis.inconsistency_score > self.settings.rhythm_threshold {
                conflicts.push(RhythmConflict {
                    contract_id: contract.id.clone(),
                    declared_rhythm: contract.declared_rhythm(),
                    analysis,
                });
            }
        }

        Ok(conflicts)
    }
}

/// One location per (year, week) in calendar order; the first entry of a
/// duplicated week stands for it.
fn weekly_locations(entries: &[CalendarEntry]) -> Vec<Location> {
    let mut sorted: Vec<&CalendarEntry> = entries.iter().collect();
    sorted.sort_by_key(|entry| (entry.week_key(), entry.id));
    sorted.dedup_by_key(|entry| entry.week_key());
    sorted.into_iter().map(|entry| entry.location).collect()
}

#[derive(Default)]
struct FailureLog {
    failures: Vec<DetectorFailure>,
    first_error: Option<AppError>,
}

impl FailureLog {
    fn capture<T>(&mut self, category: ConflictCategory, result: AppResult<Vec<T>>) -> Vec<T> {
        match result {
            Ok(found) => found,
            Err(err) => {
                self.capture_shared(&[category], err);
                Vec::new()
            }
        }
    }

    fn capture_shared(&mut self, categories: &[ConflictCategory], err: AppError) {
        let message = err.to_string();
        for category in categories {
            warn!(
                target: "app::conflict",
                detector = %category,
                error = %message,
                "conflict detector failed"
            );
            self.failures.push(DetectorFailure {
                detector: *category,
                message: message.clone(),
            });
        }
        self.first_error.get_or_insert(err);
    }
}
