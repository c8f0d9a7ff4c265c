use std::collections::{BTreeMap, HashSet};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::calendar::{CalendarEntry, CalendarEntryInsert, DuplicateGroup, Location};
use crate::models::conflict::{Conflict, ConflictReport, MissingWeekConflict};
use crate::models::resolution::{
    ResolutionAction, ResolutionReport, ResolveOptions, ResolvedConflict,
};
use crate::models::settings::ConflictSettings;
use crate::services::calendar_source::CalendarSource;
use crate::services::conflict_detector::ConflictDetector;
use crate::services::week_utils;

/// Repairs duplicate and missing weeks found by the detector.
pub struct ConflictResolver {
    source: Arc<dyn CalendarSource>,
    detector: ConflictDetector,
    default_actor: String,
}

impl ConflictResolver {
    pub fn new(source: Arc<dyn CalendarSource>, settings: ConflictSettings) -> Self {
        let default_actor = settings.default_actor.clone();
        Self {
            detector: ConflictDetector::new(Arc::clone(&source), settings),
            source,
            default_actor,
        }
    }

    pub fn auto_resolve(
        &self,
        student_id: &str,
        options: &ResolveOptions,
    ) -> AppResult<ResolutionReport> {
        let report = self.detector.detect_all(student_id)?;
        self.resolve_report(&report, options)
    }

    /// Applies repairs for an already computed report.
    ///
    /// Duplicates are settled before any missing week is inferred, since
    /// inference reads the neighbouring weeks duplicate repair may remove.
    /// Storage failures abort the batch; any other failure is recorded
    /// against its conflict and the batch continues.
    pub fn resolve_report(
        &self,
        report: &ConflictReport,
        options: &ResolveOptions,
    ) -> AppResult<ResolutionReport> {
        let student_id = report.student.as_str();
        let mut outcome = ResolutionReport::default();
        let mut removed_ids: HashSet<i64> = HashSet::new();

        for group in &report.conflicts.duplicates {
            match self.resolve_duplicate(group, options.dry_run) {
                Ok(resolved) => {
                    if let ResolutionAction::KeepBestDuplicate { removed, .. } = &resolved.action {
                        removed_ids.extend(removed.iter().copied());
                    }
                    outcome.record_resolved(resolved);
                }
                Err(err) if err.is_infrastructure() => return Err(err),
                Err(err) => outcome.record_failed(Conflict::Duplicate(group.clone()), err.to_string()),
            }
        }

        if !report.conflicts.missing_weeks.is_empty() {
            let entries = self.source.entries_for_student(student_id)?;
            let mut timeline = build_timeline(&entries, &removed_ids);
            let actor = options
                .created_by
                .clone()
                .unwrap_or_else(|| self.default_actor.clone());

            for missing in &report.conflicts.missing_weeks {
                let key = (missing.year, missing.week);
                if timeline.contains_key(&key) {
                    let err = AppError::resolution(format!(
                        "week {} of {} is already planned",
                        missing.week, missing.year
                    ));
                    outcome.record_failed(Conflict::MissingWeek(missing.clone()), err.to_string());
                    continue;
                }

                let location = infer_from_timeline(&timeline, key);
                match self.create_missing(student_id, missing, location, &actor, options.dry_run) {
                    Ok(resolved) => {
                        timeline.insert(key, location);
                        outcome.record_resolved(resolved);
                    }
                    Err(err) if err.is_infrastructure() => return Err(err),
                    Err(err) => outcome
                        .record_failed(Conflict::MissingWeek(missing.clone()), err.to_string()),
                }
            }
        }

        info!(
            target: "app::resolver",
            student_id,
            resolved = outcome.resolved.len(),
            failed = outcome.failed.len(),
            dry_run = options.dry_run,
            "calendar auto-resolution finished"
        );

        Ok(outcome)
    }

    pub fn resolve_duplicate(
        &self,
        group: &DuplicateGroup,
        dry_run: bool,
    ) -> AppResult<ResolvedConflict> {
        let (kept, removed) = choose_keeper(&group.entries)?;

        if !dry_run {
            for entry_id in &removed {
                self.source.delete_entry(*entry_id)?;
            }
            info!(
                target: "app::resolver",
                year = group.year,
                week = group.week,
                kept = kept.id,
                removed = removed.len(),
                "duplicate calendar week resolved"
            );
        }

        Ok(ResolvedConflict {
            applied: !dry_run,
            action: ResolutionAction::KeepBestDuplicate {
                week: group.week,
                year: group.year,
                kept,
                removed,
            },
        })
    }

    fn create_missing(
        &self,
        student_id: &str,
        missing: &MissingWeekConflict,
        location: Location,
        actor: &str,
        dry_run: bool,
    ) -> AppResult<ResolvedConflict> {
        week_utils::week_bounds(missing.year, missing.week)?;

        let entry_id = if dry_run {
            None
        } else {
            let insert = CalendarEntryInsert {
                student_id: student_id.to_string(),
                contract_id: missing.contract_id.clone(),
                week: missing.week,
                year: missing.year,
                location,
                confirmed: false,
                holidays: Vec::new(),
                modified_by: actor.to_string(),
            };
            let created = self.source.create_entry(&insert)?;
            info!(
                target: "app::resolver",
                entry_id = created.id,
                year = missing.year,
                week = missing.week,
                location = %location,
                "missing calendar week created"
            );
            Some(created.id)
        };

        Ok(ResolvedConflict {
            applied: !dry_run,
            action: ResolutionAction::CreateMissingWeek {
                contract_id: missing.contract_id.clone(),
                week: missing.week,
                year: missing.year,
                location,
                entry_id,
            },
        })
    }
}

/// Picks the entry to keep in a duplicate group: the first confirmed entry
/// by id, otherwise the lowest id. Returns it with the ids to delete.
pub fn choose_keeper(entries: &[CalendarEntry]) -> AppResult<(CalendarEntry, Vec<i64>)> {
    if entries.len() < 2 {
        return Err(AppError::resolution(format!(
            "a duplicate group needs at least 2 entries, got {}",
            entries.len()
        )));
    }

    let mut ordered: Vec<&CalendarEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.id);

    let kept = ordered
        .iter()
        .find(|entry| entry.confirmed)
        .or_else(|| ordered.first())
        .map(|entry| (*entry).clone())
        .ok_or_else(|| AppError::resolution("duplicate group is empty"))?;

    let removed = ordered
        .iter()
        .filter(|entry| entry.id != kept.id)
        .map(|entry| entry.id)
        .collect();

    Ok((kept, removed))
}

/// Location for a missing week given its nearest planned neighbours.
pub fn infer_location(before: Option<Location>, after: Option<Location>) -> Location {
    match (before, after) {
        (Some(before), Some(after)) if before == after => before,
        (Some(before), Some(_)) => before.opposite(),
        (Some(neighbour), None) | (None, Some(neighbour)) => neighbour.opposite(),
        (None, None) => Location::Center,
    }
}

fn build_timeline(
    entries: &[CalendarEntry],
    removed_ids: &HashSet<i64>,
) -> BTreeMap<(i32, u32), Location> {
    let mut timeline = BTreeMap::new();
    for entry in entries.iter().filter(|entry| !removed_ids.contains(&entry.id)) {
        if timeline.insert(entry.week_key(), entry.location).is_some() {
            warn!(
                target: "app::resolver",
                year = entry.year,
                week = entry.week,
                "week still duplicated while inferring missing weeks"
            );
        }
    }
    timeline
}

fn infer_from_timeline(timeline: &BTreeMap<(i32, u32), Location>, key: (i32, u32)) -> Location {
    let before = timeline.range(..key).next_back().map(|(_, location)| *location);
    let after = timeline
        .range((Excluded(key), Unbounded))
        .next()
        .map(|(_, location)| *location);
    infer_location(before, after)
}
