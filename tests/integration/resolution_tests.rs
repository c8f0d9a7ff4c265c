//! Integration tests for automatic calendar repair.

use std::sync::Arc;

use alternance_calendar::db::repositories::calendar_entry_repository::CalendarEntryRepository;
use alternance_calendar::db::repositories::contract_repository::ContractRepository;
use alternance_calendar::db::DbPool;
use alternance_calendar::error::{AppError, AppResult};
use alternance_calendar::models::calendar::{
    CalendarEntry, CalendarEntryInsert, Contract, ContractInsert, DuplicateGroup, Location,
};
use alternance_calendar::models::conflict::{
    Conflict, ConflictReport, ConflictSet, MissingWeekConflict,
};
use alternance_calendar::models::resolution::{ResolutionAction, ResolveOptions};
use alternance_calendar::models::settings::ConflictSettings;
use alternance_calendar::services::conflict_resolver::ConflictResolver;
use alternance_calendar::{AlternanceConflictService, CalendarSource, SqliteCalendarSource};
use chrono::NaiveDate;
use tempfile::{tempdir, TempDir};

const STUDENT: &str = "student-1";
const CONTRACT: &str = "contract-1";

fn setup_db(end: NaiveDate) -> (DbPool, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let db = DbPool::new(temp_dir.path().join("resolve.db")).expect("db pool");

    db.with_connection(|conn| {
        ContractRepository::insert(
            conn,
            &ContractInsert {
                id: Some(CONTRACT.to_string()),
                student_id: STUDENT.to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: end,
                rhythm_center_weeks: 1,
                rhythm_company_weeks: 1,
            },
        )?;
        Ok(())
    })
    .expect("contract setup");

    (db, temp_dir)
}

fn add_entry(db: &DbPool, week: u32, location: Location, confirmed: bool) -> i64 {
    add_contract_entry(db, CONTRACT, week, location, confirmed)
}

fn add_contract_entry(
    db: &DbPool,
    contract_id: &str,
    week: u32,
    location: Location,
    confirmed: bool,
) -> i64 {
    db.with_connection(|conn| {
        CalendarEntryRepository::insert(
            conn,
            &CalendarEntryInsert {
                student_id: STUDENT.to_string(),
                contract_id: contract_id.to_string(),
                week,
                year: 2024,
                location,
                confirmed,
                holidays: Vec::new(),
                modified_by: "planner".to_string(),
            },
        )
    })
    .expect("entry insert")
}

fn entries(db: &DbPool) -> Vec<CalendarEntry> {
    db.with_connection(|conn| CalendarEntryRepository::list_by_student(conn, STUDENT))
        .expect("list entries")
}

/// Four-week contract with week 1 planned twice and week 3 missing.
fn seed_duplicate_and_gap(db: &DbPool) -> (i64, i64) {
    let unconfirmed = add_entry(db, 1, Location::Company, false);
    let confirmed = add_entry(db, 1, Location::Center, true);
    add_entry(db, 2, Location::Company, true);
    add_entry(db, 4, Location::Company, true);
    (unconfirmed, confirmed)
}

fn service(db: &DbPool) -> AlternanceConflictService {
    AlternanceConflictService::new(
        Arc::new(SqliteCalendarSource::new(db.clone())),
        ConflictSettings::default(),
    )
}

#[test]
fn test_auto_resolve_repairs_duplicate_and_missing_week() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    let (unconfirmed, confirmed) = seed_duplicate_and_gap(&db);
    let service = service(&db);

    let before = service.detect_all(STUDENT).unwrap();
    assert_eq!(before.total_conflicts, 2);

    let outcome = service
        .auto_resolve(STUDENT, &ResolveOptions::default())
        .unwrap();
    assert_eq!(outcome.resolved.len(), 2);
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.total_processed, 2);

    match &outcome.resolved[0].action {
        ResolutionAction::KeepBestDuplicate { kept, removed, .. } => {
            assert_eq!(kept.id, confirmed);
            assert_eq!(removed, &vec![unconfirmed]);
        }
        other => panic!("unexpected first action: {other:?}"),
    }

    let stored = entries(&db);
    let week_three = stored
        .iter()
        .find(|entry| entry.week == 3)
        .expect("week 3 created");
    assert_eq!(week_three.location, Location::Company);
    assert!(!week_three.confirmed);
    assert_eq!(week_three.modified_by, "auto_resolve");
    assert_eq!(stored.iter().filter(|entry| entry.week == 1).count(), 1);

    let after = service.detect_all(STUDENT).unwrap();
    assert!(after.conflicts.duplicates.is_empty());
    assert!(after.conflicts.missing_weeks.is_empty());
}

#[test]
fn test_created_entries_use_requested_actor() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    add_entry(&db, 1, Location::Center, true);
    add_entry(&db, 4, Location::Center, true);

    let outcome = service(&db)
        .auto_resolve(
            STUDENT,
            &ResolveOptions {
                created_by: Some("coordinator-42".to_string()),
                dry_run: false,
            },
        )
        .unwrap();
    assert_eq!(outcome.resolved.len(), 2);

    let created: Vec<_> = entries(&db)
        .into_iter()
        .filter(|entry| entry.week == 2 || entry.week == 3)
        .collect();
    assert_eq!(created.len(), 2);
    for entry in created {
        assert_eq!(entry.location, Location::Center);
        assert_eq!(entry.modified_by, "coordinator-42");
    }
}

#[test]
fn test_dry_run_leaves_calendar_untouched() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    seed_duplicate_and_gap(&db);
    let before = entries(&db);

    let outcome = service(&db)
        .auto_resolve(
            STUDENT,
            &ResolveOptions {
                created_by: None,
                dry_run: true,
            },
        )
        .unwrap();

    assert_eq!(outcome.resolved.len(), 2);
    assert!(outcome.resolved.iter().all(|resolved| !resolved.applied));
    match &outcome.resolved[1].action {
        ResolutionAction::CreateMissingWeek {
            week,
            location,
            entry_id,
            ..
        } => {
            assert_eq!(*week, 3);
            assert_eq!(*location, Location::Company);
            assert!(entry_id.is_none());
        }
        other => panic!("unexpected second action: {other:?}"),
    }
    assert_eq!(entries(&db), before);
}

/// Delegates reads to SQLite but refuses to create entries.
struct RejectingSource {
    inner: SqliteCalendarSource,
    infrastructure: bool,
}

impl CalendarSource for RejectingSource {
    fn find_duplicates(&self, student_id: &str) -> AppResult<Vec<DuplicateGroup>> {
        self.inner.find_duplicates(student_id)
    }

    fn entries_for_student(&self, student_id: &str) -> AppResult<Vec<CalendarEntry>> {
        self.inner.entries_for_student(student_id)
    }

    fn entries_for_contract(&self, contract_id: &str) -> AppResult<Vec<CalendarEntry>> {
        self.inner.entries_for_contract(contract_id)
    }

    fn contracts_for_student(&self, student_id: &str) -> AppResult<Vec<Contract>> {
        self.inner.contracts_for_student(student_id)
    }

    fn create_entry(&self, _insert: &CalendarEntryInsert) -> AppResult<CalendarEntry> {
        if self.infrastructure {
            Err(AppError::database("disk I/O error"))
        } else {
            Err(AppError::validation("calendar is locked for this period"))
        }
    }

    fn delete_entry(&self, entry_id: i64) -> AppResult<()> {
        self.inner.delete_entry(entry_id)
    }
}

#[test]
fn test_rejected_creation_is_reported_without_aborting_batch() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    seed_duplicate_and_gap(&db);

    let resolver = ConflictResolver::new(
        Arc::new(RejectingSource {
            inner: SqliteCalendarSource::new(db.clone()),
            infrastructure: false,
        }),
        ConflictSettings::default(),
    );

    let outcome = resolver
        .auto_resolve(STUDENT, &ResolveOptions::default())
        .unwrap();
    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.total_processed, 2);
    assert!(matches!(outcome.failed[0].conflict, Conflict::MissingWeek(_)));
    assert!(outcome.failed[0].reason.contains("locked"));
}

#[test]
fn test_storage_failure_propagates() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    seed_duplicate_and_gap(&db);

    let resolver = ConflictResolver::new(
        Arc::new(RejectingSource {
            inner: SqliteCalendarSource::new(db.clone()),
            infrastructure: true,
        }),
        ConflictSettings::default(),
    );

    let result = resolver.auto_resolve(STUDENT, &ResolveOptions::default());
    assert!(matches!(result, Err(AppError::Database { .. })));
}

#[test]
fn test_undersized_duplicate_group_fails_locally() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    let id = add_entry(&db, 1, Location::Center, true);
    let resolver = ConflictResolver::new(
        Arc::new(SqliteCalendarSource::new(db.clone())),
        ConflictSettings::default(),
    );

    let lonely = DuplicateGroup {
        week: 1,
        year: 2024,
        entries: entries(&db).into_iter().filter(|entry| entry.id == id).collect(),
    };
    let result = resolver.resolve_duplicate(&lonely, false);
    assert!(matches!(result, Err(AppError::Resolution { .. })));
    assert_eq!(entries(&db).len(), 1);
}

#[test]
fn test_week_shared_by_renewed_contract_is_not_planned_twice() {
    // Renewal starts on Thursday 2024-01-25, inside ISO week 4.
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 24).unwrap());
    db.with_connection(|conn| {
        ContractRepository::insert(
            conn,
            &ContractInsert {
                id: Some("contract-2".to_string()),
                student_id: STUDENT.to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 2, 11).unwrap(),
                rhythm_center_weeks: 1,
                rhythm_company_weeks: 1,
            },
        )
    })
    .expect("renewal setup");

    for (week, location) in [
        (1, Location::Center),
        (2, Location::Company),
        (3, Location::Center),
        (4, Location::Company),
    ] {
        add_entry(&db, week, location, true);
    }
    add_contract_entry(&db, "contract-2", 5, Location::Center, true);
    add_contract_entry(&db, "contract-2", 6, Location::Company, true);

    let service = service(&db);
    let before = service.detect_all(STUDENT).unwrap();
    assert!(before.conflicts.missing_weeks.is_empty());

    let outcome = service
        .auto_resolve(STUDENT, &ResolveOptions::default())
        .unwrap();
    assert_eq!(outcome.total_processed, 0);

    let after = service.detect_all(STUDENT).unwrap();
    assert!(after.conflicts.duplicates.is_empty());
    assert_eq!(after.total_conflicts, 0);
    assert_eq!(entries(&db).len(), 6);
}

#[test]
fn test_resolve_report_records_invalid_items_and_continues() {
    let (db, _temp_dir) = setup_db(NaiveDate::from_ymd_opt(2024, 1, 28).unwrap());
    let lonely_id = add_entry(&db, 1, Location::Center, true);
    add_entry(&db, 2, Location::Company, true);
    add_entry(&db, 4, Location::Company, true);

    let missing = |week: u32, start: u32| MissingWeekConflict {
        contract_id: CONTRACT.to_string(),
        week,
        year: 2024,
        week_start: NaiveDate::from_ymd_opt(2024, 1, start).unwrap(),
        week_end: NaiveDate::from_ymd_opt(2024, 1, start + 6).unwrap(),
    };
    let conflicts = ConflictSet {
        duplicates: vec![DuplicateGroup {
            week: 1,
            year: 2024,
            entries: entries(&db)
                .into_iter()
                .filter(|entry| entry.id == lonely_id)
                .collect(),
        }],
        missing_weeks: vec![missing(2, 8), missing(3, 15)],
        ..Default::default()
    };
    let report = ConflictReport::new(STUDENT, conflicts, Vec::new());

    let resolver = ConflictResolver::new(
        Arc::new(SqliteCalendarSource::new(db.clone())),
        ConflictSettings::default(),
    );
    let outcome = resolver
        .resolve_report(&report, &ResolveOptions::default())
        .unwrap();

    assert_eq!(outcome.total_processed, 3);
    assert_eq!(outcome.failed.len(), 2);
    assert!(matches!(outcome.failed[0].conflict, Conflict::Duplicate(_)));
    assert!(matches!(
        &outcome.failed[1].conflict,
        Conflict::MissingWeek(stale) if stale.week == 2
    ));

    assert_eq!(outcome.resolved.len(), 1);
    match &outcome.resolved[0].action {
        ResolutionAction::CreateMissingWeek { week, location, .. } => {
            assert_eq!(*week, 3);
            assert_eq!(*location, Location::Company);
        }
        other => panic!("unexpected action: {other:?}"),
    }

    let stored = entries(&db);
    assert_eq!(stored.len(), 4);
    assert_eq!(stored.iter().filter(|entry| entry.week == 2).count(), 1);
}
