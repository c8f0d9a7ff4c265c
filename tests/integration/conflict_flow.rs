//! Integration tests for calendar conflict detection over SQLite storage.

use std::sync::Arc;

use alternance_calendar::db::repositories::calendar_entry_repository::CalendarEntryRepository;
use alternance_calendar::db::repositories::contract_repository::ContractRepository;
use alternance_calendar::db::DbPool;
use alternance_calendar::models::calendar::{CalendarEntryInsert, ContractInsert, Location};
use alternance_calendar::models::conflict::ConflictSeverity;
use alternance_calendar::models::resolution::RecommendationAction;
use alternance_calendar::models::settings::ConflictSettings;
use alternance_calendar::services::settings_service::{SettingsService, SettingsUpdateInput};
use alternance_calendar::{AlternanceConflictService, SqliteCalendarSource};
use chrono::NaiveDate;
use tempfile::{tempdir, TempDir};

const STUDENT: &str = "student-1";
const CONTRACT: &str = "contract-1";

fn setup_test_env(start: NaiveDate, end: NaiveDate) -> (DbPool, AlternanceConflictService, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let db = DbPool::new(&db_path).expect("Failed to create test database");

    db.with_connection(|conn| {
        ContractRepository::insert(
            conn,
            &ContractInsert {
                id: Some(CONTRACT.to_string()),
                student_id: STUDENT.to_string(),
                start_date: start,
                end_date: end,
                rhythm_center_weeks: 1,
                rhythm_company_weeks: 1,
            },
        )?;
        Ok(())
    })
    .expect("contract setup");

    let source = Arc::new(SqliteCalendarSource::new(db.clone()));
    let service = AlternanceConflictService::new(source, ConflictSettings::default());

    (db, service, temp_dir)
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn add_entry(db: &DbPool, week: u32, location: Location, confirmed: bool, holidays: &[&str]) -> i64 {
    db.with_connection(|conn| {
        CalendarEntryRepository::insert(
            conn,
            &CalendarEntryInsert {
                student_id: STUDENT.to_string(),
                contract_id: CONTRACT.to_string(),
                week,
                year: 2024,
                location,
                confirmed,
                holidays: holidays.iter().map(|h| h.to_string()).collect(),
                modified_by: "planner".to_string(),
            },
        )
    })
    .expect("entry insert")
}

#[test]
fn test_clean_calendar_has_no_conflicts() {
    let (db, service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 1, 28));
    for (week, location) in [
        (1, Location::Center),
        (2, Location::Company),
        (3, Location::Center),
        (4, Location::Company),
    ] {
        add_entry(&db, week, location, true, &[]);
    }

    let report = service.detect_all(STUDENT).unwrap();
    assert_eq!(report.total_conflicts, 0);
    assert_eq!(report.severity, ConflictSeverity::None);
    assert!(report.detector_failures.is_empty());
    assert!(service.recommend(&report).is_empty());
}

#[test]
fn test_duplicate_and_missing_week_give_low_severity() {
    let (db, service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 1, 28));
    add_entry(&db, 1, Location::Company, false, &[]);
    add_entry(&db, 1, Location::Center, true, &[]);
    add_entry(&db, 2, Location::Company, true, &[]);
    add_entry(&db, 4, Location::Company, true, &[]);

    let report = service.detect_all(STUDENT).unwrap();
    assert_eq!(report.conflicts.duplicates.len(), 1);
    assert_eq!(report.conflicts.missing_weeks.len(), 1);
    assert_eq!(report.total_conflicts, 2);
    assert_eq!(report.severity, ConflictSeverity::Low);

    let missing = &report.conflicts.missing_weeks[0];
    assert_eq!((missing.year, missing.week), (2024, 3));
    assert_eq!(missing.contract_id, CONTRACT);
    assert_eq!(missing.week_start, date(2024, 1, 15));
    assert_eq!(missing.week_end, date(2024, 1, 21));

    let actions: Vec<_> = service
        .recommend(&report)
        .into_iter()
        .map(|rec| rec.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            RecommendationAction::ResolveDuplicates,
            RecommendationAction::CreateMissing
        ]
    );
}

#[test]
fn test_total_matches_category_sum_and_severity() {
    let (db, service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 3, 31));
    add_entry(&db, 1, Location::Center, true, &[]);
    add_entry(&db, 5, Location::Company, true, &["2024-02-01", "2024-02-02"]);
    add_entry(&db, 13, Location::Center, true, &[]);

    let report = service.detect_all(STUDENT).unwrap();
    let conflicts = &report.conflicts;
    let sum = conflicts.duplicates.len()
        + conflicts.missing_weeks.len()
        + conflicts.location_conflicts.len()
        + conflicts.holiday_conflicts.len()
        + conflicts.rhythm_conflicts.len();

    assert_eq!(conflicts.location_conflicts.len(), 2);
    assert_eq!(conflicts.location_conflicts[0].gap_days, 28);
    assert_eq!(conflicts.location_conflicts[1].gap_days, 56);
    assert_eq!(conflicts.holiday_conflicts.len(), 1);
    assert_eq!(conflicts.missing_weeks.len(), 10);
    assert_eq!(report.total_conflicts, sum);
    assert_eq!(report.severity, ConflictSeverity::High);
}

#[test]
fn test_rhythm_drift_is_detected_per_contract() {
    let (db, service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 2, 11));
    for (week, location) in [
        (1, Location::Center),
        (2, Location::Center),
        (3, Location::Company),
        (4, Location::Company),
        (5, Location::Center),
        (6, Location::Company),
    ] {
        add_entry(&db, week, location, true, &[]);
    }

    let report = service.detect_all(STUDENT).unwrap();
    assert_eq!(report.total_conflicts, 1);
    let rhythm = &report.conflicts.rhythm_conflicts[0];
    assert_eq!(rhythm.contract_id, CONTRACT);
    assert!((rhythm.analysis.inconsistency_score - 0.4).abs() < 1e-9);

    let recommendations = service.recommend(&report);
    assert_eq!(recommendations.len(), 1);
    assert_eq!(
        recommendations[0].action,
        RecommendationAction::RegularizeRhythm
    );
}

#[test]
fn test_report_serializes_to_documented_shape() {
    let (db, service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 1, 14));
    add_entry(&db, 1, Location::Center, true, &[]);

    let full = service.full_report(STUDENT).unwrap();
    let value = serde_json::to_value(&full.report).unwrap();

    assert_eq!(value["student"], STUDENT);
    assert_eq!(value["total_conflicts"], 1);
    assert_eq!(value["severity"], "low");
    for key in [
        "duplicates",
        "missing_weeks",
        "location_conflicts",
        "holiday_conflicts",
        "rhythm_conflicts",
    ] {
        assert!(value["conflicts"][key].is_array(), "missing {key}");
    }
    assert_eq!(value["conflicts"]["missing_weeks"][0]["week"], 2);
    assert_eq!(value["conflicts"]["missing_weeks"][0]["week_start"], "2024-01-08");
    assert!(!full.generated_at.is_empty());
}

#[test]
fn test_unknown_student_yields_empty_report() {
    let (_db, service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 1, 14));

    let report = service.detect_all("nobody").unwrap();
    assert_eq!(report.student, "nobody");
    assert_eq!(report.total_conflicts, 0);
    assert_eq!(report.severity, ConflictSeverity::None);
}

#[test]
fn test_stored_settings_reach_detection() {
    let (db, default_service, _temp_dir) = setup_test_env(date(2024, 1, 1), date(2024, 2, 4));
    add_entry(&db, 1, Location::Center, true, &[]);
    add_entry(&db, 5, Location::Company, true, &["2024-02-01", "2024-02-02"]);

    let before = default_service.detect_all(STUDENT).unwrap();
    assert_eq!(before.conflicts.location_conflicts.len(), 1);
    assert_eq!(before.conflicts.holiday_conflicts.len(), 1);

    let settings = SettingsService::new(db.clone());
    settings
        .update(SettingsUpdateInput {
            gap_threshold_days: Some(30),
            holiday_marker_threshold: Some(2),
            ..Default::default()
        })
        .unwrap();

    let service = AlternanceConflictService::with_stored_settings(
        Arc::new(SqliteCalendarSource::new(db.clone())),
        &settings,
    )
    .unwrap();
    let report = service.detect_all(STUDENT).unwrap();

    assert!(report.conflicts.location_conflicts.is_empty());
    assert!(report.conflicts.holiday_conflicts.is_empty());
    assert_eq!(report.conflicts.missing_weeks.len(), 3);
}
