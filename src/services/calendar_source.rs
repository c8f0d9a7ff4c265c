use tracing::debug;

use crate::db::repositories::calendar_entry_repository::CalendarEntryRepository;
use crate::db::repositories::contract_repository::ContractRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::calendar::{
    CalendarEntry, CalendarEntryInsert, Contract, DuplicateGroup, ExpectedWeek,
};
use crate::services::week_utils;

/// Calendar data the conflict engine reads from and repairs into.
///
/// Entry listings are ordered by (year, week) and then by entry id, and
/// duplicate groups list their entries in id order.
pub trait CalendarSource: Send + Sync {
    fn find_duplicates(&self, student_id: &str) -> AppResult<Vec<DuplicateGroup>>;

    fn entries_for_student(&self, student_id: &str) -> AppResult<Vec<CalendarEntry>>;

    fn entries_for_contract(&self, contract_id: &str) -> AppResult<Vec<CalendarEntry>>;

    fn contracts_for_student(&self, student_id: &str) -> AppResult<Vec<Contract>>;

    fn expected_weeks(&self, contract: &Contract) -> AppResult<Vec<ExpectedWeek>> {
        Ok(week_utils::expected_weeks(
            contract.start_date,
            contract.end_date,
        ))
    }

    fn create_entry(&self, insert: &CalendarEntryInsert) -> AppResult<CalendarEntry>;

    fn delete_entry(&self, entry_id: i64) -> AppResult<()>;
}

/// [`CalendarSource`] backed by the SQLite calendar tables.
#[derive(Clone, Debug)]
pub struct SqliteCalendarSource {
    db: DbPool,
}

impl SqliteCalendarSource {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }
}

impl CalendarSource for SqliteCalendarSource {
    fn find_duplicates(&self, student_id: &str) -> AppResult<Vec<DuplicateGroup>> {
        self.db.with_connection(|conn| {
            CalendarEntryRepository::find_duplicates_by_student(conn, student_id)
        })
    }

    fn entries_for_student(&self, student_id: &str) -> AppResult<Vec<CalendarEntry>> {
        self.db
            .with_connection(|conn| CalendarEntryRepository::list_by_student(conn, student_id))
    }

    fn entries_for_contract(&self, contract_id: &str) -> AppResult<Vec<CalendarEntry>> {
        self.db
            .with_connection(|conn| CalendarEntryRepository::list_by_contract(conn, contract_id))
    }

    fn contracts_for_student(&self, student_id: &str) -> AppResult<Vec<Contract>> {
        self.db
            .with_connection(|conn| ContractRepository::list_by_student(conn, student_id))
    }

    fn create_entry(&self, insert: &CalendarEntryInsert) -> AppResult<CalendarEntry> {
        self.db.with_connection(|conn| {
            let id = CalendarEntryRepository::insert(conn, insert)?;
            debug!(
                target: "app::db",
                entry_id = id,
                student_id = %insert.student_id,
                year = insert.year,
                week = insert.week,
                "calendar entry created"
            );
            CalendarEntryRepository::find_by_id(conn, id)
        })
    }

    fn delete_entry(&self, entry_id: i64) -> AppResult<()> {
        self.db.with_connection(|conn| {
            CalendarEntryRepository::delete(conn, entry_id)?;
            debug!(target: "app::db", entry_id, "calendar entry deleted");
            Ok(())
        })
    }
}
