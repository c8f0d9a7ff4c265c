use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::calendar::{CalendarEntry, CalendarEntryInsert, DuplicateGroup, Location};

const ENTRY_COLUMNS: &str = r#"
    id,
    student_id,
    contract_id,
    week,
    year,
    location,
    confirmed,
    holidays,
    modified_by,
    created_at,
    updated_at
"#;

#[derive(Debug, Clone)]
pub struct CalendarEntryRow {
    pub id: i64,
    pub student_id: String,
    pub contract_id: String,
    pub week: i64,
    pub year: i64,
    pub location: String,
    pub confirmed: bool,
    pub holidays: String,
    pub modified_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl CalendarEntryRow {
    pub fn into_record(self) -> AppResult<CalendarEntry> {
        let location = Location::try_from(self.location.as_str()).map_err(AppError::validation)?;

        let holidays = serde_json::from_str::<Vec<String>>(&self.holidays).unwrap_or_else(|err| {
            warn!(
                target: "app::db",
                entry_id = self.id,
                error = %err,
                "unreadable holiday markers, treating week as holiday-free"
            );
            Vec::new()
        });

        let week = u32::try_from(self.week)
            .map_err(|_| AppError::validation(format!("invalid ISO week {}", self.week)))?;
        let year = i32::try_from(self.year)
            .map_err(|_| AppError::validation(format!("invalid year {}", self.year)))?;

        Ok(CalendarEntry {
            id: self.id,
            student_id: self.student_id,
            contract_id: self.contract_id,
            week,
            year,
            location,
            confirmed: self.confirmed,
            holidays,
            modified_by: self.modified_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for CalendarEntryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            contract_id: row.get("contract_id")?,
            week: row.get("week")?,
            year: row.get("year")?,
            location: row.get("location")?,
            confirmed: row.get("confirmed")?,
            holidays: row.get("holidays")?,
            modified_by: row.get("modified_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct CalendarEntryRepository;

impl CalendarEntryRepository {
    pub fn insert(conn: &Connection, insert: &CalendarEntryInsert) -> AppResult<i64> {
        if insert.week == 0 || insert.week > 53 {
            return Err(AppError::validation(format!(
                "ISO week must be between 1 and 53, got {}",
                insert.week
            )));
        }

        let holidays = serde_json::to_string(&insert.holidays)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
                INSERT INTO calendar_entries (
                    student_id,
                    contract_id,
                    week,
                    year,
                    location,
                    confirmed,
                    holidays,
                    modified_by,
                    created_at,
                    updated_at
                ) VALUES (
                    :student_id,
                    :contract_id,
                    :week,
                    :year,
                    :location,
                    :confirmed,
                    :holidays,
                    :modified_by,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":student_id": &insert.student_id,
                ":contract_id": &insert.contract_id,
                ":week": insert.week,
                ":year": insert.year,
                ":location": insert.location.as_str(),
                ":confirmed": insert.confirmed,
                ":holidays": &holidays,
                ":modified_by": &insert.modified_by,
                ":created_at": &now,
                ":updated_at": &now,
            },
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<CalendarEntry> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM calendar_entries WHERE id = :id");
        let mut stmt = conn.prepare(&sql)?;

        let row = stmt
            .query_row(named_params! {":id": id}, |row| CalendarEntryRow::try_from(row))
            .optional()?;

        match row {
            Some(row) => row.into_record(),
            None => Err(AppError::not_found()),
        }
    }

    /// Entries of a student ordered by (year, week), then id.
    pub fn list_by_student(conn: &Connection, student_id: &str) -> AppResult<Vec<CalendarEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM calendar_entries
             WHERE student_id = :student_id
             ORDER BY year ASC, week ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;

        let records = stmt
            .query_map(named_params! {":student_id": student_id}, |row| {
                CalendarEntryRow::try_from(row)
            })?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(records)
    }

    /// Entries of a contract ordered by (year, week), then id.
    pub fn list_by_contract(
        conn: &Connection,
        contract_id: &str,
    ) -> AppResult<Vec<CalendarEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM calendar_entries
             WHERE contract_id = :contract_id
             ORDER BY year ASC, week ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;

        let records = stmt
            .query_map(named_params! {":contract_id": contract_id}, |row| {
                CalendarEntryRow::try_from(row)
            })?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(records)
    }

    /// Groups of two or more entries sharing a student's (year, week).
    pub fn find_duplicates_by_student(
        conn: &Connection,
        student_id: &str,
    ) -> AppResult<Vec<DuplicateGroup>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM calendar_entries AS e
             WHERE e.student_id = :student_id
               AND (
                   SELECT COUNT(*) FROM calendar_entries AS d
                   WHERE d.student_id = e.student_id
                     AND d.year = e.year
                     AND d.week = e.week
               ) > 1
             ORDER BY e.year ASC, e.week ASC, e.id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;

        let entries = stmt
            .query_map(named_params! {":student_id": student_id}, |row| {
                CalendarEntryRow::try_from(row)
            })?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for entry in entries {
            match groups.last_mut() {
                Some(group) if (group.year, group.week) == entry.week_key() => {
                    group.entries.push(entry);
                }
                _ => groups.push(DuplicateGroup {
                    week: entry.week,
                    year: entry.year,
                    entries: vec![entry],
                }),
            }
        }

        Ok(groups)
    }

    pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
        let affected = conn.execute(
            "DELETE FROM calendar_entries WHERE id = :id",
            named_params! {":id": id},
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }
}
