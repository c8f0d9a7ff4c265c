use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::calendar::{Contract, ContractInsert};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct ContractRow {
    pub id: String,
    pub student_id: String,
    pub start_date: String,
    pub end_date: String,
    pub rhythm_center_weeks: i64,
    pub rhythm_company_weeks: i64,
}

impl ContractRow {
    pub fn into_record(self) -> AppResult<Contract> {
        Ok(Contract {
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            rhythm_center_weeks: u32::try_from(self.rhythm_center_weeks).unwrap_or(0),
            rhythm_company_weeks: u32::try_from(self.rhythm_company_weeks).unwrap_or(0),
            id: self.id,
            student_id: self.student_id,
        })
    }
}

impl TryFrom<&Row<'_>> for ContractRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            rhythm_center_weeks: row.get("rhythm_center_weeks")?,
            rhythm_company_weeks: row.get("rhythm_company_weeks")?,
        })
    }
}

fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|err| {
        AppError::validation_with_details(
            "invalid contract date",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub struct ContractRepository;

impl ContractRepository {
    pub fn insert(conn: &Connection, insert: &ContractInsert) -> AppResult<String> {
        if insert.end_date < insert.start_date {
            return Err(AppError::validation(
                "contract end date must not precede its start date",
            ));
        }

        let id = insert
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        conn.execute(
            r#"
                INSERT INTO contracts (
                    id,
                    student_id,
                    start_date,
                    end_date,
                    rhythm_center_weeks,
                    rhythm_company_weeks
                ) VALUES (
                    :id,
                    :student_id,
                    :start_date,
                    :end_date,
                    :rhythm_center_weeks,
                    :rhythm_company_weeks
                )
            "#,
            named_params! {
                ":id": &id,
                ":student_id": &insert.student_id,
                ":start_date": insert.start_date.format(DATE_FORMAT).to_string(),
                ":end_date": insert.end_date.format(DATE_FORMAT).to_string(),
                ":rhythm_center_weeks": insert.rhythm_center_weeks,
                ":rhythm_company_weeks": insert.rhythm_company_weeks,
            },
        )?;

        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Contract> {
        let mut stmt = conn.prepare(
            r#"
                SELECT
                    id,
                    student_id,
                    start_date,
                    end_date,
                    rhythm_center_weeks,
                    rhythm_company_weeks
                FROM contracts
                WHERE id = :id
            "#,
        )?;

        let row = stmt
            .query_row(named_params! {":id": id}, |row| ContractRow::try_from(row))
            .optional()?;

        match row {
            Some(row) => row.into_record(),
            None => Err(AppError::not_found()),
        }
    }

    pub fn list_by_student(conn: &Connection, student_id: &str) -> AppResult<Vec<Contract>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT
                    id,
                    student_id,
                    start_date,
                    end_date,
                    rhythm_center_weeks,
                    rhythm_company_weeks
                FROM contracts
                WHERE student_id = :student_id
                ORDER BY start_date ASC, id ASC
            "#,
        )?;

        let records = stmt
            .query_map(named_params! {":student_id": student_id}, |row| {
                ContractRow::try_from(row)
            })?
            .map(|row| row.map_err(AppError::from).and_then(|row| row.into_record()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(records)
    }
}
