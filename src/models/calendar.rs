use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Center,
    Company,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Center => "center",
            Location::Company => "company",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Location::Center => Location::Company,
            Location::Company => Location::Center,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Location {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "center" => Ok(Location::Center),
            "company" => Ok(Location::Company),
            other => Err(format!("unsupported calendar location: {other}")),
        }
    }
}

/// One student's assignment for one ISO week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEntry {
    pub id: i64,
    pub student_id: String,
    pub contract_id: String,
    pub week: u32,
    pub year: i32,
    pub location: Location,
    pub confirmed: bool,
    #[serde(default)]
    pub holidays: Vec<String>,
    pub modified_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl CalendarEntry {
    pub fn week_key(&self) -> (i32, u32) {
        (self.year, self.week)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntryInsert {
    pub student_id: String,
    pub contract_id: String,
    pub week: u32,
    pub year: i32,
    pub location: Location,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub holidays: Vec<String>,
    pub modified_by: String,
}

/// Contract bounding a student's expected calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    pub id: String,
    pub student_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rhythm_center_weeks: u32,
    pub rhythm_company_weeks: u32,
}

impl Contract {
    /// Declared rhythm as "center/company" week counts, e.g. "3/1".
    pub fn declared_rhythm(&self) -> String {
        format!("{}/{}", self.rhythm_center_weeks, self.rhythm_company_weeks)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInsert {
    #[serde(default)]
    pub id: Option<String>,
    pub student_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_rhythm_weeks")]
    pub rhythm_center_weeks: u32,
    #[serde(default = "default_rhythm_weeks")]
    pub rhythm_company_weeks: u32,
}

fn default_rhythm_weeks() -> u32 {
    1
}

/// A week the contract expects to be planned, with its Monday..Sunday bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpectedWeek {
    pub week: u32,
    pub year: i32,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

/// Entries sharing the same (student, year, week), ordered by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateGroup {
    pub week: u32,
    pub year: i32,
    pub entries: Vec<CalendarEntry>,
}
