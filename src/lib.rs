pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult};
pub use services::alternance_conflict_service::AlternanceConflictService;
pub use services::calendar_source::{CalendarSource, SqliteCalendarSource};
