pub mod calendar;
pub mod conflict;
pub mod resolution;
pub mod settings;
