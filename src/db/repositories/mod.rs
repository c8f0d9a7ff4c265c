pub mod calendar_entry_repository;
pub mod contract_repository;
pub mod settings_repository;
