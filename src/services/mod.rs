pub mod alternance_conflict_service;
pub mod calendar_source;
pub mod conflict_detector;
pub mod conflict_resolver;
pub mod recommendation_engine;
pub mod rhythm_analyzer;
pub mod settings_service;
pub mod week_utils;
