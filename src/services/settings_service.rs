use std::str::FromStr;
use std::sync::RwLock;

use tracing::{info, warn};

use crate::db::repositories::settings_repository::{SettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::ConflictSettings;

const KEY_GAP_THRESHOLD: &str = "gap_threshold_days";
const KEY_RHYTHM_THRESHOLD: &str = "rhythm_threshold";
const KEY_MIN_RHYTHM_WEEKS: &str = "min_rhythm_weeks";
const KEY_HOLIDAY_THRESHOLD: &str = "holiday_marker_threshold";
const KEY_DEFAULT_ACTOR: &str = "default_actor";

const MAX_GAP_THRESHOLD_DAYS: i64 = 366;
const MIN_RHYTHM_WEEKS_FLOOR: usize = 2;

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub gap_threshold_days: Option<i64>,
    pub rhythm_threshold: Option<f64>,
    pub min_rhythm_weeks: Option<usize>,
    pub holiday_marker_threshold: Option<usize>,
    pub default_actor: Option<String>,
}

/// Conflict engine settings: defaults overlaid with stored overrides.
pub struct SettingsService {
    db: DbPool,
    cache: RwLock<Option<ConflictSettings>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    pub fn get(&self) -> AppResult<ConflictSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<ConflictSettings> {
        if let Some(days) = input.gap_threshold_days {
            if !(1..=MAX_GAP_THRESHOLD_DAYS).contains(&days) {
                return Err(AppError::validation(format!(
                    "gap threshold must be between 1 and {MAX_GAP_THRESHOLD_DAYS} days"
                )));
            }
        }

        if let Some(threshold) = input.rhythm_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(AppError::validation(
                    "rhythm threshold must be between 0 and 1",
                ));
            }
        }

        if let Some(weeks) = input.min_rhythm_weeks {
            if weeks < MIN_RHYTHM_WEEKS_FLOOR {
                return Err(AppError::validation(format!(
                    "rhythm analysis needs at least {MIN_RHYTHM_WEEKS_FLOOR} weeks"
                )));
            }
        }

        let actor = match input.default_actor.as_ref() {
            Some(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(AppError::validation("default actor must not be empty"));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        self.db.with_transaction(|tx| {
            if let Some(value) = input.gap_threshold_days {
                SettingsRepository::upsert_override(tx, KEY_GAP_THRESHOLD, &value.to_string())?;
            }
            if let Some(value) = input.rhythm_threshold {
                SettingsRepository::upsert_override(tx, KEY_RHYTHM_THRESHOLD, &value.to_string())?;
            }
            if let Some(value) = input.min_rhythm_weeks {
                SettingsRepository::upsert_override(tx, KEY_MIN_RHYTHM_WEEKS, &value.to_string())?;
            }
            if let Some(value) = input.holiday_marker_threshold {
                SettingsRepository::upsert_override(
                    tx,
                    KEY_HOLIDAY_THRESHOLD,
                    &value.to_string(),
                )?;
            }
            if let Some(value) = actor.as_deref() {
                SettingsRepository::upsert_override(tx, KEY_DEFAULT_ACTOR, value)?;
            }
            Ok(())
        })?;

        self.invalidate();
        let settings = self.get()?;
        info!(target: "app::settings", ?settings, "conflict settings updated");
        Ok(settings)
    }

    /// Drops every stored override, returning to the built-in defaults.
    pub fn reset(&self) -> AppResult<ConflictSettings> {
        let removed = self.db.with_connection(SettingsRepository::clear_overrides)?;
        info!(target: "app::settings", removed, "conflict settings reset to defaults");
        self.invalidate();
        self.get()
    }

    fn invalidate(&self) {
        if let Ok(mut guard) = self.cache.write() {
            *guard = None;
        }
    }

    fn load_settings_from_db(&self) -> AppResult<ConflictSettings> {
        let overrides = self.db.with_connection(SettingsRepository::load_overrides)?;
        let mut settings = ConflictSettings::default();

        if let Some(value) = parse_override(overrides.get(KEY_GAP_THRESHOLD)) {
            settings.gap_threshold_days = value;
        }
        if let Some(value) = parse_override(overrides.get(KEY_RHYTHM_THRESHOLD)) {
            settings.rhythm_threshold = value;
        }
        if let Some(value) = parse_override(overrides.get(KEY_MIN_RHYTHM_WEEKS)) {
            settings.min_rhythm_weeks = value;
        }
        if let Some(value) = parse_override(overrides.get(KEY_HOLIDAY_THRESHOLD)) {
            settings.holiday_marker_threshold = value;
        }
        if let Some(row) = overrides.get(KEY_DEFAULT_ACTOR) {
            settings.default_actor = row.value.clone();
        }

        settings.updated_at = overrides
            .values()
            .map(|row| row.updated_at.clone())
            .max();

        Ok(settings)
    }
}

fn parse_override<T: FromStr>(row: Option<&SettingRow>) -> Option<T> {
    let row = row?;
    match row.value.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(
                target: "app::settings",
                key = %row.key,
                value = %row.value,
                "ignoring unparsable settings override"
            );
            None
        }
    }
}
