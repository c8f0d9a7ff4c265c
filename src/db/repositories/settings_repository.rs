use std::collections::HashMap;
use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;

/// Keys owned by the conflict engine share this prefix in `app_settings`.
pub const CONFLICT_KEY_PREFIX: &str = "conflict.";

#[derive(Debug, Clone)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for SettingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct SettingsRepository;

impl SettingsRepository {
    /// Conflict-engine overrides keyed without their prefix.
    pub fn load_overrides(conn: &Connection) -> AppResult<HashMap<String, SettingRow>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT key, value, updated_at
                FROM app_settings
                WHERE key LIKE :pattern
                ORDER BY key ASC
            "#,
        )?;

        let pattern = format!("{CONFLICT_KEY_PREFIX}%");
        let rows = stmt
            .query_map(named_params! {":pattern": pattern}, |row| {
                SettingRow::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let short = row
                    .key
                    .strip_prefix(CONFLICT_KEY_PREFIX)
                    .unwrap_or(&row.key)
                    .to_string();
                (short, row)
            })
            .collect())
    }

    pub fn upsert_override(conn: &Connection, key: &str, value: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO app_settings (key, value)
                VALUES (:key, :value)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP
            "#,
            named_params! {
                ":key": format!("{CONFLICT_KEY_PREFIX}{key}"),
                ":value": value,
            },
        )?;

        Ok(())
    }

    pub fn clear_overrides(conn: &Connection) -> AppResult<usize> {
        let removed = conn.execute(
            "DELETE FROM app_settings WHERE key LIKE ?1",
            [format!("{CONFLICT_KEY_PREFIX}%")],
        )?;
        Ok(removed)
    }
}
