//! SQLite-backed feature table: one row per user with the ten engagement counters.

use crate::error::TrainingError;
use crate::features::{FieldValue, UserFeatureVector, FEATURE_NAMES};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub features: UserFeatureVector,
}

pub struct FeatureStore {
    conn: Connection,
    table: String,
}

impl FeatureStore {
    /// Open or create the DB at path. `table` must be a plain SQL identifier.
    pub fn open(path: &Path, table: &str) -> Result<Self, TrainingError> {
        check_identifier(table)?;
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn in_memory(table: &str) -> Result<Self, TrainingError> {
        check_identifier(table)?;
        Ok(Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
        })
    }

    pub fn create_table(&self) -> Result<(), TrainingError> {
        let columns: Vec<String> = FEATURE_NAMES.iter().map(|n| format!("{n} REAL NOT NULL")).collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (user_id TEXT PRIMARY KEY, {});",
            self.table,
            columns.join(", ")
        ))?;
        Ok(())
    }

    /// Insert or replace rows in one transaction.
    pub fn insert_all(&mut self, records: &[UserRecord]) -> Result<usize, TrainingError> {
        let placeholders: Vec<String> = (1..=FEATURE_NAMES.len() + 1).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {} (user_id, {}) VALUES ({})",
            self.table,
            FEATURE_NAMES.join(", "),
            placeholders.join(", ")
        );
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for r in records {
                let values = r.features.to_array();
                stmt.execute(params_from_iter(
                    std::iter::once(rusqlite::types::Value::Text(r.user_id.clone()))
                        .chain(values.iter().map(|v| rusqlite::types::Value::Real(*v))),
                ))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Every row, ordered by user id. Rows failing validation abort the load.
    pub fn load_all(&self) -> Result<Vec<UserRecord>, TrainingError> {
        let sql = format!(
            "SELECT user_id, {} FROM {} ORDER BY user_id",
            FEATURE_NAMES.join(", "),
            self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let user_id = match row.get_ref(0)? {
                ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
                ValueRef::Integer(i) => i.to_string(),
                other => format!("{other:?}"),
            };
            let mut column = 0;
            let features = UserFeatureVector::from_fields(|_| {
                column += 1;
                row.get_ref(column)
                    .map(FieldValue::from)
                    .unwrap_or(FieldValue::Missing)
            })
            .map_err(|source| TrainingError::InvalidRow {
                user_id: user_id.clone(),
                source,
            })?;
            out.push(UserRecord { user_id, features });
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<usize, TrainingError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |r| r.get(0))?;
        Ok(n as usize)
    }
}

fn check_identifier(table: &str) -> Result<(), TrainingError> {
    let ok = !table.is_empty()
        && table
            .split('.')
            .all(|part| {
                !part.is_empty()
                    && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !part.starts_with(|c: char| c.is_ascii_digit())
            });
    if ok {
        Ok(())
    } else {
        Err(TrainingError::InvalidTable(table.to_string()))
    }
}
