// ── Classifier artifacts: SessionStore DB layer ─────────────────────────────
//
// Every trained version is kept. At most one row carries `is_active = 1`
// (partial unique index); switching is done inside a transaction so a reader
// never sees zero-then-two active rows.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{fmt_ts, parse_ts, SessionStore};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::gate_types::ClassifierModelInfo;

const MODEL_COLUMNS: &str = "version, trained_at, training_example_count, held_out_accuracy,
    trained_through_seq, is_active, artifact";

/// A persisted model: metadata plus the serialized artifact (JSON).
#[derive(Debug, Clone)]
pub struct StoredModel {
    pub info: ClassifierModelInfo,
    pub artifact: String,
}

impl StoredModel {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let trained_at: String = row.get(1)?;
        let count: i64 = row.get(2)?;
        Ok(StoredModel {
            info: ClassifierModelInfo {
                version: row.get(0)?,
                trained_at: parse_ts(&trained_at)?,
                training_example_count: count as usize,
                held_out_accuracy: row.get(3)?,
                trained_through_seq: row.get(4)?,
                is_active: row.get(5)?,
            },
            artifact: row.get(6)?,
        })
    }
}

impl SessionStore {
    /// Persist a new version. With `activate`, it becomes the only active row.
    pub(crate) fn insert_model(
        &self,
        training_example_count: usize,
        held_out_accuracy: f64,
        trained_through_seq: i64,
        artifact: &str,
        activate: bool,
    ) -> EngineResult<ClassifierModelInfo> {
        let trained_at = Utc::now();
        let version = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            if activate {
                tx.execute("UPDATE classifier_models SET is_active = 0 WHERE is_active = 1", [])?;
            }
            tx.execute(
                "INSERT INTO classifier_models (
                    trained_at, training_example_count, held_out_accuracy,
                    trained_through_seq, is_active, artifact
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    fmt_ts(&trained_at),
                    training_example_count as i64,
                    held_out_accuracy,
                    trained_through_seq,
                    activate,
                    artifact,
                ],
            )?;
            let version = tx.last_insert_rowid();
            tx.commit()?;
            version
        };
        Ok(self.get_model(version)?.info)
    }

    /// Make `version` the active model.
    pub(crate) fn activate_model(&self, version: i64) -> EngineResult<StoredModel> {
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM classifier_models WHERE version = ?1",
                    params![version],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(EngineError::not_found("classifier model", version.to_string()));
            }
            tx.execute("UPDATE classifier_models SET is_active = 0 WHERE is_active = 1", [])?;
            tx.execute(
                "UPDATE classifier_models SET is_active = 1 WHERE version = ?1",
                params![version],
            )?;
            tx.commit()?;
        }
        self.get_model(version)
    }

    pub fn get_model(&self, version: i64) -> EngineResult<StoredModel> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {MODEL_COLUMNS} FROM classifier_models WHERE version = ?1"),
            params![version],
            StoredModel::from_row,
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found("classifier model", version.to_string()))
    }

    pub fn active_model(&self) -> EngineResult<Option<StoredModel>> {
        let conn = self.conn.lock();
        let model = conn
            .query_row(
                &format!("SELECT {MODEL_COLUMNS} FROM classifier_models WHERE is_active = 1"),
                [],
                StoredModel::from_row,
            )
            .optional()?;
        Ok(model)
    }

    /// Metadata of every version, newest first.
    pub fn list_models(&self) -> EngineResult<Vec<ClassifierModelInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM classifier_models ORDER BY version DESC"
        ))?;
        let rows = stmt.query_map([], StoredModel::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.info);
        }
        Ok(out)
    }

    /// Highest event sequence consumed by any training run (0 when none).
    pub(crate) fn last_trained_seq(&self) -> EngineResult<i64> {
        let conn = self.conn.lock();
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(trained_through_seq), 0) FROM classifier_models",
            [],
            |r| r.get(0),
        )?;
        Ok(seq)
    }
}
