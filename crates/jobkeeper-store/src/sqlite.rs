//! SQLite-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::debug;

use jobkeeper_protocols::error::StoreError;
use jobkeeper_protocols::execution::{ExecutionRecord, ExecutionStatus};
use jobkeeper_protocols::job::{ConcurrencyPolicy, JobDefinition, JobSpec};
use jobkeeper_protocols::store::{ExecutionStore, JobStore};

use crate::schema::init_schema;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

/// SQLite store. One instance serves both the definition and the
/// execution tables; timestamps are stored as RFC3339 text.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open or create a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(path.clone())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        debug!("sqlite store opened at {:?}", path);
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            init_schema(conn)
        })
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(Self { conn })
    }
}

fn parse_ts(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn definition_from_row(row: &Row<'_>) -> rusqlite::Result<JobDefinition> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let concurrency: String = row.get(5)?;
    Ok(JobDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        registry_key: row.get(2)?,
        cron_expression: row.get(3)?,
        enabled: row.get(4)?,
        concurrency: ConcurrencyPolicy::parse(&concurrency),
        description: row.get(6)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let status: String = row.get(2)?;
    let status = ExecutionStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown execution status: {status}"),
            )),
        )
    })?;
    let started_at: String = row.get(3)?;
    let completed_at: Option<String> = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(ExecutionRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        status,
        started_at: parse_ts(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
        result_message: row.get(5)?,
        error_message: row.get(6)?,
        created_at: parse_ts(&created_at)?,
    })
}

const DEFINITION_COLUMNS: &str = "id, name, registry_key, cron_expression, enabled, concurrency, description, created_at, updated_at";
const RECORD_COLUMNS: &str =
    "id, job_id, status, started_at, completed_at, result_message, error_message, created_at";

#[async_trait]
impl JobStore for SqliteStore {
    async fn create(&self, spec: JobSpec) -> Result<JobDefinition, StoreError> {
        let def = JobDefinition::from_spec(uuid::Uuid::new_v4().to_string(), spec);
        let row = def.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO job_definitions \
                     (id, name, registry_key, cron_expression, enabled, concurrency, description, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.id,
                        row.name,
                        row.registry_key,
                        row.cron_expression,
                        row.enabled,
                        row.concurrency.as_str(),
                        row.description,
                        row.created_at.to_rfc3339(),
                        row.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(def)
    }

    async fn get(&self, id: &str) -> Result<Option<JobDefinition>, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DEFINITION_COLUMNS} FROM job_definitions WHERE id = ?1"
                ))?;
                match stmt.query_row([&id], definition_from_row) {
                    Ok(def) => Ok(Some(def)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn list(&self) -> Result<Vec<JobDefinition>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DEFINITION_COLUMNS} FROM job_definitions ORDER BY name"
                ))?;
                let defs = stmt
                    .query_map([], definition_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(defs)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn list_enabled(&self) -> Result<Vec<JobDefinition>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DEFINITION_COLUMNS} FROM job_definitions WHERE enabled = 1 ORDER BY name"
                ))?;
                let defs = stmt
                    .query_map([], definition_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(defs)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn update(&self, id: &str, spec: JobSpec) -> Result<JobDefinition, StoreError> {
        let mut def = JobStore::get(self, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        def.apply_spec(spec);

        let row = def.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE job_definitions SET \
                     name = ?2, registry_key = ?3, cron_expression = ?4, enabled = ?5, \
                     concurrency = ?6, description = ?7, updated_at = ?8 \
                     WHERE id = ?1",
                    params![
                        row.id,
                        row.name,
                        row.registry_key,
                        row.cron_expression,
                        row.enabled,
                        row.concurrency.as_str(),
                        row.description,
                        row.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(def)
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<JobDefinition, StoreError> {
        let mut def = JobStore::get(self, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        def.enabled = enabled;
        def.updated_at = Utc::now();

        let row_id = def.id.clone();
        let updated_at = def.updated_at.to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE job_definitions SET enabled = ?2, updated_at = ?3 WHERE id = ?1",
                    params![row_id, enabled, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(def)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM job_executions WHERE job_id = ?1", [&id])?;
                tx.execute("DELETE FROM job_definitions WHERE id = ?1", [&id])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
    async fn create(
        &self,
        job_id: &str,
        initial: ExecutionStatus,
    ) -> Result<ExecutionRecord, StoreError> {
        let now = Utc::now();
        let record = ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            status: initial,
            started_at: now,
            completed_at: None,
            result_message: None,
            error_message: None,
            created_at: now,
        };

        let row = record.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO job_executions (id, job_id, status, started_at, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        row.id,
                        row.job_id,
                        row.status.as_str(),
                        row.started_at.to_rfc3339(),
                        row.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(record)
    }

    async fn transition_to_running(&self, execution_id: &str) -> Result<(), StoreError> {
        let id = execution_id.to_string();
        let started_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE job_executions SET status = 'RUNNING', started_at = ?2 \
                     WHERE id = ?1 AND status = 'PENDING'",
                    params![id, started_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn transition_to_success(
        &self,
        execution_id: &str,
        result_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let id = execution_id.to_string();
        let message = result_message.map(|m| m.to_string());
        let completed_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                // Terminal guard: a record that already reached SUCCESS or
                // FAILED is left untouched, first write wins.
                conn.execute(
                    "UPDATE job_executions SET status = 'SUCCESS', completed_at = ?2, result_message = ?3 \
                     WHERE id = ?1 AND status IN ('PENDING', 'RUNNING')",
                    params![id, completed_at, message],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn transition_to_failure(
        &self,
        execution_id: &str,
        error_message: &str,
    ) -> Result<(), StoreError> {
        let id = execution_id.to_string();
        let message = error_message.to_string();
        let completed_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE job_executions SET status = 'FAILED', completed_at = ?2, error_message = ?3 \
                     WHERE id = ?1 AND status IN ('PENDING', 'RUNNING')",
                    params![id, completed_at, message],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let id = execution_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM job_executions WHERE id = ?1"
                ))?;
                match stmt.query_row([&id], record_from_row) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn list_by_job(&self, job_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let job_id = job_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM job_executions WHERE job_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC"
                ))?;
                let records = stmt
                    .query_map([&job_id], record_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn latest_by_job(&self, job_id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let job_id = job_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM job_executions WHERE job_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ))?;
                match stmt.query_row([&job_id], record_from_row) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn close_stale(&self, error_message: &str) -> Result<u64, StoreError> {
        let message = error_message.to_string();
        let completed_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                let closed = conn.execute(
                    "UPDATE job_executions SET status = 'FAILED', completed_at = ?1, error_message = ?2 \
                     WHERE status IN ('PENDING', 'RUNNING')",
                    params![completed_at, message],
                )?;
                Ok(closed as u64)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}
