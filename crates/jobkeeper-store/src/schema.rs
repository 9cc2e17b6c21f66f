//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- Job definitions table
CREATE TABLE IF NOT EXISTS job_definitions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    registry_key TEXT NOT NULL,
    cron_expression TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    concurrency TEXT NOT NULL DEFAULT 'allow',
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Execution records table
CREATE TABLE IF NOT EXISTS job_executions (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    result_message TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (job_id) REFERENCES job_definitions(id) ON DELETE CASCADE
);

-- Indexes for efficient queries
CREATE INDEX IF NOT EXISTS idx_job_definitions_enabled ON job_definitions(enabled);
CREATE INDEX IF NOT EXISTS idx_job_executions_job ON job_executions(job_id, created_at);
CREATE INDEX IF NOT EXISTS idx_job_executions_status ON job_executions(status);
"#;
