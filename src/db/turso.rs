use crate::types::{AppError, AuditEvent, ChunkScore, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libsql::params::Params;
use libsql::{Builder, Connection, Value};
use std::path::Path;
use tracing::debug;

use super::audit::AuditLog;

/// Audit record as stored in the `answer_audit` table.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub request_id: String,
    pub question: String,
    pub answer: String,
    pub chunk_count: usize,
    pub top_score: Option<f32>,
    pub average_score: Option<f32>,
    pub fallback: bool,
    pub chunks: Vec<ChunkScore>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub raw_response: Option<String>,
    pub model: Option<String>,
    pub feedback: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Audit log stored in SQLite, either a local file or a Turso database.
pub struct TursoAuditLog {
    // In-memory databases exist per connection, so one is kept for the
    // lifetime of the log.
    conn: Connection,
}

impl TursoAuditLog {
    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Turso: {}", e)))?;
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;
        Self::with_connection(conn).await
    }

    /// Open a local database file, creating parent directories as needed.
    /// `:memory:` gives a throwaway database.
    pub async fn new_local(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::Database(format!(
                            "Failed to create audit directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open audit database: {}", e)))?;
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;
        Self::with_connection(conn).await
    }

    pub async fn new_memory() -> Result<Self> {
        Self::new_local(":memory:").await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let log = Self { conn };
        log.initialize_schema().await?;
        Ok(log)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS answer_audit (
                    request_id TEXT PRIMARY KEY,
                    question TEXT NOT NULL,
                    answer TEXT NOT NULL,
                    chunk_count INTEGER NOT NULL,
                    top_score REAL,
                    average_score REAL,
                    fallback INTEGER NOT NULL,
                    chunks TEXT NOT NULL,
                    system_prompt TEXT,
                    user_prompt TEXT,
                    raw_response TEXT,
                    model TEXT,
                    feedback INTEGER,
                    feedback_at INTEGER,
                    created_at INTEGER NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to create answer_audit table: {}", e)))?;

        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_answer_audit_created ON answer_audit(created_at)",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to create audit index: {}", e)))?;

        Ok(())
    }

    /// Fetch a stored record by request id.
    pub async fn get(&self, request_id: &str) -> Result<Option<AuditRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT request_id, question, answer, chunk_count, top_score, average_score,
                        fallback, chunks, system_prompt, user_prompt, raw_response,
                        model, feedback, created_at
                 FROM answer_audit WHERE request_id = ?",
                [request_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query audit record: {}", e)))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let value = |idx: i32| row.get_value(idx).map_err(|e| AppError::Database(e.to_string()));

        let chunks_json = text(value(7)?)?;
        let chunks: Vec<ChunkScore> = serde_json::from_str(&chunks_json)
            .map_err(|e| AppError::Database(format!("Corrupt chunks column: {}", e)))?;

        let created_at = integer(value(13)?)?;

        Ok(Some(AuditRecord {
            request_id: text(value(0)?)?,
            question: text(value(1)?)?,
            answer: text(value(2)?)?,
            chunk_count: usize::try_from(integer(value(3)?)?).unwrap_or_default(),
            top_score: optional_real(value(4)?)?,
            average_score: optional_real(value(5)?)?,
            fallback: integer(value(6)?)? != 0,
            chunks,
            system_prompt: optional_text(value(8)?)?,
            user_prompt: optional_text(value(9)?)?,
            raw_response: optional_text(value(10)?)?,
            model: optional_text(value(11)?)?,
            feedback: optional_integer(value(12)?)?.map(|flag| flag != 0),
            created_at: Utc
                .timestamp_opt(created_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }))
    }
}

fn text(value: Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(AppError::Database(format!("Expected text, got {:?}", other))),
    }
}

fn optional_text(value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => text(other).map(Some),
    }
}

fn integer(value: Value) -> Result<i64> {
    match value {
        Value::Integer(n) => Ok(n),
        other => Err(AppError::Database(format!("Expected integer, got {:?}", other))),
    }
}

fn optional_integer(value: Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        other => integer(other).map(Some),
    }
}

fn optional_real(value: Value) -> Result<Option<f32>> {
    match value {
        Value::Null => Ok(None),
        Value::Real(f) => Ok(Some(f as f32)),
        Value::Integer(n) => Ok(Some(n as f32)),
        other => Err(AppError::Database(format!("Expected real, got {:?}", other))),
    }
}

fn nullable_real(value: Option<f32>) -> Value {
    value.map_or(Value::Null, |v| Value::Real(f64::from(v)))
}

fn nullable_text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

#[async_trait]
impl AuditLog for TursoAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        let chunks = serde_json::to_string(&event.chunks)
            .map_err(|e| AppError::Internal(format!("Failed to encode chunks: {}", e)))?;

        let params = Params::Positional(vec![
            Value::Text(event.request_id.clone()),
            Value::Text(event.question.clone()),
            Value::Text(event.answer.clone()),
            Value::Integer(i64::try_from(event.chunk_count).unwrap_or(i64::MAX)),
            nullable_real(event.top_score),
            nullable_real(event.average_score),
            Value::Integer(i64::from(event.fallback)),
            Value::Text(chunks),
            nullable_text(&event.system_prompt),
            nullable_text(&event.user_prompt),
            nullable_text(&event.raw_response),
            nullable_text(&event.model),
            Value::Integer(event.timestamp.timestamp()),
        ]);

        self.conn
            .execute(
                "INSERT INTO answer_audit
                (request_id, question, answer, chunk_count, top_score, average_score,
                 fallback, chunks, system_prompt, user_prompt, raw_response, model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(request_id) DO UPDATE SET
                    question = excluded.question,
                    answer = excluded.answer,
                    chunk_count = excluded.chunk_count,
                    top_score = excluded.top_score,
                    average_score = excluded.average_score,
                    fallback = excluded.fallback,
                    chunks = excluded.chunks,
                    system_prompt = excluded.system_prompt,
                    user_prompt = excluded.user_prompt,
                    raw_response = excluded.raw_response,
                    model = excluded.model,
                    created_at = excluded.created_at",
                params,
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to store audit record: {}", e)))?;

        debug!(request_id = %event.request_id, "Audit record stored");
        Ok(())
    }

    async fn record_feedback(&self, request_id: &str, helpful: bool) -> Result<bool> {
        let params = Params::Positional(vec![
            Value::Integer(i64::from(helpful)),
            Value::Integer(Utc::now().timestamp()),
            Value::Text(request_id.to_string()),
        ]);

        let changed = self
            .conn
            .execute(
                "UPDATE answer_audit SET feedback = ?, feedback_at = ?
                 WHERE request_id = ? AND feedback IS NULL",
                params,
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to store feedback: {}", e)))?;

        Ok(changed == 1)
    }
}
