//! SQLite-backed store
//!
//! Tables are created on open. Answers are stored as a JSON column; timestamps
//! as RFC 3339 text so they sort lexically.

use super::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use icoach_common::models::{Candidate, FinalScore, NewCandidate, SessionRecord, SessionSummary};
use icoach_common::{Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating tables if missing
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_candidates_table(&pool).await?;
        create_sessions_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn create_candidates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            candidate_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            branch TEXT NOT NULL,
            resume_text TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_sessions (
            session_id TEXT PRIMARY KEY,
            connection_id TEXT NOT NULL,
            candidate_id TEXT,
            branch TEXT,
            transcript TEXT NOT NULL,
            answers TEXT NOT NULL,
            non_verbal_score REAL NOT NULL,
            vocal_score REAL NOT NULL,
            keyword_score REAL NOT NULL,
            final_score REAL NOT NULL,
            saved_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interview_sessions_saved_at ON interview_sessions(saved_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("bad timestamp {:?}: {}", value, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("bad uuid {:?}: {}", value, e)))
}

fn session_from_row(row: &SqliteRow) -> Result<SessionRecord> {
    let session_id: String = row.get("session_id");
    let connection_id: String = row.get("connection_id");
    let answers: String = row.get("answers");
    let saved_at: String = row.get("saved_at");

    Ok(SessionRecord {
        session_id: parse_uuid(&session_id)?,
        connection_id: parse_uuid(&connection_id)?,
        candidate_id: row.get("candidate_id"),
        branch: row.get("branch"),
        transcript: row.get("transcript"),
        answers: serde_json::from_str(&answers)?,
        scores: FinalScore {
            non_verbal_score: row.get("non_verbal_score"),
            vocal_score: row.get("vocal_score"),
            keyword_score: row.get("keyword_score"),
            final_score: row.get("final_score"),
        },
        saved_at: parse_timestamp(&saved_at)?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn is_online(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn save_candidate(&self, candidate: &NewCandidate) -> Result<String> {
        let candidate_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO candidates (candidate_id, name, email, branch, resume_text, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candidate_id)
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.branch)
        .bind(&candidate.resume_text)
        .bind(timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!(candidate_id = %candidate_id, "Candidate saved");
        Ok(candidate_id)
    }

    async fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>> {
        let row = sqlx::query(
            r#"
            SELECT candidate_id, name, email, branch, resume_text, created_at
            FROM candidates
            WHERE candidate_id = ?
            "#,
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let created_at: String = row.get("created_at");
                Ok(Some(Candidate {
                    candidate_id: row.get("candidate_id"),
                    name: row.get("name"),
                    email: row.get("email"),
                    branch: row.get("branch"),
                    resume_text: row.get("resume_text"),
                    created_at: parse_timestamp(&created_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn persist(&self, record: &SessionRecord) -> Result<()> {
        let answers = serde_json::to_string(&record.answers)?;
        sqlx::query(
            r#"
            INSERT INTO interview_sessions (
                session_id, connection_id, candidate_id, branch, transcript, answers,
                non_verbal_score, vocal_score, keyword_score, final_score, saved_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.session_id.to_string())
        .bind(record.connection_id.to_string())
        .bind(&record.candidate_id)
        .bind(&record.branch)
        .bind(&record.transcript)
        .bind(answers)
        .bind(record.scores.non_verbal_score)
        .bind(record.scores.vocal_score)
        .bind(record.scores.keyword_score)
        .bind(record.scores.final_score)
        .bind(timestamp(&record.saved_at))
        .execute(&self.pool)
        .await?;

        info!(session_id = %record.session_id, final_score = record.scores.final_score, "Session persisted");
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, connection_id, candidate_id, branch, transcript, answers,
                   non_verbal_score, vocal_score, keyword_score, final_score, saved_at
            FROM interview_sessions
            WHERE session_id = ?
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, candidate_id, branch, final_score, saved_at
            FROM interview_sessions
            ORDER BY saved_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let session_id: String = row.get("session_id");
                let saved_at: String = row.get("saved_at");
                Ok(SessionSummary {
                    session_id: parse_uuid(&session_id)?,
                    candidate_id: row.get("candidate_id"),
                    branch: row.get("branch"),
                    final_score: row.get("final_score"),
                    saved_at: parse_timestamp(&saved_at)?,
                })
            })
            .collect()
    }
}
