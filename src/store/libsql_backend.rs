//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Sessions are stored as
//! JSON blobs (one row per user); leads are a flat append-only table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::funnel::model::{Lead, Session};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn lead_from_row(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let get_text = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("Failed to read lead column {idx}: {e}")))
    };
    let id: String = get_text(0)?;
    Ok(Lead {
        id: Uuid::parse_str(&id)
            .map_err(|e| DatabaseError::Serialization(format!("Bad lead id {id}: {e}")))?,
        user_id: get_text(1)?,
        display_name: get_text(2)?,
        prize: get_text(3)?,
        custom_name: get_text(4)?,
        phone: get_text(5)?,
        captured_at: parse_datetime(&get_text(6)?),
    })
}

// ── Database trait implementation ───────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn get_session(&self, user_id: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT data FROM sessions WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query session: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read session row: {e}")))?;

        match row {
            Some(row) => {
                let data: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("Failed to read session: {e}")))?;
                let session = serde_json::from_str(&data).map_err(|e| {
                    DatabaseError::Serialization(format!("Bad session JSON for {user_id}: {e}"))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn put_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(session)
            .map_err(|e| DatabaseError::Serialization(format!("Failed to serialize session: {e}")))?;
        self.conn()
            .execute(
                "INSERT INTO sessions (user_id, data, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET data = ?2, updated_at = ?3",
                params![
                    session.user_id.as_str(),
                    data,
                    session.updated_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to write session: {e}")))?;
        Ok(())
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM sessions WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to delete session: {e}")))?;
        Ok(())
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO leads
                    (id, user_id, display_name, prize, custom_name, phone, captured_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    lead.id.to_string(),
                    lead.user_id.as_str(),
                    lead.display_name.as_str(),
                    lead.prize.as_str(),
                    lead.custom_name.as_str(),
                    lead.phone.as_str(),
                    lead.captured_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert lead: {e}")))?;
        Ok(())
    }

    async fn recent_leads(&self, limit: usize) -> Result<Vec<Lead>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, user_id, display_name, prize, custom_name, phone, captured_at
                 FROM leads ORDER BY captured_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query leads: {e}")))?;

        let mut leads = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read lead row: {e}")))?
        {
            leads.push(lead_from_row(&row)?);
        }
        Ok(leads)
    }

    async fn count_leads(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM leads", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count leads: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read lead count: {e}")))?;

        match row {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("Failed to parse count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_session(user_id: &str) -> Session {
        let mut session = Session::new(user_id, "Nodira");
        session.claim("40% Chegirma");
        session.record_name("Nodira Aliyeva");
        session.record_phone("+998901234567");
        session
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let db = LibSqlBackend::new_memory().await.unwrap();

        assert!(db.get_session("42").await.unwrap().is_none());

        let mut session = Session::new("42", "Nodira");
        session.claim("40% Chegirma");
        db.put_session(&session).await.unwrap();

        let loaded = db.get_session("42").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "42");
        assert_eq!(loaded.prize.as_deref(), Some("40% Chegirma"));
        assert_eq!(loaded.stage, session.stage);
    }

    #[tokio::test]
    async fn put_session_overwrites() {
        let db = LibSqlBackend::new_memory().await.unwrap();

        let mut session = Session::new("42", "Nodira");
        db.put_session(&session).await.unwrap();

        session.claim("50% Chegirma");
        db.put_session(&session).await.unwrap();

        let loaded = db.get_session("42").await.unwrap().unwrap();
        assert_eq!(loaded.prize.as_deref(), Some("50% Chegirma"));
    }

    #[tokio::test]
    async fn delete_session_removes_row() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.put_session(&Session::new("42", "Nodira")).await.unwrap();
        db.delete_session("42").await.unwrap();
        assert!(db.get_session("42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lead_insert_and_readback() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let lead = completed_session("42").to_lead().unwrap();
        db.insert_lead(&lead).await.unwrap();

        assert_eq!(db.count_leads().await.unwrap(), 1);
        let leads = db.recent_leads(10).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].id, lead.id);
        assert_eq!(leads[0].prize, "40% Chegirma");
        assert_eq!(leads[0].phone, "+998901234567");
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        // new_memory already ran them once
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
        assert_eq!(db.count_leads().await.unwrap(), 0);
    }
}
