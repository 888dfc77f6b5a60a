//! Unified `Database` trait — single async interface for all persistence.
//!
//! Covers both capabilities the funnel needs: the per-user session store
//! (get/put/delete) and the append-only lead store. Keeping sessions
//! behind the trait means the core stays correct even when the hosting
//! process is not resident between events.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::funnel::model::{Lead, Session};

/// Backend-agnostic database trait covering sessions and leads.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Fetch the session for a user identity, if any.
    async fn get_session(&self, user_id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Write (or overwrite) a session.
    async fn put_session(&self, session: &Session) -> Result<(), DatabaseError>;

    /// Drop a session.
    async fn delete_session(&self, user_id: &str) -> Result<(), DatabaseError>;

    // ── Leads ───────────────────────────────────────────────────────

    /// Append a finalized lead. No read-back is required by the funnel.
    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError>;

    /// Most recent leads, newest first. Operator convenience only.
    async fn recent_leads(&self, limit: usize) -> Result<Vec<Lead>, DatabaseError>;

    /// Total number of captured leads.
    async fn count_leads(&self) -> Result<u64, DatabaseError>;
}
