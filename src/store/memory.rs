//! In-memory backend — used when no database path is configured, and in
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::funnel::model::{Lead, Session};
use crate::store::traits::Database;

/// Process-memory database. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
    leads: RwLock<Vec<Lead>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_session(&self, user_id: &str) -> Result<Option<Session>, DatabaseError> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn put_session(&self, session: &Session) -> Result<(), DatabaseError> {
        self.sessions
            .write()
            .await
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.sessions.write().await.remove(user_id);
        Ok(())
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        self.leads.write().await.push(lead.clone());
        Ok(())
    }

    async fn recent_leads(&self, limit: usize) -> Result<Vec<Lead>, DatabaseError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().rev().take(limit).cloned().collect())
    }

    async fn count_leads(&self) -> Result<u64, DatabaseError> {
        Ok(self.leads.read().await.len() as u64)
    }
}
