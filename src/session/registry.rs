// Session registry: one pipeline per session key
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::{RagError, Result};
use crate::rag::{RagPipeline, RagServices};
use crate::types::{AnswerPayload, MemoryStats};

struct SessionState {
    pipeline: RagPipeline,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl SessionState {
    fn new(services: &Arc<RagServices>) -> Self {
        let now = Utc::now();
        Self {
            pipeline: services.pipeline(),
            created_at: now,
            last_active: now,
        }
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// Snapshot of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub memory: MemoryStats,
}

/// Owns every live session; each session's turns are serialized by its own lock
pub struct SessionRegistry {
    services: Arc<RagServices>,
    idle_ttl: Duration,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl SessionRegistry {
    /// Idle sessions expire after the configured `sessions.idle_ttl_secs`
    pub fn new(services: Arc<RagServices>) -> Self {
        let idle_ttl = services.config().session_idle_ttl();
        Self {
            services,
            idle_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh session under a random key
    ///
    /// Expired sessions are pruned first.
    pub async fn create(&self) -> String {
        self.prune_idle(self.idle_ttl).await;
        let id = Uuid::new_v4().to_string();
        let state = Arc::new(Mutex::new(SessionState::new(&self.services)));
        self.sessions.lock().await.insert(id.clone(), state);
        tracing::debug!(session = %id, "Session created");
        id
    }

    /// Register `key` if it is not known yet. Returns true when created.
    pub async fn open(&self, key: &str) -> bool {
        self.prune_idle(self.idle_ttl).await;
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(key) {
            return false;
        }
        sessions.insert(
            key.to_string(),
            Arc::new(Mutex::new(SessionState::new(&self.services))),
        );
        tracing::debug!(session = key, "Session created");
        true
    }

    async fn get(&self, key: &str) -> Result<Arc<Mutex<SessionState>>> {
        self.sessions
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| RagError::UnknownSession(key.to_string()))
    }

    /// Answer within the session's own conversation
    pub async fn ask(&self, key: &str, question: &str) -> Result<String> {
        let session = self.get(key).await?;
        let mut state = session.lock().await;
        state.touch();
        state.pipeline.generate_response(question).await
    }

    /// Caller payload; unknown keys fail like any other request error
    pub async fn answer(&self, key: &str, question: &str) -> AnswerPayload {
        let result = self.ask(key, question).await;
        if let Err(RagError::UnknownSession(ref id)) = result {
            tracing::warn!(session = %id, "Question for unknown session");
        }
        AnswerPayload::from_result(result)
    }

    pub async fn reset(&self, key: &str) -> Result<()> {
        let session = self.get(key).await?;
        let mut state = session.lock().await;
        state.touch();
        state.pipeline.reset_conversation();
        Ok(())
    }

    pub async fn stats(&self, key: &str) -> Result<MemoryStats> {
        let session = self.get(key).await?;
        let state = session.lock().await;
        Ok(state.pipeline.conversation_stats())
    }

    pub async fn info(&self, key: &str) -> Result<SessionInfo> {
        let session = self.get(key).await?;
        let state = session.lock().await;
        Ok(SessionInfo {
            id: key.to_string(),
            created_at: state.created_at,
            last_active: state.last_active,
            memory: state.pipeline.conversation_stats(),
        })
    }

    /// Drop the session and its conversation. Returns false for unknown keys.
    pub async fn end(&self, key: &str) -> bool {
        let removed = self.sessions.lock().await.remove(key).is_some();
        if removed {
            tracing::debug!(session = key, "Session ended");
        }
        removed
    }

    /// Remove sessions idle for longer than `ttl`; busy sessions are kept
    pub async fn prune_idle(&self, ttl: Duration) -> usize {
        let ttl = match chrono::Duration::from_std(ttl) {
            Ok(ttl) => ttl,
            Err(_) => return 0,
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(state) => state.last_active > cutoff,
            Err(_) => true,
        });
        let pruned = before - sessions.len();

        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "Idle sessions pruned");
        }
        pruned
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub fn services(&self) -> &Arc<RagServices> {
        &self.services
    }
}
