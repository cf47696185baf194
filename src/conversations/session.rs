use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ShoppingError};
use crate::gateway::AgentGateway;

/// One user message and the assistant's reply to it
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub timestamp: DateTime<Utc>,
}

/// A user's conversation, bound to exactly one remote thread
pub struct Session {
    pub session_id: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    turn_lock: Mutex<()>,
    turns: RwLock<Vec<Turn>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

impl Session {
    pub fn new(session_id: String, thread_id: String) -> Self {
        Self {
            session_id,
            thread_id,
            created_at: Utc::now(),
            turn_lock: Mutex::new(()),
            turns: RwLock::new(Vec::new()),
        }
    }

    /// Held for the duration of a turn so a session never has two runs in flight
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn_lock.lock().await
    }

    pub async fn record_turn(&self, user: &str, assistant: &str) {
        self.turns.write().await.push(Turn {
            user: user.to_string(),
            assistant: assistant.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub async fn turns(&self) -> Vec<Turn> {
        self.turns.read().await.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            thread_id: self.thread_id.clone(),
            created_at: self.created_at,
            turns: self.turns().await,
        }
    }
}

/// Live sessions keyed by session id
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Open a new remote thread and register a session for it
    pub async fn create(&self, gateway: &dyn AgentGateway) -> Result<Arc<Session>> {
        let thread_id = gateway.create_thread().await?;
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(session_id.clone(), thread_id));
        self.sessions.insert(session_id.clone(), session.clone());
        info!("Created session {} on thread {}", session_id, session.thread_id);
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ShoppingError::SessionNotFound(session_id.to_string()))
    }

    pub fn remove(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .remove(session_id)
            .map(|(_, session)| session)
            .ok_or_else(|| ShoppingError::SessionNotFound(session_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
