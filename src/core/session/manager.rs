use crate::core::session::session::Session;
use crate::domain::{
    config::{Address, Options, TransportMode},
    error::{RawComError, RawComResult},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Session manager for handling multiple devices, keyed by device name
pub struct SessionManager {
    /// Active sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Maximum number of sessions
    max_sessions: usize,
}

/// Session summary information
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub name: String,
    pub address: String,
    pub mode: TransportMode,
    pub pending: usize,
    pub idle: bool,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
        }
    }

    /// Create a session and register it under `address.name`
    pub async fn create_session(&self, address: Address, options: Options) -> RawComResult<Session> {
        let mut sessions = self.sessions.write().await;

        if sessions.len() >= self.max_sessions {
            return Err(RawComError::Session {
                message: format!("Maximum number of sessions ({}) reached", self.max_sessions),
            });
        }

        if sessions.contains_key(&address.name) {
            return Err(RawComError::Session {
                message: format!("Session with name '{}' already exists", address.name),
            });
        }

        let session = Session::new(address, options)?;
        sessions.insert(session.name().to_string(), session.clone());

        info!("Registered session '{}'", session.name());
        Ok(session)
    }

    /// Look up a session by device name
    pub async fn get_session(&self, name: &str) -> Option<Session> {
        self.sessions.read().await.get(name).cloned()
    }

    /// Check if session exists
    pub async fn has_session(&self, name: &str) -> bool {
        self.sessions.read().await.contains_key(name)
    }

    /// Unregister a session and close its transport
    pub async fn remove_session(&self, name: &str) -> RawComResult<()> {
        let session = self.sessions.write().await.remove(name);

        match session {
            Some(session) => {
                session.close().await;
                info!("Removed session '{}'", name);
                Ok(())
            }
            None => Err(RawComError::Session {
                message: format!("Session '{}' not found", name),
            }),
        }
    }

    /// List all sessions, sorted by name
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|session| SessionSummary {
                name: session.name().to_string(),
                address: session.address().to_string(),
                mode: session.mode(),
                pending: session.pending(),
                idle: session.is_idle(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Close every transport and forget all sessions
    pub async fn close_all_sessions(&self) {
        let drained: Vec<Session> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        let count = drained.len();

        for session in drained {
            session.close().await;
        }

        debug!("Closed {} sessions", count);
    }

    /// Get session count
    pub async fn get_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Get maximum session count
    pub fn get_max_sessions(&self) -> usize {
        self.max_sessions
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(64)
    }
}
