//! Password gate in front of the admin panel.
//!
//! The secret is a fixed credential compared in-process. This keeps casual
//! visitors of the public display out of the admin screens; it is not an
//! access-control boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminFlag {
    pub authenticated: bool,
    pub login_time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Senha incorreta!")]
    InvalidSecret,
    #[error("session storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn load(&self) -> Result<Option<AdminFlag>, SessionError>;
    async fn save(&self, flag: &AdminFlag) -> Result<(), SessionError>;
    async fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { login_time: DateTime<Utc> },
}

pub struct AdminGate {
    store: Arc<dyn FlagStore>,
    secret: String,
    state: SessionState,
}

impl AdminGate {
    /// Rebuilds the gate from whatever flag is stored. An unreadable flag
    /// counts as logged out.
    pub async fn restore(store: Arc<dyn FlagStore>, secret: impl Into<String>) -> Self {
        let state = match store.load().await {
            Ok(Some(flag)) if flag.authenticated => SessionState::Authenticated {
                login_time: flag.login_time,
            },
            Ok(_) => SessionState::Unauthenticated,
            Err(err) => {
                warn!("ignoring unreadable admin flag: {err}");
                SessionState::Unauthenticated
            }
        };
        Self {
            store,
            secret: secret.into(),
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub async fn login(
        &mut self,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionState, SessionError> {
        if submitted != self.secret {
            warn!("admin login rejected");
            return Err(SessionError::InvalidSecret);
        }
        self.store
            .save(&AdminFlag {
                authenticated: true,
                login_time: now,
            })
            .await?;
        self.state = SessionState::Authenticated { login_time: now };
        info!("admin logged in");
        Ok(self.state)
    }

    pub async fn logout(&mut self) -> Result<(), SessionError> {
        self.store.clear().await?;
        self.state = SessionState::Unauthenticated;
        info!("admin logged out");
        Ok(())
    }
}
