//! In-memory, observable mirror of the persisted session

use crate::types::{Session, User};
use std::fmt;
use tokio::sync::watch;

/// Point-in-time view of the auth state
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for AuthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSnapshot")
            .field("is_authenticated", &self.is_authenticated)
            .field("user", &self.user)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Shared auth state
///
/// Reads are synchronous. Observers get every change through [`AuthState::subscribe`].
/// Only the session coordinator writes to it.
pub struct AuthState {
    tx: watch::Sender<AuthSnapshot>,
}

impl AuthState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().access_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn set_session(&self, session: &Session) {
        self.tx.send_replace(AuthSnapshot {
            is_authenticated: true,
            user: Some(session.user.clone()),
            access_token: Some(session.access_token.clone()),
            refresh_token: session.refresh_token.clone(),
        });
    }

    /// Replace tokens after a refresh; the user is left as is
    pub(crate) fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        self.tx.send_modify(|state| {
            state.access_token = Some(access_token.to_string());
            if let Some(refresh_token) = refresh_token {
                state.refresh_token = Some(refresh_token.to_string());
            }
            state.is_authenticated = state.user.is_some();
        });
    }

    pub(crate) fn clear(&self) {
        self.tx.send_replace(AuthSnapshot::default());
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
