//! Resolution of the active session user, done once before command
//! dispatch. Auth-gated handlers take the resolved [`User`] as an argument.

use thiserror::Error;

use crate::config::Config;
use crate::storage::{Database, StoreError, User};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not logged in (run 'rivulet login <name>' or 'rivulet register <name>' first)")]
    NotLoggedIn,
}

/// The session identity for this invocation.
#[derive(Debug, Clone)]
pub enum Session {
    Authenticated(User),
    Anonymous,
}

impl Session {
    /// Resolve the configured user name against the user store. A name that
    /// no longer resolves (e.g. after `reset`) is anonymous, not an error.
    pub async fn resolve(db: &Database, config: &Config) -> Result<Self, StoreError> {
        match config.current_user_name.as_deref() {
            Some(name) => Ok(db
                .get_user(name)
                .await?
                .map(Session::Authenticated)
                .unwrap_or(Session::Anonymous)),
            None => Ok(Session::Anonymous),
        }
    }

    /// The authenticated user, or the error gated commands report.
    pub fn require(self) -> Result<User, SessionError> {
        match self {
            Session::Authenticated(user) => Ok(user),
            Session::Anonymous => Err(SessionError::NotLoggedIn),
        }
    }
}
