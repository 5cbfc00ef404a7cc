//! Local-mode identity. INSECURE BY DESIGN: this is a development
//! fallback, not a security model. `sign_in` accepts any password for a
//! known email and no credential is ever stored. Real verification
//! belongs to the remote identity provider.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::json;

use crate::domain::{Role, Session, User};
use crate::error::{AppResult, Error};
use crate::gateway::{Gateway, GatewayError, Query};

use super::store::LocalStore;

pub const SESSION_KEY: &str = "session";
pub const DEFAULT_SESSION_HOURS: i64 = 24;

const USERS: &str = "users";

pub struct LocalAuth {
    store: Arc<LocalStore>,
    session_hours: i64,
}

impl LocalAuth {
    pub fn new(store: Arc<LocalStore>, session_hours: i64) -> Self {
        Self {
            store,
            session_hours,
        }
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let needle = email.trim().to_lowercase();
        let rows = self.store.select(USERS, Query::new()).await?;
        for row in rows {
            let user: User =
                serde_json::from_value(row).map_err(|e| Error::Remote(GatewayError::Serde(e)))?;
            if user.email.to_lowercase() == needle {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// Create a user. Emails are unique, compared case-insensitively.
    pub async fn sign_up(&self, email: &str, name: &str) -> AppResult<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::Validation("a valid email is required".into()));
        }
        if name.trim().is_empty() {
            return Err(Error::Validation("name must not be blank".into()));
        }
        if self.find_by_email(email).await?.is_some() {
            return Err(Error::Duplicate(format!(
                "email '{}' is already registered",
                email
            )));
        }

        let row = self
            .store
            .insert(
                USERS,
                json!({
                    "email": email,
                    "name": name.trim(),
                    "role": Role::Member,
                    "last_login_at": null,
                }),
            )
            .await?;
        serde_json::from_value(row).map_err(|e| Error::Remote(GatewayError::Serde(e)))
    }

    /// Sign in a known email. The password goes unchecked (see module
    /// doc). A fresh session replaces any stored one.
    pub async fn sign_in(&self, email: &str, _password: &str) -> AppResult<Session> {
        let user = self.find_by_email(email).await?.ok_or(Error::NotFound)?;
        let now = Utc::now();
        let row = self
            .store
            .update(USERS, &user.id, json!({ "last_login_at": now }))
            .await?;
        let user: User =
            serde_json::from_value(row).map_err(|e| Error::Remote(GatewayError::Serde(e)))?;

        let session = Session {
            token: generate_token(),
            user,
            created_at: now,
            expires_at: now + Duration::hours(self.session_hours),
        };
        let value = serde_json::to_value(&session)
            .map_err(|e| Error::Remote(GatewayError::Serde(e)))?;
        self.store.write_blob(SESSION_KEY, &value)?;
        tracing::info!(email = %session.user.email, "Signed in (local mode)");
        Ok(session)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.store.remove_blob(SESSION_KEY)?;
        Ok(())
    }

    /// Read the current session. Expiry is checked on every call, not by
    /// background eviction; an expired or unreadable session blob is
    /// cleared and treated as absent.
    pub async fn session(&self) -> AppResult<Option<Session>> {
        let Some(value) = self.store.read_blob(SESSION_KEY)? else {
            return Ok(None);
        };
        let session: Session = match serde_json::from_value(value) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Clearing unreadable session blob: {}", e);
                self.store.remove_blob(SESSION_KEY)?;
                return Ok(None);
            }
        };
        if session.is_expired(Utc::now()) {
            self.store.remove_blob(SESSION_KEY)?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn current_user(&self) -> AppResult<Option<User>> {
        Ok(self.session().await?.map(|s| s.user))
    }
}

/// 32-byte hex session token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
