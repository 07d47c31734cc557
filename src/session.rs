use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{KeyValueStore, SESSION_KEY};
use crate::models::Lga;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    FieldOfficer,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("ADMIN"),
            Self::FieldOfficer => f.write_str("FIELD_OFFICER"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ADMIN" => Ok(Self::Admin),
            "FIELD_OFFICER" | "OFFICER" => Ok(Self::FieldOfficer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub role: UserRole,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lga: Option<Lga>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("invalid administrator passcode")]
    InvalidPasscode,

    #[error("field officers must choose their assigned LGA")]
    MissingLga,

    #[error("no one is logged in; run `login` first")]
    NotLoggedIn,

    #[error("{0} is not an administrator")]
    NotAdmin(String),
}

pub fn login(
    role: UserRole,
    name: &str,
    lga: Option<Lga>,
    passcode: Option<&str>,
    admin_passcode: &str,
) -> Result<AuthUser, LoginError> {
    let name = name.trim();
    match role {
        UserRole::Admin => {
            if passcode != Some(admin_passcode) {
                return Err(LoginError::InvalidPasscode);
            }
            Ok(AuthUser {
                role,
                name: (if name.is_empty() { "State Admin" } else { name }).to_string(),
                lga: None,
            })
        }
        UserRole::FieldOfficer => {
            let lga = lga.ok_or(LoginError::MissingLga)?;
            Ok(AuthUser {
                role,
                name: (if name.is_empty() { "Officer" } else { name }).to_string(),
                lga: Some(lga),
            })
        }
    }
}

/// The logged-in user, persisted until logout.
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn current(&self) -> Option<AuthUser> {
        let raw = self.store.get(SESSION_KEY).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(error) => {
                tracing::warn!(%error, "stored session is unreadable, ignoring it");
                None
            }
        }
    }

    pub fn save(&self, user: &AuthUser) -> anyhow::Result<()> {
        let raw = serde_json::to_string(user)?;
        self.store
            .set(SESSION_KEY, &raw)
            .context("failed to persist the session")
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.store
            .remove(SESSION_KEY)
            .context("failed to clear the session")
    }

    pub fn require_user(&self) -> Result<AuthUser, LoginError> {
        self.current().ok_or(LoginError::NotLoggedIn)
    }

    pub fn require_admin(&self) -> Result<AuthUser, LoginError> {
        let user = self.require_user()?;
        if !user.is_admin() {
            return Err(LoginError::NotAdmin(user.name));
        }
        Ok(user)
    }
}
