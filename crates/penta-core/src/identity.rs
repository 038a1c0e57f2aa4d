//! Caller identity established by authentication.
//!
//! An [`Identity`] is whatever the first accepting authenticator returned.
//! Operations without an auth chain see [`Identity::Anonymous`].

use serde::{Deserialize, Serialize};

/// The caller behind a request.
///
/// # Example
///
/// ```rust
/// use penta_core::Identity;
///
/// let identity = Identity::user("user-123");
/// assert_eq!(identity.log_id(), "user:user-123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    /// An authenticated end user.
    User {
        /// Stable user identifier.
        user_id: String,
        /// Granted roles.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        roles: Vec<String>,
    },
    /// A machine client identified by an API key.
    ApiKey {
        /// Key identifier, never the secret itself.
        key_id: String,
        /// Granted scopes.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scopes: Vec<String>,
    },
    /// A bearer token accepted as-is.
    Token {
        /// Opaque token subject.
        subject: String,
    },
    /// Application-defined identity payload.
    Custom(serde_json::Value),
    /// No authentication performed.
    #[default]
    Anonymous,
}

impl Identity {
    /// Creates a user identity without roles.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    /// Creates an API key identity without scopes.
    #[must_use]
    pub fn api_key(key_id: impl Into<String>) -> Self {
        Self::ApiKey {
            key_id: key_id.into(),
            scopes: Vec::new(),
        }
    }

    /// Creates a token identity.
    #[must_use]
    pub fn token(subject: impl Into<String>) -> Self {
        Self::Token {
            subject: subject.into(),
        }
    }

    /// Returns `true` unless this is [`Identity::Anonymous`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Returns a string identifier suitable for logging and throttle keys.
    ///
    /// Never contains secrets:
    /// - User: `user:<user_id>`
    /// - ApiKey: `apikey:<key_id>`
    /// - Token: `token:<subject>`
    /// - Custom: `custom:<json>`
    /// - Anonymous: `anonymous`
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::User { user_id, .. } => format!("user:{user_id}"),
            Self::ApiKey { key_id, .. } => format!("apikey:{key_id}"),
            Self::Token { subject } => format!("token:{subject}"),
            Self::Custom(value) => format!("custom:{value}"),
            Self::Anonymous => "anonymous".to_string(),
        }
    }

    /// Returns roles (user roles or API key scopes).
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        match self {
            Self::User { roles, .. } => roles.iter().map(String::as_str).collect(),
            Self::ApiKey { scopes, .. } => scopes.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}
