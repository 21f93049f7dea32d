//! Session inspector
//!
//! Opens a short-lived connection with a session string, asks who it belongs
//! to and reports the outcome as a [`ValidationResult`]. The inspector is
//! generic over a [`Connector`] so the Telegram backend can be swapped for a
//! fake in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::InspectorConfig;
use crate::session::{AccountKind, SessionToken};

/// Profile of the account a session string authenticates as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub is_premium: bool,
    pub is_bot: bool,
    pub is_verified: bool,
}

impl Identity {
    /// Identity with only the id and first name set
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            phone: None,
            is_premium: false,
            is_bot: false,
            is_verified: false,
        }
    }

    pub fn kind(&self) -> AccountKind {
        if self.is_bot {
            AccountKind::Bot
        } else {
            AccountKind::User
        }
    }

    /// First and last name joined
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    /// Name followed by `(@username)` when the account has one
    pub fn display_name(&self) -> String {
        let name = if self.is_bot {
            self.first_name.clone()
        } else {
            self.full_name()
        };
        match &self.username {
            Some(username) => format!("{} (@{})", name, username),
            None => name,
        }
    }
}

/// Why a session string could not be validated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// Rejected by Telegram as unregistered, revoked or malformed
    #[error("invalid session: {reason}")]
    InvalidCredential { reason: String },

    /// Telegram demands a wait before the next request
    #[error("rate limited, retry in {wait} seconds")]
    RateLimited { wait: u32 },

    /// Transient connectivity problem
    #[error("network failure: {message}")]
    NetworkFailure { message: String },

    #[error("validation failed: {message}")]
    Unknown { message: String },
}

/// Discriminant of [`ValidationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCredential,
    RateLimited,
    NetworkFailure,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidCredential => "invalid credential",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::NetworkFailure => "network failure",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl ValidationError {
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            reason: reason.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            ValidationError::RateLimited { .. } => ErrorKind::RateLimited,
            ValidationError::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            ValidationError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Seconds to wait before retrying, for rate limit errors
    pub fn retry_after(&self) -> Option<u32> {
        match self {
            ValidationError::RateLimited { wait } => Some(*wait),
            _ => None,
        }
    }
}

/// Outcome of one validation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<ValidationError>,
    pub identity: Option<Identity>,
}

impl ValidationResult {
    pub fn valid(identity: Identity) -> Self {
        Self {
            is_valid: true,
            error: None,
            identity: Some(identity),
        }
    }

    pub fn invalid(error: ValidationError) -> Self {
        Self {
            is_valid: false,
            error: Some(error),
            identity: None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(ValidationError::kind)
    }
}

impl From<Result<Identity, ValidationError>> for ValidationResult {
    fn from(outcome: Result<Identity, ValidationError>) -> Self {
        match outcome {
            Ok(identity) => Self::valid(identity),
            Err(error) => Self::invalid(error),
        }
    }
}

/// Opens connections authenticated by a session string
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    async fn connect(&self, token: &SessionToken) -> Result<Self::Connection, ValidationError>;
}

/// An open, authenticated connection
#[async_trait]
pub trait Connection: Send {
    /// Fetch the profile of the authenticated account
    async fn current_identity(&mut self) -> Result<Identity, ValidationError>;

    /// Release the connection. Must be idempotent.
    fn disconnect(&mut self);
}

/// Disconnects the wrapped connection when dropped
///
/// Dropping covers early returns, errors, timeouts and a caller abandoning
/// the future mid-request.
struct ConnectionGuard<C: Connection> {
    conn: C,
}

impl<C: Connection> ConnectionGuard<C> {
    fn new(conn: C) -> Self {
        Self { conn }
    }
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.conn.disconnect();
    }
}

/// Validates session strings through a [`Connector`]
pub struct SessionInspector<C> {
    connector: C,
    config: InspectorConfig,
}

impl<C: Connector> SessionInspector<C> {
    pub fn new(connector: C, config: InspectorConfig) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Validate a single session string
    ///
    /// Never fails: every error is folded into the returned result. A blank
    /// token is rejected without touching the connector.
    pub async fn validate(&self, token: &SessionToken) -> ValidationResult {
        if token.is_blank() {
            return ValidationResult::invalid(ValidationError::invalid_credential(
                "session string is empty",
            ));
        }

        let outcome = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.inspect(token)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ValidationError::network(format!(
                    "timed out after {}s",
                    limit.as_secs_f32()
                ))),
            },
            None => self.inspect(token).await,
        };

        match &outcome {
            Ok(identity) => tracing::info!(
                "Session {} is valid: id={}, kind={}",
                token.preview(),
                identity.id,
                identity.kind()
            ),
            Err(e) => tracing::info!("Session {} is not valid: {}", token.preview(), e),
        }

        outcome.into()
    }

    async fn inspect(&self, token: &SessionToken) -> Result<Identity, ValidationError> {
        tracing::debug!("Connecting with session {}", token.preview());
        let mut conn = ConnectionGuard::new(self.connector.connect(token).await?);

        let identity = conn.current_identity().await?;
        if identity.id <= 0 {
            return Err(ValidationError::unknown(format!(
                "server returned non-positive account id {}",
                identity.id
            )));
        }

        Ok(identity)
    }

    /// Validate every token independently
    ///
    /// The result holds exactly one entry per input token, keyed by its
    /// position in `tokens`.
    pub async fn validate_many(
        &self,
        tokens: &[SessionToken],
    ) -> BTreeMap<usize, ValidationResult> {
        let concurrency = self.config.batch_concurrency.max(1);
        tracing::info!(
            "Validating {} sessions (concurrency {})",
            tokens.len(),
            concurrency
        );

        if concurrency > 1 {
            return stream::iter(tokens.iter().enumerate())
                .map(|(index, token)| async move { (index, self.validate(token).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        }

        let mut results = BTreeMap::new();
        for (index, token) in tokens.iter().enumerate() {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            tracing::debug!("Validating session {}/{}", index + 1, tokens.len());
            results.insert(index, self.validate(token).await);
        }
        results
    }
}
