//! Session string representation

use std::fmt;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of characters shown by [`SessionToken::preview`]
const PREVIEW_LEN: usize = 12;

/// An opaque session string
///
/// The string is forwarded verbatim to the client library and never
/// rewritten. `Debug` output is redacted so tokens don't end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a session string as-is
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Encode serialized client session bytes as a session string
    pub fn from_session_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// Decode the session string back into serialized session bytes
    pub fn to_session_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.0.as_bytes())
            .map_err(|e| Error::invalid_session(format!("not valid base64: {}", e)))
    }

    /// The raw session string. Treat the result as a secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Length of the session string in characters
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Whether the session string has no characters at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A short prefix of the token, safe for tables and logs
    pub fn preview(&self) -> String {
        if self.len() <= PREVIEW_LEN {
            return "*".repeat(self.len());
        }
        let prefix: String = self.0.chars().take(PREVIEW_LEN).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("len", &self.len())
            .finish()
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Kind of Telegram account a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Bot,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::User => "user",
            AccountKind::Bot => "bot",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load a session file written by the client library and export it as a
/// session string
///
/// # Returns
/// - `Ok(SessionToken)` if the file holds a loadable session
/// - `Err(Error::FileNotFound)` if there is no such file
/// - `Err(Error::InvalidSession)` if the file is not a session
pub fn load_session_file<P: AsRef<Path>>(path: P) -> Result<SessionToken> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = fs::read(path)?;
    tracing::debug!("Read {} bytes from session file {:?}", bytes.len(), path);

    grammers_session::Session::load(&bytes)
        .map_err(|_| Error::invalid_session(format!("{:?} is not a session file", path)))?;

    Ok(SessionToken::from_session_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_bytes_roundtrip() {
        let token = SessionToken::from_session_bytes(b"foobar");
        assert_eq!(token.expose(), "Zm9vYmFy");
        assert_eq!(token.to_session_bytes().unwrap(), b"foobar");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let token = SessionToken::new("not base64 at all!");
        assert!(matches!(
            token.to_session_bytes(),
            Err(Error::InvalidSession { .. })
        ));
    }

    #[test]
    fn test_blank_tokens() {
        assert!(SessionToken::new("").is_blank());
        assert!(SessionToken::new("  \n\t").is_blank());
        assert!(!SessionToken::new("VALID123").is_blank());
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = SessionToken::new("super-secret-session");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("len"));
    }

    #[test]
    fn test_preview() {
        assert_eq!(SessionToken::new("abc").preview(), "***");
        assert_eq!(
            SessionToken::new("ABCDEFGHIJKLMNOP").preview(),
            "ABCDEFGHIJKL..."
        );
    }

    #[test]
    fn test_missing_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session_file(dir.path().join("nope.session")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_garbage_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.session");
        fs::write(&path, b"\x00\x01garbage").unwrap();
        assert!(matches!(
            load_session_file(&path),
            Err(Error::InvalidSession { .. })
        ));
    }

    #[test]
    fn test_account_kind_display() {
        assert_eq!(AccountKind::User.to_string(), "user");
        assert_eq!(AccountKind::Bot.to_string(), "bot");
    }
}
