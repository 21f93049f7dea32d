//! Telegram backend built on grammers
//!
//! Implements [`Connector`] for real sessions, maps grammers failures onto
//! [`ValidationError`], and drives the login flows that produce new session
//! strings.

use async_trait::async_trait;
use chrono::Local;
use grammers_client::types::User;
use grammers_client::{Client, Config as ClientConfig, InitParams, SignInError};
use grammers_mtsender::{AuthorizationError, InvocationError, ReadError, RpcError};
use grammers_session::Session;

use crate::credentials::{ApiCredentials, BotToken};
use crate::inspector::{Connection, Connector, Identity, ValidationError};
use crate::session::SessionToken;
use crate::{Error, Result};

/// RPC errors meaning the session itself is no longer usable
const INVALID_SESSION_ERRORS: &[&str] = &[
    "AUTH_KEY_UNREGISTERED",
    "AUTH_KEY_INVALID",
    "AUTH_KEY_PERM_EMPTY",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
    "USER_DEACTIVATED",
    "USER_DEACTIVATED_BAN",
    "SESSION_PASSWORD_NEEDED",
    "ACCESS_TOKEN_INVALID",
    "ACCESS_TOKEN_EXPIRED",
];

/// Code Telegram uses for flood waits
const FLOOD_CODE: i32 = 420;

/// Code Telegram uses for authorization failures
const UNAUTHORIZED_CODE: i32 = 401;

/// Map an RPC error onto the validation taxonomy
pub fn classify_rpc(err: &RpcError) -> ValidationError {
    if err.code == FLOOD_CODE || err.name.starts_with("FLOOD_") {
        return ValidationError::RateLimited {
            wait: err.value.unwrap_or(0),
        };
    }

    if err.name == "SESSION_PASSWORD_NEEDED" {
        return ValidationError::invalid_credential(
            "two-factor authentication is enabled and the session is not fully signed in",
        );
    }

    if err.code == UNAUTHORIZED_CODE || INVALID_SESSION_ERRORS.contains(&err.name.as_str()) {
        return ValidationError::invalid_credential(format!(
            "session is invalid or expired ({})",
            err.name
        ));
    }

    ValidationError::unknown(err.to_string())
}

/// Map any invocation failure onto the validation taxonomy
pub fn classify_invocation(err: &InvocationError) -> ValidationError {
    match err {
        InvocationError::Rpc(rpc) => classify_rpc(rpc),
        // The connection broke before a response arrived
        InvocationError::Read(ReadError::Io(_) | ReadError::Transport(_))
        | InvocationError::Dropped => ValidationError::network(err.to_string()),
        other => ValidationError::unknown(other.to_string()),
    }
}

/// Map a connection/authorization failure onto the validation taxonomy
///
/// Failures outside of an invocation happen while generating the
/// authorization key, which means the network let us down.
pub fn classify_authorization(err: &AuthorizationError) -> ValidationError {
    match err {
        AuthorizationError::Invoke(invocation) => classify_invocation(invocation),
        other => ValidationError::network(other.to_string()),
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            id: user.id(),
            first_name: user.first_name().to_string(),
            last_name: user.last_name().map(str::to_string),
            username: user.username().map(str::to_string),
            phone: user.phone().map(str::to_string),
            is_premium: user.raw.premium,
            is_bot: user.is_bot(),
            is_verified: user.verified(),
        }
    }
}

fn init_params() -> InitParams {
    InitParams {
        // Flood waits are reported to the caller, never slept on
        flood_sleep_threshold: 0,
        ..Default::default()
    }
}

async fn open_client(
    api: &ApiCredentials,
    session: Session,
) -> std::result::Result<Client, AuthorizationError> {
    tracing::debug!("Connecting to Telegram with api_id={}", api.api_id);
    Client::connect(ClientConfig {
        session,
        api_id: api.api_id,
        api_hash: api.api_hash.clone(),
        params: init_params(),
    })
    .await
}

/// Decode a session string into a grammers session
fn load_session(token: &SessionToken) -> std::result::Result<Session, ValidationError> {
    let bytes = token
        .to_session_bytes()
        .map_err(|e| ValidationError::invalid_credential(e.to_string()))?;
    Session::load(&bytes)
        .map_err(|_| ValidationError::invalid_credential("session string is malformed"))
}

fn export_session(client: &Client) -> SessionToken {
    SessionToken::from_session_bytes(&client.session().save())
}

/// [`Connector`] that talks to Telegram
#[derive(Debug, Clone)]
pub struct TelegramConnector {
    api: ApiCredentials,
}

impl TelegramConnector {
    pub fn new(api: ApiCredentials) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Connector for TelegramConnector {
    type Connection = TelegramConnection;

    async fn connect(
        &self,
        token: &SessionToken,
    ) -> std::result::Result<TelegramConnection, ValidationError> {
        let session = load_session(token)?;
        let client = open_client(&self.api, session)
            .await
            .map_err(|e| classify_authorization(&e))?;

        // The client is dropped, and the socket closed, on every early return
        let authorized = client
            .is_authorized()
            .await
            .map_err(|e| classify_invocation(&e))?;
        if !authorized {
            return Err(ValidationError::invalid_credential(
                "session holds no authorized account",
            ));
        }

        Ok(TelegramConnection {
            client: Some(client),
        })
    }
}

/// An authorized grammers client
pub struct TelegramConnection {
    client: Option<Client>,
}

#[async_trait]
impl Connection for TelegramConnection {
    async fn current_identity(&mut self) -> std::result::Result<Identity, ValidationError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ValidationError::network("connection already closed"))?;
        let me = client.get_me().await.map_err(|e| classify_invocation(&e))?;
        Ok(Identity::from(&me))
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("Disconnected from Telegram");
        }
    }
}

/// Interactive input needed while logging in
pub trait LoginPrompt {
    /// The login code Telegram sent to the account
    fn login_code(&self) -> Result<String>;

    /// The two-factor authentication password
    fn password(&self, hint: Option<&str>) -> Result<String>;
}

/// A freshly generated session string and its account
#[derive(Debug, Clone)]
pub struct GeneratedSession {
    pub token: SessionToken,
    pub identity: Identity,
}

/// Logs in to Telegram to produce new session strings
#[derive(Debug, Clone)]
pub struct SessionGenerator {
    api: ApiCredentials,
}

impl SessionGenerator {
    pub fn new(api: ApiCredentials) -> Self {
        Self { api }
    }

    async fn fresh_client(&self) -> Result<Client> {
        open_client(&self.api, Session::new())
            .await
            .map_err(Error::telegram)
    }

    /// Log in as a user account
    ///
    /// `phone` must already be normalized. The prompt is asked for the login
    /// code and, when the account has 2FA enabled, for its password.
    pub async fn user_session<P: LoginPrompt>(
        &self,
        phone: &str,
        prompt: &P,
    ) -> Result<GeneratedSession> {
        let client = self.fresh_client().await?;

        let login_token = client
            .request_login_code(phone)
            .await
            .map_err(Error::telegram)?;
        tracing::info!("Login code requested");

        let code = prompt.login_code()?;
        let user = match client.sign_in(&login_token, code.trim()).await {
            Ok(user) => user,
            Err(SignInError::PasswordRequired(password_token)) => {
                tracing::info!("Account has two-factor authentication enabled");
                let password = prompt.password(password_token.hint())?;
                client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(Error::telegram)?
            }
            Err(SignInError::SignUpRequired { .. }) => return Err(Error::SignUpRequired),
            Err(e) => return Err(Error::telegram(e)),
        };

        let identity = Identity::from(&user);
        tracing::info!("Signed in as user id={}", identity.id);

        Ok(GeneratedSession {
            token: export_session(&client),
            identity,
        })
    }

    /// Log in as a bot account
    pub async fn bot_session(&self, bot_token: &BotToken) -> Result<GeneratedSession> {
        let client = self.fresh_client().await?;

        let user = client
            .bot_sign_in(bot_token.expose())
            .await
            .map_err(Error::telegram)?;

        let identity = Identity::from(&user);
        tracing::info!("Signed in as bot id={}", identity.id);

        Ok(GeneratedSession {
            token: export_session(&client),
            identity,
        })
    }

    /// Post a session string to the account's own Saved Messages
    pub async fn send_to_saved_messages(&self, token: &SessionToken) -> Result<()> {
        let session = load_session(token).map_err(|e| Error::invalid_session(e.to_string()))?;
        let client = open_client(&self.api, session)
            .await
            .map_err(Error::telegram)?;

        let me = client.get_me().await.map_err(Error::telegram)?;
        client
            .send_message(me.pack(), saved_message_text(token))
            .await
            .map_err(Error::telegram)?;

        tracing::info!("Session string sent to Saved Messages");
        Ok(())
    }
}

fn saved_message_text(token: &SessionToken) -> String {
    format!(
        "🔑 Telegram Session String\n\n{}\n\n\
         ⚠️ Security Warning:\n\
         • Keep this string private and secure\n\
         • Do not share it with anyone\n\
         • It provides full access to your account\n\
         • Store it in a safe location\n\n\
         Generated on: {}",
        token.expose(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::ErrorKind;

    fn rpc(code: i32, name: &str, value: Option<u32>) -> RpcError {
        RpcError {
            code,
            name: name.to_string(),
            value,
            caused_by: None,
        }
    }

    #[test]
    fn test_flood_wait_is_rate_limited() {
        let err = classify_rpc(&rpc(420, "FLOOD_WAIT", Some(30)));
        assert_eq!(err, ValidationError::RateLimited { wait: 30 });

        let premium = classify_rpc(&rpc(420, "FLOOD_PREMIUM_WAIT", Some(5)));
        assert_eq!(premium.retry_after(), Some(5));
    }

    #[test]
    fn test_revoked_sessions_are_invalid() {
        for name in ["AUTH_KEY_UNREGISTERED", "SESSION_REVOKED", "USER_DEACTIVATED_BAN"] {
            let err = classify_rpc(&rpc(401, name, None));
            assert_eq!(err.kind(), ErrorKind::InvalidCredential, "{}", name);
        }
        // Listed names are invalid even with an unexpected code
        let err = classify_rpc(&rpc(400, "ACCESS_TOKEN_INVALID", None));
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[test]
    fn test_password_needed_is_invalid() {
        let err = classify_rpc(&rpc(401, "SESSION_PASSWORD_NEEDED", None));
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[test]
    fn test_other_rpc_errors_are_unknown() {
        let err = classify_rpc(&rpc(500, "INTERNAL_SERVER_ERROR", None));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_invocation_classification() {
        let io = InvocationError::Read(ReadError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        )));
        assert_eq!(classify_invocation(&io).kind(), ErrorKind::NetworkFailure);
        assert_eq!(
            classify_invocation(&InvocationError::Dropped).kind(),
            ErrorKind::NetworkFailure
        );

        let flood = InvocationError::Rpc(rpc(420, "FLOOD_WAIT", Some(12)));
        assert_eq!(classify_invocation(&flood).retry_after(), Some(12));
    }

    #[test]
    fn test_malformed_session_strings() {
        for token in ["not base64!", "Zm9vYmFy"] {
            assert!(
                matches!(
                    load_session(&SessionToken::new(token)),
                    Err(e) if e.kind() == ErrorKind::InvalidCredential
                ),
                "{}",
                token
            );
        }
    }

    #[test]
    fn test_session_roundtrip_through_token() {
        let token = SessionToken::from_session_bytes(&Session::new().save());
        assert!(load_session(&token).is_ok());
    }

    #[test]
    fn test_flood_sleep_disabled() {
        assert_eq!(init_params().flood_sleep_threshold, 0);
    }

    #[test]
    fn test_saved_message_contains_token() {
        let text = saved_message_text(&SessionToken::new("AQIDBA=="));
        assert!(text.contains("AQIDBA=="));
        assert!(text.contains("Generated on:"));
    }
}
