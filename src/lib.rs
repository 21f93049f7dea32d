//! # tgsession-rs
//!
//! Generate, validate and back up Telegram session strings using the
//! [grammers](https://github.com/Lonami/grammers) client library.
//!
//! ## Features
//!
//! - Validate session strings and report the account behind them
//! - Validate many session strings, sequentially or concurrently
//! - Generate session strings for user accounts (with 2FA) and bots
//! - Convert grammers session files into session strings
//! - Timestamped backups and txt/json/env exports
//!
//! ## Example
//!
//! ```rust,no_run
//! use tgsession_rs::{
//!     ApiCredentials, InspectorConfig, SessionInspector, SessionToken, TelegramConnector,
//! };
//!
//! # async fn run() -> Result<(), tgsession_rs::Error> {
//! let api = ApiCredentials::parse("12345", "0123456789abcdef0123456789abcdef")?;
//! let inspector = SessionInspector::new(TelegramConnector::new(api), InspectorConfig::default());
//!
//! let result = inspector.validate(&SessionToken::new("AQAAA...")).await;
//! if let Some(identity) = result.identity {
//!     println!("Logged in as {} ({})", identity.display_name(), identity.id);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod session;
mod credentials;
mod config;
mod inspector;
mod store;
mod telegram;
pub mod console;

pub use error::{Error, Result};
pub use session::{load_session_file, AccountKind, SessionToken};
pub use credentials::{normalize_phone, ApiCredentials, BotToken};
pub use config::{Config, InspectorConfig};
pub use inspector::{
    Connection, Connector, ErrorKind, Identity, SessionInspector, ValidationError,
    ValidationResult,
};
pub use store::{
    backup_file_name, export_file_name, ExportFormat, SessionRecord, SessionStore,
};
pub use telegram::{
    classify_authorization, classify_invocation, classify_rpc, GeneratedSession, LoginPrompt,
    SessionGenerator, TelegramConnection, TelegramConnector,
};

/// Application name shown in banners
pub const APP_NAME: &str = "Telegram Session Manager";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
