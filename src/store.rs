//! Backup and export storage for session strings
//!
//! Handles file naming, backing up files before they are overwritten, and
//! rendering sessions into the supported export formats.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::Config;
use crate::inspector::Identity;
use crate::session::{AccountKind, SessionToken};
use crate::{Error, Result};

/// Name of the variable written by [`ExportFormat::Env`]
pub const SESSION_ENV_VAR: &str = "TG_SESSION_STRING";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Output format for exported session strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// The bare session string
    #[default]
    Txt,
    /// Session string with account metadata
    Json,
    /// A `KEY="value"` line for `.env` files
    Env,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Env => "env",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "json" => Ok(ExportFormat::Json),
            "env" | "dotenv" => Ok(ExportFormat::Env),
            other => Err(Error::UnsupportedFormat {
                name: other.to_string(),
            }),
        }
    }
}

/// A session string together with what is known about its account
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: SessionToken,
    pub kind: AccountKind,
    pub identity: Option<Identity>,
    pub created_at: DateTime<Local>,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    session_string: &'a str,
    account_type: AccountKind,
    user_id: Option<i64>,
    first_name: Option<&'a str>,
    username: Option<&'a str>,
    created: String,
}

impl SessionRecord {
    pub fn new(token: SessionToken, kind: AccountKind, identity: Option<Identity>) -> Self {
        Self {
            token,
            kind,
            identity,
            created_at: Local::now(),
        }
    }

    /// Identifier used in export file names: the account id when known
    pub fn identifier(&self) -> String {
        match &self.identity {
            Some(identity) => identity.id.to_string(),
            None => "unknown".to_string(),
        }
    }

    /// Render the record in the given format
    pub fn render(&self, format: ExportFormat) -> Result<String> {
        let rendered = match format {
            ExportFormat::Txt => self.token.expose().to_string(),
            ExportFormat::Env => format!("{}=\"{}\"\n", SESSION_ENV_VAR, self.token.expose()),
            ExportFormat::Json => {
                let identity = self.identity.as_ref();
                let export = JsonExport {
                    session_string: self.token.expose(),
                    account_type: self.kind,
                    user_id: identity.map(|i| i.id),
                    first_name: identity.map(|i| i.first_name.as_str()),
                    username: identity.and_then(|i| i.username.as_deref()),
                    created: self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                };
                serde_json::to_string_pretty(&export)?
            }
        };
        Ok(rendered)
    }
}

/// `<base>_backup_<YYYYmmdd_HHMMSS>.<ext>`
pub fn backup_file_name(base: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{}_backup_{}.{}", base, at.format(TIMESTAMP_FORMAT), extension)
}

/// `<kind>_session_<identifier>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn export_file_name(
    kind: AccountKind,
    identifier: &str,
    format: ExportFormat,
    at: DateTime<Local>,
) -> String {
    format!(
        "{}_session_{}_{}.{}",
        kind,
        identifier,
        at.format(TIMESTAMP_FORMAT),
        format.extension()
    )
}

/// Writes session files, keeping backups of anything it overwrites
#[derive(Debug, Clone)]
pub struct SessionStore {
    backup_dir: PathBuf,
    export_dir: PathBuf,
    create_backups: bool,
}

impl SessionStore {
    pub fn new(config: &Config) -> Self {
        Self::with_dirs(&config.backup_dir, &config.export_dir, config.create_backups)
    }

    pub fn with_dirs<P: AsRef<Path>, Q: AsRef<Path>>(
        backup_dir: P,
        export_dir: Q,
        create_backups: bool,
    ) -> Self {
        Self {
            backup_dir: backup_dir.as_ref().to_path_buf(),
            export_dir: export_dir.as_ref().to_path_buf(),
            create_backups,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Create the backup and export directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.backup_dir, &self.export_dir] {
            if !dir.is_dir() {
                tracing::debug!("Creating directory {:?}", dir);
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Write `content` to `path`
    ///
    /// An existing file is moved into the backup directory first when backups
    /// are enabled. Returns where the old file went.
    pub fn write<P: AsRef<Path>>(&self, path: P, content: &str) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        let mut backup = None;

        if self.create_backups && path.is_file() {
            let base = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("session");
            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("txt");
            fs::create_dir_all(&self.backup_dir)?;
            let backup_path = self
                .backup_dir
                .join(backup_file_name(base, extension, Local::now()));

            fs::rename(path, &backup_path)?;
            tracing::info!("Backed up {:?} to {:?}", path, backup_path);
            backup = Some(backup_path);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        tracing::debug!("Wrote {} bytes to {:?}", content.len(), path);

        Ok(backup)
    }

    /// Export a record into the export directory
    pub fn export(&self, record: &SessionRecord, format: ExportFormat) -> Result<PathBuf> {
        let name = export_file_name(
            record.kind,
            &record.identifier(),
            format,
            record.created_at,
        );
        let path = self.export_dir.join(name);
        self.write(&path, &record.render(format)?)?;
        tracing::info!("Exported {} session to {:?}", record.kind, path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn record() -> SessionRecord {
        let mut identity = Identity::new(42, "Ana");
        identity.username = Some("ana".into());
        SessionRecord {
            token: SessionToken::new("AQIDBA=="),
            kind: AccountKind::User,
            identity: Some(identity),
            created_at: at(),
        }
    }

    fn store_in(root: &Path, create_backups: bool) -> SessionStore {
        SessionStore::with_dirs(root.join("backups"), root.join("exports"), create_backups)
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            backup_file_name("user_session", "txt", at()),
            "user_session_backup_20240102_030405.txt"
        );
        assert_eq!(
            export_file_name(AccountKind::Bot, "777", ExportFormat::Json, at()),
            "bot_session_777_20240102_030405.json"
        );
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("dotenv".parse::<ExportFormat>().unwrap(), ExportFormat::Env);
        assert!(matches!(
            "yaml".parse::<ExportFormat>(),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_render_formats() {
        let record = record();
        assert_eq!(record.render(ExportFormat::Txt).unwrap(), "AQIDBA==");
        assert_eq!(
            record.render(ExportFormat::Env).unwrap(),
            "TG_SESSION_STRING=\"AQIDBA==\"\n"
        );

        let json: serde_json::Value =
            serde_json::from_str(&record.render(ExportFormat::Json).unwrap()).unwrap();
        assert_eq!(json["session_string"], "AQIDBA==");
        assert_eq!(json["account_type"], "user");
        assert_eq!(json["user_id"], 42);
        assert_eq!(json["username"], "ana");
        assert_eq!(json["created"], "2024-01-02 03:04:05");
    }

    #[test]
    fn test_write_backs_up_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), true);
        let target = dir.path().join("user_session.txt");

        assert_eq!(store.write(&target, "first").unwrap(), None);
        let backup = store.write(&target, "second").unwrap().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "first");
        assert!(backup.starts_with(store.backup_dir()));
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("user_session_backup_"));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn test_write_without_backups_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), false);
        let target = dir.path().join("s.txt");

        store.write(&target, "first").unwrap();
        assert_eq!(store.write(&target, "second").unwrap(), None);

        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        assert!(!store.backup_dir().exists());
    }

    #[test]
    fn test_export_writes_into_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), true);
        store.ensure_directories().unwrap();
        assert!(store.backup_dir().is_dir());

        let path = store.export(&record(), ExportFormat::Env).unwrap();

        assert_eq!(
            path,
            store.export_dir().join("user_session_42_20240102_030405.env")
        );
        assert!(fs::read_to_string(path).unwrap().contains("AQIDBA=="));
    }
}
