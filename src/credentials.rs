//! API credentials, phone numbers and bot tokens
//!
//! Everything here is checked locally before any request reaches Telegram.

use std::fmt;

use crate::{Error, Result};

/// Minimum length of an API hash issued by my.telegram.org
pub const MIN_API_HASH_LEN: usize = 32;

/// Minimum length of the secret half of a bot token
pub const MIN_BOT_SECRET_LEN: usize = 35;

/// Developer API id/hash pair used to open client connections
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl ApiCredentials {
    /// Parse credentials as typed by a user or read from the environment
    pub fn parse(api_id: &str, api_hash: &str) -> Result<Self> {
        let api_id = api_id.trim();
        let api_hash = api_hash.trim();

        if api_id.is_empty() {
            return Err(Error::invalid_api("API ID is required"));
        }
        if api_hash.is_empty() {
            return Err(Error::invalid_api("API Hash is required"));
        }

        let api_id: i32 = api_id
            .parse()
            .map_err(|_| Error::invalid_api("API ID must be a valid number"))?;
        if api_id <= 0 {
            return Err(Error::invalid_api("API ID must be a positive number"));
        }

        if api_hash.len() < MIN_API_HASH_LEN {
            return Err(Error::invalid_api(format!(
                "API Hash must be at least {} characters long",
                MIN_API_HASH_LEN
            )));
        }
        if !api_hash.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_api(
                "API Hash should contain only alphanumeric characters",
            ));
        }

        Ok(Self {
            api_id,
            api_hash: api_hash.to_string(),
        })
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

/// Normalize a phone number to `+<digits>`
///
/// Spaces, dashes and parentheses are dropped; 7 to 15 digits are accepted.
pub fn normalize_phone(input: &str) -> Result<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && (7..=15).contains(&digits.len());

    if !valid {
        return Err(Error::InvalidPhone {
            input: input.to_string(),
        });
    }

    Ok(format!("+{}", digits))
}

/// A bot token issued by BotFather: `<bot id>:<secret>`
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken {
    raw: String,
    bot_id: u64,
}

impl BotToken {
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        let (id, secret) = raw
            .split_once(':')
            .ok_or_else(|| Error::invalid_bot_token("expected <bot id>:<secret>"))?;

        if secret.contains(':') {
            return Err(Error::invalid_bot_token("expected exactly one ':'"));
        }
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::invalid_bot_token("bot id must be numeric"));
        }
        let bot_id = id
            .parse()
            .map_err(|_| Error::invalid_bot_token("bot id is out of range"))?;
        if secret.len() < MIN_BOT_SECRET_LEN {
            return Err(Error::invalid_bot_token(format!(
                "secret must be at least {} characters",
                MIN_BOT_SECRET_LEN
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            bot_id,
        })
    }

    /// Numeric id of the bot, the part before `:`
    pub fn bot_id(&self) -> u64 {
        self.bot_id
    }

    pub fn expose(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotToken")
            .field("bot_id", &self.bot_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_api_credentials_valid() {
        let creds = ApiCredentials::parse(" 12345 ", HASH).unwrap();
        assert_eq!(creds.api_id, 12345);
        assert_eq!(creds.api_hash, HASH);
        assert!(!format!("{:?}", creds).contains(HASH));
    }

    #[test]
    fn test_api_credentials_rejected() {
        for (id, hash) in [
            ("", HASH),
            ("123", ""),
            ("abc", HASH),
            ("-5", HASH),
            ("0", HASH),
            ("123", "tooshort"),
            ("123", "0123456789abcdef0123456789abcde!"),
        ] {
            let err = ApiCredentials::parse(id, hash).unwrap_err();
            assert!(
                matches!(err, Error::InvalidApiCredentials { .. }),
                "{:?}/{:?} gave {:?}",
                id,
                hash,
                err
            );
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+1 (555) 123-4567").unwrap(), "+15551234567");
        assert_eq!(normalize_phone("447700900123").unwrap(), "+447700900123");
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("+12345").is_err());
        assert!(normalize_phone("+1234567890123456").is_err());
        assert!(normalize_phone("+1555abc4567").is_err());
    }

    #[test]
    fn test_bot_token() {
        let secret = "A".repeat(MIN_BOT_SECRET_LEN);
        let token = BotToken::parse(&format!("123456:{}", secret)).unwrap();
        assert_eq!(token.bot_id(), 123456);
        assert!(!format!("{:?}", token).contains(&secret));

        assert!(BotToken::parse("123456").is_err());
        assert!(BotToken::parse(&format!("abc:{}", secret)).is_err());
        assert!(BotToken::parse("123456:short").is_err());
        assert!(BotToken::parse(&format!("1:2:{}", secret)).is_err());
    }
}
