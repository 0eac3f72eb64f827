//! Configuration module for Gmail accounts and server settings
//!
//! All configuration is loaded from environment variables following the pattern
//! `MAIL_GMAIL_<SEGMENT>_<KEY>`. Account segments are discovered by scanning for
//! `MAIL_GMAIL_*_ACCESS_TOKEN` variables.

use std::collections::BTreeMap;
use std::env;
use std::env::VarError;
use std::path::PathBuf;

use regex::Regex;
use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

/// Default Gmail REST API root
const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail account configuration
///
/// Holds the bearer token for a single mailbox. Token acquisition and refresh
/// happen outside this process; the token is stored in a `SecretString` to
/// prevent accidental logging.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Account identifier (lowercase, used as default `account_id` parameter)
    pub account_id: String,
    /// Gmail user id path segment (`me` for the token owner)
    pub user_id: String,
    /// OAuth access token
    pub access_token: SecretString,
}

/// Server-wide configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// All configured accounts, keyed by `account_id`
    pub accounts: BTreeMap<String, AccountConfig>,
    /// Gmail API base URL (without `/users/...`)
    pub api_base_url: String,
    /// Whether send, draft, and reply tools are enabled
    pub write_enabled: bool,
    /// Per-request timeout for Gmail API calls in milliseconds
    pub request_timeout_ms: u64,
    /// Directory downloaded attachments are written to
    pub download_dir: PathBuf,
}

impl ServerConfig {
    /// Load all configuration from environment variables
    ///
    /// Discovers accounts by scanning for `MAIL_GMAIL_*_ACCESS_TOKEN` patterns.
    /// If no accounts are explicitly defined, a `default` account is required
    /// via `MAIL_GMAIL_DEFAULT_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if required environment variables are missing
    /// or malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_GMAIL_DEFAULT_ACCESS_TOKEN=ya29.a0...
    /// MAIL_GMAIL_WORK_ACCESS_TOKEN=ya29.b1...
    /// MAIL_GMAIL_WORK_USER_ID=me
    /// MAIL_GMAIL_WRITE_ENABLED=true
    /// MAIL_GMAIL_DOWNLOAD_DIR=/tmp/attachments
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let account_pattern = Regex::new(r"^MAIL_GMAIL_([A-Z0-9_]+)_ACCESS_TOKEN$")
            .map_err(|e| AppError::Internal(format!("invalid account regex: {e}")))?;

        let mut account_segments: Vec<String> = env::vars()
            .filter_map(|(k, _)| {
                account_pattern
                    .captures(&k)
                    .and_then(|c| c.get(1).map(|m| m.as_str().to_owned()))
            })
            .collect();

        if account_segments.is_empty() {
            account_segments.push("DEFAULT".to_owned());
        }

        account_segments.sort();
        account_segments.dedup();

        let mut accounts = BTreeMap::new();
        for seg in account_segments {
            let account = load_account(&seg)?;
            accounts.insert(account.account_id.clone(), account);
        }

        let api_base_url = match env::var("MAIL_GMAIL_API_BASE_URL") {
            Ok(v) if !v.trim().is_empty() => v.trim().trim_end_matches('/').to_owned(),
            _ => DEFAULT_API_BASE_URL.to_owned(),
        };

        Ok(Self {
            accounts,
            api_base_url,
            write_enabled: parse_bool_env("MAIL_GMAIL_WRITE_ENABLED", false)?,
            request_timeout_ms: parse_u64_env("MAIL_GMAIL_REQUEST_TIMEOUT_MS", 30_000)?,
            download_dir: env::var("MAIL_GMAIL_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        })
    }

    /// Get account configuration by ID
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account ID is not configured.
    pub fn get_account(&self, account_id: &str) -> AppResult<&AccountConfig> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| AppError::NotFound(format!("account '{account_id}' is not configured")))
    }
}

/// Load a single account configuration from environment
///
/// Reads `MAIL_GMAIL_<SEGMENT>_ACCESS_TOKEN` and optional `_USER_ID`.
/// Normalizes the segment name to lowercase for `account_id`.
fn load_account(segment: &str) -> AppResult<AccountConfig> {
    let prefix = format!("MAIL_GMAIL_{}_", sanitize_segment(segment));
    let access_token = required_env(&format!("{prefix}ACCESS_TOKEN"))?;
    let user_id = env::var(format!("{prefix}USER_ID"))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "me".to_owned());

    Ok(AccountConfig {
        account_id: segment.to_ascii_lowercase(),
        user_id,
        access_token: SecretString::new(access_token.into()),
    })
}

/// Read a required environment variable, returning error if missing or empty
fn required_env(key: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_owned()),
        _ => Err(AppError::InvalidInput(format!(
            "missing required environment variable {key}"
        ))),
    }
}

/// Sanitize an account segment to uppercase alphanumeric/underscore
fn sanitize_segment(seg: &str) -> String {
    let mut out = String::with_capacity(seg.len());
    for ch in seg.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push('_');
        }
    }
    out.trim_matches('_').to_owned()
}

/// Parse a boolean environment variable with flexible values
///
/// Accepts: `1`, `true`, `yes`, `y`, `on` (truthy) or `0`, `false`, `no`,
/// `n`, `off` (falsy). Case-insensitive. Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set to an unrecognized value.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::InvalidInput(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u64` environment variable with default fallback
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u64`.
fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(v) => v.trim().parse::<u64>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}
