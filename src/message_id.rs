//! Stable, opaque message identifier parsing and encoding
//!
//! Binds a Gmail message id to the configured account it was read from, so
//! a tool call cannot accidentally act on another account's message.

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Stable message identifier
///
/// # Format
///
/// `gmail:{account_id}:{provider_id}`
///
/// Gmail ids are hexadecimal, so the provider segment never contains colons.
///
/// # Example
///
/// ```text
/// gmail:default:18c2f0a9b1d4e5f6
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageId {
    /// Account identifier
    pub account_id: String,
    /// Gmail message id
    pub provider_id: String,
}

impl MessageId {
    /// Parse message ID from string
    ///
    /// Returns error if:
    /// - Does not start with `gmail:`
    /// - Does not have exactly 3 segments
    /// - Account or provider id segment is empty
    pub fn parse(raw: &str) -> AppResult<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != 3 {
            return Err(AppError::invalid("message_id must have exactly 3 segments"));
        }
        if parts[0] != "gmail" {
            return Err(AppError::invalid("message_id must start with 'gmail'"));
        }
        if parts[1].is_empty() {
            return Err(AppError::invalid("message_id account cannot be empty"));
        }
        let provider_id = parts[2];
        if provider_id.is_empty() || !provider_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::invalid(
                "message_id provider segment must be non-empty alphanumeric",
            ));
        }

        Ok(Self {
            account_id: parts[1].to_owned(),
            provider_id: provider_id.to_owned(),
        })
    }

    /// Encode message ID to its canonical string
    pub fn encode(&self) -> String {
        format!("gmail:{}:{}", self.account_id, self.provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::MessageId;

    #[test]
    fn parses_and_encodes_standard_message_id() {
        let id = MessageId::parse("gmail:default:18c2f0a9b1d4e5f6").expect("parse succeeds");
        assert_eq!(id.account_id, "default");
        assert_eq!(id.provider_id, "18c2f0a9b1d4e5f6");
        assert_eq!(id.encode(), "gmail:default:18c2f0a9b1d4e5f6");
    }

    #[test]
    fn rejects_invalid_prefix() {
        let err = MessageId::parse("imap:default:abc").expect_err("must fail");
        assert!(err.to_string().contains("must start with 'gmail'"));
    }

    #[test]
    fn rejects_path_like_provider_segment() {
        let err = MessageId::parse("gmail:default:../profile").expect_err("must fail");
        assert!(err.to_string().contains("alphanumeric"));

        let err = MessageId::parse("gmail:default").expect_err("must fail");
        assert!(err.to_string().contains("3 segments"));
    }
}
