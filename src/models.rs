//! Input/output DTOs and schema-bearing types
//!
//! Defines all data structures used in MCP tool contracts. Each type is
//! annotated with `JsonSchema` for automatic schema generation.

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata included in all tool responses
///
/// Provides timing information and current UTC timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Meta {
    /// Current UTC timestamp in RFC 3339 format with milliseconds
    pub now_utc: String,
    /// Tool execution duration in milliseconds
    pub duration_ms: u64,
}

impl Meta {
    /// Create metadata populated with current time and elapsed duration
    pub fn now(duration_ms: u64) -> Self {
        Self {
            now_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms,
        }
    }
}

/// Standard response envelope for all tools
///
/// Wraps tool-specific data with human-readable summary and execution metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolEnvelope<T>
where
    T: JsonSchema,
{
    /// Human-readable summary of the operation outcome
    pub summary: String,
    /// Tool-specific data payload
    pub data: T,
    /// Execution metadata (timestamp, duration)
    pub meta: Meta,
}

/// Account metadata (no credentials)
///
/// Returned by `gmail_list_accounts`. The access token is intentionally excluded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountInfo {
    /// Account identifier
    pub account_id: String,
    /// Gmail user id used in API paths (usually `me`)
    pub user_id: String,
}

/// Message summary for search results
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageSummary {
    /// Stable, opaque message identifier
    pub message_id: String,
    /// Gmail thread identifier
    pub thread_id: Option<String>,
    /// Date header
    pub date: Option<String>,
    /// From header
    pub from: Option<String>,
    /// Subject header
    pub subject: Option<String>,
    /// Gmail label ids (e.g. `INBOX`, `UNREAD`)
    pub labels: Vec<String>,
    /// Provider-generated preview text (if `include_snippet=true`)
    pub snippet: Option<String>,
}

/// Attachment metadata extracted from a message part tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentDescriptor {
    /// Filename from the part
    pub filename: String,
    /// MIME content type (e.g., `application/pdf`, `image/jpeg`)
    pub mime_type: String,
    /// Size in bytes as reported by the provider
    pub size: usize,
    /// Token for `gmail_download_attachment`, absent when not provided
    pub attachment_id: Option<String>,
}

/// Full message detail
///
/// Returned by `gmail_get_message`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageDetail {
    /// Stable, opaque message identifier
    pub message_id: String,
    /// Gmail thread identifier
    pub thread_id: Option<String>,
    /// Date header
    pub date: Option<String>,
    /// From header
    pub from: Option<String>,
    /// To header
    pub to: Option<String>,
    /// Cc header
    pub cc: Option<String>,
    /// Subject header
    pub subject: Option<String>,
    /// Gmail label ids
    pub labels: Vec<String>,
    /// All headers or curated subset (if `include_headers=true`)
    pub headers: Option<Vec<(String, String)>>,
    /// Plain text body (truncated to `body_max_chars`)
    pub body_text: String,
    /// Attachment metadata (up to `MAX_ATTACHMENTS`)
    pub attachments: Vec<AttachmentDescriptor>,
}

/// Input: account_id only
///
/// Used by `gmail_verify_account`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AccountOnlyInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
}

/// Input: search messages
///
/// Used by `gmail_search_messages`. The query uses Gmail search syntax
/// (e.g. `from:alice is:unread newer_than:7d`).
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchMessagesInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Gmail search query; omit to list the most recent messages
    pub query: Option<String>,
    /// Page token from a previous result's `next_page_token`
    pub page_token: Option<String>,
    /// Maximum messages to return (1..50, default 10)
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Include provider snippet in results
    #[serde(default)]
    pub include_snippet: bool,
}

/// Input: get decoded message details
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetMessageInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Stable message identifier (format: `gmail:{account}:{id}`)
    pub message_id: String,
    /// Maximum body characters (100..20000, default 2000)
    #[serde(default = "default_body_max_chars")]
    pub body_max_chars: usize,
    /// Include headers in response
    #[serde(default = "default_true")]
    pub include_headers: bool,
    /// Include all headers (if `true`, overrides curated header list)
    #[serde(default)]
    pub include_all_headers: bool,
}

/// Input: send a new message or create a draft
///
/// Used by `gmail_send_message` and `gmail_create_draft`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ComposeMessageInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Carbon-copy addresses
    pub cc: Option<Vec<String>>,
    /// Blind carbon-copy addresses
    pub bcc: Option<Vec<String>>,
    /// Local file paths to attach
    pub attachments: Option<Vec<String>>,
}

/// Input: reply to the sender of an existing message
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReplyMessageInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Stable identifier of the message being answered
    pub message_id: String,
    /// Plain-text reply body
    pub body: String,
    /// Carbon-copy addresses
    pub cc: Option<Vec<String>>,
    /// Blind carbon-copy addresses
    pub bcc: Option<Vec<String>>,
    /// Local file paths to attach
    pub attachments: Option<Vec<String>>,
    /// Save as draft instead of sending
    #[serde(default)]
    pub draft: bool,
}

/// Input: download an attachment to local storage
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DownloadAttachmentInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Stable message identifier
    pub message_id: String,
    /// Attachment token from `gmail_get_message`
    pub attachment_id: String,
    /// Filename to save as (basename only; defaults to `attachment-<n>.bin`)
    pub filename: Option<String>,
}

/// Default value for `account_id` field
pub fn default_account_id() -> String {
    "default".to_owned()
}

/// Default value for `bool` fields (true)
fn default_true() -> bool {
    true
}

/// Default value for `limit` in search
fn default_limit() -> usize {
    10
}

/// Default value for `body_max_chars` in get_message
///
/// 2,000 characters is typically sufficient to understand message content.
fn default_body_max_chars() -> usize {
    2_000
}
