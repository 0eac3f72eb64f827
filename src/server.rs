//! MCP server implementation with tool handlers
//!
//! Implements the `ServerHandler` trait and registers 8 MCP tools. Handles
//! input validation, business logic orchestration, and response formatting.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ErrorData, ServerCapabilities, ServerInfo};
use rmcp::{Json, ServerHandler, tool, tool_handler, tool_router};
use tracing::info;

use crate::compose::{self, ComposeRequest, EncodedMessage};
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::gmail::{self, GmailSession, MessageFormat};
use crate::message_id::MessageId;
use crate::mime::{self, header_value};
use crate::models::{
    AccountInfo, AccountOnlyInput, ComposeMessageInput, DownloadAttachmentInput,
    GetMessageInput, MessageDetail, MessageSummary, Meta, ReplyMessageInput,
    SearchMessagesInput, ToolEnvelope,
};
use crate::threading::{ReplyThreading, derive_reply};

/// Maximum messages per search result page
const MAX_SEARCH_LIMIT: usize = 50;
/// Maximum attachments to return per message
const MAX_ATTACHMENTS: usize = 50;
/// Maximum attachments per outgoing message
const MAX_OUTGOING_ATTACHMENTS: usize = 20;
/// Maximum recipients per address field
const MAX_RECIPIENTS: usize = 100;

/// Gmail MCP server
///
/// Holds shared configuration and the HTTP client. Implements MCP tool
/// handlers via `#[tool]` attribute macro and `ServerHandler` trait.
#[derive(Clone)]
pub struct MailGmailServer {
    /// Server config (accounts, timeouts, write flag)
    config: Arc<ServerConfig>,
    /// Shared HTTP client (connection pool)
    http: reqwest::Client,
    /// Tool router for dispatching MCP tool calls
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MailGmailServer {
    /// Create a new MCP server instance
    ///
    /// # Errors
    ///
    /// - `Internal` if the HTTP client cannot be initialized
    pub fn new(config: ServerConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config: Arc::new(config),
            http,
            tool_router: Self::tool_router(),
        })
    }

    /// Tool: List configured Gmail accounts
    ///
    /// Returns account identifiers without exposing tokens.
    #[tool(
        name = "gmail_list_accounts",
        description = "List configured Gmail accounts"
    )]
    async fn list_accounts(&self) -> Result<Json<ToolEnvelope<Vec<AccountInfo>>>, ErrorData> {
        let started = Instant::now();
        let data = self
            .config
            .accounts
            .values()
            .map(|a| AccountInfo {
                account_id: a.account_id.clone(),
                user_id: a.user_id.clone(),
            })
            .collect::<Vec<_>>();
        finalize_tool(
            started,
            Ok((format!("{} account(s) configured", data.len()), data)),
        )
    }

    /// Tool: Verify that an account's token is accepted
    #[tool(
        name = "gmail_verify_account",
        description = "Verify account token and report mailbox totals"
    )]
    async fn verify_account(
        &self,
        Parameters(input): Parameters<AccountOnlyInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.verify_account_impl(input)
                .await
                .map(|data| ("Account verification succeeded".to_owned(), data)),
        )
    }

    /// Tool: Search messages with Gmail query syntax
    ///
    /// Returns one page of summaries plus a page token for the next page.
    #[tool(
        name = "gmail_search_messages",
        description = "Search messages using Gmail query syntax"
    )]
    async fn search_messages(
        &self,
        Parameters(input): Parameters<SearchMessagesInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        let result = self.search_messages_impl(input).await.and_then(|data| {
            let summary = format!("{} message(s) returned", data.messages.len());
            let serialized = serde_json::to_value(data)
                .map_err(|e| AppError::Internal(format!("serialization failure: {e}")))?;
            Ok((summary, serialized))
        });
        finalize_tool(started, result)
    }

    /// Tool: Get a message as plain text with attachment metadata
    #[tool(
        name = "gmail_get_message",
        description = "Get message body text, headers and attachments"
    )]
    async fn get_message(
        &self,
        Parameters(input): Parameters<GetMessageInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.get_message_impl(input)
                .await
                .map(|data| ("Message retrieved".to_owned(), data)),
        )
    }

    /// Tool: Send a new message
    ///
    /// Requires `MAIL_GMAIL_WRITE_ENABLED=true`.
    #[tool(
        name = "gmail_send_message",
        description = "Send a plain-text email with optional file attachments"
    )]
    async fn send_message(
        &self,
        Parameters(input): Parameters<ComposeMessageInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.compose_impl(input, false)
                .await
                .map(|data| ("Message sent".to_owned(), data)),
        )
    }

    /// Tool: Save a new message as a draft
    ///
    /// Requires `MAIL_GMAIL_WRITE_ENABLED=true`.
    #[tool(
        name = "gmail_create_draft",
        description = "Create a plain-text draft with optional file attachments"
    )]
    async fn create_draft(
        &self,
        Parameters(input): Parameters<ComposeMessageInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.compose_impl(input, true)
                .await
                .map(|data| ("Draft created".to_owned(), data)),
        )
    }

    /// Tool: Reply to the sender of a message
    ///
    /// Threads the reply with `In-Reply-To`/`References` and keeps it in the
    /// original Gmail thread. Requires `MAIL_GMAIL_WRITE_ENABLED=true`.
    #[tool(
        name = "gmail_reply_message",
        description = "Reply to the sender of a message in the same thread"
    )]
    async fn reply_message(
        &self,
        Parameters(input): Parameters<ReplyMessageInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        let summary = if input.draft {
            "Reply draft created"
        } else {
            "Reply sent"
        };
        finalize_tool(
            started,
            self.reply_message_impl(input)
                .await
                .map(|data| (summary.to_owned(), data)),
        )
    }

    /// Tool: Download an attachment to the configured directory
    #[tool(
        name = "gmail_download_attachment",
        description = "Download a message attachment to local storage"
    )]
    async fn download_attachment(
        &self,
        Parameters(input): Parameters<DownloadAttachmentInput>,
    ) -> Result<Json<ToolEnvelope<serde_json::Value>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.download_attachment_impl(input)
                .await
                .map(|data| ("Attachment downloaded".to_owned(), data)),
        )
    }
}

/// MCP server handler implementation
///
/// Provides server info and capabilities to MCP client.
#[tool_handler(router = self.tool_router)]
impl ServerHandler for MailGmailServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "Gmail MCP server. Read tools are enabled by default; send, draft and reply tools require MAIL_GMAIL_WRITE_ENABLED=true.",
        )
    }
}

/// Search result data structure
#[derive(Debug, serde::Serialize)]
struct SearchResultData {
    account_id: String,
    query: Option<String>,
    result_size_estimate: u64,
    messages: Vec<MessageSummary>,
    next_page_token: Option<String>,
    has_more: bool,
}

/// Tool implementation methods
///
/// Private methods handle the actual business logic for each tool, separated
/// from the public `#[tool]` methods that handle response formatting.
impl MailGmailServer {
    fn open_session(&self, account_id: &str) -> AppResult<GmailSession> {
        validate_account_id(account_id)?;
        let account = self.config.get_account(account_id)?;
        Ok(gmail::session(&self.config, &self.http, account))
    }

    async fn verify_account_impl(&self, input: AccountOnlyInput) -> AppResult<serde_json::Value> {
        let session = self.open_session(&input.account_id)?;
        let started = Instant::now();
        let profile = gmail::get_profile(&self.config, &session).await?;

        Ok(serde_json::json!({
            "account_id": input.account_id,
            "ok": true,
            "latency_ms": duration_ms(started),
            "email_address": profile.email_address,
            "messages_total": profile.messages_total,
            "threads_total": profile.threads_total,
        }))
    }

    async fn search_messages_impl(
        &self,
        input: SearchMessagesInput,
    ) -> AppResult<SearchResultData> {
        validate_search_input(&input)?;
        let session = self.open_session(&input.account_id)?;

        let page = gmail::list_messages(
            &self.config,
            &session,
            input.query.as_deref(),
            input.limit,
            input.page_token.as_deref(),
        )
        .await?;

        let mut messages = Vec::with_capacity(page.messages.len());
        for (id, thread_id) in page.messages {
            let message =
                gmail::get_message(&self.config, &session, &id, MessageFormat::Metadata).await?;
            let headers = message.headers();
            messages.push(MessageSummary {
                message_id: MessageId {
                    account_id: input.account_id.clone(),
                    provider_id: id,
                }
                .encode(),
                thread_id: message.thread_id.clone().or(thread_id),
                date: header_value(headers, "Date").map(str::to_owned),
                from: header_value(headers, "From").map(str::to_owned),
                subject: header_value(headers, "Subject").map(str::to_owned),
                labels: message.label_ids.clone(),
                snippet: if input.include_snippet {
                    message.snippet.clone()
                } else {
                    None
                },
            });
        }

        Ok(SearchResultData {
            account_id: input.account_id,
            query: input.query,
            result_size_estimate: page.result_size_estimate,
            messages,
            has_more: page.next_page_token.is_some(),
            next_page_token: page.next_page_token,
        })
    }

    async fn get_message_impl(&self, input: GetMessageInput) -> AppResult<serde_json::Value> {
        validate_chars(input.body_max_chars, 100, 20_000, "body_max_chars")?;
        let msg_id = parse_and_validate_message_id(&input.account_id, &input.message_id)?;
        let session = self.open_session(&input.account_id)?;

        let message =
            gmail::get_message(&self.config, &session, &msg_id.provider_id, MessageFormat::Full)
                .await?;
        let root = message.payload.as_ref();
        let body_text = mime::decode_body(root)?;
        let attachments = mime::list_attachments(root);
        let headers = message.headers();

        let detail = MessageDetail {
            message_id: msg_id.encode(),
            thread_id: message.thread_id.clone(),
            date: header_value(headers, "Date").map(str::to_owned),
            from: header_value(headers, "From").map(str::to_owned),
            to: header_value(headers, "To").map(str::to_owned),
            cc: header_value(headers, "Cc").map(str::to_owned),
            subject: header_value(headers, "Subject").map(str::to_owned),
            labels: message.label_ids.clone(),
            headers: (input.include_headers || input.include_all_headers)
                .then(|| mime::curated_headers(headers, input.include_all_headers)),
            body_text: mime::truncate_chars(body_text, input.body_max_chars),
            attachments: attachments.into_iter().take(MAX_ATTACHMENTS).collect(),
        };

        Ok(serde_json::json!({
            "account_id": input.account_id,
            "message": detail,
        }))
    }

    async fn compose_impl(
        &self,
        input: ComposeMessageInput,
        draft: bool,
    ) -> AppResult<serde_json::Value> {
        require_write_enabled(&self.config)?;
        let session = self.open_session(&input.account_id)?;

        let to = join_addresses(&input.to, "to")?;
        validate_header_text(&input.subject, "subject", 998)?;
        let request = ComposeRequest {
            to: to.clone(),
            subject: input.subject,
            body_text: input.body,
            cc: optional_addresses(input.cc.as_deref(), "cc")?,
            bcc: optional_addresses(input.bcc.as_deref(), "bcc")?,
            attachments: attachment_paths(input.attachments.as_deref())?,
            ..ComposeRequest::default()
        };
        let attachment_count = request.attachments.len();
        let encoded = encode_off_runtime(request).await?;

        let dispatched = if draft {
            gmail::create_draft(&self.config, &session, &encoded, None).await?
        } else {
            gmail::send_message(&self.config, &session, &encoded, None).await?
        };
        info!(
            account_id = %input.account_id,
            draft,
            attachments = attachment_count,
            "outgoing message dispatched"
        );

        Ok(dispatch_result(
            &input.account_id,
            dispatched,
            draft,
            &to,
            attachment_count,
        ))
    }

    async fn reply_message_impl(&self, input: ReplyMessageInput) -> AppResult<serde_json::Value> {
        require_write_enabled(&self.config)?;
        let msg_id = parse_and_validate_message_id(&input.account_id, &input.message_id)?;
        let session = self.open_session(&input.account_id)?;

        let original = gmail::get_message(
            &self.config,
            &session,
            &msg_id.provider_id,
            MessageFormat::Metadata,
        )
        .await?;
        let threading = derive_reply(original.headers());
        validate_reply_threading(&threading)?;
        let to = threading.to.ok_or_else(|| {
            AppError::InvalidInput("original message has no From header to reply to".to_owned())
        })?;

        let request = ComposeRequest {
            to: to.clone(),
            subject: threading.thread_subject.clone(),
            body_text: input.body,
            cc: optional_addresses(input.cc.as_deref(), "cc")?,
            bcc: optional_addresses(input.bcc.as_deref(), "bcc")?,
            attachments: attachment_paths(input.attachments.as_deref())?,
            in_reply_to: threading.in_reply_to,
            references: threading.references,
            thread_subject: Some(threading.thread_subject),
        };
        let attachment_count = request.attachments.len();
        let encoded = encode_off_runtime(request).await?;

        let thread_id = original.thread_id.as_deref();
        let dispatched = if input.draft {
            gmail::create_draft(&self.config, &session, &encoded, thread_id).await?
        } else {
            gmail::send_message(&self.config, &session, &encoded, thread_id).await?
        };
        info!(
            account_id = %input.account_id,
            draft = input.draft,
            "reply dispatched"
        );

        Ok(dispatch_result(
            &input.account_id,
            dispatched,
            input.draft,
            &to,
            attachment_count,
        ))
    }

    async fn download_attachment_impl(
        &self,
        input: DownloadAttachmentInput,
    ) -> AppResult<serde_json::Value> {
        let msg_id = parse_and_validate_message_id(&input.account_id, &input.message_id)?;
        validate_attachment_id(&input.attachment_id)?;
        let filename = match &input.filename {
            Some(name) => safe_basename(name)?,
            None => format!("attachment-{}.bin", msg_id.provider_id),
        };
        let session = self.open_session(&input.account_id)?;

        let bytes = gmail::get_attachment(
            &self.config,
            &session,
            &msg_id.provider_id,
            &input.attachment_id,
        )
        .await?;

        let path = self.config.download_dir.join(&filename);
        write_download(&path, &bytes).await?;
        info!(size = bytes.len(), path = %path.display(), "attachment saved");

        Ok(serde_json::json!({
            "account_id": input.account_id,
            "message_id": msg_id.encode(),
            "filename": filename,
            "size_bytes": bytes.len(),
            "saved_to": path.display().to_string(),
        }))
    }
}

/// Calculate elapsed milliseconds
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

/// Build a standardized MCP tool response envelope from business logic output
fn finalize_tool<T>(
    started: Instant,
    result: AppResult<(String, T)>,
) -> Result<Json<ToolEnvelope<T>>, ErrorData>
where
    T: schemars::JsonSchema,
{
    match result {
        Ok((summary, data)) => Ok(Json(ToolEnvelope {
            summary,
            data,
            meta: Meta::now(duration_ms(started)),
        })),
        Err(e) => Err(e.to_error_data()),
    }
}

fn dispatch_result(
    account_id: &str,
    dispatched: gmail::Dispatched,
    draft: bool,
    to: &str,
    attachment_count: usize,
) -> serde_json::Value {
    let message_id = dispatched.message_id.map(|id| {
        MessageId {
            account_id: account_id.to_owned(),
            provider_id: id,
        }
        .encode()
    });
    serde_json::json!({
        "account_id": account_id,
        "draft_id": draft.then_some(dispatched.id),
        "message_id": message_id,
        "thread_id": dispatched.thread_id,
        "to": to,
        "attachments": attachment_count,
    })
}

/// Encode an outgoing message on the blocking pool
///
/// Attachment files are read synchronously during encoding.
async fn encode_off_runtime(request: ComposeRequest) -> AppResult<EncodedMessage> {
    tokio::task::spawn_blocking(move || compose::encode(&request))
        .await
        .map_err(|e| AppError::Internal(format!("message encoding task failed: {e}")))?
}

/// Write downloaded bytes, creating the target directory if needed
async fn write_download(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::Internal(format!("cannot create '{}': {e}", parent.display()))
        })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| AppError::Internal(format!("cannot write '{}': {e}", path.display())))
}

/// Parse message_id and enforce account_id match.
fn parse_and_validate_message_id(account_id: &str, message_id: &str) -> AppResult<MessageId> {
    let msg_id = MessageId::parse(message_id)?;
    if msg_id.account_id != account_id {
        return Err(AppError::InvalidInput(
            "message_id account does not match account_id".to_owned(),
        ));
    }
    Ok(msg_id)
}

/// Validate account_id format
fn validate_account_id(account_id: &str) -> AppResult<()> {
    if account_id.is_empty() || account_id.len() > 64 {
        return Err(AppError::InvalidInput(
            "account_id must be 1..64 characters".to_owned(),
        ));
    }
    if !account_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(AppError::InvalidInput(
            "account_id must match [A-Za-z0-9_-]+".to_owned(),
        ));
    }
    Ok(())
}

/// Reject control characters (including CR/LF header injection)
fn validate_no_controls(value: &str, field: &str) -> AppResult<()> {
    if value.chars().any(char::is_control) {
        return Err(AppError::InvalidInput(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}

/// Validate a value destined for a single header line
fn validate_header_text(value: &str, field: &str, max: usize) -> AppResult<()> {
    if value.len() > max {
        return Err(AppError::InvalidInput(format!(
            "{field} must be at most {max} bytes"
        )));
    }
    validate_no_controls(value, field)
}

/// Validate a header value copied from a received message
///
/// Folding whitespace (tab) is allowed; CR, LF and other controls are not.
fn validate_received_header(value: &str, field: &str, max: usize) -> AppResult<()> {
    if value.len() > max {
        return Err(AppError::InvalidInput(format!(
            "{field} must be at most {max} bytes"
        )));
    }
    if value.chars().any(|ch| ch.is_control() && ch != '\t') {
        return Err(AppError::InvalidInput(format!(
            "{field} contains line breaks or control characters"
        )));
    }
    Ok(())
}

/// Check every reply header derived from the original message
fn validate_reply_threading(threading: &ReplyThreading) -> AppResult<()> {
    if let Some(to) = &threading.to {
        validate_received_header(to, "original From", 2_048)?;
    }
    validate_received_header(&threading.thread_subject, "original Subject", 2_048)?;
    if let Some(in_reply_to) = &threading.in_reply_to {
        validate_received_header(in_reply_to, "original Message-ID", 998)?;
    }
    if let Some(references) = &threading.references {
        validate_received_header(references, "original References", 32_768)?;
    }
    Ok(())
}

/// Validate numeric value in range
fn validate_chars(value: usize, min: usize, max: usize, field: &str) -> AppResult<()> {
    if value < min || value > max {
        return Err(AppError::InvalidInput(format!(
            "{field} must be in range {min}..{max}"
        )));
    }
    Ok(())
}

/// Validate search messages input
fn validate_search_input(input: &SearchMessagesInput) -> AppResult<()> {
    validate_chars(input.limit, 1, MAX_SEARCH_LIMIT, "limit")?;
    if let Some(q) = &input.query {
        if q.is_empty() || q.len() > 1_024 {
            return Err(AppError::InvalidInput(
                "query must be 1..1024 characters".to_owned(),
            ));
        }
        validate_no_controls(q, "query")?;
    }
    if let Some(token) = &input.page_token {
        if token.is_empty() || token.len() > 256 {
            return Err(AppError::InvalidInput(
                "page_token must be 1..256 characters".to_owned(),
            ));
        }
        validate_no_controls(token, "page_token")?;
    }
    Ok(())
}

/// Validate one address (display name form `Name <a@b>` allowed)
fn validate_address(address: &str, field: &str) -> AppResult<()> {
    let trimmed = address.trim();
    if trimmed.is_empty() || trimmed.len() > 320 {
        return Err(AppError::InvalidInput(format!(
            "{field} addresses must be 1..320 characters"
        )));
    }
    validate_no_controls(trimmed, field)?;
    if !trimmed.contains('@') {
        return Err(AppError::InvalidInput(format!(
            "{field} address '{trimmed}' is missing '@'"
        )));
    }
    Ok(())
}

/// Validate and comma-join a recipient list
fn join_addresses(addresses: &[String], field: &str) -> AppResult<String> {
    if addresses.is_empty() || addresses.len() > MAX_RECIPIENTS {
        return Err(AppError::InvalidInput(format!(
            "{field} must contain 1..{MAX_RECIPIENTS} addresses"
        )));
    }
    for address in addresses {
        validate_address(address, field)?;
    }
    Ok(addresses
        .iter()
        .map(|a| a.trim())
        .collect::<Vec<_>>()
        .join(", "))
}

/// Join an optional recipient list; an empty list counts as absent
fn optional_addresses(addresses: Option<&[String]>, field: &str) -> AppResult<Option<String>> {
    match addresses {
        Some(list) if !list.is_empty() => join_addresses(list, field).map(Some),
        _ => Ok(None),
    }
}

/// Validate attachment paths supplied by the caller
fn attachment_paths(paths: Option<&[String]>) -> AppResult<Vec<PathBuf>> {
    let paths = paths.unwrap_or_default();
    if paths.len() > MAX_OUTGOING_ATTACHMENTS {
        return Err(AppError::InvalidInput(format!(
            "at most {MAX_OUTGOING_ATTACHMENTS} attachments are allowed"
        )));
    }
    paths
        .iter()
        .map(|p| {
            if p.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "attachment paths must not be empty".to_owned(),
                ));
            }
            validate_no_controls(p, "attachment path")?;
            Ok(PathBuf::from(p))
        })
        .collect()
}

/// Validate a Gmail attachment token (base64url alphabet)
fn validate_attachment_id(attachment_id: &str) -> AppResult<()> {
    if attachment_id.is_empty() || attachment_id.len() > 2_048 {
        return Err(AppError::InvalidInput(
            "attachment_id must be 1..2048 characters".to_owned(),
        ));
    }
    if !attachment_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(AppError::InvalidInput(
            "attachment_id must match [A-Za-z0-9_-]+".to_owned(),
        ));
    }
    Ok(())
}

/// Reduce a caller-supplied filename to a safe basename
fn safe_basename(name: &str) -> AppResult<String> {
    validate_no_controls(name, "filename")?;
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." || base.len() > 255 {
        return Err(AppError::InvalidInput(
            "filename must be a non-empty file name".to_owned(),
        ));
    }
    Ok(base)
}

/// Check if write operations are enabled
fn require_write_enabled(config: &ServerConfig) -> AppResult<()> {
    if !config.write_enabled {
        return Err(AppError::InvalidInput(
            "write tools are disabled; set MAIL_GMAIL_WRITE_ENABLED=true".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{
        attachment_paths, encode_off_runtime, join_addresses, optional_addresses,
        parse_and_validate_message_id, safe_basename, validate_attachment_id,
        validate_header_text, validate_reply_threading,
    };
    use crate::compose::ComposeRequest;
    use crate::encoding::decode_url_safe;
    use crate::errors::AppError;
    use crate::mime::Header;
    use crate::threading::derive_reply;

    fn received(subject: &str, message_id: &str) -> Vec<Header> {
        vec![
            Header::new("From", "Alice <alice@example.com>"),
            Header::new("Subject", subject),
            Header::new("Message-ID", message_id),
        ]
    }

    #[test]
    fn joins_and_trims_recipients() {
        let to = vec![" a@b.com".to_owned(), "Carol <c@d.org> ".to_owned()];
        assert_eq!(
            join_addresses(&to, "to").expect("valid"),
            "a@b.com, Carol <c@d.org>"
        );
    }

    #[test]
    fn rejects_header_injection_in_recipients() {
        let to = vec!["a@b.com\r\nBcc: evil@x.com".to_owned()];
        let err = join_addresses(&to, "to").expect_err("must fail");
        assert!(err.to_string().contains("control characters"));
    }

    #[test]
    fn empty_optional_recipients_are_absent() {
        assert_eq!(optional_addresses(Some(&[]), "cc").expect("valid"), None);
        assert_eq!(optional_addresses(None, "cc").expect("valid"), None);
    }

    #[test]
    fn rejects_subject_with_newline() {
        let err = validate_header_text("Hi\nBcc: x@y", "subject", 998).expect_err("must fail");
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn attachment_paths_reject_blank_entries() {
        let paths = vec!["/tmp/a.pdf".to_owned(), "  ".to_owned()];
        assert!(attachment_paths(Some(&paths)).is_err());
        assert!(attachment_paths(None).expect("valid").is_empty());
    }

    #[test]
    fn safe_basename_strips_directories() {
        assert_eq!(safe_basename("../../etc/passwd").expect("valid"), "passwd");
        assert_eq!(safe_basename("report.pdf").expect("valid"), "report.pdf");
        assert!(safe_basename("..").is_err());
        assert!(safe_basename("/").is_err());
    }

    #[test]
    fn attachment_id_must_be_base64url() {
        validate_attachment_id("ANGjdJ_x-9").expect("valid token");
        assert!(validate_attachment_id("../profile").is_err());
    }

    #[test]
    fn message_id_must_match_account() {
        let err = parse_and_validate_message_id("work", "gmail:default:abc123")
            .expect_err("must fail");
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn reply_rejects_line_break_in_original_subject() {
        let headers = received("Invoice\r\nBcc: attacker@evil.com", "<m1@example.com>");
        let threading = derive_reply(&headers);
        let err = validate_reply_threading(&threading).expect_err("must fail");
        assert!(err.to_string().contains("original Subject"));
    }

    #[test]
    fn reply_rejects_line_break_in_original_message_id() {
        let headers = received("Invoice", "<m1@example.com>\nBcc: attacker@evil.com");
        let err = validate_reply_threading(&derive_reply(&headers)).expect_err("must fail");
        assert!(err.to_string().contains("original Message-ID"));
    }

    #[test]
    fn reply_rejects_line_break_in_original_references() {
        let mut headers = received("Invoice", "<m2@example.com>");
        headers.push(Header::new("References", "<m1@example.com>\rX-Evil: 1"));
        let err = validate_reply_threading(&derive_reply(&headers)).expect_err("must fail");
        assert!(err.to_string().contains("original References"));
    }

    #[test]
    fn reply_accepts_ordinary_headers_with_folding_tab() {
        let mut headers = received("Quarterly\treport", "<m2@example.com>");
        headers.push(Header::new("References", "<m0@example.com>\t<m1@example.com>"));
        validate_reply_threading(&derive_reply(&headers)).expect("valid reply headers");
    }

    #[tokio::test]
    async fn encoding_with_attachment_runs_on_blocking_pool() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"quarterly numbers").expect("write fixture");
        let request = ComposeRequest {
            to: "bob@example.com".to_owned(),
            subject: "Numbers".to_owned(),
            body_text: "Attached.".to_owned(),
            attachments: vec![file.path().to_path_buf()],
            ..ComposeRequest::default()
        };
        let encoded = encode_off_runtime(request).await.expect("encode succeeds");
        let raw = decode_url_safe(encoded.as_str()).expect("outer layer decodes");
        let parsed = mailparse::parse_mail(&raw).expect("parse mail");
        assert_eq!(parsed.subparts.len(), 2);
        assert_eq!(
            parsed.subparts[1].get_body_raw().expect("attachment bytes"),
            b"quarterly numbers"
        );
    }

    #[tokio::test]
    async fn unreadable_attachment_error_survives_blocking_pool() {
        let request = ComposeRequest {
            to: "bob@example.com".to_owned(),
            attachments: vec![PathBuf::from("/definitely/not/here/a.pdf")],
            ..ComposeRequest::default()
        };
        let err = encode_off_runtime(request).await.expect_err("must fail");
        assert!(matches!(err, AppError::AttachmentRead { .. }));
    }
}
