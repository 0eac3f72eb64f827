//! Gmail REST transport
//!
//! Provides timeout-bounded wrappers around the Gmail API v1 endpoints the
//! tools need. Responses are mapped into codec types: message payloads become
//! [`Part`] trees, attachment blobs become raw bytes.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::compose::EncodedMessage;
use crate::config::{AccountConfig, ServerConfig};
use crate::encoding::decode_url_safe;
use crate::errors::{AppError, AppResult};
use crate::mime::{Header, Part, truncate_chars};

/// Headers requested for search summaries and reply derivation
const METADATA_HEADERS: [&str; 7] = [
    "Date",
    "From",
    "To",
    "Subject",
    "Message-ID",
    "References",
    "In-Reply-To",
];

/// Maximum characters of an error body echoed back to the caller
const ERROR_BODY_MAX_CHARS: usize = 500;

/// Authenticated handle for one account
///
/// Cheap to create per tool call; the underlying `reqwest::Client` shares its
/// connection pool.
pub struct GmailSession {
    http: Client,
    user_base_url: String,
    access_token: SecretString,
}

/// How much of a message to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Full part tree including inline bodies
    Full,
    /// Selected headers only
    Metadata,
}

/// A fetched message with its part tree
#[derive(Debug, Clone)]
pub struct GmailMessage {
    /// Gmail thread id
    pub thread_id: Option<String>,
    /// Provider-generated preview text
    pub snippet: Option<String>,
    /// Label ids (e.g. `INBOX`, `UNREAD`)
    pub label_ids: Vec<String>,
    /// Root of the MIME part tree, absent if the provider sent none
    pub payload: Option<Part>,
}

impl GmailMessage {
    /// Root-level headers, empty when the payload is absent
    pub fn headers(&self) -> &[Header] {
        self.payload
            .as_ref()
            .map(|p| p.headers.as_slice())
            .unwrap_or_default()
    }
}

/// One page of message references
#[derive(Debug, Clone)]
pub struct MessagePage {
    /// `(message id, thread id)` pairs, newest first
    pub messages: Vec<(String, Option<String>)>,
    /// Token for the following page
    pub next_page_token: Option<String>,
    /// Provider estimate of total matches
    pub result_size_estimate: u64,
}

/// Identifiers returned by send and draft calls
#[derive(Debug, Clone)]
pub struct Dispatched {
    /// Sent message id, or draft id for drafts
    pub id: String,
    /// Message id inside the draft, if any
    pub message_id: Option<String>,
    /// Thread the message landed in
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessage {
    thread_id: Option<String>,
    snippet: Option<String>,
    #[serde(default)]
    label_ids: Vec<String>,
    payload: Option<ApiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<ApiHeader>,
    body: Option<ApiBody>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBody {
    attachment_id: Option<String>,
    #[serde(default)]
    size: usize,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessageRef {
    id: String,
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessageList {
    #[serde(default)]
    messages: Vec<ApiMessageRef>,
    next_page_token: Option<String>,
    #[serde(default)]
    result_size_estimate: u64,
}

#[derive(Debug, Deserialize)]
struct ApiAttachment {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDraft {
    id: String,
    message: Option<ApiMessageRef>,
}

/// Mailbox profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Address of the authenticated user
    pub email_address: String,
    /// Total messages in the mailbox
    #[serde(default)]
    pub messages_total: u64,
    /// Total threads in the mailbox
    #[serde(default)]
    pub threads_total: u64,
}

impl From<ApiPart> for Part {
    fn from(part: ApiPart) -> Self {
        let (payload, attachment_ref, size) = match part.body {
            Some(body) => (
                body.data.filter(|d| !d.is_empty()),
                body.attachment_id.filter(|a| !a.is_empty()),
                body.size,
            ),
            None => (None, None, 0),
        };
        Self {
            mime_type: part.mime_type,
            headers: part
                .headers
                .into_iter()
                .map(|h| Header::new(h.name, h.value))
                .collect(),
            payload,
            filename: Some(part.filename).filter(|f| !f.is_empty()),
            attachment_ref,
            size,
            children: part.parts.into_iter().map(Part::from).collect(),
        }
    }
}

impl From<ApiMessage> for GmailMessage {
    fn from(message: ApiMessage) -> Self {
        Self {
            thread_id: message.thread_id,
            snippet: message.snippet,
            label_ids: message.label_ids,
            payload: message.payload.map(Part::from),
        }
    }
}

/// Get request timeout duration from server config
fn request_timeout(server: &ServerConfig) -> Duration {
    Duration::from_millis(server.request_timeout_ms)
}

/// Open a session for one account
pub fn session(server: &ServerConfig, http: &Client, account: &AccountConfig) -> GmailSession {
    GmailSession {
        http: http.clone(),
        user_base_url: format!(
            "{}/users/{}",
            server.api_base_url,
            urlencoding::encode(&account.user_id)
        ),
        access_token: account.access_token.clone(),
    }
}

impl GmailSession {
    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{path}", self.user_base_url))
            .bearer_auth(self.access_token.expose_secret())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{path}", self.user_base_url))
            .bearer_auth(self.access_token.expose_secret())
    }
}

/// Send a request and decode its JSON body
///
/// # Errors
///
/// - `Timeout` if sending or reading the body exceeds the request timeout
/// - `AuthFailed` for 401/403, `NotFound` for 404, `InvalidInput` for 400
/// - `Internal` for transport failures and other statuses
async fn execute<T: DeserializeOwned>(
    server: &ServerConfig,
    request: RequestBuilder,
    operation: &str,
) -> AppResult<T> {
    let response = timeout(request_timeout(server), request.send())
        .await
        .map_err(|_| AppError::Timeout(format!("{operation} timed out")))
        .and_then(|r| r.map_err(|e| AppError::Internal(format!("{operation} failed: {e}"))))?;

    let status = response.status();
    debug!(operation, %status, "gmail api response");
    if !status.is_success() {
        let body = timeout(request_timeout(server), response.text())
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
        warn!(operation, %status, "gmail api request rejected");
        return Err(status_error(status, operation, &body));
    }

    timeout(request_timeout(server), response.json::<T>())
        .await
        .map_err(|_| AppError::Timeout(format!("{operation} response timed out")))
        .and_then(|r| {
            r.map_err(|e| AppError::Internal(format!("{operation} returned malformed JSON: {e}")))
        })
}

/// Map a non-success HTTP status to an application error
fn status_error(status: StatusCode, operation: &str, body: &str) -> AppError {
    let detail = truncate_chars(body.trim().to_owned(), ERROR_BODY_MAX_CHARS);
    let msg = format!("{operation} returned {status}: {detail}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::AuthFailed(msg),
        StatusCode::NOT_FOUND => AppError::NotFound(msg),
        StatusCode::BAD_REQUEST => AppError::InvalidInput(msg),
        _ => AppError::Internal(msg),
    }
}

/// Fetch the mailbox profile
///
/// Used to verify that the configured token is accepted.
pub async fn get_profile(server: &ServerConfig, session: &GmailSession) -> AppResult<Profile> {
    execute(server, session.get("/profile"), "profile lookup").await
}

/// List message references matching a Gmail search query
pub async fn list_messages(
    server: &ServerConfig,
    session: &GmailSession,
    query: Option<&str>,
    max_results: usize,
    page_token: Option<&str>,
) -> AppResult<MessagePage> {
    let mut params = vec![("maxResults", max_results.to_string())];
    if let Some(q) = query {
        params.push(("q", q.to_owned()));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_owned()));
    }

    let list: ApiMessageList = execute(
        server,
        session.get("/messages").query(&params),
        "message search",
    )
    .await?;

    Ok(MessagePage {
        messages: list
            .messages
            .into_iter()
            .map(|m| (m.id, m.thread_id))
            .collect(),
        next_page_token: list.next_page_token,
        result_size_estimate: list.result_size_estimate,
    })
}

/// Fetch a single message
pub async fn get_message(
    server: &ServerConfig,
    session: &GmailSession,
    id: &str,
    format: MessageFormat,
) -> AppResult<GmailMessage> {
    let mut params = Vec::new();
    match format {
        MessageFormat::Full => params.push(("format", "full")),
        MessageFormat::Metadata => {
            params.push(("format", "metadata"));
            params.extend(METADATA_HEADERS.iter().map(|h| ("metadataHeaders", *h)));
        }
    }

    let path = format!("/messages/{}", urlencoding::encode(id));
    let message: ApiMessage =
        execute(server, session.get(&path).query(&params), "message fetch").await?;
    Ok(message.into())
}

/// Fetch raw attachment bytes
///
/// # Errors
///
/// - `Decode` if the attachment payload is not valid base64url
pub async fn get_attachment(
    server: &ServerConfig,
    session: &GmailSession,
    message_id: &str,
    attachment_id: &str,
) -> AppResult<Vec<u8>> {
    let path = format!(
        "/messages/{}/attachments/{}",
        urlencoding::encode(message_id),
        urlencoding::encode(attachment_id)
    );
    let attachment: ApiAttachment =
        execute(server, session.get(&path), "attachment fetch").await?;
    decode_url_safe(attachment.data.as_deref().unwrap_or_default())
}

/// Send an encoded message, optionally inside an existing thread
pub async fn send_message(
    server: &ServerConfig,
    session: &GmailSession,
    raw: &EncodedMessage,
    thread_id: Option<&str>,
) -> AppResult<Dispatched> {
    let mut body = json!({ "raw": raw.as_str() });
    if let Some(thread_id) = thread_id {
        body["threadId"] = json!(thread_id);
    }
    let sent: ApiMessageRef = execute(
        server,
        session.post("/messages/send").json(&body),
        "message send",
    )
    .await?;
    debug!(thread_id = ?sent.thread_id, "gmail message sent");
    Ok(Dispatched {
        message_id: Some(sent.id.clone()),
        id: sent.id,
        thread_id: sent.thread_id,
    })
}

/// Store an encoded message as a draft, optionally inside an existing thread
pub async fn create_draft(
    server: &ServerConfig,
    session: &GmailSession,
    raw: &EncodedMessage,
    thread_id: Option<&str>,
) -> AppResult<Dispatched> {
    let mut message = json!({ "raw": raw.as_str() });
    if let Some(thread_id) = thread_id {
        message["threadId"] = json!(thread_id);
    }
    let draft: ApiDraft = execute(
        server,
        session.post("/drafts").json(&json!({ "message": message })),
        "draft create",
    )
    .await?;
    let (message_id, thread_id) = draft
        .message
        .map_or((None, None), |m| (Some(m.id), m.thread_id));
    Ok(Dispatched {
        id: draft.id,
        message_id,
        thread_id,
    })
}
