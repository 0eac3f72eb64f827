//! Received-message part tree and body extraction
//!
//! Models a provider message as an owned tree of MIME parts, extracts the
//! best available plain-text body, and enumerates attachment metadata.
//! Decoding is best-effort: an absent or sparse tree degrades to an empty
//! body and no attachments. Only corrupt base64url payloads are errors.

use crate::encoding::{decode_url_safe, html_to_text};
use crate::errors::AppResult;
use crate::models::AttachmentDescriptor;

/// One RFC 822 header (name is matched case-insensitively)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as received
    pub name: String,
    /// Header value (unfolded)
    pub value: String,
}

impl Header {
    /// Build a header from name and value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One node of a received message's MIME tree
///
/// Leaves carry an inline `payload` or an `attachment_ref`; containers carry
/// `children`. A node with none of these is an empty leaf.
#[derive(Debug, Clone, Default)]
pub struct Part {
    /// MIME type such as `text/plain` or `multipart/alternative`
    pub mime_type: String,
    /// Headers (usually only populated on the root part)
    pub headers: Vec<Header>,
    /// Inline body, base64url text
    pub payload: Option<String>,
    /// Attachment filename; non-empty marks the part as an attachment
    pub filename: Option<String>,
    /// Provider token for fetching attachment bytes later
    pub attachment_ref: Option<String>,
    /// Body size in bytes as reported by the provider
    pub size: usize,
    /// Nested parts of a multipart container
    pub children: Vec<Part>,
}

impl Part {
    /// Whether this part is an attachment (has a non-empty filename)
    pub fn is_attachment(&self) -> bool {
        self.filename.as_deref().is_some_and(|f| !f.is_empty())
    }

    fn inline_payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

/// Extract the best plain-text rendering of a message
///
/// Preference at each level: an inline `text/plain` child, then an inline
/// `text/html` child (degraded to text), then the first non-empty result of
/// descending into children in order.
///
/// # Errors
///
/// - `Decode` if a selected payload is not valid base64url
pub fn decode_body(root: Option<&Part>) -> AppResult<String> {
    let Some(part) = root else {
        return Ok(String::new());
    };

    if part.children.is_empty() {
        return match part.inline_payload() {
            Some(payload) => decode_leaf(&part.mime_type, payload),
            None => Ok(String::new()),
        };
    }

    for mime_type in ["text/plain", "text/html"] {
        if let Some(payload) = part
            .children
            .iter()
            .find(|c| c.mime_type == mime_type && c.payload.is_some())
            .and_then(Part::inline_payload)
        {
            return decode_leaf(mime_type, payload);
        }
    }

    for child in &part.children {
        let text = decode_body(Some(child))?;
        if !text.is_empty() {
            return Ok(text);
        }
    }
    Ok(String::new())
}

/// Decode one leaf payload, degrading HTML to text
fn decode_leaf(mime_type: &str, payload: &str) -> AppResult<String> {
    let bytes = decode_url_safe(payload)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if mime_type == "text/html" {
        Ok(html_to_text(&text))
    } else {
        Ok(text)
    }
}

/// Enumerate attachments in pre-order
///
/// Every part with a non-empty filename yields a descriptor, at any depth and
/// regardless of MIME type. A missing provider reference is carried as `None`.
pub fn list_attachments(root: Option<&Part>) -> Vec<AttachmentDescriptor> {
    let mut out = Vec::new();
    if let Some(part) = root {
        walk_attachments(part, &mut out);
    }
    out
}

fn walk_attachments(part: &Part, out: &mut Vec<AttachmentDescriptor>) {
    if part.is_attachment() {
        out.push(AttachmentDescriptor {
            filename: part.filename.clone().unwrap_or_default(),
            mime_type: part.mime_type.clone(),
            size: part.size,
            attachment_id: part.attachment_ref.clone().filter(|r| !r.is_empty()),
        });
    }
    for child in &part.children {
        walk_attachments(child, out);
    }
}

/// Get header value by case-insensitive name (first match wins)
pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Return headers, either curated or all
///
/// If `include_all=true`, returns all headers. Otherwise, returns only
/// a safe subset (Date, From, To, Cc, Subject, Message-ID).
pub fn curated_headers(headers: &[Header], include_all: bool) -> Vec<(String, String)> {
    let allowed = ["date", "from", "to", "cc", "subject", "message-id"];
    headers
        .iter()
        .filter(|h| include_all || allowed.contains(&h.name.to_ascii_lowercase().as_str()))
        .map(|h| (h.name.clone(), h.value.clone()))
        .collect()
}

/// Truncate string to maximum characters (Unicode-aware)
///
/// Preserves complete characters, never splitting multi-byte sequences.
pub fn truncate_chars(input: String, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input;
    }
    input.chars().take(max_chars).collect()
}
