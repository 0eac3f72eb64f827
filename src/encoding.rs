//! Transfer encodings and HTML degradation
//!
//! Gmail carries message bodies, attachment blobs, and outgoing raw messages
//! as URL-safe base64. Attachments embedded inside an outgoing multipart body
//! use standard padded base64 wrapped at 76 columns (RFC 2045). HTML bodies
//! are flattened to readable text with a small, intentionally lossy rule set.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use regex::{Captures, Regex};

use crate::errors::{AppError, AppResult};

/// Maximum encoded line length inside a MIME body part
const BASE64_LINE_LENGTH: usize = 76;

/// URL-safe alphabet, padded on encode, padding optional on decode
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes with the URL-safe base64 alphabet (RFC 4648 §5)
pub fn encode_url_safe(data: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(data)
}

/// Decode URL-safe base64, with or without `=` padding
///
/// ASCII whitespace is ignored so that line-folded payloads decode too.
///
/// # Errors
///
/// - `Decode` if the input contains characters outside the alphabet or has
///   an impossible length
pub fn decode_url_safe(data: &str) -> AppResult<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| AppError::Decode(format!("invalid base64url payload: {e}")))
}

/// Encode bytes as standard base64 wrapped at 76 characters per line
///
/// Lines are joined with CRLF. No separator follows the final line.
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LENGTH * 2);
    // base64 output is ASCII, so every byte offset is a char boundary
    let mut rest = encoded.as_str();
    while rest.len() > BASE64_LINE_LENGTH {
        let (line, tail) = rest.split_at(BASE64_LINE_LENGTH);
        out.push_str(line);
        out.push_str("\r\n");
        rest = tail;
    }
    out.push_str(rest);
    out
}

struct HtmlRules {
    line_break: Regex,
    paragraph_end: Regex,
    div_end: Regex,
    any_tag: Regex,
    entity: Regex,
}

static HTML_RULES: LazyLock<HtmlRules> = LazyLock::new(|| HtmlRules {
    line_break: Regex::new(r"(?i)<br\b[^>]*>").expect("static regex"),
    paragraph_end: Regex::new(r"(?i)</p\s*>").expect("static regex"),
    div_end: Regex::new(r"(?i)</div\s*>").expect("static regex"),
    any_tag: Regex::new(r"<[^>]*>").expect("static regex"),
    entity: Regex::new(r"&(nbsp|amp|lt|gt|quot|#39);").expect("static regex"),
});

/// Degrade HTML to plain text
///
/// Not an HTML parser. Applies, in order: `<br>` → newline, `</p>` → blank
/// line, `</div>` → newline, strip remaining tags, decode `&nbsp;`, `&amp;`,
/// `&lt;`, `&gt;`, `&quot;` and `&#39;`, then trim surrounding whitespace.
/// Entities are decoded in a single pass, so `&amp;lt;` becomes `&lt;`.
pub fn html_to_text(html: &str) -> String {
    let rules = &*HTML_RULES;
    let text = rules.line_break.replace_all(html, "\n");
    let text = rules.paragraph_end.replace_all(&text, "\n\n");
    let text = rules.div_end.replace_all(&text, "\n");
    let text = rules.any_tag.replace_all(&text, "");
    let text = rules.entity.replace_all(&text, |caps: &Captures<'_>| {
        match &caps[1] {
            "nbsp" => " ",
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'",
        }
    });
    text.trim().to_owned()
}
