//! Outgoing message assembly
//!
//! Builds RFC 2822 messages from compose parameters. A message without
//! attachments is a single `text/plain` part; with attachments it becomes
//! `multipart/mixed` (RFC 2046) with each file base64-encoded. The finished
//! wire text is wrapped in URL-safe base64 for the Gmail `raw` field.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::encoding::{encode_base64_wrapped, encode_url_safe};
use crate::errors::{AppError, AppResult};

const CRLF: &str = "\r\n";

/// Parameters for one outgoing message
///
/// Strings are assumed validated by the tool layer (no CR/LF in header fields).
#[derive(Debug, Clone, Default)]
pub struct ComposeRequest {
    /// Comma-joined recipient list
    pub to: String,
    /// Subject line (ignored when `thread_subject` is set)
    pub subject: String,
    /// Plain-text body
    pub body_text: String,
    /// Comma-joined Cc list
    pub cc: Option<String>,
    /// Comma-joined Bcc list
    pub bcc: Option<String>,
    /// Local files to attach, in order
    pub attachments: Vec<PathBuf>,
    /// Message-ID being answered
    pub in_reply_to: Option<String>,
    /// Space-joined Message-ID chain
    pub references: Option<String>,
    /// Subject override for replies (e.g. `Re: ...`)
    pub thread_subject: Option<String>,
}

/// URL-safe base64 text of a complete wire message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(String);

impl EncodedMessage {
    /// Borrow the encoded text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encode a compose request for transport
///
/// Attachment files are read fully before anything is assembled.
///
/// # Errors
///
/// - `AttachmentRead` if any attachment path cannot be read
pub fn encode(request: &ComposeRequest) -> AppResult<EncodedMessage> {
    let raw = render_message(request)?;
    Ok(EncodedMessage(encode_url_safe(raw.as_bytes())))
}

/// Render the RFC 2822 wire text of a compose request
///
/// # Errors
///
/// - `AttachmentRead` if any attachment path cannot be read
pub fn render_message(request: &ComposeRequest) -> AppResult<String> {
    if request.attachments.is_empty() {
        return Ok(render_simple(request));
    }

    let files = request
        .attachments
        .iter()
        .map(|path| load_attachment(path))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(render_multipart(request, &files, &generate_boundary()))
}

/// Attachment file contents ready for embedding
struct AttachmentFile {
    basename: String,
    mime_type: &'static str,
    data: Vec<u8>,
}

fn load_attachment(path: &Path) -> AppResult<AttachmentFile> {
    let data = fs::read(path).map_err(|source| AppError::AttachmentRead {
        path: path.display().to_string(),
        source,
    })?;
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_owned());
    Ok(AttachmentFile {
        mime_type: guess_mime_type(&basename),
        basename,
        data,
    })
}

fn address_headers(request: &ComposeRequest, lines: &mut Vec<String>) {
    lines.push(format!("To: {}", request.to));
    if let Some(cc) = &request.cc {
        lines.push(format!("Cc: {cc}"));
    }
    if let Some(bcc) = &request.bcc {
        lines.push(format!("Bcc: {bcc}"));
    }
    let subject = request.thread_subject.as_deref().unwrap_or(&request.subject);
    lines.push(format!("Subject: {subject}"));
}

fn threading_headers(request: &ComposeRequest, lines: &mut Vec<String>) {
    if let Some(in_reply_to) = &request.in_reply_to {
        lines.push(format!("In-Reply-To: {in_reply_to}"));
        let references = request.references.as_deref().unwrap_or(in_reply_to);
        lines.push(format!("References: {references}"));
    }
}

fn render_simple(request: &ComposeRequest) -> String {
    let mut lines = Vec::new();
    address_headers(request, &mut lines);
    lines.push("Content-Type: text/plain; charset=utf-8".to_owned());
    threading_headers(request, &mut lines);
    lines.push(String::new());
    lines.push(request.body_text.clone());
    lines.join(CRLF)
}

fn render_multipart(request: &ComposeRequest, files: &[AttachmentFile], boundary: &str) -> String {
    let mut lines = Vec::new();
    address_headers(request, &mut lines);
    lines.push("MIME-Version: 1.0".to_owned());
    threading_headers(request, &mut lines);
    lines.push(format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\""
    ));
    lines.push(String::new());

    lines.push(format!("--{boundary}"));
    lines.push("Content-Type: text/plain; charset=utf-8".to_owned());
    lines.push(String::new());
    lines.push(request.body_text.clone());
    lines.push(String::new());

    for file in files {
        let name = quote_param(&file.basename);
        lines.push(format!("--{boundary}"));
        lines.push(format!("Content-Type: {}; name=\"{name}\"", file.mime_type));
        lines.push("Content-Transfer-Encoding: base64".to_owned());
        lines.push(format!("Content-Disposition: attachment; filename=\"{name}\""));
        lines.push(String::new());
        lines.push(encode_base64_wrapped(&file.data));
        lines.push(String::new());
    }

    lines.push(format!("--{boundary}--"));
    lines.join(CRLF)
}

/// Escape a value for use inside a quoted MIME parameter
fn quote_param(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Generate a multipart boundary from the current time and a random UUID
///
/// Uniqueness is probabilistic; content is not scanned for collisions.
fn generate_boundary() -> String {
    format!(
        "=_part_{}_{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Guess a MIME type from a filename extension (case-insensitive)
///
/// Unknown or missing extensions map to `application/octet-stream`.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        // documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "rtf" => "application/rtf",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "md" => "text/markdown",
        "json" => "application/json",
        "xml" => "application/xml",
        "ics" => "text/calendar",
        // images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "heic" => "image/heic",
        // audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        // video
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        // archives
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use mailparse::ParsedMail;

    use super::{ComposeRequest, encode, guess_mime_type, render_message};
    use crate::encoding::{decode_url_safe, encode_url_safe};
    use crate::mime::{Header, Part, decode_body};

    fn basic_request() -> ComposeRequest {
        ComposeRequest {
            to: "bob@example.com".to_owned(),
            subject: "Status".to_owned(),
            body_text: "All good.\r\nSee you.".to_owned(),
            ..ComposeRequest::default()
        }
    }

    fn decoded(request: &ComposeRequest) -> String {
        let encoded = encode(request).expect("encode succeeds");
        let raw = decode_url_safe(encoded.as_str()).expect("outer layer decodes");
        String::from_utf8(raw).expect("wire text is utf-8")
    }

    fn boundary_of(raw: &str) -> String {
        let start = raw.find("boundary=\"").expect("boundary param") + "boundary=\"".len();
        let end = raw[start..].find('"').expect("closing quote") + start;
        raw[start..end].to_owned()
    }

    /// Convert a parsed message back into a provider-style part tree
    fn to_part(mail: &ParsedMail<'_>) -> Part {
        let payload = if mail.subparts.is_empty() {
            mail.get_body_raw().ok().map(|b| encode_url_safe(&b))
        } else {
            None
        };
        Part {
            mime_type: mail.ctype.mimetype.clone(),
            headers: mail
                .headers
                .iter()
                .map(|h| Header::new(h.get_key(), h.get_value()))
                .collect(),
            payload,
            filename: mail.ctype.params.get("name").cloned(),
            children: mail.subparts.iter().map(to_part).collect(),
            ..Part::default()
        }
    }

    #[test]
    fn simple_message_has_minimal_headers() {
        let raw = decoded(&basic_request());
        let (head, body) = raw.split_once("\r\n\r\n").expect("header/body separator");
        let headers: Vec<&str> = head.split("\r\n").collect();
        assert_eq!(
            headers,
            [
                "To: bob@example.com",
                "Subject: Status",
                "Content-Type: text/plain; charset=utf-8",
            ]
        );
        assert_eq!(body, "All good.\r\nSee you.");
    }

    #[test]
    fn simple_message_carries_optional_headers_in_order() {
        let request = ComposeRequest {
            cc: Some("carol@example.com".to_owned()),
            bcc: Some("dave@example.com".to_owned()),
            in_reply_to: Some("<abc@x>".to_owned()),
            thread_subject: Some("Re: Status".to_owned()),
            ..basic_request()
        };
        let raw = render_message(&request).expect("render succeeds");
        let head = raw.split("\r\n\r\n").next().expect("header block");
        assert_eq!(
            head,
            "To: bob@example.com\r\nCc: carol@example.com\r\nBcc: dave@example.com\r\n\
             Subject: Re: Status\r\nContent-Type: text/plain; charset=utf-8\r\n\
             In-Reply-To: <abc@x>\r\nReferences: <abc@x>"
        );
    }

    #[test]
    fn explicit_references_are_used_when_replying() {
        let request = ComposeRequest {
            in_reply_to: Some("<abc@x>".to_owned()),
            references: Some("<zzz@x> <abc@x>".to_owned()),
            ..basic_request()
        };
        let raw = render_message(&request).expect("render succeeds");
        assert!(raw.contains("\r\nReferences: <zzz@x> <abc@x>\r\n"));
    }

    #[test]
    fn references_without_in_reply_to_are_dropped() {
        let request = ComposeRequest {
            references: Some("<zzz@x>".to_owned()),
            ..basic_request()
        };
        let raw = render_message(&request).expect("render succeeds");
        assert!(!raw.contains("References:"));
        assert!(!raw.contains("In-Reply-To:"));
    }

    #[test]
    fn attachment_produces_two_part_multipart_message() {
        let mut file = tempfile::Builder::new()
            .suffix(".PDF")
            .tempfile()
            .expect("temp file");
        let content: Vec<u8> = (0..=255).cycle().take(300).collect();
        file.write_all(&content).expect("write fixture");

        let request = ComposeRequest {
            attachments: vec![file.path().to_path_buf()],
            ..basic_request()
        };
        let raw = decoded(&request);
        let boundary = boundary_of(&raw);
        let delimiter = format!("--{boundary}");

        assert!(raw.contains("\r\nMIME-Version: 1.0\r\n"));
        assert!(raw.contains("Content-Type: multipart/mixed; boundary=\""));
        assert!(raw.ends_with(&format!("{delimiter}--")));

        let sections: Vec<&str> = raw.split(delimiter.as_str()).collect();
        // preamble, body part, attachment part, closing "--"
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[3], "--");
        assert!(sections[1].contains("Content-Type: text/plain; charset=utf-8"));
        assert!(sections[1].contains("All good.\r\nSee you."));

        let attachment = sections[2];
        let basename = file
            .path()
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .into_owned();
        assert!(attachment.contains(&format!(
            "Content-Type: application/pdf; name=\"{basename}\""
        )));
        assert!(attachment.contains("Content-Transfer-Encoding: base64"));
        assert!(attachment.contains(&format!(
            "Content-Disposition: attachment; filename=\"{basename}\""
        )));

        let encoded_body = attachment
            .split("\r\n\r\n")
            .nth(1)
            .expect("attachment body")
            .trim_end();
        let lines: Vec<&str> = encoded_body.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == 76));
        assert!(lines.iter().all(|l| l.len() <= 76));

        let parsed = mailparse::parse_mail(raw.as_bytes()).expect("parse mail");
        assert_eq!(parsed.subparts.len(), 2);
        assert_eq!(
            parsed.subparts[1].get_body_raw().expect("attachment bytes"),
            content
        );
    }

    #[test]
    fn threaded_reply_with_two_attachments_keeps_order() {
        let mut first = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp file");
        first.write_all(b"a,b\r\n1,2\r\n").expect("write fixture");
        let mut second = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("temp file");
        let image: Vec<u8> = (0..=255).rev().cycle().take(500).collect();
        second.write_all(&image).expect("write fixture");

        let request = ComposeRequest {
            attachments: vec![first.path().to_path_buf(), second.path().to_path_buf()],
            in_reply_to: Some("<abc@x>".to_owned()),
            references: Some("<zzz@x> <abc@x>".to_owned()),
            thread_subject: Some("Re: Status".to_owned()),
            ..basic_request()
        };
        let raw = decoded(&request);
        let boundary = boundary_of(&raw);

        let head = raw.split("\r\n\r\n").next().expect("header block");
        assert_eq!(
            head,
            format!(
                "To: bob@example.com\r\nSubject: Re: Status\r\nMIME-Version: 1.0\r\n\
                 In-Reply-To: <abc@x>\r\nReferences: <zzz@x> <abc@x>\r\n\
                 Content-Type: multipart/mixed; boundary=\"{boundary}\""
            )
        );

        let sections: Vec<&str> = raw.split(format!("--{boundary}").as_str()).collect();
        // preamble, body, two attachments, closing "--"
        assert_eq!(sections.len(), 5);
        assert!(sections[2].contains("Content-Type: text/csv; name="));
        assert!(sections[3].contains("Content-Type: image/png; name="));

        let parsed = mailparse::parse_mail(raw.as_bytes()).expect("parse mail");
        assert_eq!(parsed.subparts.len(), 3);
        assert_eq!(
            parsed.subparts[0].get_body().expect("body text").trim_end(),
            "All good.\r\nSee you."
        );
        assert_eq!(
            parsed.subparts[1].get_body_raw().expect("csv bytes"),
            b"a,b\r\n1,2\r\n"
        );
        assert_eq!(parsed.subparts[2].get_body_raw().expect("png bytes"), image);
    }

    #[test]
    fn boundaries_differ_between_messages() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let request = ComposeRequest {
            attachments: vec![file.path().to_path_buf()],
            ..basic_request()
        };
        let first = render_message(&request).expect("render succeeds");
        let second = render_message(&request).expect("render succeeds");
        assert_ne!(boundary_of(&first), boundary_of(&second));
    }

    #[test]
    fn missing_attachment_fails_with_path() {
        let request = ComposeRequest {
            attachments: vec![PathBuf::from("/definitely/not/here/report.pdf")],
            ..basic_request()
        };
        let err = encode(&request).expect_err("must fail");
        assert!(err.to_string().contains("/definitely/not/here/report.pdf"));
    }

    #[test]
    fn simple_message_body_survives_decode() {
        let request = basic_request();
        let raw = decoded(&request);
        let parsed = mailparse::parse_mail(raw.as_bytes()).expect("parse mail");
        let root = to_part(&parsed);
        assert_eq!(root.mime_type, "text/plain");
        assert_eq!(
            decode_body(Some(&root)).expect("decode succeeds"),
            request.body_text
        );
    }

    #[test]
    fn guesses_common_types_case_insensitively() {
        assert_eq!(guess_mime_type("report.PDF"), "application/pdf");
        assert_eq!(guess_mime_type("photo.JpEg"), "image/jpeg");
        assert_eq!(guess_mime_type("song.mp3"), "audio/mpeg");
        assert_eq!(guess_mime_type("clip.mov"), "video/quicktime");
        assert_eq!(guess_mime_type("bundle.zip"), "application/zip");
        assert_eq!(guess_mime_type("data.unknownext"), "application/octet-stream");
        assert_eq!(guess_mime_type("Makefile"), "application/octet-stream");
    }
}
