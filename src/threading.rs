//! Reply threading header derivation
//!
//! Turns the headers of a received message into the inputs a reply needs so
//! that mail clients group it into the same conversation (RFC 5322 §3.6.4).

use crate::mime::{Header, header_value};

/// Literal prefix marking a subject as a reply
const REPLY_PREFIX: &str = "Re:";

/// Threading inputs for a reply to the original sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyThreading {
    /// Original `From` value (reply goes to the sender only)
    pub to: Option<String>,
    /// Original `Message-ID`
    pub in_reply_to: Option<String>,
    /// Original `References` chain with the original `Message-ID` appended
    pub references: Option<String>,
    /// Original subject, prefixed with `Re: ` unless already a reply
    pub thread_subject: String,
}

/// Derive reply threading from the original message headers
pub fn derive_reply(headers: &[Header]) -> ReplyThreading {
    let message_id = header_value(headers, "Message-ID").map(str::to_owned);
    let prior = header_value(headers, "References");

    let references = match (prior, message_id.as_deref()) {
        (Some(chain), Some(id)) => Some(format!("{chain} {id}")),
        (None, Some(id)) => Some(id.to_owned()),
        (Some(chain), None) => Some(chain.to_owned()),
        (None, None) => None,
    };

    let subject = header_value(headers, "Subject").unwrap_or_default();
    let thread_subject = if subject.starts_with(REPLY_PREFIX) {
        subject.to_owned()
    } else {
        format!("{REPLY_PREFIX} {subject}")
    };

    ReplyThreading {
        to: header_value(headers, "From").map(str::to_owned),
        in_reply_to: message_id,
        references,
        thread_subject,
    }
}

#[cfg(test)]
mod tests {
    use super::derive_reply;
    use crate::mime::Header;

    #[test]
    fn derives_threading_from_original_headers() {
        let headers = vec![
            Header::new("Message-ID", "<abc@x>"),
            Header::new("References", "<zzz@x>"),
            Header::new("Subject", "Meeting"),
            Header::new("From", "a@b.com"),
        ];
        let reply = derive_reply(&headers);
        assert_eq!(reply.in_reply_to.as_deref(), Some("<abc@x>"));
        assert_eq!(reply.references.as_deref(), Some("<zzz@x> <abc@x>"));
        assert_eq!(reply.thread_subject, "Re: Meeting");
        assert_eq!(reply.to.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn existing_reply_subject_is_kept() {
        let headers = vec![
            Header::new("Message-Id", "<abc@x>"),
            Header::new("subject", "Re: Meeting"),
        ];
        let reply = derive_reply(&headers);
        assert_eq!(reply.thread_subject, "Re: Meeting");
        assert_eq!(reply.references.as_deref(), Some("<abc@x>"));
    }

    #[test]
    fn prefix_check_is_case_sensitive() {
        let headers = vec![Header::new("Subject", "RE: Meeting")];
        assert_eq!(derive_reply(&headers).thread_subject, "Re: RE: Meeting");
    }

    #[test]
    fn missing_message_id_keeps_prior_chain() {
        let headers = vec![Header::new("References", "<zzz@x>")];
        let reply = derive_reply(&headers);
        assert!(reply.in_reply_to.is_none());
        assert_eq!(reply.references.as_deref(), Some("<zzz@x>"));
        assert_eq!(reply.thread_subject, "Re: ");
        assert!(reply.to.is_none());
    }
}
