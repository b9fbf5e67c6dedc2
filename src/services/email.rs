//! Best-effort email metadata for message uploads.
//!
//! `.eml` files are parsed as MIME messages with `mailparse`: encoded-word
//! headers are decoded and the first `text/plain` part is returned with its
//! transfer encoding and charset undone. Outlook `.msg` containers are not
//! parsed; they get placeholder metadata.

use chrono::{DateTime, NaiveDate};
use mailparse::{MailHeaderMap, ParsedMail};

use crate::error::{PorError, PorResult};

pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN_SENDER: &str = "Unknown Sender";
pub const MSG_SUBJECT: &str = "Email Subject (MSG file)";
pub const MSG_BODY: &str = "MSG file content - manual processing required";

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMetadata {
    pub subject: String,
    pub from: String,
    /// Raw `Date` header, or the placeholder date for stubs.
    pub date: String,
    pub body: String,
}

impl EmailMetadata {
    /// The `Date` header as a calendar date, when it is valid RFC 2822.
    pub fn sent_on(&self) -> Option<NaiveDate> {
        DateTime::parse_from_rfc2822(self.date.trim())
            .ok()
            .map(|dt| dt.date_naive())
    }

    /// Sender without the `<address>` part.
    pub fn sender_name(&self) -> &str {
        match self.from.split_once('<') {
            Some((name, _)) => name.trim().trim_matches('"').trim(),
            None => self.from.trim(),
        }
    }
}

/// Placeholder metadata for an unparsed Outlook message.
pub fn msg_placeholder(today: &str) -> EmailMetadata {
    EmailMetadata {
        subject: MSG_SUBJECT.to_string(),
        from: UNKNOWN_SENDER.to_string(),
        date: today.to_string(),
        body: MSG_BODY.to_string(),
    }
}

/// Raw messages must open with a `Name: value` header line.
fn starts_with_header(text: &str) -> bool {
    let first = text.lines().next().unwrap_or_default();
    match first.split_once(':') {
        Some((name, _)) => !name.trim().is_empty() && !name.contains(char::is_whitespace),
        None => false,
    }
}

/// Decoded header value with folding whitespace collapsed.
fn header_value(mail: &ParsedMail<'_>, name: &str) -> Option<String> {
    let value = mail.headers.get_first_value(name)?;
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!value.is_empty()).then_some(value)
}

/// First `text/plain` body, descending into nested multiparts.
fn plain_text_body(mail: &ParsedMail<'_>) -> Option<String> {
    if mail.ctype.mimetype.starts_with("multipart/") {
        return mail.subparts.iter().find_map(plain_text_body);
    }
    if mail.ctype.mimetype != "text/plain" {
        return None;
    }
    let body = mail.get_body().ok()?;
    Some(body.replace("\r\n", "\n").trim().to_string())
}

pub fn parse_eml(bytes: &[u8]) -> PorResult<EmailMetadata> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or(PorError::EmptyDocument)?;
    let raw = &bytes[start..];
    if !starts_with_header(&String::from_utf8_lossy(raw)) {
        return Err(PorError::UnreadableDocument(
            "No message headers found".to_string(),
        ));
    }
    let mail = mailparse::parse_mail(raw)
        .map_err(|e| PorError::UnreadableDocument(format!("Malformed message: {}", e)))?;

    Ok(EmailMetadata {
        subject: header_value(&mail, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string()),
        from: header_value(&mail, "From").unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        date: header_value(&mail, "Date").unwrap_or_default(),
        body: plain_text_body(&mail).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "From: \"Jane Doe\" <jane@example.com>\r\n\
Subject: Supplier quote for\r\n  valves\r\n\
Date: Fri, 31 Jan 2025 10:15:00 +0000\r\n\
\r\n\
Please raise a PO.\r\n";

    const MULTIPART: &str = "From: ops@example.com\n\
Subject: Parts\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\n\
\n\
--XYZ\n\
Content-Type: text/html\n\
\n\
<p>html</p>\n\
--XYZ\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
plain body\n\
--XYZ--\n";

    #[test]
    fn test_parse_simple_message() {
        let meta = parse_eml(SIMPLE.as_bytes()).unwrap();
        assert_eq!(meta.subject, "Supplier quote for valves");
        assert_eq!(meta.sender_name(), "Jane Doe");
        assert_eq!(meta.body, "Please raise a PO.");
        assert_eq!(meta.sent_on(), NaiveDate::from_ymd_opt(2025, 1, 31));
    }

    #[test]
    fn test_multipart_picks_plain_text() {
        let meta = parse_eml(MULTIPART.as_bytes()).unwrap();
        assert_eq!(meta.body, "plain body");
        assert_eq!(meta.sender_name(), "ops@example.com");
        assert_eq!(meta.sent_on(), None);
    }

    const ENCODED: &str = "From: =?utf-8?q?Jos=C3=A9_Ruiz?= <jose@example.com>\r\n\
Subject: =?UTF-8?B?U3VwcGxpZXIgcXVvdGU=?=\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
UGxlYXNlIG9yZGVy\r\n";

    const QUOTED_PRINTABLE_PART: &str = "From: ops@example.com\n\
Subject: =?iso-8859-1?q?Caf=E9_order?=\n\
Content-Type: multipart/mixed; boundary=\"b1\"\n\
\n\
--b1\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
Price =C2=A312 each\n\
--b1--\n";

    #[test]
    fn test_encoded_headers_and_base64_body() {
        let meta = parse_eml(ENCODED.as_bytes()).unwrap();
        assert_eq!(meta.subject, "Supplier quote");
        assert_eq!(meta.sender_name(), "José Ruiz");
        assert_eq!(meta.body, "Please order");
    }

    #[test]
    fn test_quoted_printable_part() {
        let meta = parse_eml(QUOTED_PRINTABLE_PART.as_bytes()).unwrap();
        assert_eq!(meta.subject, "Café order");
        assert_eq!(meta.body, "Price £12 each");
    }

    #[test]
    fn test_missing_headers_get_defaults() {
        let meta = parse_eml(b"X-Mailer: test\n\nbody").unwrap();
        assert_eq!(meta.subject, NO_SUBJECT);
        assert_eq!(meta.from, UNKNOWN_SENDER);
    }

    #[test]
    fn test_unreadable_and_empty() {
        assert!(matches!(
            parse_eml(b"just some words"),
            Err(PorError::UnreadableDocument(_))
        ));
        assert!(matches!(parse_eml(b"  \n "), Err(PorError::EmptyDocument)));
    }

    #[test]
    fn test_msg_placeholder() {
        let meta = msg_placeholder("01/02/2025");
        assert_eq!(meta.subject, MSG_SUBJECT);
        assert_eq!(meta.date, "01/02/2025");
    }
}
