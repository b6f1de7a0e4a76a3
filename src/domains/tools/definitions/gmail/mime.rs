//! RFC 5322 message building for outgoing mail.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

/// Base64 lines are wrapped at this width (RFC 2045 allows up to 76).
const LINE_WIDTH: usize = 76;

const BOUNDARY_PREFIX: &str = "=_tool_adapter_";

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = content_type_for(&filename);
        Self {
            filename,
            content_type,
            data,
        }
    }
}

/// A plain-text message with at most one attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

impl OutgoingMail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            attachment: None,
        }
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Render as multipart/mixed: a text/plain part, then the attachment.
    pub fn to_rfc5322(&self) -> String {
        let boundary = boundary_for(self);
        let mut out = String::new();
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str(&format!("To: {}\r\n", strip_newlines(&self.to)));
        out.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        out.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
        ));

        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
        out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        out.push_str(&wrapped_base64(self.body.as_bytes()));

        if let Some(attachment) = &self.attachment {
            let filename = strip_newlines(&attachment.filename).replace('"', "");
            out.push_str(&format!("--{boundary}\r\n"));
            out.push_str(&format!(
                "Content-Type: {}; name=\"{filename}\"\r\n",
                attachment.content_type
            ));
            out.push_str("Content-Transfer-Encoding: base64\r\n");
            out.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n"
            ));
            out.push_str(&wrapped_base64(&attachment.data));
        }

        out.push_str(&format!("--{boundary}--\r\n"));
        out
    }

    /// The `raw` field expected by `users.messages.send`.
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.to_rfc5322())
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
pub fn encode_header(value: &str) -> String {
    let value = strip_newlines(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Guess a MIME type from the file extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

fn strip_newlines(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn wrapped_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // Base64 output is ASCII.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

/// Deterministic boundary that cannot occur in base64 bodies (`=` followed
/// by `_` is not valid base64).
fn boundary_for(mail: &OutgoingMail) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in mail.to.bytes().chain(mail.subject.bytes()).chain(mail.body.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    format!("{BOUNDARY_PREFIX}{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_raw(raw: &str) -> String {
        String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_plain_message_structure() {
        let mail = OutgoingMail::new("bob@example.com", "Hello", "Hi Bob");
        let text = mail.to_rfc5322();
        assert!(text.starts_with("MIME-Version: 1.0\r\nTo: bob@example.com\r\nSubject: Hello\r\n"));
        assert!(text.contains("multipart/mixed; boundary=\"=_tool_adapter_"));
        assert!(text.contains(&STANDARD.encode("Hi Bob")));
        assert!(text.trim_end().ends_with("--"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded_word() {
        assert_eq!(encode_header("Plain"), "Plain");
        let encoded = encode_header("Café");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert_eq!(encoded, format!("=?UTF-8?B?{}?=", STANDARD.encode("Café")));
    }

    #[test]
    fn test_header_injection_is_neutralised() {
        let mail = OutgoingMail::new("a@example.com\r\nBcc: evil@example.com", "s", "b");
        let text = mail.to_rfc5322();
        assert!(!text.contains("\r\nBcc:"));
    }

    #[test]
    fn test_attachment_part() {
        let mail = OutgoingMail::new("a@example.com", "Report", "See attached")
            .attach(Attachment::new("report.pdf", b"%PDF-1.4".to_vec()));
        let text = decode_raw(&mail.to_raw());
        assert!(text.contains("Content-Type: application/pdf; name=\"report.pdf\""));
        assert!(text.contains("Content-Disposition: attachment; filename=\"report.pdf\""));
        assert!(text.contains(&STANDARD.encode(b"%PDF-1.4")));
    }

    #[test]
    fn test_long_body_lines_are_wrapped() {
        let body = "x".repeat(500);
        let text = OutgoingMail::new("a@example.com", "s", body).to_rfc5322();
        assert!(text.lines().all(|l| l.trim_end_matches('\r').len() <= LINE_WIDTH));
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("archive.tar.gz"), "application/octet-stream");
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }
}
