use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// An attachment to embed in an outbound multipart message.
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Builds a `multipart/mixed` RFC 2822 message and returns it base64url
/// encoded, ready to hand to a provider's "raw message" send endpoint.
/// `mailparse` only parses MIME, it doesn't write it, so this is a small
/// hand-rolled writer grounded in the original system's Gmail MIME
/// construction (a base64url-encoded `multipart/mixed` body).
pub fn build_raw_message(
    from: &str,
    to: &str,
    subject: &str,
    body_text: &str,
    attachments: &[Attachment],
) -> String {
    let boundary = format!("boundary_{}", uuid::Uuid::new_v4().simple());
    let mut message = String::new();

    message.push_str(&format!("From: {from}\r\n"));
    message.push_str(&format!("To: {to}\r\n"));
    message.push_str(&format!("Subject: {subject}\r\n"));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
    ));

    message.push_str(&format!("--{boundary}\r\n"));
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n");
    message.push_str(body_text);
    message.push_str("\r\n");

    for attachment in attachments {
        message.push_str(&format!("--{boundary}\r\n"));
        message.push_str(&format!("Content-Type: {}\r\n", attachment.content_type));
        message.push_str("Content-Transfer-Encoding: base64\r\n");
        message.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
            attachment.filename
        ));
        message.push_str(&STANDARD.encode(&attachment.bytes));
        message.push_str("\r\n");
    }

    message.push_str(&format!("--{boundary}--"));

    base64::engine::general_purpose::URL_SAFE.encode(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_decodable_multipart_message() {
        let attachment = Attachment {
            filename: "resume.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        };
        let raw = build_raw_message(
            "candidate@example.com",
            "jobs@example.com",
            "Application for Backend Engineer",
            "Please find my resume attached.",
            &[attachment],
        );
        let decoded = base64::engine::general_purpose::URL_SAFE
            .decode(raw)
            .expect("valid base64url");
        let text = String::from_utf8(decoded).expect("valid utf8");
        assert!(text.contains("Subject: Application for Backend Engineer"));
        assert!(text.contains("resume.pdf"));
        assert!(text.contains("multipart/mixed"));
    }
}
