//! Wire formatting shared by the file and SMTP transports

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use contracts::{mailbox_address, Message};

/// Longest UTF-8 chunk per encoded-word; 45 bytes -> 60 base64 chars,
/// 72 with the `=?UTF-8?B?` / `?=` framing (limit is 75)
const MAX_WORD_BYTES: usize = 45;

/// Internet message text (headers + body), CRLF line endings
pub fn format_message(message: &Message, date: DateTime<Utc>, message_id: &str) -> String {
    let mut out = String::with_capacity(message.body.len() + 512);

    push_header(&mut out, "From", &encode_mailbox(&single_line(&message.from)));
    push_header(&mut out, "To", &encode_mailbox(&single_line(&message.to)));
    push_header(&mut out, "Subject", &encode_text(&single_line(&message.subject)));
    push_header(&mut out, "Date", &date.to_rfc2822());
    push_header(&mut out, "Message-ID", &format!("<{message_id}>"));
    push_header(&mut out, "MIME-Version", "1.0");
    push_header(&mut out, "Content-Type", message.body_format.content_type());
    push_header(&mut out, "Content-Transfer-Encoding", "8bit");
    out.push_str("\r\n");

    out.push_str(&to_crlf(&message.body));
    if !out.ends_with("\r\n") {
        out.push_str("\r\n");
    }
    out
}

/// Globally unique-enough id: `<seq>.<timestamp>@<sender domain>`
pub fn message_id(message: &Message, seq: u64, date: DateTime<Utc>) -> String {
    let domain = mailbox_address(&message.from)
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or("localhost");
    format!(
        "{}.{}.{}@{}",
        date.timestamp_millis(),
        std::process::id(),
        seq,
        domain
    )
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// Header values are single-line
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

/// RFC 2047 `B` encoding for non-ASCII unstructured text
///
/// ASCII passes through. Otherwise the text is cut on char boundaries into
/// encoded-words joined by folding whitespace.
pub fn encode_text(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > MAX_WORD_BYTES {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes()))
}

/// Encode the display name of `Name <addr>`; the address is left alone
pub fn encode_mailbox(mailbox: &str) -> String {
    let trimmed = mailbox.trim();
    if trimmed.is_ascii() {
        return trimmed.to_string();
    }
    let Some(start) = trimmed.rfind('<') else {
        // bare address, nothing to encode
        return trimmed.to_string();
    };
    let (display, address) = trimmed.split_at(start);
    let display = unquote(display.trim());
    if display.is_empty() {
        return address.to_string();
    }
    format!("{} {}", encode_text(&display), address)
}

/// Strip a quoted-string's quotes and escapes
fn unquote(display: &str) -> String {
    let Some(inner) = display
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return display.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize any mix of `\n` / `\r\n` line endings to `\r\n`
pub fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        if lines.peek().is_some() {
            out.push_str("\r\n");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use contracts::BodyFormat;

    fn message() -> Message {
        Message {
            from: "News <news@x.com>".into(),
            to: "Alice <alice@y.com>".into(),
            to_address: "alice@y.com".into(),
            subject: "Hello Alice".into(),
            body: "line one\nline two\r\n".into(),
            body_format: BodyFormat::Html,
        }
    }

    #[test]
    fn test_format_message() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let text = format_message(&message(), date, "1@x.com");

        assert!(text.starts_with("From: News <news@x.com>\r\nTo: Alice <alice@y.com>\r\n"));
        assert!(text.contains("Subject: Hello Alice\r\n"));
        assert!(text.contains("Date: Wed, 1 May 2024 12:00:00 +0000\r\n"));
        assert!(text.contains("Message-ID: <1@x.com>\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.ends_with("\r\n\r\nline one\r\nline two\r\n"));
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let id = message_id(&message(), 7, date);
        assert!(id.ends_with(".7@x.com"), "got: {id}");
    }

    #[test]
    fn test_non_ascii_headers_use_encoded_words() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut message = message();
        message.to = "Zoë <zoe@y.com>".into();
        message.subject = "Grüße Jürgen".into();
        let text = format_message(&message, date, "1@x.com");

        assert!(text.contains("To: =?UTF-8?B?Wm/Dqw==?= <zoe@y.com>\r\n"));
        assert!(text.contains("Subject: =?UTF-8?B?R3LDvMOfZSBKw7xyZ2Vu?=\r\n"));
        let headers = text.split("\r\n\r\n").next().unwrap();
        assert!(headers.is_ascii());
    }

    #[test]
    fn test_encode_mailbox() {
        assert_eq!(encode_mailbox("News <news@x.com>"), "News <news@x.com>");
        assert_eq!(
            encode_mailbox("\"José, Ana\" <ja@x.com>"),
            "=?UTF-8?B?Sm9zw6ksIEFuYQ==?= <ja@x.com>"
        );
        assert_eq!(encode_mailbox("josé@x.com"), "josé@x.com");
    }

    #[test]
    fn test_long_text_is_split_into_short_words() {
        let subject = "ü".repeat(100);
        let encoded = encode_text(&subject);
        let words: Vec<&str> = encoded.split("\r\n ").collect();

        assert_eq!(words.len(), 5);
        assert!(words.iter().all(|w| w.len() <= 75 && w.starts_with("=?UTF-8?B?")));
        let decoded: String = words
            .iter()
            .map(|w| {
                let payload = &w["=?UTF-8?B?".len()..w.len() - 2];
                String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap()
            })
            .collect();
        assert_eq!(decoded, subject);
    }

    #[test]
    fn test_to_crlf() {
        assert_eq!(to_crlf("a\nb\r\nc"), "a\r\nb\r\nc");
        assert_eq!(to_crlf("a\n"), "a\r\n");
        assert_eq!(to_crlf(""), "");
    }
}
