//! Message header and body encoding on top of lettre's builder

use crate::error::{ConfigError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use encoding_rs::Encoding;
use lettre::message::header::{
    ContentTransferEncoding, ContentType, Header, HeaderName, HeaderValue,
};
use lettre::message::Body;

/// Longest encoded-word allowed by RFC 2047
const MAX_ENCODED_WORD_LEN: usize = 75;

/// `X-Priority` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPriority(String);

impl XPriority {
    /// Priority `1`, the value used for important mail
    pub fn highest() -> Self {
        Self("1".to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl Header for XPriority {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Priority")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.trim().to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `Subject` header whose non-ASCII text is RFC 2047 encoded in the
/// message charset instead of lettre's fixed UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSubject {
    raw: String,
    encoded: String,
}

impl EncodedSubject {
    pub fn new(subject: &str, charset: &str, encoding: &'static Encoding) -> Result<Self> {
        Ok(Self {
            raw: subject.to_string(),
            encoded: encode_header_text(subject, charset, encoding)?,
        })
    }

    /// Value as written to the message
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

impl Header for EncodedSubject {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Subject")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self {
            raw: s.to_string(),
            encoded: s.to_string(),
        })
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::dangerous_new_pre_encoded(Self::name(), self.raw.clone(), self.encoded.clone())
    }
}

/// Look up an encoder for a charset label such as `ISO-8859-1`
pub fn resolve_charset(label: &str) -> Result<&'static Encoding> {
    let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        ConfigError::MessageBuildFailed(format!("Unknown charset '{}'", label))
    })?;
    // UTF-16 and friends decode only; encoding_rs would silently emit UTF-8
    if encoding.output_encoding() != encoding {
        return Err(ConfigError::MessageBuildFailed(format!(
            "Charset '{}' cannot be used to encode a message",
            label
        )));
    }
    Ok(encoding)
}

/// Encode text, failing on characters the charset cannot represent
pub fn encode_text(encoding: &'static Encoding, text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(ConfigError::MessageBuildFailed(format!(
            "Text cannot be represented in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

/// ASCII text is kept as is; anything else becomes base64 encoded-words
/// folded onto continuation lines.
fn encode_header_text(text: &str, charset: &str, encoding: &'static Encoding) -> Result<String> {
    if text.is_ascii() {
        return Ok(text.to_string());
    }

    // "=?" charset "?B?" ... "?="
    let overhead = charset.len() + 7;
    let max_bytes = (MAX_ENCODED_WORD_LEN.saturating_sub(overhead) / 4).max(1) * 3;

    let mut words = Vec::new();
    let mut chunk: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let bytes = encode_text(encoding, c.encode_utf8(&mut buf))?;
        if !chunk.is_empty() && chunk.len() + bytes.len() > max_bytes {
            words.push(encoded_word(charset, &chunk));
            chunk.clear();
        }
        chunk.extend_from_slice(&bytes);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(charset, &chunk));
    }

    Ok(words.join("\r\n "))
}

fn encoded_word(charset: &str, bytes: &[u8]) -> String {
    format!("=?{}?B?{}?=", charset, STANDARD.encode(bytes))
}

/// Parse a full `Content-Type` value such as `text/html; charset=utf-8`
pub fn parse_content_type(value: &str) -> Result<ContentType> {
    ContentType::parse(value).map_err(|e| {
        ConfigError::MessageBuildFailed(format!("Invalid content type '{}': {}", value, e))
    })
}

/// Body in `encoding`, sent with `Content-Transfer-Encoding: 8bit`.
///
/// Line endings become CRLF. Line length is not limited; NUL cannot be
/// carried by `DATA` and is rejected.
pub fn eight_bit_body(text: &str, encoding: &'static Encoding) -> Result<Body> {
    let bytes = encode_text(encoding, &crlf_line_endings(text))?;
    if bytes.contains(&0) {
        return Err(ConfigError::MessageBuildFailed(
            "Message body contains NUL bytes".to_string(),
        ));
    }
    Ok(Body::dangerous_pre_encoded(
        bytes,
        ContentTransferEncoding::EightBit,
    ))
}

fn crlf_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\r\n")
}
