//! Request and response bodies, decoded by content type.

use serde_json::Value;

/// Content type assumed when a response carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
/// MIME type used for JSON documents.
pub const JSON_MIME: &str = "application/json";
/// Marker appended to the Content-Type of binary bodies.
pub const BINARY_CHARSET: &str = "charset=binary";

/// Decoded body content.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Binary(Vec<u8>),
    Json(Value),
    Text(String),
}

/// A body together with its MIME type (parameters stripped).
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub payload: Payload,
    pub mime_type: String,
}

impl Body {
    /// A JSON document.
    pub fn json(value: Value) -> Self {
        Self {
            payload: Payload::Json(value),
            mime_type: JSON_MIME.to_string(),
        }
    }

    /// A text document with the given MIME type.
    pub fn text(text: impl Into<String>, mime_type: &str) -> Self {
        Self {
            payload: Payload::Text(text.into()),
            mime_type: mime_type.to_string(),
        }
    }

    /// A binary document with the given MIME type.
    pub fn binary(bytes: Vec<u8>, mime_type: &str) -> Self {
        Self {
            payload: Payload::Binary(bytes),
            mime_type: mime_type.to_string(),
        }
    }

    /// Decode raw response bytes according to a Content-Type header.
    ///
    /// `charset=binary` keeps the bytes; `application/json` is parsed and left
    /// as text when parsing fails; anything else is text.
    pub fn decode(content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let mime_type = content_type
            .split(';')
            .next()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .trim()
            .to_string();

        if content_type.contains(BINARY_CHARSET) {
            return Self {
                payload: Payload::Binary(bytes),
                mime_type,
            };
        }

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                return Self {
                    payload: Payload::Binary(err.into_bytes()),
                    mime_type,
                }
            }
        };

        let payload = if mime_type == JSON_MIME {
            match serde_json::from_str(&text) {
                Ok(value) => Payload::Json(value),
                Err(_) => Payload::Text(text),
            }
        } else {
            Payload::Text(text)
        };

        Self { payload, mime_type }
    }

    /// Content-Type header value for uploading this body.
    pub fn content_type(&self) -> String {
        match self.payload {
            Payload::Binary(_) => format!("{}; {}", self.mime_type, BINARY_CHARSET),
            _ => self.mime_type.clone(),
        }
    }

    /// Serialized bytes for uploading this body.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Binary(bytes) => bytes.clone(),
            Payload::Json(value) => value.to_string().into_bytes(),
            Payload::Text(text) => text.clone().into_bytes(),
        }
    }

    /// The parsed JSON value, if this body holds one.
    pub fn as_json(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }
}
