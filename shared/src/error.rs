//! Backend error body
//!
//! Non-2xx responses may carry `{ "message": ... }`. Validation failures on
//! the backend send an array of messages instead of a single string.

use serde::Deserialize;

/// Optional message payload of a failed backend call
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<ErrorMessage>,
}

/// `message` is either a string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ApiErrorBody {
    /// Parse a raw response body; anything that is not JSON yields `None`
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Message to show to the operator verbatim, if the backend sent one
    pub fn text(&self) -> Option<String> {
        let text = match self.message.as_ref()? {
            ErrorMessage::One(msg) => msg.trim().to_string(),
            ErrorMessage::Many(msgs) => msgs.join("; "),
        };
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let body = ApiErrorBody::parse(r#"{"message":"Станция занята","statusCode":409}"#).unwrap();
        assert_eq!(body.text().as_deref(), Some("Станция занята"));
    }

    #[test]
    fn test_message_list_is_joined() {
        let body = ApiErrorBody::parse(r#"{"message":["price must be positive","quantity must be an integer"]}"#)
            .unwrap();
        assert_eq!(
            body.text().as_deref(),
            Some("price must be positive; quantity must be an integer")
        );
    }

    #[test]
    fn test_missing_or_blank_message() {
        assert_eq!(ApiErrorBody::parse("{}").unwrap().text(), None);
        assert_eq!(ApiErrorBody::parse(r#"{"message":"  "}"#).unwrap().text(), None);
        assert!(ApiErrorBody::parse("Bad Gateway").is_none());
    }
}
