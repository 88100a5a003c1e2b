//! Response types for the gateway.
//!
//! A streamed chunk uses the same [`ChatResponse`] shape as a synchronous
//! response; it carries no usage and an empty finish reason until the final
//! chunk.

use crate::error::{GatewayError, GatewayResult};
use crate::request::Message;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Object kind of a synchronous response
pub const OBJECT_COMPLETION: &str = "chat.completion";

/// Object kind of a streamed chunk
pub const OBJECT_CHUNK: &str = "chat.completion.chunk";

/// Canonical chat response (also used for stream chunks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response identifier
    pub id: String,
    /// Object kind
    pub object: String,
    /// Unix timestamp (seconds)
    pub created: i64,
    /// Model that produced the response
    pub model: String,
    /// Ordered choices
    pub choices: Vec<Choice>,
    /// Token usage, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Single-choice synchronous response
    #[must_use]
    pub fn completion(
        id: impl Into<String>,
        model: impl Into<String>,
        content: impl Into<String>,
        finish_reason: FinishReason,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id: id.into(),
            object: OBJECT_COMPLETION.to_string(),
            created: Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice::new(0, Message::assistant(content), finish_reason)],
            usage,
        }
    }

    /// Single-choice stream chunk
    #[must_use]
    pub fn chunk(
        id: impl Into<String>,
        model: impl Into<String>,
        created: i64,
        content: impl Into<String>,
        finish_reason: FinishReason,
    ) -> Self {
        Self {
            id: id.into(),
            object: OBJECT_CHUNK.to_string(),
            created,
            model: model.into(),
            choices: vec![Choice::new(0, Message::assistant(content), finish_reason)],
            usage: None,
        }
    }

    /// Content of the first choice, or an empty string
    #[must_use]
    pub fn content(&self) -> &str {
        self.choices.first().map_or("", |c| c.message.content())
    }

    /// Finish reason of the first choice
    #[must_use]
    pub fn finish_reason(&self) -> FinishReason {
        self.choices
            .first()
            .map_or(FinishReason::Unset, |c| c.finish_reason)
    }

    /// Whether this chunk terminates a stream
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.finish_reason() != FinishReason::Unset
    }
}

/// One choice of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    pub index: u32,
    /// Generated message
    pub message: Message,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: FinishReason,
}

impl Choice {
    /// Create a choice
    #[must_use]
    pub fn new(index: u32, message: Message, finish_reason: FinishReason) -> Self {
        Self {
            index,
            message,
            finish_reason,
        }
    }
}

/// Finish reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishReason {
    /// Generation still in progress
    #[default]
    #[serde(rename = "")]
    Unset,
    /// Natural stop
    #[serde(rename = "stop")]
    Stop,
    /// Token limit reached
    #[serde(rename = "length")]
    Length,
    /// Backend reported an error
    #[serde(rename = "error")]
    Error,
}

impl FinishReason {
    /// Map a backend-native stop reason onto the canonical set
    #[must_use]
    pub fn from_backend(reason: Option<&str>) -> Self {
        match reason {
            None | Some("") => Self::Unset,
            Some("length" | "max_tokens") => Self::Length,
            Some("error") => Self::Error,
            Some(_) => Self::Stop,
        }
    }

    /// Wire representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Error => "error",
        }
    }
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage with `total = prompt + completion`
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Result of a single-prompt completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Token usage, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: FinishReason,
    /// Unix timestamp (seconds)
    pub created: i64,
}

impl Completion {
    /// Take the first choice of a chat response
    ///
    /// # Errors
    /// Returns a provider error if the response carries no choices
    pub fn from_response(provider: &str, response: ChatResponse) -> GatewayResult<Self> {
        let ChatResponse {
            model,
            created,
            usage,
            choices,
            ..
        } = response;

        let choice = choices.into_iter().next().ok_or_else(|| {
            GatewayError::provider(provider, "no choices in response", None, false)
        })?;

        Ok(Self {
            content: choice.message.content().to_string(),
            model,
            usage,
            finish_reason: choice.finish_reason,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_wire_format() {
        let json = serde_json::to_string(&FinishReason::Unset).expect("serialize");
        assert_eq!(json, "\"\"");
        let json = serde_json::to_string(&FinishReason::Stop).expect("serialize");
        assert_eq!(json, "\"stop\"");

        let parsed: FinishReason = serde_json::from_str("\"length\"").expect("deserialize");
        assert_eq!(parsed, FinishReason::Length);
    }

    #[test]
    fn test_finish_reason_from_backend() {
        assert_eq!(FinishReason::from_backend(None), FinishReason::Unset);
        assert_eq!(FinishReason::from_backend(Some("end_turn")), FinishReason::Stop);
        assert_eq!(FinishReason::from_backend(Some("max_tokens")), FinishReason::Length);
        assert_eq!(FinishReason::from_backend(Some("error")), FinishReason::Error);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage::new(10, 12);
        assert_eq!(usage.total_tokens, 22);
    }

    #[test]
    fn test_chunk_is_final() {
        let chunk = ChatResponse::chunk("id-0", "mock", 0, "Hello ", FinishReason::Unset);
        assert!(!chunk.is_final());
        assert_eq!(chunk.object, OBJECT_CHUNK);
        assert!(chunk.usage.is_none());

        let last = ChatResponse::chunk("id-1", "mock", 0, "bye ", FinishReason::Stop);
        assert!(last.is_final());
    }

    #[test]
    fn test_usage_omitted_when_absent() {
        let chunk = ChatResponse::chunk("id", "mock", 1, "x", FinishReason::Unset);
        let json = serde_json::to_value(&chunk).expect("serialize");
        assert!(json.get("usage").is_none());
        assert_eq!(json["choices"][0]["finish_reason"], "");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    }

    #[test]
    fn test_completion_from_empty_response() {
        let mut response =
            ChatResponse::completion("id", "m", "text", FinishReason::Stop, Some(Usage::new(1, 2)));
        response.choices.clear();
        let result = Completion::from_response("openrouter", response);
        assert!(matches!(result, Err(GatewayError::Provider { .. })));
    }
}
