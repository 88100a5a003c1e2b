//! Request types for the gateway.
//!
//! This module defines the canonical chat request shared by every backend adapter.

use crate::error::{GatewayError, GatewayResult};
use crate::options::CompletionOptions;
use serde::{Deserialize, Serialize};

/// Canonical chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Target model; empty means "use the adapter default"
    #[serde(default)]
    pub model: String,

    /// Ordered conversation messages
    pub messages: Vec<Message>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Enable streaming response
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new builder for `ChatRequest`
    #[must_use]
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }

    /// Build a single-turn request from resolved completion options
    #[must_use]
    pub fn from_prompt(options: &CompletionOptions, prompt: impl Into<String>) -> Self {
        Self {
            model: options.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: Some(options.max_tokens),
            temperature: Some(options.temperature),
            stream: false,
        }
    }

    /// Fill unset fields from adapter defaults.
    ///
    /// Fields present on the request always win.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &CompletionOptions) -> Self {
        if self.model.is_empty() {
            self.model = defaults.model.clone();
        }
        if self.max_tokens.is_none() {
            self.max_tokens = Some(defaults.max_tokens);
        }
        if self.temperature.is_none() {
            self.temperature = Some(defaults.temperature);
        }
        self
    }

    /// Validate the request before it is handed to a backend
    ///
    /// # Errors
    /// Returns a validation error if any field is out of range
    pub fn validate(&self) -> GatewayResult<()> {
        if self.messages.is_empty() {
            return Err(GatewayError::validation(
                "messages cannot be empty",
                Some("messages".to_string()),
                "empty_messages",
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(GatewayError::validation(
                    format!("invalid temperature: must be between 0 and 1, got {temperature}"),
                    Some("temperature".to_string()),
                    "invalid_temperature",
                ));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(GatewayError::validation(
                "invalid max_tokens: must be greater than 0",
                Some("max_tokens".to_string()),
                "invalid_max_tokens",
            ));
        }

        Ok(())
    }

    /// Concatenated text of every system message, if any
    #[must_use]
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role() == MessageRole::System)
            .map(Message::content)
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Builder for `ChatRequest`
#[derive(Debug, Default)]
pub struct ChatRequestBuilder {
    model: String,
    messages: Vec<Message>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    stream: bool,
}

impl ChatRequestBuilder {
    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enable streaming
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns error if the assembled request is invalid
    pub fn build(self) -> GatewayResult<ChatRequest> {
        let request = ChatRequest {
            model: self.model,
            messages: self.messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: self.stream,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Chat message with role and content.
///
/// Messages are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: MessageRole,
    #[serde(default)]
    content: String,
}

impl Message {
    /// Create a message with an explicit role
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Role of the message author
    #[must_use]
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// Text content
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
