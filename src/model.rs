//! Boundary between the agent loop and a remote model service

use async_trait::async_trait;

use crate::agent::conversation::Conversation;
use crate::tools::{ToolInvocationRequest, ToolSpec};

/// What the model answered for one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// A user-facing answer; the cycle is done
    Final { text: String },
    /// The model wants tools executed before it can continue
    ToolCallRequested { calls: Vec<ToolInvocationRequest> },
}

/// Error type for model service calls
#[derive(Debug)]
pub enum ChatError {
    /// Transport failure (connect, TLS, timeout)
    Request(reqwest::Error),
    /// The service answered with a non-success status
    Api { status: u16, message: String },
    /// Response body could not be decoded
    Parse(serde_json::Error),
    /// Response had no candidate content
    EmptyResponse,
    /// Response arrived but violated the function-calling protocol
    Malformed(String),
    /// No API key was supplied
    MissingCredential,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Request(e) => write!(f, "Request error: {}", e),
            ChatError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            ChatError::Parse(e) => write!(f, "Parse error: {}", e),
            ChatError::EmptyResponse => write!(f, "Empty response from model"),
            ChatError::Malformed(msg) => write!(f, "Malformed response: {}", msg),
            ChatError::MissingCredential => write!(f, "No API key provided"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::Request(e) => Some(e),
            ChatError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Request(e)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Parse(e)
    }
}

/// A model service the agent loop can talk to
///
/// Implementations must send the whole conversation on every call; the
/// remote side keeps no state between calls.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ChatError>;
}
