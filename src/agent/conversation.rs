//! In-memory conversation log
//!
//! The conversation is the only context the remote model ever sees, so it
//! is resent in full on every call. Turns are append-only; `clear` is the
//! single way to drop them.

use serde_json::Value;

use crate::tools::ToolInvocationRequest;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
    ToolCall,
    ToolResult,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::ToolCall => "tool_call",
            Role::ToolResult => "tool_result",
        }
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Operator input
    User(String),
    /// Final model answer
    Model(String),
    /// A tool call the model requested
    ToolCall(ToolInvocationRequest),
    /// What the tool returned, bound to the tool's name
    ToolResult { name: String, response: Value },
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Turn::User(_) => Role::User,
            Turn::Model(_) => Role::Model,
            Turn::ToolCall(_) => Role::ToolCall,
            Turn::ToolResult { .. } => Role::ToolResult,
        }
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User(text.into()));
    }

    pub fn push_model(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Model(text.into()));
    }

    pub fn push_tool_call(&mut self, request: ToolInvocationRequest) {
        self.turns.push(Turn::ToolCall(request));
    }

    pub fn push_tool_result(&mut self, name: impl Into<String>, response: Value) {
        self.turns.push(Turn::ToolResult {
            name: name.into(),
            response,
        });
    }

    /// Reset to an empty log
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Roles in order, mostly useful for checking ordering in tests and logs
    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(Turn::role).collect()
    }

    /// Check that every tool call is immediately followed by its result
    pub fn tool_calls_paired(&self) -> bool {
        self.turns.iter().enumerate().all(|(i, turn)| match turn {
            Turn::ToolCall(call) => matches!(
                self.turns.get(i + 1),
                Some(Turn::ToolResult { name, .. }) if *name == call.name
            ),
            Turn::ToolResult { .. } => {
                i > 0 && matches!(self.turns[i - 1], Turn::ToolCall(_))
            }
            _ => true,
        })
    }
}
