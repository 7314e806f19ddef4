//! Agent module for the LLM-driven file exploration loop
//!
//! This module provides the agent loop that orchestrates:
//! - the remote model with function calling
//! - the local read-only tools
//! - the conversation log shared between them
//!
//! # Architecture
//!
//! ```text
//! Operator line → Session ──(exit/clear handled locally)
//!                    ↓
//!             AgentController.run_cycle
//!                    ↓
//!             ModelClient.invoke(conversation, tools)
//!                    ↓
//!        Final text ─┴─ Tool call → ToolRegistry.execute
//!            ↓                           ↓
//!        print + append          append call + result, invoke again
//!                                (at most max_iterations tools)
//! ```

pub mod controller;
pub mod conversation;
pub mod session;

pub use controller::{AgentConfig, AgentController, AgentError, CycleOutcome, ToolCallRecord};
pub use conversation::{Conversation, Role, Turn};
pub use session::{Command, Session, SessionState};
