//! Gemini LLM integration module
//!
//! This module provides the client for Google's Generative Language API
//! that backs the agent's [`ModelClient`](crate::model::ModelClient).

pub mod tool_use;

pub use tool_use::{
    GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION,
};
