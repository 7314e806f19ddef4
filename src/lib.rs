//! fileagent - interactive command-line agent with local file tools
//!
//! An operator types questions; a remote model answers them, asking for
//! the local `list_files` / `read_file` tools when it needs to look at the
//! working directory.
//!
//! # Modules
//!
//! - `agent` - Conversation log, tool-call feedback loop, interactive session
//! - `gemini` - Gemini generateContent client
//! - `model` - Model client trait and response/error types
//! - `tools` - Read-only tool catalog and dispatcher
//! - `tracing` - Logging setup
//!
//! # Quick Start
//!
//! ```ignore
//! use fileagent::agent::{AgentConfig, AgentController, Session};
//! use fileagent::gemini::GeminiClient;
//! use fileagent::tools::ToolRegistry;
//!
//! let config = AgentConfig::default();
//! let client = GeminiClient::new(api_key, &config.model)?;
//! let controller = AgentController::new(client, ToolRegistry::default(), config);
//! let mut session = Session::new(controller, false);
//! session.run(tokio::io::BufReader::new(tokio::io::stdin()), &mut std::io::stdout()).await?;
//! ```

pub mod agent;
pub mod gemini;
pub mod model;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentController, Conversation, Session};
pub use model::{ChatError, ModelClient, ModelResponse};
pub use tools::{ToolRegistry, ToolSpec};
