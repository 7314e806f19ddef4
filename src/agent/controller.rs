//! Agent Controller - the tool-call feedback loop for one operator input
//!
//! The AgentController sends the conversation to the model, executes the
//! tool the model asks for, feeds the result back, and repeats until the
//! model gives a final answer or the iteration cap is hit.

use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::conversation::Conversation;
use crate::gemini::DEFAULT_MODEL;
use crate::model::{ChatError, ModelClient, ModelResponse};
use crate::tools::{ToolError, ToolRegistry};

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model to use (e.g., "gemini-2.0-flash")
    pub model: String,
    /// Maximum number of tool executions per cycle
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: 10,
        }
    }
}

/// Result of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Final answer from the model
    pub final_response: String,
    /// Number of model invocations made
    pub model_calls: usize,
    /// Number of tool calls executed
    pub tool_calls_made: usize,
    /// Records of every executed tool call, in order
    pub tool_records: Vec<ToolCallRecord>,
    /// Unique trace ID for this cycle
    pub trace_id: String,
}

/// Record of a single tool execution
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// 1-based position within the cycle
    pub iteration: usize,
    pub name: String,
    pub args: serde_json::Value,
    pub duration_ms: f64,
}

/// Error type for agent operations
#[derive(Debug)]
pub enum AgentError {
    /// Tool iteration cap reached while the model still wanted tools
    ToolCallLimitExceeded(usize),
    /// The model's response violated the protocol
    MalformedResponse(String),
    /// A tool failed (unknown tool, missing file, I/O)
    Tool(ToolError),
    /// The model service call failed
    ModelService(ChatError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::ToolCallLimitExceeded(max) => {
                write!(f, "Tool-call limit exceeded ({} iterations)", max)
            }
            AgentError::MalformedResponse(msg) => write!(f, "Malformed model response: {}", msg),
            AgentError::Tool(e) => write!(f, "Tool error: {}", e),
            AgentError::ModelService(e) => write!(f, "Model service error: {}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Tool(e) => Some(e),
            AgentError::ModelService(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ChatError> for AgentError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Malformed(msg) => AgentError::MalformedResponse(msg),
            other => AgentError::ModelService(other),
        }
    }
}

impl From<ToolError> for AgentError {
    fn from(e: ToolError) -> Self {
        AgentError::Tool(e)
    }
}

/// Agent Controller orchestrating the model and the local tools
pub struct AgentController<M> {
    client: M,
    registry: ToolRegistry,
    config: AgentConfig,
}

impl<M: ModelClient> AgentController<M> {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `client` - Model client the conversation is sent to
    /// * `registry` - Tools the model may call
    /// * `config` - Agent configuration
    pub fn new(client: M, registry: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Process one operator input end-to-end
    ///
    /// Appends the user turn, then alternates model calls and tool
    /// executions. On success the final answer has been appended as a model
    /// turn. Errors leave the conversation with every tool call paired with
    /// its result.
    ///
    /// Only the first tool call of each response is executed.
    pub async fn run_cycle(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<CycleOutcome, AgentError> {
        let trace_id = Uuid::now_v7().to_string();

        let cycle_span = info_span!(
            "agent_cycle",
            trace_id = %trace_id,
            model = %self.config.model,
        );

        async {
            info!(trace_id = %trace_id, input_len = input.len(), "Starting agent cycle");

            conversation.push_user(input);

            let tools = self.registry.list_tools();
            let mut iterations = 0;
            let mut model_calls = 0;
            let mut tool_records = vec![];

            loop {
                model_calls += 1;
                let llm_span = info_span!("llm_call", trace_id = %trace_id, call = model_calls);
                let call_start = Instant::now();

                let response = self
                    .client
                    .invoke(conversation, tools)
                    .instrument(llm_span)
                    .await?;

                debug!(
                    trace_id = %trace_id,
                    call = model_calls,
                    duration_ms = call_start.elapsed().as_secs_f64() * 1000.0,
                    "Model call completed"
                );

                let calls = match response {
                    ModelResponse::Final { text } => {
                        info!(trace_id = %trace_id, model_calls, tool_calls = iterations, "Agent cycle completed");
                        conversation.push_model(text.clone());
                        return Ok(CycleOutcome {
                            final_response: text,
                            model_calls,
                            tool_calls_made: iterations,
                            tool_records,
                            trace_id,
                        });
                    }
                    ModelResponse::ToolCallRequested { calls } => calls,
                };

                if iterations >= self.config.max_iterations {
                    warn!(trace_id = %trace_id, iterations, "Tool-call limit reached");
                    return Err(AgentError::ToolCallLimitExceeded(self.config.max_iterations));
                }

                let mut calls = calls.into_iter();
                let call = calls.next().ok_or_else(|| {
                    AgentError::MalformedResponse("tool call requested with no calls".to_string())
                })?;
                let dropped = calls.count();
                if dropped > 0 {
                    warn!(trace_id = %trace_id, tool = %call.name, dropped, "Only the first tool call is executed");
                }

                iterations += 1;
                let args = call.args_json();
                info!(trace_id = %trace_id, iteration = iterations, tool = %call.name, args = %args, "Executing tool");

                conversation.push_tool_call(call.clone());
                let exec_start = Instant::now();
                let result = self.registry.execute(&call).await;
                let duration_ms = exec_start.elapsed().as_secs_f64() * 1000.0;

                match result {
                    Ok(output) => {
                        conversation.push_tool_result(call.name.clone(), output.to_response());
                        tool_records.push(ToolCallRecord {
                            iteration: iterations,
                            name: call.name,
                            args,
                            duration_ms,
                        });
                    }
                    Err(e) => {
                        warn!(trace_id = %trace_id, tool = %call.name, error = %e, "Tool execution failed");
                        conversation.push_tool_result(
                            call.name,
                            serde_json::json!({ "error": e.to_string() }),
                        );
                        return Err(AgentError::Tool(e));
                    }
                }
            }
        }
        .instrument(cycle_span)
        .await
    }
}
