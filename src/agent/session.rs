//! Interactive operator session
//!
//! Reads lines, routes the `exit` and `clear` control words, and hands
//! everything else to the [`AgentController`] one cycle at a time. The next
//! line is not read until the current cycle has finished.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use super::controller::AgentController;
use super::conversation::Conversation;
use crate::model::ModelClient;

pub const BANNER: &str = "AI Agent - Interactive Mode (type \"exit\" to quit)";
pub const PROMPT: &str = "> ";

/// What an input line asks the session to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Clear,
    Empty,
    Query(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Command::Empty,
            "exit" => Command::Exit,
            "clear" => Command::Clear,
            query => Command::Query(query.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    ProcessingCycle,
    Terminated,
}

/// Owns the conversation for the lifetime of the process
pub struct Session<M> {
    controller: AgentController<M>,
    conversation: Conversation,
    state: SessionState,
    verbose: bool,
}

impl<M: ModelClient> Session<M> {
    pub fn new(controller: AgentController<M>, verbose: bool) -> Self {
        Self {
            controller,
            conversation: Conversation::new(),
            state: SessionState::Idle,
            verbose,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Drive the session until `exit` or end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "{}", BANNER)?;
        self.state = SessionState::AwaitingInput;

        let mut lines = input.lines();
        while self.state != SessionState::Terminated {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                self.state = SessionState::Terminated;
                break;
            };
            self.handle_line(&line, out).await?;
        }

        writeln!(out, "Goodbye!")?;
        Ok(())
    }

    /// Process a single input line and return the resulting state
    ///
    /// Cycle failures are reported to `out` and leave the session waiting
    /// for the next line; only writer errors are returned.
    pub async fn handle_line<W: Write>(
        &mut self,
        line: &str,
        out: &mut W,
    ) -> std::io::Result<SessionState> {
        if self.state == SessionState::Idle {
            self.state = SessionState::AwaitingInput;
        }

        match Command::parse(line) {
            Command::Exit => self.state = SessionState::Terminated,
            Command::Clear => {
                self.conversation.clear();
                writeln!(out, "history cleared")?;
            }
            Command::Empty => {}
            Command::Query(query) => {
                self.state = SessionState::ProcessingCycle;
                let result = self
                    .controller
                    .run_cycle(&mut self.conversation, &query)
                    .await;
                self.state = SessionState::AwaitingInput;

                match result {
                    Ok(outcome) => {
                        if self.verbose {
                            for record in &outcome.tool_records {
                                writeln!(out, "Tool {}: {}({})", record.iteration, record.name, record.args)?;
                            }
                        }
                        writeln!(out, "{}", outcome.final_response)?;
                    }
                    Err(e) => {
                        warn!(error = %e, "Agent cycle failed");
                        writeln!(out, "Error: {}", e)?;
                    }
                }
            }
        }

        Ok(self.state)
    }
}
