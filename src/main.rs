use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;

use fileagent::agent::{AgentConfig, AgentController, Session};
use fileagent::gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
use fileagent::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "fileagent", version, about = "Interactive AI agent that can list and read local files")]
struct Cli {
    /// API key for the Gemini service
    #[arg(short = 'a', long = "apiKey", alias = "api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Print tool calls and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum tool calls per question
    #[arg(long, default_value_t = 10)]
    max_iterations: usize,

    /// Service endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    fileagent::tracing::init_tracing(cli.verbose)
        .map_err(|e| anyhow::anyhow!(e))
        .context("initialize logging")?;

    let config = AgentConfig {
        model: cli.model,
        max_iterations: cli.max_iterations,
    };

    let client = GeminiClient::new(cli.api_key, &config.model)
        .context("initialize Gemini client")?
        .with_base_url(cli.base_url);

    if cli.verbose {
        println!("Gemini client initialized");
    }
    info!(model = %config.model, max_iterations = config.max_iterations, "Starting interactive session");

    let controller = AgentController::new(client, ToolRegistry::default(), config);
    let mut session = Session::new(controller, cli.verbose);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).await.context("console I/O")?;

    Ok(())
}
