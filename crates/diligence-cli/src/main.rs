use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use diligence_core::{
    AgentConfig, AgentResponse, AgentRunner, CompanyInput, EventRelay, TelemetryOptions,
    build_agent, init_telemetry,
};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "diligence-cli",
    version,
    about = "Technical due diligence agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a company and print the report.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Company name (1-100 characters).
    #[arg(long)]
    company: String,

    /// Company website (4-200 characters).
    #[arg(long)]
    url: String,

    /// Print the structured result as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    init_telemetry(TelemetryOptions::default())?;

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let input = CompanyInput::new(args.company, args.url)?;
    let config = AgentConfig::from_env()?;
    let agent = build_agent(&config)?;
    info!(company = %input.company_name, model = %config.model, "starting due diligence run");

    let (relay, mut messages) = EventRelay::new();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = input.task_description();
    let handle = tokio::spawn(async move { agent.run(task, Arc::new(relay), token).await });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Some(message) => eprintln!("{message}"),
                None => break,
            },
            signal = &mut ctrl_c, if !cancel.is_cancelled() => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for Ctrl+C");
                }
                warn!("cancelling run");
                cancel.cancel();
            }
        }
    }

    let response = handle.await??;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_report(&input, &response);
    }
    Ok(())
}

fn print_report(input: &CompanyInput, response: &AgentResponse) {
    println!("# {} ({})", input.company_name, input.url);
    println!();
    println!("Verdict: {}", response.verdict);
    println!();
    println!("## Value proposition\n{}\n", response.value_proposition_analysis);
    println!("## Technical substance\n{}\n", response.technical);
    println!("## Developer sentiment\n{}\n", response.developer_sentiment);

    println!("## Red flags");
    if response.red_flags.is_empty() {
        println!("None identified.");
    }
    for flag in &response.red_flags {
        println!("- {flag}");
    }

    println!("\n## Sources");
    for (index, source) in response.sources.iter().enumerate() {
        println!("{}. {source}", index + 1);
    }
}
