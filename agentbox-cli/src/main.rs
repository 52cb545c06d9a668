//! AgentBox CLI - run policy-governed agents and inspect policies

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use agentbox_core::prelude::*;

#[derive(Parser)]
#[command(name = "agentbox")]
#[command(about = "Run tool-using agents under a default-deny policy", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent on a single prompt
    Run {
        /// User prompt
        #[arg(short, long)]
        prompt: String,

        /// Policy file (YAML, JSON or TOML)
        #[arg(long, env = "AGENTBOX_POLICY")]
        policy: PathBuf,

        /// JSONL audit log to append to
        #[arg(long)]
        log: Option<PathBuf>,

        /// Model name override
        #[arg(long)]
        model: Option<String>,

        /// Iteration ceiling override
        #[arg(long)]
        max_iterations: Option<usize>,

        /// System prompt override
        #[arg(long)]
        system: Option<String>,
    },
    /// Policy inspection commands
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Load and compile a policy file
    Validate {
        #[arg(long)]
        policy: PathBuf,
    },
    /// Evaluate one tool call against a policy
    Check {
        #[arg(long)]
        policy: PathBuf,

        /// Tool name
        #[arg(long)]
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Version => {
            println!("agentbox {}", env!("CARGO_PKG_VERSION"));
            println!("agentbox-core {}", agentbox_core::VERSION);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Policy { command } => match command {
            PolicyCommands::Validate { policy } => validate_policy(&policy),
            PolicyCommands::Check { policy, tool, args } => check_policy(&policy, &tool, &args),
        },
        Commands::Run {
            prompt,
            policy,
            log,
            model,
            max_iterations,
            system,
        } => {
            let mut config = AgentBoxConfig::load()?;
            if let Some(model) = model {
                config.llm.model = model;
            }
            if let Some(max_iterations) = max_iterations {
                config.runtime.max_iterations = max_iterations;
            }
            if system.is_some() {
                config.runtime.system_prompt = system;
            }
            if log.is_some() {
                config.audit.log_path = log;
            }
            run(config, &policy, prompt).await
        }
    }
}

fn validate_policy(path: &Path) -> Result<ExitCode> {
    let engine = PolicyEngine::from_file(path)
        .with_context(|| format!("Failed to load policy {}", path.display()))?;

    let document = engine.document();
    println!("Policy OK: {}", path.display());
    for name in document.tools.keys() {
        println!("  tool: {}", name);
    }
    let limits = engine.limits();
    match limits.max_tool_calls {
        Some(n) => println!("  max_tool_calls: {}", n),
        None => println!("  max_tool_calls: unbounded"),
    }
    match limits.max_runtime_seconds {
        Some(s) => println!("  max_runtime_seconds: {}", s),
        None => println!("  max_runtime_seconds: unbounded"),
    }
    Ok(ExitCode::SUCCESS)
}

fn check_policy(path: &Path, tool: &str, args: &str) -> Result<ExitCode> {
    let engine = PolicyEngine::from_file(path)
        .with_context(|| format!("Failed to load policy {}", path.display()))?;
    let args: serde_json::Value =
        serde_json::from_str(args).context("--args must be valid JSON")?;

    let decision = engine.validate(tool, &args);
    println!("{}", decision);
    Ok(if decision.allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn run(config: AgentBoxConfig, policy_path: &Path, prompt: String) -> Result<ExitCode> {
    let policy = PolicyEngine::from_file(policy_path)
        .with_context(|| format!("Failed to load policy {}", policy_path.display()))?;
    let provider = LLMProviderFactory::create(&config.llm)?;

    let mut tools = ToolRegistry::new();
    tools.register_all(builtin_tools(config.tools.http_timeout))?;

    let cancel = CancellationToken::new();
    let mut runtime = AgentRuntime::new(provider, tools, Arc::new(policy))
        .with_settings(&config.runtime)
        .with_cancellation(cancel.clone());
    if let Some(log_path) = &config.audit.log_path {
        let sink = JsonlAuditSink::open(log_path)
            .with_context(|| format!("Failed to open audit log {}", log_path.display()))?;
        runtime = runtime.with_audit_sink(Arc::new(sink));
    }

    tokio::spawn(watch_interrupts(cancel));

    let result = runtime.run_prompt(prompt).await;
    let outcome = RunOutcome::from_result(&result);

    match result {
        Ok(output) => {
            tracing::info!(
                run_id = %output.run_id,
                iterations = output.iterations,
                tool_calls = output.tool_calls,
                "Agent finished"
            );
            println!("{}", output.content);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}: {}", outcome, e);
            Ok(ExitCode::from(exit_code(outcome)))
        }
    }
}

/// First Ctrl-C stops the run at the next iteration; a second one exits at once
async fn watch_interrupts(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::warn!("Interrupted; stopping after the current iteration (Ctrl-C again to abort)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("aborted");
        std::process::exit(130);
    }
}

fn exit_code(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::BudgetExceeded => 2,
        RunOutcome::MaxIterationsReached => 3,
        RunOutcome::Cancelled | RunOutcome::Failed => 1,
    }
}
