//! Remote-directed execution agent.
//!
//! Pings the controller, fetches a program, runs it, and requests fixes until
//! the program succeeds or the retry budget is spent.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use reflex_agent::control::{LoopConfig, run_agent};
use reflex_agent::core::types::AgentOutcome;
use reflex_agent::exit_codes;
use reflex_agent::io::config::{AgentConfig, load_config};
use reflex_agent::io::executor::InterpreterExecutor;
use reflex_agent::io::self_destruct::SelfDestruct;
use reflex_agent::io::transport::HttpTransport;
use reflex_agent::logging;

#[derive(Parser)]
#[command(
    name = "reflex-agent",
    version,
    about = "Run controller-generated programs and request fixes until they succeed"
)]
struct Cli {
    /// TOML config file. Missing file means built-in defaults.
    #[arg(short, long, default_value = "reflex.toml")]
    config: PathBuf,

    /// Controller base URL (overrides the config file).
    #[arg(short, long)]
    server_url: Option<String>,

    /// Task description sent to the controller (overrides the config file).
    #[arg(short, long)]
    master_prompt: Option<String>,

    /// Repairs allowed after the first execution (overrides the config file).
    #[arg(long)]
    max_retries: Option<u32>,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<AgentConfig> {
        let mut cfg = load_config(&self.config)?;
        if let Some(url) = &self.server_url {
            cfg.server_url = url.clone();
        }
        if let Some(prompt) = &self.master_prompt {
            cfg.master_prompt = prompt.clone();
        }
        if let Some(max_retries) = self.max_retries {
            cfg.max_retries = max_retries;
        }
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.quiet);
    match run(&cli) {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ABORTED);
        }
    }
}

fn run(cli: &Cli) -> Result<AgentOutcome> {
    let cfg = cli.resolve_config()?;
    info!(target_url = %cfg.base_url(), "agent started");
    info!(master_prompt = %cfg.master_prompt, "master prompt");

    let kill_switch = SelfDestruct::for_current_exe()?;
    let transport = HttpTransport::from_config(&cfg);
    let executor = InterpreterExecutor::new(&cfg.executor, cfg.execution_timeout());

    let outcome = run_agent(&transport, &executor, &kill_switch, &LoopConfig::from(&cfg))?;
    let stats = outcome.stats();
    info!(
        ?outcome,
        executions = stats.executions,
        fix_requests = stats.fix_requests,
        "agent finished"
    );
    Ok(outcome)
}
