//! `toolagent`: ask a local model, or run the tool-calling agent on a request.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use toolagent::agent::run_with_config;
use toolagent::core::session::Termination;
use toolagent::exit_codes;
use toolagent::io::config::{AgentConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use toolagent::io::facade::{ResponseFacade, is_degraded};
use toolagent::logging;
use toolagent::tools::default_registry;

#[derive(Parser)]
#[command(
    name = "toolagent",
    version,
    about = "Tool-calling agent on top of a local model CLI"
)]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to the model and print the reply.
    Ask {
        prompt: String,
        /// Use this model instead of the configured one.
        #[arg(long)]
        model: Option<String>,
    },
    /// Run the agent loop on a request and print the final answer.
    Run {
        request: String,
        /// Step budget; defaults to `agent.max_steps`.
        #[arg(long)]
        max_steps: Option<u32>,
    },
    /// Print the registered tools and their argument schemas as JSON.
    Tools,
    /// Write the default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Ask { prompt, model } => cmd_ask(&load(&cli.config)?, &prompt, model.as_deref()),
        Command::Run { request, max_steps } => cmd_run(&load(&cli.config)?, &request, max_steps),
        Command::Tools => cmd_tools(&load(&cli.config)?),
    }
}

fn load(path: &Path) -> Result<AgentConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env_overrides()?;
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &AgentConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_ask(cfg: &AgentConfig, prompt: &str, model: Option<&str>) -> Result<i32> {
    let facade = ResponseFacade::from_config(cfg);
    let reply = facade.respond_with_model(prompt, model.unwrap_or(facade.model()));
    println!("{reply}");
    if is_degraded(&reply) {
        return Ok(exit_codes::DEGRADED);
    }
    Ok(exit_codes::OK)
}

fn cmd_run(cfg: &AgentConfig, request: &str, max_steps: Option<u32>) -> Result<i32> {
    let outcome = run_with_config(cfg, request, max_steps)?;
    println!("{}", outcome.answer);
    match outcome.termination {
        Termination::Done => Ok(exit_codes::OK),
        Termination::Exhausted | Termination::Running => Ok(exit_codes::EXHAUSTED),
    }
}

fn cmd_tools(cfg: &AgentConfig) -> Result<i32> {
    let registry = default_registry(&cfg.tools, ResponseFacade::from_config(cfg))?;
    let catalogue: Vec<Value> = registry
        .names()
        .iter()
        .filter_map(|name| registry.get(name))
        .map(|tool| {
            let spec = tool.spec();
            json!({
                "name": spec.name,
                "description": spec.description,
                "parameters": spec.json_schema(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&catalogue)?);
    Ok(exit_codes::OK)
}
