//! LOGPROBE command-line entry point.
//!
//! Loads `.env` and an optional TOML config, initialises structured
//! logging, then asks each requested model for the probability of
//! `--answer` given `--prompt`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use logprobe::config::{ProbeConfig, DEFAULT_CONFIG_FILE};
use logprobe::parallel;
use logprobe::{Dispatcher, EndpointStyle, ProviderRegistry, RequestOptions};

#[derive(Debug, Parser)]
#[command(name = "logprobe", version, about = "Probability that a model answers a prompt with a given string")]
struct Cli {
    /// Model identifier `provider:model[:aux]`; repeat for several models.
    #[arg(short, long = "model", required = true)]
    models: Vec<String>,

    #[arg(short, long)]
    prompt: String,

    #[arg(short, long)]
    answer: String,

    /// TOML config with defaults, providers and aliases.
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    top_logprobs: Option<u32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long, value_parser = parse_endpoint)]
    endpoint: Option<EndpointStyle>,

    /// Fail when a reasoning anchor is absent from the output.
    #[arg(long)]
    strict: bool,

    /// Concurrent requests; defaults to available parallelism.
    #[arg(short, long)]
    workers: Option<usize>,
}

fn parse_endpoint(s: &str) -> std::result::Result<EndpointStyle, String> {
    match s {
        "chat" => Ok(EndpointStyle::Chat),
        "responses" => Ok(EndpointStyle::Responses),
        other => Err(format!("unknown endpoint style {other:?} (expected chat|responses)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let config = load_config(cli.config.as_deref())?;
    let registry = Arc::new(ProviderRegistry::with_builtin_providers());
    config
        .apply(&registry)
        .context("Failed to apply configuration")?;

    let dispatcher = Dispatcher::new(registry).with_defaults(config.defaults.clone());
    let overrides = RequestOptions {
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
        top_logprobs: cli.top_logprobs,
        endpoint: cli.endpoint,
        require_anchor: cli.strict.then_some(true),
        ..Default::default()
    };

    let workers = cli.workers.unwrap_or_else(parallel::default_workers);
    info!(models = cli.models.len(), workers, "Probing models");

    let results = parallel::map_ordered(cli.models.iter(), workers, |model| {
        let dispatcher = &dispatcher;
        let overrides = &overrides;
        let prompt = cli.prompt.as_str();
        async move {
            let result = dispatcher.get_completion(model, prompt, overrides).await;
            (model, result)
        }
    })
    .await;

    let mut failures = 0usize;
    for (model, result) in results {
        match result {
            Ok(envelope) => {
                println!(
                    "{model}\tP={:.4}\t{envelope}",
                    envelope.probability(&cli.answer)
                );
            }
            Err(e) => {
                failures += 1;
                warn!(model = %model, error = %e, "Probe failed");
                println!("{model}\terror: {e}");
            }
        }
    }

    if failures == cli.models.len() {
        anyhow::bail!("All {failures} probes failed");
    }
    Ok(())
}

/// Explicit path must exist; the default file is optional.
fn load_config(path: Option<&str>) -> Result<ProbeConfig> {
    match path {
        Some(p) => ProbeConfig::load(p).with_context(|| format!("Failed to load config: {p}")),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => ProbeConfig::load(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load config: {DEFAULT_CONFIG_FILE}")),
        None => Ok(ProbeConfig::default()),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("logprobe=info"));

    let json_logging = std::env::var("LOGPROBE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
