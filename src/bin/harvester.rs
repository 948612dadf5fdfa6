//! Listing harvester CLI.
//!
//! Usage examples:
//!   HTTP service:
//!     $ TARGET_URL=https://news.example.com cargo run --bin harvester -- serve
//!   One-shot run printing JSON:
//!     $ TARGET_URL=https://news.example.com cargo run --bin harvester -- run --pretty
//!   Liveness probe (exit code 0/1):
//!     $ cargo run --bin harvester -- health-check

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use listing_harvester::browser::LaunchOptions;
use listing_harvester::config::HarvestConfig;
use listing_harvester::logging::HarvestLogger;
use listing_harvester::pipeline::Harvester;
use listing_harvester::runtime::ChromiumoxideRuntime;
use listing_harvester::server::{self, HEALTH_ROUTE, HealthResponse};
use log::{error, info};

#[derive(Parser)]
#[command(
    name = "harvester",
    author,
    version,
    about = "Browser-driven listing harvester"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the automation endpoint until SIGINT/SIGTERM.
    Serve(ServeArgs),
    /// Run one harvest and print the records as JSON.
    Run(RunArgs),
    /// Probe a running server's health endpoint.
    HealthCheck(HealthCheckArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Override PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct RunArgs {
    /// Override MAX_ITEMS.
    #[arg(long)]
    max_items: Option<usize>,

    /// Include run metrics in the output.
    #[arg(long)]
    metrics: bool,

    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct HealthCheckArgs {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env_logger();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Run(args) => run_once(args).await,
        Command::HealthCheck(args) => health_check(args).await,
    }
}

fn load_config() -> Result<HarvestConfig> {
    HarvestConfig::from_env().context("invalid configuration")
}

fn build(config: &HarvestConfig) -> (Arc<ChromiumoxideRuntime>, Harvester<ChromiumoxideRuntime>) {
    let logger = Arc::new(HarvestLogger::with_config(config.log_config()));
    let runtime = Arc::new(ChromiumoxideRuntime::new(
        LaunchOptions::from_config(config),
        Arc::clone(&logger),
    ));
    let harvester = Harvester::new(Arc::clone(&runtime), config.settings(), logger);
    (runtime, harvester)
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    info!(
        "starting harvester ({}) for {} on port {}",
        config.app_env, config.target_url, config.port
    );

    let (runtime, harvester) = build(&config);
    let shutdown = server::shutdown_signal(Arc::clone(harvester.logger()));
    let served = server::serve(harvester, config.port, shutdown).await;

    if let Err(err) = runtime.shutdown().await {
        error!("failed to close browser: {err}");
    }
    served.with_context(|| format!("server on port {} failed", config.port))
}

async fn run_once(args: RunArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(max_items) = args.max_items {
        if max_items == 0 {
            bail!("--max-items must be at least 1");
        }
        config.max_items = max_items;
    }

    let (runtime, harvester) = build(&config);
    let outcome = harvester.run().await;
    if let Err(err) = runtime.shutdown().await {
        error!("failed to close browser: {err}");
    }
    let run = outcome.context("harvest failed")?;

    let output = if args.metrics {
        serde_json::to_value(&run)?
    } else {
        serde_json::to_value(&run.records)?
    };
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

async fn health_check(args: HealthCheckArgs) -> Result<()> {
    let url = format!("http://{}:{}{}", args.host, args.port, HEALTH_ROUTE);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("health check request to {url} failed"))?;
    if !response.status().is_success() {
        bail!("health check returned {}", response.status());
    }
    let body: HealthResponse = response
        .json()
        .await
        .context("health check returned an unexpected body")?;
    if body.status != "ok" {
        bail!("health check reported status '{}'", body.status);
    }
    info!("health check passed");
    Ok(())
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
