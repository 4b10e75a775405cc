//! circuit-failover
//!
//! Command-line driver for the failover client.
//!
//! ```text
//! circuit-failover --config failover.toml check
//! circuit-failover --config failover.toml send --path /health --count 10 --interval-ms 500 --watch
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Method;

use circuit_failover::config::watcher::ConfigWatcher;
use circuit_failover::config::{load_config, FailoverConfig};
use circuit_failover::observability::{logging, metrics};
use circuit_failover::transport::http::http_client;
use circuit_failover::transport::{FailoverClient, HttpDispatcher, HttpRequest};

#[derive(Parser)]
#[command(name = "circuit-failover")]
#[command(about = "Failover HTTP client with per-endpoint circuit breakers", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "failover.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the initial circuits
    Check,
    /// Send requests through the failover client
    Send {
        #[arg(short, long)]
        path: String,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Number of requests; runs until Ctrl+C when omitted
        #[arg(short = 'n', long)]
        count: Option<u64>,

        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,

        /// Reload the configuration when the file changes
        #[arg(short, long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(
        config = ?cli.config,
        addresses = config.cluster.addresses.len(),
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Check => {
            let client = http_client(&config)?;
            print_snapshot(&client)?;
        }
        Commands::Send {
            path,
            method,
            count,
            interval_ms,
            watch,
        } => {
            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let method: Method = method.parse()?;
            let request = HttpRequest::new(method, path);
            run_send(&cli.config, config, request, count, Duration::from_millis(interval_ms), watch).await?;
        }
    }

    Ok(())
}

async fn run_send(
    config_path: &std::path::Path,
    config: FailoverConfig,
    request: HttpRequest,
    count: Option<u64>,
    interval: Duration,
    watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = http_client(&config)?;

    let (watcher, mut updates) = ConfigWatcher::new(config_path, config);
    // Dropping the handle stops the watch.
    let _watch_handle = if watch { Some(watcher.run()?) } else { None };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(interval);
    let mut sent = 0u64;

    loop {
        if count.is_some_and(|n| sent >= n) {
            break;
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Ctrl+C received, stopping");
                break;
            }
            Some(new_config) = updates.recv() => {
                match http_client(&new_config) {
                    Ok(rebuilt) => {
                        tracing::info!(addresses = new_config.cluster.addresses.len(), "Configuration changed, circuits reset");
                        client = rebuilt;
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to apply reloaded configuration"),
                }
            }
            _ = ticker.tick() => {
                sent += 1;
                match client.execute_until(request.clone(), &mut shutdown).await {
                    None => {
                        tracing::info!(seq = sent, "Ctrl+C received, request abandoned");
                        break;
                    }
                    Some(Ok(response)) => tracing::info!(
                        seq = sent,
                        address = %response.address,
                        status = %response.status,
                        bytes = response.body.len(),
                        "Request succeeded"
                    ),
                    Some(Err(e)) => tracing::error!(
                        seq = sent,
                        error = %e,
                        last_error = ?e.last_error.as_ref().map(|err| err.to_string()),
                        "Request failed"
                    ),
                }
            }
        }
    }

    print_snapshot(&client)?;
    Ok(())
}

fn print_snapshot(client: &FailoverClient<HttpDispatcher>) -> Result<(), serde_json::Error> {
    let snapshot = client.selector().registry().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
