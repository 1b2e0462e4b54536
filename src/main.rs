//! Stevedore - streaming client for a container engine
//!
//! This is the binary entry point: argument parsing and wiring of the
//! engine client, streamed output and the wait conditions.

mod config;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use stevedore_core::prelude::*;
use stevedore_engine::{
    describe_all, fetch_logs, follow_logs, wait_for, BuildOptions, EngineClient, EngineQuery,
    ExitMatch, HttpWait, LogOptions, ProgressStreamHandler, TcpWait, WaitConfig,
    DEFAULT_REQUEST_TIMEOUT,
};

use output::{PrintCallback, TermProgress};

/// Stevedore - talk to a container engine and wait for readiness
#[derive(Parser, Debug)]
#[command(name = "stevedore")]
#[command(about = "Streaming client for a container engine", long_about = None)]
struct Cli {
    /// Engine endpoint, e.g. http://localhost:2375
    #[arg(long, global = true)]
    host: Option<String>,

    /// Engine API version prefix, e.g. 1.44
    #[arg(long, global = true)]
    api_version: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull an image, streaming progress
    Pull {
        /// Image reference, e.g. alpine:3.20
        image: String,
    },
    /// Build an image from an existing context archive, streaming progress
    Build {
        /// Path to the build context tar archive
        #[arg(long)]
        context: PathBuf,
        /// Tag for the built image
        #[arg(long)]
        tag: Option<String>,
        /// Dockerfile path inside the context
        #[arg(long)]
        dockerfile: Option<String>,
        /// Disable the build cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Print a container's logs
    Logs {
        /// Container id or name
        container: String,
        /// Keep the stream open and follow new output
        #[arg(short, long)]
        follow: bool,
        /// Prefix each line with its engine-side timestamp
        #[arg(short, long)]
        timestamps: bool,
    },
    /// Wait until a container satisfies one of the given conditions
    Wait {
        /// Container id or name
        container: String,
        /// Succeed when this URL answers with an acceptable status
        #[arg(long)]
        url: Option<String>,
        /// HTTP method for --url (default HEAD)
        #[arg(long)]
        method: Option<String>,
        /// Acceptable status for --url: a code or 'min..max'
        #[arg(long)]
        status: Option<String>,
        /// Skip TLS certificate validation for --url
        #[arg(long)]
        insecure: bool,
        /// Succeed when these TCP ports accept connections (repeatable)
        #[arg(long = "tcp-port")]
        tcp_ports: Vec<u16>,
        /// Host to probe for --tcp-port (default localhost)
        #[arg(long, default_value = "localhost")]
        tcp_host: String,
        /// Succeed when the log output matches this pattern
        #[arg(long)]
        log_pattern: Option<String>,
        /// Succeed when the container exits with exactly this code
        #[arg(long)]
        exit_code: Option<i64>,
        /// Succeed when the container exits, whatever the code
        #[arg(long, conflicts_with = "exit_code")]
        any_exit: bool,
        /// Succeed when the container's healthcheck reports healthy
        #[arg(long)]
        healthy: bool,
        /// Overall time budget in milliseconds (default 10000)
        #[arg(long, default_value_t = 0)]
        timeout_ms: i64,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    stevedore_core::logging::init();

    let cli = Cli::parse();

    let settings = config::load_settings()?;
    let host = config::resolve_host(cli.host.as_deref(), &settings)?;
    let api_version = cli.api_version.or_else(|| settings.api_version.clone());
    let timeout = settings
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let client = EngineClient::new(host, api_version, timeout)?;

    match cli.command {
        Command::Pull { image } => {
            let mut handler = ProgressStreamHandler::pull_push(TermProgress);
            client.pull_image(&image, &mut handler).await?;
            info!("Pulled {image}");
        }
        Command::Build {
            context,
            tag,
            dockerfile,
            no_cache,
        } => {
            let options = BuildOptions {
                tag,
                dockerfile,
                no_cache,
            };
            let mut handler = ProgressStreamHandler::build(TermProgress);
            client.build_image(&context, &options, &mut handler).await?;
            info!("Build finished");
        }
        Command::Logs {
            container,
            follow,
            timestamps,
        } => {
            if follow {
                let handle = follow_logs(
                    Arc::new(client),
                    &container,
                    LogOptions::follow(),
                    PrintCallback::new(timestamps),
                );
                handle.join().await;
            } else {
                let mut callback = PrintCallback::new(timestamps);
                fetch_logs(&client, &container, &LogOptions::default(), &mut callback).await;
            }
        }
        Command::Wait {
            container,
            url,
            method,
            status,
            insecure,
            tcp_ports,
            tcp_host,
            log_pattern,
            exit_code,
            any_exit,
            healthy,
            timeout_ms,
        } => {
            let wait = WaitConfig {
                http: url.map(|url| HttpWait {
                    url,
                    method,
                    status,
                    allow_insecure: insecure,
                }),
                log_pattern,
                tcp: (!tcp_ports.is_empty()).then(|| TcpWait {
                    host: tcp_host,
                    ports: tcp_ports,
                }),
                healthy,
                exit: exit_code
                    .map(ExitMatch::Code)
                    .or(any_exit.then_some(ExitMatch::Any)),
                timeout_ms,
            };

            let engine: Arc<dyn EngineQuery> = Arc::new(client);
            let mut conditions = wait.conditions(engine, &container)?;
            if conditions.is_empty() {
                return Err(Error::config("no wait condition given").into());
            }

            let labels = describe_all(&conditions);
            info!("{container}: waiting {labels}");
            match wait_for(wait.timeout_ms, &mut conditions).await {
                Ok(elapsed) => {
                    info!("{container}: waited {labels} for {} ms", elapsed.as_millis());
                }
                Err(e) => {
                    if let Some(waited) = e.waited() {
                        error!(
                            "{container}: timeout after {} ms while waiting {labels}",
                            waited.as_millis()
                        );
                    }
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
