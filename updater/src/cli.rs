//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use updater_common::status_keys;

use crate::app::AppContext;
use crate::application::ports::StatusStore;
use crate::application::services::status::{last_status, restart_required};
use crate::daemon::{Timings, serve};
use crate::domain::config::UpdaterConfig;
use crate::infra::clock::SystemClock;
use crate::infra::config::{load_config, resolve_config};
use crate::infra::fetcher::HttpFetcher;
use crate::infra::fs::LocalFs;
use crate::infra::nats::NatsChannel;
use crate::infra::service_host::platform_host;
use crate::infra::status_store::open_status_store;
use crate::logging;

/// Inbound deliveries buffered between the connection and the dispatcher.
const INBOUND_CAPACITY: usize = 64;

/// Keeps the agent and its messenger updated, restarted, and running
#[derive(Parser)]
#[command(name = "agent-updater", version, propagate_version = true)]
pub struct Cli {
    /// Configuration file [default: updater.yaml next to the executable]
    #[arg(long, global = true, env = "AGENT_UPDATER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write logs to agent-updater.log in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the updater daemon (default)
    Run,

    /// Validate configuration and certificates, then exit
    CheckConfig,

    /// Show the last recorded execution status
    Status,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            log_dir,
            command,
        } = self;
        match command.unwrap_or(Command::Run) {
            Command::Run => {
                let config = load_config(config.as_deref())?;
                let log_dir = log_dir.or_else(|| config.log_dir.clone());
                let _guard = logging::init(log_dir.as_deref())?;
                run_daemon(config).await
            }
            Command::CheckConfig => {
                let config = load_config(config.as_deref())?;
                print_config(&config);
                Ok(())
            }
            Command::Status => {
                let config = resolve_config(config.as_deref())?;
                let store = open_status_store(&config)?;
                print_status(store.as_ref())
            }
        }
    }
}

async fn run_daemon(config: UpdaterConfig) -> Result<()> {
    tracing::info!(
        agent_id = %config.agent_id,
        servers = ?config.nats_servers,
        service = %config.service_name,
        "agent updater starting"
    );
    let store = open_status_store(&config)?;
    let fetcher = HttpFetcher::new()?;
    let (outbound, inbound) = mpsc::channel(INBOUND_CAPACITY);
    let channel = Arc::new(NatsChannel::new(&config, outbound));
    let ctx = Arc::new(AppContext::new(
        config,
        platform_host(),
        fetcher,
        store,
        Box::new(LocalFs),
        Box::new(SystemClock),
    ));

    serve(
        ctx,
        Arc::clone(&channel),
        inbound,
        Timings::default(),
        shutdown_signal(),
    )
    .await;
    channel.close().await;
    tracing::info!("agent updater stopped");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

fn print_config(config: &UpdaterConfig) {
    println!("agent id:        {}", config.agent_id);
    println!("servers:         {}", config.nats_servers.join(", "));
    println!("service:         {}", config.service_name);
    println!("install dir:     {}", config.install_dir.display());
    println!("agent binary:    {}", config.agent_layout().install_path.display());
    println!("messenger:       {}", config.messenger_layout().install_path.display());
    println!("CA certificate:  {}", config.certificates.ca_cert.display());
    println!("certificate:     {}", config.certificates.agent_cert.display());
    println!("private key:     {}", config.certificates.agent_key.display());
    println!("status backend:  {:?}", config.status_backend);
    println!("status file:     {}", config.status_file.display());
    if let Some(log) = &config.agent_log {
        println!("agent log:       {}", log.display());
    }
    println!("configuration OK");
}

fn print_status(store: &dyn StatusStore) -> Result<()> {
    match last_status(store).context("reading execution status")? {
        Some(status) => {
            println!(
                "last run:        {}",
                status.last_run_at.format(crate::domain::status::TIME_FORMAT)
            );
            println!("outcome:         {}", status.outcome);
            println!("result:          {}", status.result_text());
        }
        None => println!("no update has run yet"),
    }
    println!("restart needed:  {}", restart_required(store));
    if let Some(version) = store.get(status_keys::MESSENGER_VERSION)? {
        println!("messenger:       {version}");
    }
    Ok(())
}
