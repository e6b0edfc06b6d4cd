// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! moord: keeps one digest-pinned workload reconciled on the local engine.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use moor_adapters::DockerEngine;
use moor_daemon::{env, load_desired, logging, startup, Config, LifecycleError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "moord", version, about = "Digest-pinned workload reconciler")]
struct Args {
    /// Desired-state file (overrides MOOR_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the config file and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("moord: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.check {
        return match load_desired(&config.config_path) {
            Ok(_) => {
                println!("ok");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("moord: {e}");
                ExitCode::from(2)
            }
        };
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("moord: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let _guard = logging::init(&config.log_dir, &env::log_filter())?;

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let daemon = match startup(&config, DockerEngine::new()).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "startup failed");
            return Err(e);
        }
    };
    info!(pid = std::process::id(), "moord ready");

    loop {
        tokio::select! {
            _ = hangup.recv() => daemon.reload().await,
            _ = interrupt.recv() => break,
            _ = terminate.recv() => break,
        }
    }

    daemon.shutdown().await;
    Ok(())
}
