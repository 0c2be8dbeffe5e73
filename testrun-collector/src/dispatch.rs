// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::{CollectorConfig, LoadedConfig},
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts, clap_styles},
    server, show,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use std::{io::Write, net::SocketAddr, sync::Arc};
use testrun_metadata::TestrunExitCode;
use testrun_store::RunStore;
use tracing::{info, warn};

/// Records test runs and their tests reported over HTTP.
///
/// Test runners report lifecycle events (run started, test started, test
/// finished, run finished) to the collector, which persists them in a store
/// directory.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct CollectorApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl CollectorApp {
    /// Initializes logging and color output.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let config = self.config_opts.load()?;
        match self.command {
            Command::Serve { listen_addr } => {
                let mut config = config;
                if let Some(listen_addr) = listen_addr {
                    config.listen_addr = listen_addr;
                }
                exec_serve(&config)
            }
            Command::Show => exec_show(&config, output),
            Command::Reset { yes } => exec_reset(&config, yes),
            Command::Compact => exec_compact(&config),
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: built-in defaults only]
    #[arg(long, global = true, value_name = "PATH", env = "TESTRUN_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Store directory, overriding the config
    #[arg(long, global = true, value_name = "DIR")]
    store_dir: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn load(&self) -> Result<CollectorConfig> {
        let LoadedConfig {
            mut config,
            unknown_keys,
        } = CollectorConfig::load(self.config.as_deref())?;

        if !unknown_keys.is_empty() {
            let keys = unknown_keys.iter().join(", ");
            match &self.config {
                Some(file) => {
                    warn!("in config file {file}, ignoring unknown configuration keys: {keys}")
                }
                None => warn!("ignoring unknown configuration keys: {keys}"),
            }
        }

        if let Some(store_dir) = &self.store_dir {
            config.store_dir = store_dir.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API until interrupted
    Serve {
        /// Address to listen on, overriding the config
        #[arg(long, value_name = "ADDR")]
        listen_addr: Option<SocketAddr>,
    },
    /// Print every stored run and test
    Show,
    /// Delete every stored run and test
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Rewrite the store as a compressed snapshot and truncate its journal
    Compact,
}

fn open_store(store_dir: &Utf8Path) -> Result<RunStore> {
    RunStore::open(store_dir).map_err(|err| ExpectedError::store_open(store_dir, err))
}

fn exec_serve(config: &CollectorConfig) -> Result<i32> {
    let store = Arc::new(open_store(&config.store_dir)?);
    let counts = store.counts();
    info!(
        store_dir = %config.store_dir,
        runs = counts.runs,
        tests = counts.tests,
        "opened store",
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ExpectedError::RuntimeBuild { err })?;

    let listen_addr = config.listen_addr;
    let server_store = store.clone();
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(listen_addr)
            .await
            .map_err(|err| ExpectedError::Bind {
                addr: listen_addr,
                err,
            })?;
        server::serve(listener, server_store, shutdown_signal())
            .await
            .map_err(|err| ExpectedError::Serve { err })
    })?;
    drop(runtime);

    if config.compact_on_shutdown {
        let counts = store
            .compact()
            .map_err(|err| ExpectedError::store_operation("compact", err))?;
        info!(runs = counts.runs, tests = counts.tests, "compacted store");
    }
    info!("collector stopped");
    Ok(TestrunExitCode::OK)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received interrupt, shutting down"),
        Err(error) => {
            // Without a signal handler the only way out is killing the
            // process, so keep serving.
            warn!(%error, "failed to listen for interrupts");
            std::future::pending::<()>().await;
        }
    }
}

fn exec_show(config: &CollectorConfig, output: OutputContext) -> Result<i32> {
    let store = open_store(&config.store_dir)?;
    let report = store.full_report();

    let mut stdout = std::io::stdout().lock();
    show::write_report(&report, &output.stdout_styles(), &mut stdout)
        .and_then(|()| stdout.flush())
        .map_err(|err| ExpectedError::WriteOutput { err })?;
    Ok(TestrunExitCode::OK)
}

fn exec_reset(config: &CollectorConfig, yes: bool) -> Result<i32> {
    if !yes {
        return Err(ExpectedError::ResetNotConfirmed);
    }
    let store = open_store(&config.store_dir)?;
    let counts = store
        .reset()
        .map_err(|err| ExpectedError::store_operation("reset", err))?;
    info!(
        runs = counts.runs,
        tests = counts.tests,
        store_dir = %config.store_dir,
        "deleted all records",
    );
    Ok(TestrunExitCode::OK)
}

fn exec_compact(config: &CollectorConfig) -> Result<i32> {
    let store = open_store(&config.store_dir)?;
    let counts = store
        .compact()
        .map_err(|err| ExpectedError::store_operation("compact", err))?;
    info!(runs = counts.runs, tests = counts.tests, "compacted store");
    Ok(TestrunExitCode::OK)
}
