#![deny(unsafe_code)]

//! overlayctl: route all traffic through an overlay exit, or stop doing so.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser};
use tracing::{debug, info};

use overlayctl_config::ClientConfig;
use overlayctl_core::build_info;
use overlayctl_core::{
    ControlError, ControlSettings, Endpoint, ExitController, ExitMode, ExitReport, HttpTransport,
    LogSettings,
};

static VERSION: LazyLock<String> = LazyLock::new(build_info::version_string);

/// Map the full IPv4 range to an overlay exit, or remove that mapping.
#[derive(Parser, Debug)]
#[command(name = "overlayctl", version = VERSION.as_str(), about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["up", "down"])))]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "overlayctl.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Route all traffic through the exit given by --exit.
    #[arg(long, conflicts_with = "down")]
    up: bool,

    /// Remove the full-range exit mapping.
    #[arg(long)]
    down: bool,

    /// Exit peer address, used with --up.
    #[arg(long, value_name = "ADDR")]
    exit: Option<String>,

    /// Daemon control endpoint (tcp://host:port or ipc://path).
    #[arg(long, value_name = "URL")]
    rpc: Option<String>,

    /// Logical endpoint to read the interface from.
    #[arg(long, value_name = "NAME")]
    endpoint: Option<String>,

    /// Auth token sent along with the exit request.
    #[arg(long)]
    token: Option<String>,
}

impl Cli {
    /// Fold flag values over the loaded configuration. Flags win.
    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.rpc {
            config.rpc.url = url.clone();
        }
        if let Some(name) = &self.endpoint {
            config.rpc.endpoint = name.clone();
        }
        if let Some(exit) = &self.exit {
            config.exit.address = Some(exit.clone());
        }
        if let Some(token) = &self.token {
            config.exit.token = Some(token.clone());
        }
    }

    fn mode(&self, config: &ClientConfig) -> Result<ExitMode, ControlError> {
        ExitMode::from_flags(
            self.up,
            self.down,
            config.exit.address.clone(),
            config.exit.token.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let (config, from_file) = match load_config(&cli.config).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = LogSettings::from_config(&config.logging, cli.verbose).init() {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    debug!(version = %build_info::version_string(), "overlayctl starting");
    if !from_file {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let result = execute(&cli, config).await;
    finish(result, &mut io::stdout().lock(), &mut io::stderr().lock())
}

/// Load the config file if it exists, else defaults. The flag tells the
/// caller which one happened so it can log after tracing is up.
async fn load_config(path: &Path) -> Result<(ClientConfig, bool)> {
    if path.exists() {
        let config = ClientConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((ClientConfig::default(), false))
    }
}

async fn execute(cli: &Cli, mut config: ClientConfig) -> Result<ExitReport, ControlError> {
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| ControlError::Usage(e.to_string()))?;

    let mode = cli.mode(&config)?;
    let endpoint: Endpoint = config.rpc.url.parse()?;
    info!(%endpoint, mode = mode.label(), "contacting daemon");

    let mut controller = ExitController::new(
        Arc::new(HttpTransport::new()),
        ControlSettings::from_config(&config.rpc),
    );
    controller.run(&endpoint, &mode).await
}

/// Tell the operator how the run ended and pick the process exit code.
fn finish(
    result: Result<ExitReport, ControlError>,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> ExitCode {
    let written = match &result {
        Ok(report) => writeln!(stdout, "{report}"),
        // The daemon's own words, unadorned.
        Err(ControlError::ExitRejected(message)) => writeln!(stdout, "{message}"),
        Err(err @ ControlError::Usage(_)) => {
            writeln!(stderr, "error: {err}\n\n{}", Cli::command().render_help())
        }
        Err(err) => writeln!(stderr, "error: {err}"),
    };
    if let Err(e) = written {
        debug!(error = %e, "failed to write outcome");
    }

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
