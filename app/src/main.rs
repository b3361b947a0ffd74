use std::process::ExitCode;

use clap::Parser;
use sqlwalk_adapters::{remember_password, MysqlCatalogProvider};
use sqlwalk_core::profiles::{FileProfilesStore, ProfilesError};
use sqlwalk_core::settings::{Settings, SettingsError};
use sqlwalk_core::{default_tree, NavError, Navigator, ProviderError, Session};
use sqlwalk_tui::{choose_profile, CrosstermDriver, FlowError, Selector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "sqlwalk=debug,sqlwalk_core=debug,sqlwalk_tui=debug,sqlwalk_adapters=debug";

#[derive(Debug, Parser)]
#[command(name = "sqlwalk", version, about = "Browse a MySQL catalog from the terminal")]
struct Cli {
    /// Log debug output to stderr (filter with RUST_LOG).
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Profiles(#[from] ProfilesError),
    #[error("profile setup failed: {0}")]
    Startup(#[source] FlowError),
    #[error("cannot reach the database: {0}")]
    Connect(#[source] ProviderError),
    #[error(transparent)]
    Navigation(NavError),
}

fn init_logging(debug: bool) {
    if !debug {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spawn_signal_relay(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        debug!("termination signal received");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(error) = result {
                        warn!(%error, "interrupt handler unavailable");
                        terminate.recv().await;
                    }
                }
                _ = terminate.recv() => {}
            }
        }
        Err(error) => {
            warn!(%error, "terminate handler unavailable");
            interrupt().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    interrupt().await;
}

async fn interrupt() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "interrupt handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// A cancelled run is a normal quit; anything else is a fault.
fn navigation_outcome(stopped: NavError) -> Result<(), AppError> {
    if stopped.is_cancelled() {
        Ok(())
    } else {
        Err(AppError::Navigation(stopped))
    }
}

fn exit_status(outcome: &Result<(), AppError>) -> u8 {
    u8::from(outcome.is_err())
}

/// Error text for stderr. Only `--debug` runs surface it; the exit code reports the rest.
fn stderr_report(outcome: &Result<(), AppError>, debug: bool) -> Option<String> {
    match outcome {
        Err(error) if debug => Some(format!("sqlwalk: {error}")),
        _ => None,
    }
}

async fn run_app() -> Result<(), AppError> {
    let cancel = CancellationToken::new();
    spawn_signal_relay(cancel.clone());

    let settings = Settings::load_default()?;
    let mut store = FileProfilesStore::load_default()?;
    let mut selector = Selector::new(CrosstermDriver::new());

    let chosen = choose_profile(&mut selector, &mut store, remember_password, &cancel).await;
    let startup = match chosen {
        Ok(startup) => startup,
        Err(FlowError::Cancelled) => return Ok(()),
        Err(error) => return Err(AppError::Startup(error)),
    };

    let provider =
        MysqlCatalogProvider::from_profile(&startup.profile, startup.password.as_deref());
    let timeout = settings.provider.fetch_timeout();
    tokio::select! {
        () = cancel.cancelled() => return Ok(()),
        verified = tokio::time::timeout(timeout, provider.verify()) => {
            verified
                .unwrap_or(Err(ProviderError::Timeout(timeout)))
                .map_err(AppError::Connect)?;
        }
    }
    info!(
        host = %startup.profile.host,
        port = startup.profile.port,
        user = %startup.profile.user,
        "connected"
    );

    let navigator = Navigator::new(default_tree()).with_policy(settings.navigation.return_to);
    let mut session =
        Session::new(&provider, &mut selector, cancel.clone()).with_fetch_timeout(timeout);
    let stopped = navigator.run(&mut session).await;

    if let Err(error) = provider.disconnect().await {
        debug!(%error, "disconnect failed");
    }
    navigation_outcome(stopped)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("sqlwalk: failed to start runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(run_app());
    if let Err(error) = &outcome {
        error!(%error, "sqlwalk stopped");
    }
    if let Some(report) = stderr_report(&outcome, cli.debug) {
        eprintln!("{report}");
    }
    ExitCode::from(exit_status(&outcome))
}
