//! AppInsights - AI competitive analyses for mobile apps
//!
//! A CLI front end over the analysis retrieval core: it lists a user's
//! previous analyses, opens one, or runs a new one through the analysis
//! service, caching every result per user, app and region.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, output, client setup, etc.)
//!   2 - Invalid request (bad arguments, app id, region or key)
//!   3 - Analysis not found
//!   4 - Store unavailable
//!   5 - Analysis service failed

mod cli;
mod compute;
mod config;
mod error;
mod index;
mod models;
mod orchestrator;
mod report;
mod session;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::{Args, Mode, OutputFormat};
use compute::HttpComputeClient;
use config::{Config, CONFIG_FILE_NAME};
use error::InsightsError;
use indicatif::{ProgressBar, ProgressStyle};
use orchestrator::{Delivery, RequestPhase};
use session::{AuthEvent, Session};
use std::sync::Arc;
use std::time::Duration;
use store::FileStore;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("AppInsights v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("AppInsights failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .appinsights.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the service URL, store directory and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins if set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the requested mode. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let Some(mode) = args.mode() else {
        eprintln!("Error: nothing to do");
        return Ok(2);
    };
    let user_id = args.user.clone().unwrap_or_default();

    let store = Arc::new(FileStore::new(config.store.resolve_data_dir()));
    let compute = Arc::new(
        HttpComputeClient::new(config.compute.clone())
            .context("Failed to set up the analysis service client")?,
    );

    let session = Session::new(store, compute);
    if let Err(e) = session.handle_auth_event(AuthEvent::SignedIn { user_id }) {
        return Ok(report_failure(&e));
    }

    let rendered = match mode {
        Mode::List => render_listing(&session, config.general.format).await?,
        Mode::Open(key) => {
            println!("📂 Opening analysis {}", key);
            match track_phase(&session, args.quiet, session.open_existing(&key)).await {
                Ok(delivery) => render_delivery(&session, &config, &delivery)?,
                Err(e) => return Ok(report_failure(&e)),
            }
        }
        Mode::Analyze {
            app_id,
            region,
            refresh,
        } => {
            println!("🔬 Analyzing {} in region {}", app_id, region);
            println!("   Service: {}", config.compute.service_url);
            let outcome = if refresh {
                track_phase(&session, args.quiet, session.run_new(&app_id, &region)).await
            } else {
                track_phase(&session, args.quiet, session.request(&app_id, &region)).await
            };
            match outcome {
                Ok(delivery) => render_delivery(&session, &config, &delivery)?,
                Err(e) => return Ok(report_failure(&e)),
            }
        }
    };

    emit(&rendered, &args)?;

    session
        .handle_auth_event(AuthEvent::SignedOut)
        .context("Failed to end the session")?;
    Ok(0)
}

/// Render the dashboard listing. A listing failure degrades to an empty list.
async fn render_listing(session: &Session, format: OutputFormat) -> Result<String> {
    let (mut entries, warning) = match session.list_analyses().await {
        Ok(entries) => (entries, None),
        Err(e) => {
            warn!("Listing previous analyses failed: {}", e);
            (Vec::new(), Some(e))
        }
    };
    index::newest_first(&mut entries);
    info!("Found {} previous analyses", entries.len());

    match format {
        OutputFormat::Json => report::generate_listing_json(&entries, warning.as_ref()),
        OutputFormat::Markdown => Ok(report::generate_listing_markdown(
            &entries,
            warning.as_ref(),
        )),
    }
}

/// Render whatever the shared state currently shows.
fn render_delivery(session: &Session, config: &Config, delivery: &Delivery) -> Result<String> {
    if !delivery.published {
        warn!(
            "Analysis of {} was superseded before it could be shown",
            delivery.analysis.reference_app.app_id
        );
    }

    match session.get_active() {
        Some(analysis) => match config.general.format {
            OutputFormat::Json => report::generate_json_report(&analysis),
            OutputFormat::Markdown => Ok(report::generate_markdown_report(
                &analysis,
                &config.report,
            )),
        },
        None => Ok(format!("{}\n", report::NO_DATA_MESSAGE)),
    }
}

/// Print or save the rendered view.
fn emit(rendered: &str, args: &Args) -> Result<()> {
    match args.output {
        Some(ref path) => {
            report::write_report(rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("\n✅ Saved to: {}", path.display());
        }
        None => println!("\n{}", rendered),
    }
    Ok(())
}

/// Print a domain failure with its hint and map it to an exit code.
fn report_failure(err: &InsightsError) -> i32 {
    error!("{}", err);
    let marker = if err.is_retryable() { "⚠️ " } else { "❌" };
    eprintln!("\n{} {}", marker, err);
    eprintln!("   {}", err.next_action());
    err.exit_code()
}

/// Drive `operation` while showing a spinner whenever the session is computing.
async fn track_phase<F, T>(session: &Session, quiet: bool, operation: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let (done_tx, done_rx) = oneshot::channel();
    let spinner = tokio::spawn(show_spinner(session.subscribe_phase(), done_rx, quiet));

    let outcome = operation.await;

    let _ = done_tx.send(());
    let _ = spinner.await;
    outcome
}

async fn show_spinner(
    mut phases: watch::Receiver<RequestPhase>,
    mut done: oneshot::Receiver<()>,
    quiet: bool,
) {
    let mut spinner: Option<ProgressBar> = None;

    loop {
        tokio::select! {
            _ = &mut done => break,
            changed = phases.changed() => {
                if changed.is_err() {
                    break;
                }
                let phase = *phases.borrow_and_update();
                debug!("Request phase: {}", phase);
                match phase {
                    RequestPhase::Computing if spinner.is_none() && !quiet => {
                        spinner = Some(computing_spinner());
                    }
                    RequestPhase::Computing => {}
                    _ => {
                        if let Some(pb) = spinner.take() {
                            pb.finish_and_clear();
                        }
                    }
                }
            }
        }
    }

    if let Some(pb) = spinner.take() {
        pb.finish_and_clear();
    }
}

fn computing_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Waiting for the analysis service (this can take a few minutes)...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
