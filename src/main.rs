//! netfault - headless fault correlation for one target
//!
//! Builds the neighborhood of an alarmed equipment, lays it out, runs the
//! fault analysis and prints the report as JSON.

use anyhow::{bail, Context};
use clap::Parser;
use netfault_rs::{
    app::{AnalysisPoll, DashboardContext},
    backend::{Collaborators, ScriptedTelemetry, StaticTopologyClient},
    config::DashboardConfig,
    session::SessionOutcome,
    topology::AlarmDirectory,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Frame interval used when relaxing the layout without a display
const HEADLESS_FRAME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(author, version, about = "Locate the likely failure points around an alarmed equipment")]
struct Args {
    /// Equipment id to analyze
    equip_id: String,

    /// Alarm list and equipment directory (`{"alarms": [...], "equipment": [...]}`)
    directory: PathBuf,

    /// Configuration file; the platform config directory is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve the neighborhood from a saved response and analyze in process
    #[arg(long)]
    neighborhood: Option<PathBuf>,

    /// Include the laid-out graph in the output
    #[arg(long)]
    with_graph: bool,
}

fn init_logging(config: &DashboardConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "netfault.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DashboardConfig::load_or_default(),
    };
    let _log_guard = init_logging(&config);

    tracing::info!("Starting netfault for {}", args.equip_id);

    let directory = AlarmDirectory::load(&args.directory)
        .with_context(|| format!("Failed to load directory {}", args.directory.display()))?;

    let collaborators = match &args.neighborhood {
        Some(path) => {
            let topology = StaticTopologyClient::load(path)
                .with_context(|| format!("Failed to load neighborhood {}", path.display()))?;
            Collaborators::local(&config, topology, ScriptedTelemetry::new())
        }
        None => Collaborators::http(&config),
    };

    let mut context = DashboardContext::new(config, collaborators, directory);
    context.select_target(&args.equip_id, Instant::now())?;

    while context.tick(Instant::now()).is_some_and(|state| state.is_running()) {
        std::thread::sleep(HEADLESS_FRAME);
    }

    context.start_analysis()?;
    let report = match context.wait_analysis() {
        AnalysisPoll::Finished(SessionOutcome::Completed(report)) => report,
        AnalysisPoll::Finished(SessionOutcome::Failed(e)) => bail!("Analysis failed: {}", e),
        AnalysisPoll::Finished(SessionOutcome::TimedOut) => bail!("Analysis timed out"),
        other => bail!("Analysis did not finish: {:?}", other),
    };

    for message in context.progress() {
        tracing::debug!("progress: {}", message);
    }

    let output = if args.with_graph {
        serde_json::json!({ "report": report, "graph": context.graph() })
    } else {
        serde_json::to_value(&report)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    tracing::info!("Shutting down...");
    Ok(())
}
