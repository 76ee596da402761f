//! Climate tile publishing pipeline runner.
//!
//! Drives configured layers through download, encoding, archive build,
//! explosion and publication. Every stage writes a durable artifact, so an
//! interrupted run resumes from where it stopped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use acquisition::{GridSource, HttpGridSource, LocalGridSource};
use pipeline::config::SourceConfig;
use pipeline::{Orchestrator, PipelineConfig, SkipPolicy};
use publisher::ObjectStorage;
use tiler::{MbUtilExtractor, TippecanoeBuilder};

#[derive(Parser, Debug)]
#[command(name = "pipeline-cli")]
#[command(about = "Publish monthly climate layers as vector tile trees")]
struct Args {
    /// Pipeline configuration file
    #[arg(short, long, env = "PIPELINE_CONFIG", default_value = "config/pipeline.yaml")]
    config: PathBuf,

    /// Only process this variable (default: all configured)
    #[arg(long)]
    variable: Option<String>,

    /// Skip every stage whose artifact already exists, overriding the
    /// configured skip flags
    #[arg(long)]
    resume: bool,

    /// Re-run every stage even when artifacts exist, overriding the
    /// configured skip flags
    #[arg(long, conflicts_with = "resume")]
    force: bool,

    /// Log planned work without executing stages
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(config = %args.config.display(), "Starting climate tile pipeline");

    let config = PipelineConfig::load(&args.config)?;

    tokio::fs::create_dir_all(&config.workspace.data_dir).await?;
    tokio::fs::create_dir_all(&config.workspace.mbtiles_dir).await?;
    tokio::fs::create_dir_all(&config.workspace.tiles_dir).await?;

    let mut layers = config.layers()?;
    if let Some(variable) = &args.variable {
        layers.retain(|layer| &layer.variable == variable);
        if layers.is_empty() {
            anyhow::bail!("variable {} is not in the configured set", variable);
        }
    }

    let source: Arc<dyn GridSource> = match &config.source {
        SourceConfig::Http { .. } => {
            let http = config
                .source
                .http_config()
                .expect("http source carries an http config");
            Arc::new(HttpGridSource::new(http)?)
        }
        SourceConfig::Local { root } => Arc::new(LocalGridSource::new(root)),
    };

    let builder = Arc::new(
        TippecanoeBuilder::new(config.tiling.tool_timeout())
            .with_program(&config.tiling.tippecanoe),
    );
    let extractor = Arc::new(
        MbUtilExtractor::new(config.tiling.tool_timeout()).with_program(&config.tiling.mbutil),
    );
    let storage = Arc::new(ObjectStorage::new(&config.storage)?);

    let skip = if args.resume {
        SkipPolicy::all()
    } else if args.force {
        SkipPolicy::none()
    } else {
        config.skip.to_policy()
    };

    let orchestrator = Orchestrator::new(
        source,
        builder,
        extractor,
        storage,
        config.tiling.zoom_range()?,
        &config.workspace,
    )
    .with_skip_policy(skip)
    .with_max_concurrent(config.max_concurrent)
    .with_land_mask(config.land_mask.clone())
    .with_dry_run(args.dry_run);

    // First Ctrl+C finishes in-flight stages and stops between stages.
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, cancelling between stages");
        cancel.cancel();
    });

    info!(layers = layers.len(), dry_run = args.dry_run, "Running pipeline");
    let summary = orchestrator.run_all(layers).await;

    for report in &summary.layers {
        match &report.state {
            pipeline::LayerState::Published => {}
            pipeline::LayerState::Cancelled => {
                info!(layer = %report.slug, "Layer cancelled");
            }
            pipeline::LayerState::Failed {
                stage,
                kind,
                message,
            } => {
                error!(
                    layer = %report.slug,
                    stage = %stage,
                    kind = ?kind,
                    error = %message,
                    "Layer failed"
                );
            }
        }
    }

    info!(
        published = summary.published(),
        failed = summary.failed(),
        cancelled = summary.cancelled(),
        "Pipeline run complete"
    );

    if !summary.all_succeeded() {
        anyhow::bail!(
            "{} of {} layers did not publish",
            summary.layers.len() - summary.published(),
            summary.layers.len()
        );
    }

    Ok(())
}
