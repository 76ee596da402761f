//! Per-layer stage execution with failure isolation and cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::{stream, StreamExt};
use tracing::{error, info, instrument, warn};

use acquisition::{parse_monthly_csv, GridSource, LandMask};
use encoder::{encode_layer, write_feature_collection};
use publisher::{sync_tile_tree, ObjectStorage, SyncOutcome, TILE_CONTENT_TYPE};
use tiles_common::{Layer, PipelineResult, TileCoord};
use tiler::{ArchiveBuilder, ArchiveExtractor, ZoomRange};

use crate::artifacts::LayerArtifacts;
use crate::config::WorkspaceConfig;
use crate::stage::{SkipPolicy, Stage};
use crate::summary::{LayerReport, LayerState, RunSummary};

/// Cooperative cancellation shared between the run loop and a signal handler.
/// Cancellation is only observed between stages, never mid-stage, so every
/// artifact on disk is either absent or complete.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives layers through the stage sequence. One layer failing never stops
/// the others; each layer carries its own terminal state into the summary.
pub struct Orchestrator {
    source: Arc<dyn GridSource>,
    builder: Arc<dyn ArchiveBuilder>,
    extractor: Arc<dyn ArchiveExtractor>,
    storage: Arc<ObjectStorage>,
    zoom: ZoomRange,
    data_dir: PathBuf,
    mbtiles_dir: PathBuf,
    tiles_dir: PathBuf,
    land_mask: Option<PathBuf>,
    skip: SkipPolicy,
    max_concurrent: usize,
    cancel: CancelFlag,
    dry_run: bool,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn GridSource>,
        builder: Arc<dyn ArchiveBuilder>,
        extractor: Arc<dyn ArchiveExtractor>,
        storage: Arc<ObjectStorage>,
        zoom: ZoomRange,
        workspace: &WorkspaceConfig,
    ) -> Self {
        Self {
            source,
            builder,
            extractor,
            storage,
            zoom,
            data_dir: workspace.data_dir.clone(),
            mbtiles_dir: workspace.mbtiles_dir.clone(),
            tiles_dir: workspace.tiles_dir.clone(),
            land_mask: None,
            skip: SkipPolicy::none(),
            max_concurrent: 2,
            cancel: CancelFlag::new(),
            dry_run: false,
        }
    }

    pub fn with_skip_policy(mut self, skip: SkipPolicy) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_land_mask(mut self, path: Option<PathBuf>) -> Self {
        self.land_mask = path;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Handle for a signal handler to request cancellation.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run every layer with bounded concurrency and collect the summary.
    /// Reports are ordered by slug regardless of completion order.
    pub async fn run_all(&self, layers: Vec<Layer>) -> RunSummary {
        let mut reports: Vec<LayerReport> = stream::iter(layers)
            .map(|layer| self.run_layer(layer))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        reports.sort_by(|a, b| a.slug.cmp(&b.slug));

        let mut summary = RunSummary::default();
        for report in reports {
            summary.push(report);
        }
        summary
    }

    /// Run one layer to its terminal state. A stage error stops this layer
    /// and leaves all earlier artifacts intact for the next run to resume
    /// from.
    #[instrument(skip(self), fields(layer = %layer))]
    pub async fn run_layer(&self, layer: Layer) -> LayerReport {
        let started = Instant::now();
        let artifacts = LayerArtifacts::new(
            &layer,
            &self.data_dir,
            &self.mbtiles_dir,
            &self.tiles_dir,
        );

        let mut stages_run = Vec::new();
        let mut stages_skipped = Vec::new();
        let mut tiles_uploaded = 0;
        let mut tiles_skipped = 0;

        for stage in Stage::SEQUENCE {
            if self.cancel.is_cancelled() {
                warn!(stage = %stage, "Run cancelled, stopping layer");
                return LayerReport {
                    slug: layer.slug(),
                    state: LayerState::Cancelled,
                    stages_run,
                    stages_skipped,
                    tiles_uploaded,
                    tiles_skipped,
                    elapsed: started.elapsed(),
                };
            }

            match self.stage_satisfied(stage, &artifacts).await {
                Ok(true) => {
                    info!(stage = %stage, "Artifact present, skipping stage");
                    stages_skipped.push(stage);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(stage = %stage, error = %e, "Skip probe failed");
                    return LayerReport {
                        slug: layer.slug(),
                        state: LayerState::Failed {
                            stage,
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                        stages_run,
                        stages_skipped,
                        tiles_uploaded,
                        tiles_skipped,
                        elapsed: started.elapsed(),
                    };
                }
            }

            if self.dry_run {
                info!(stage = %stage, "[dry run] stage would execute");
                stages_run.push(stage);
                continue;
            }

            match self.execute(stage, &layer, &artifacts).await {
                Ok(outcome) => {
                    stages_run.push(stage);
                    if let Some(sync) = outcome {
                        tiles_uploaded = sync.uploaded;
                        tiles_skipped = sync.skipped;
                    }
                }
                Err(e) => {
                    error!(stage = %stage, error = %e, kind = ?e.kind(), "Stage failed");
                    return LayerReport {
                        slug: layer.slug(),
                        state: LayerState::Failed {
                            stage,
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                        stages_run,
                        stages_skipped,
                        tiles_uploaded,
                        tiles_skipped,
                        elapsed: started.elapsed(),
                    };
                }
            }
        }

        info!(
            stages_run = stages_run.len(),
            stages_skipped = stages_skipped.len(),
            tiles_uploaded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Layer published"
        );

        LayerReport {
            slug: layer.slug(),
            state: LayerState::Published,
            stages_run,
            stages_skipped,
            tiles_uploaded,
            tiles_skipped,
            elapsed: started.elapsed(),
        }
    }

    /// A stage may be bypassed only when its skip flag is set AND its output
    /// artifact already exists. The flag alone never suffices.
    async fn stage_satisfied(
        &self,
        stage: Stage,
        artifacts: &LayerArtifacts,
    ) -> PipelineResult<bool> {
        if !self.skip.allows_skip(stage) {
            return Ok(false);
        }
        match stage {
            Stage::Download => Ok(artifacts.grid_csv.exists()),
            Stage::Encode => Ok(artifacts.feature_collection.exists()),
            Stage::BuildArchive => Ok(artifacts.archive.exists()),
            Stage::Explode => Ok(artifacts.tile_tree.is_dir()),
            Stage::Publish => {
                // The world tile exists at every zoom, so its presence under
                // the prefix is the cheapest witness of a completed publish.
                let probe = format!(
                    "{}/{}",
                    artifacts.remote_prefix,
                    TileCoord::new(0, 0, 0).relative_path()
                );
                self.storage.exists(&probe).await
            }
        }
    }

    async fn execute(
        &self,
        stage: Stage,
        layer: &Layer,
        artifacts: &LayerArtifacts,
    ) -> PipelineResult<Option<SyncOutcome>> {
        match stage {
            Stage::Download => {
                self.source.fetch(layer, &artifacts.grid_csv).await?;
                Ok(None)
            }
            Stage::Encode => {
                let text = tokio::fs::read_to_string(&artifacts.grid_csv).await?;
                let grid = parse_monthly_csv(&text)?;
                let mask = match &self.land_mask {
                    Some(path) => LandMask::load(path).await?,
                    None => LandMask::all_land(grid.rows(), grid.cols()),
                };
                let collection = encode_layer(layer, &grid, &mask)?;
                write_feature_collection(&collection, &artifacts.feature_collection).await?;
                Ok(None)
            }
            Stage::BuildArchive => {
                self.builder
                    .build(
                        layer,
                        &[&artifacts.feature_collection],
                        self.zoom,
                        &artifacts.archive,
                    )
                    .await?;
                Ok(None)
            }
            Stage::Explode => {
                self.extractor
                    .extract(&artifacts.archive, &artifacts.tile_tree)
                    .await?;
                Ok(None)
            }
            Stage::Publish => {
                let outcome = sync_tile_tree(
                    &self.storage,
                    &artifacts.tile_tree,
                    &artifacts.remote_prefix,
                    TILE_CONTENT_TYPE,
                )
                .await?;
                Ok(Some(outcome))
            }
        }
    }
}
