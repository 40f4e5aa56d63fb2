use std::time::Duration;

use harvest_logging::engine_info;
use harvester_core::{HarvestOutcome, HarvestSettings, Record};

use crate::extract::{CardExtractor, ExtractError, ExtractorSettings};
use crate::fetch::{FetchSettings, ReqwestFetcher};
use crate::harvest::Harvester;
use crate::inference::{EnrichError, InferenceClient, InferenceSettings};
use crate::pacing::PacingSettings;
use crate::payload::{HttpPayloadSource, NormalizeSettings};
use crate::pipeline::{EnrichmentPipeline, PipelineStats, ProgressSink};
use crate::surface::{SurfaceDriver, SurfaceError};
use crate::types::{FetchError, PreferenceHints};

/// Everything needed to harvest one surface and enrich the result.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub harvest: HarvestSettings,
    /// Wall-clock ceiling for the harvest phase.
    pub deadline: Option<Duration>,
    pub extractor: ExtractorSettings,
    pub image_fetch: FetchSettings,
    pub normalize: NormalizeSettings,
    pub inference: InferenceSettings,
    pub pacing: PacingSettings,
    /// When false the harvested records are returned as-is.
    pub enrich: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            harvest: HarvestSettings::default(),
            deadline: Some(Duration::from_secs(15 * 60)),
            extractor: ExtractorSettings::default(),
            image_fetch: FetchSettings::images(),
            normalize: NormalizeSettings::default(),
            inference: InferenceSettings::default(),
            pacing: PacingSettings::default(),
            enrich: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Extractor(#[from] ExtractError),
    #[error("harvest failed: {0}")]
    Surface(#[from] SurfaceError),
    #[error("image fetcher setup failed: {0}")]
    Fetcher(#[from] FetchError),
    #[error("inference client setup failed: {0}")]
    Inference(#[from] EnrichError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutput {
    pub location: String,
    pub board_label: Option<String>,
    pub outcome: HarvestOutcome,
    pub passes: u32,
    /// Harvest order, enrichment attached where it succeeded.
    pub records: Vec<Record>,
    pub stats: PipelineStats,
}

/// A harvester and an optional enrichment stage, wired together.
pub struct Session {
    harvester: Harvester,
    pipeline: Option<EnrichmentPipeline>,
}

impl Session {
    pub fn new(harvester: Harvester, pipeline: Option<EnrichmentPipeline>) -> Self {
        Self {
            harvester,
            pipeline,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let extractor = CardExtractor::new(&config.extractor)?;
        let harvester = Harvester::new(Box::new(extractor), config.harvest.clone())
            .with_deadline(config.deadline);

        let pipeline = if config.enrich {
            let fetcher = ReqwestFetcher::new(config.image_fetch.clone())?;
            let payloads = HttpPayloadSource::new(Box::new(fetcher), config.normalize);
            let client = InferenceClient::new(config.inference.clone())?;
            Some(EnrichmentPipeline::new(
                Box::new(payloads),
                Box::new(client),
                config.pacing,
            ))
        } else {
            None
        };

        Ok(Self::new(harvester, pipeline))
    }

    pub async fn run(
        &self,
        driver: &dyn SurfaceDriver,
        credential: Option<&str>,
        hints: &PreferenceHints,
        sink: &dyn ProgressSink,
    ) -> Result<SessionOutput, SessionError> {
        let report = self.harvester.run(driver).await?;

        let (records, stats) = match &self.pipeline {
            Some(pipeline) => {
                let output = pipeline.run(report.records, credential, hints, sink).await;
                (output.records, output.stats)
            }
            None => {
                engine_info!(
                    "Enrichment disabled; keeping {} records as harvested",
                    report.records.len()
                );
                let stats = PipelineStats {
                    total: report.records.len(),
                    skipped: report.records.len(),
                    ..PipelineStats::default()
                };
                (report.records, stats)
            }
        };

        Ok(SessionOutput {
            location: report.location,
            board_label: report.board_label,
            outcome: report.outcome,
            passes: report.passes,
            records,
            stats,
        })
    }
}

/// Harvests `driver` and enriches the result with the stock components.
pub async fn run_session(
    driver: &dyn SurfaceDriver,
    config: &SessionConfig,
    credential: Option<&str>,
    hints: &PreferenceHints,
    sink: &dyn ProgressSink,
) -> Result<SessionOutput, SessionError> {
    Session::from_config(config)?
        .run(driver, credential, hints, sink)
        .await
}
