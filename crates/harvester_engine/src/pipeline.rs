use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use harvest_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::Record;
use serde::Serialize;

use crate::inference::{enrich_record, EnrichStep, Enricher};
use crate::pacing::{IntervalPacer, PacingSettings};
use crate::payload::PayloadSource;
use crate::types::PreferenceHints;

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDisposition {
    Enriched { items: usize },
    /// The service answered but found nothing usable.
    Unmatched,
    /// No call was made: payload unavailable or service disabled.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Started { total: usize },
    RecordStarted { index: usize, link: String },
    RecordFinished { index: usize, disposition: RecordDisposition },
    /// The credential was rejected; remaining records are passed through.
    ServiceDisabled { status: u16 },
    Finished(PipelineStats),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: PipelineEvent) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub total: usize,
    pub enriched: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PipelineStats {
    fn record(&mut self, disposition: &RecordDisposition) {
        match disposition {
            RecordDisposition::Enriched { .. } => self.enriched += 1,
            RecordDisposition::Unmatched => self.unmatched += 1,
            RecordDisposition::Skipped => self.skipped += 1,
            RecordDisposition::Failed { .. } => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Same length and order as the input.
    pub records: Vec<Record>,
    pub stats: PipelineStats,
}

/// Serial, paced enrichment of a harvested record set.
///
/// A failure on one record never affects another: every input record comes
/// back, enriched or untouched.
pub struct EnrichmentPipeline {
    payloads: Box<dyn PayloadSource>,
    enricher: Box<dyn Enricher>,
    pacing: PacingSettings,
}

impl EnrichmentPipeline {
    pub fn new(
        payloads: Box<dyn PayloadSource>,
        enricher: Box<dyn Enricher>,
        pacing: PacingSettings,
    ) -> Self {
        Self {
            payloads,
            enricher,
            pacing,
        }
    }

    pub async fn run(
        &self,
        records: Vec<Record>,
        credential: Option<&str>,
        hints: &PreferenceHints,
        sink: &dyn ProgressSink,
    ) -> PipelineOutput {
        let total = records.len();
        let mut stats = PipelineStats {
            total,
            ..PipelineStats::default()
        };
        sink.emit(PipelineEvent::Started { total });

        let Some(credential) = credential.map(str::trim).filter(|c| !c.is_empty()) else {
            engine_warn!("No inference credential; {} records left unenriched", total);
            for index in 0..total {
                let disposition = RecordDisposition::Skipped;
                stats.record(&disposition);
                sink.emit(PipelineEvent::RecordFinished { index, disposition });
            }
            sink.emit(PipelineEvent::Finished(stats));
            return PipelineOutput { records, stats };
        };

        let interval = self
            .pacing
            .interval_for(self.enricher.uses_remote_service());
        let mut pacer = IntervalPacer::new(interval);
        let mut service_enabled = true;
        let mut output = Vec::with_capacity(total);
        engine_info!(
            "Enrichment started records={} interval_ms={}",
            total,
            interval.as_millis()
        );

        for (index, mut record) in records.into_iter().enumerate() {
            if !service_enabled {
                let disposition = RecordDisposition::Skipped;
                stats.record(&disposition);
                sink.emit(PipelineEvent::RecordFinished { index, disposition });
                output.push(record);
                continue;
            }

            let held = pacer.wait().await;
            engine_debug!("Record {} paced for {:?}", index, held);
            sink.emit(PipelineEvent::RecordStarted {
                index,
                link: record.link.clone(),
            });

            let step = AssertUnwindSafe(enrich_record(
                self.payloads.as_ref(),
                self.enricher.as_ref(),
                &record,
                credential,
                hints,
            ))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| EnrichStep::Failed(panic_message(panic.as_ref())));

            let disposition = match step {
                EnrichStep::Matched(matches) => {
                    if record.attach_matches(&matches) {
                        RecordDisposition::Enriched {
                            items: matches.len(),
                        }
                    } else {
                        RecordDisposition::Unmatched
                    }
                }
                EnrichStep::Unmatched => RecordDisposition::Unmatched,
                EnrichStep::Skipped(reason) => {
                    engine_warn!("Record {} skipped: {}", index, reason);
                    RecordDisposition::Skipped
                }
                EnrichStep::Rejected { status } => {
                    engine_error!(
                        "Credential rejected (status {}); disabling enrichment for the rest of the run",
                        status
                    );
                    service_enabled = false;
                    sink.emit(PipelineEvent::ServiceDisabled { status });
                    RecordDisposition::Failed {
                        reason: format!("credential rejected (status {status})"),
                    }
                }
                EnrichStep::Failed(reason) => {
                    engine_warn!("Record {} failed: {}", index, reason);
                    RecordDisposition::Failed { reason }
                }
            };

            engine_info!("Record {}/{} {:?}", index + 1, total, disposition);
            stats.record(&disposition);
            sink.emit(PipelineEvent::RecordFinished { index, disposition });
            output.push(record);
        }

        engine_info!(
            "Enrichment finished enriched={} unmatched={} skipped={} failed={}",
            stats.enriched,
            stats.unmatched,
            stats.skipped,
            stats.failed
        );
        sink.emit(PipelineEvent::Finished(stats));
        PipelineOutput {
            records: output,
            stats,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("enricher panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("enricher panicked: {message}")
    } else {
        "enricher panicked".to_string()
    }
}
