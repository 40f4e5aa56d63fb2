use std::time::Duration;

use serde::Serialize;

use crate::accumulator::RecordAccumulator;
use crate::record::{KeyStrategy, Record};

/// One reading of the rendered surface's geometry, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub scroll_offset: f64,
    pub visible_extent: f64,
    pub total_extent: f64,
}

impl SurfaceMetrics {
    pub fn reached_bottom(&self, tolerance: f64) -> bool {
        self.scroll_offset + self.visible_extent + tolerance >= self.total_extent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestSettings {
    /// Fraction of the visible extent advanced per scroll step.
    pub step_fraction: f64,
    /// Pause after resetting to the top, before the seeding pass.
    pub mount_delay: Duration,
    /// Pause after each scroll step so lazy content can mount.
    pub scroll_delay: Duration,
    /// Longer pause at the bottom before checking whether the surface grew.
    pub settle_delay: Duration,
    /// Pixels short of the total extent that still count as "at the bottom".
    pub bottom_tolerance: f64,
    /// Ceiling on extraction passes; `None` disables it.
    pub max_passes: Option<u32>,
    /// Consecutive scroll steps without the offset advancing before giving up.
    pub max_stalled_steps: Option<u32>,
    pub key_strategy: KeyStrategy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            step_fraction: 0.6,
            mount_delay: Duration::from_millis(1500),
            scroll_delay: Duration::from_millis(1200),
            settle_delay: Duration::from_millis(3000),
            bottom_tolerance: 4.0,
            max_passes: Some(400),
            max_stalled_steps: Some(5),
            key_strategy: KeyStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    PassLimit,
    Stalled,
    Deadline,
    /// The surface stopped answering after at least one pass was merged.
    SurfaceError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestOutcome {
    /// The surface stopped growing and the final pass was merged.
    Converged,
    /// A ceiling ended the harvest early; the records gathered so far are kept.
    Truncated(TruncationReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HarvestPhase {
    Idle,
    Scrolling,
    Settling { baseline_total: f64 },
    Finalizing,
    Done(HarvestOutcome),
}

/// State of one harvest run. Owned by the driving loop and consumed at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestState {
    pub(crate) settings: HarvestSettings,
    pub(crate) phase: HarvestPhase,
    pub(crate) accumulator: RecordAccumulator,
    pub(crate) passes: u32,
    pub(crate) idle_passes: u32,
    pub(crate) stalled_steps: u32,
    pub(crate) last_metrics: Option<SurfaceMetrics>,
}

impl HarvestState {
    pub fn new(settings: HarvestSettings) -> Self {
        let accumulator = RecordAccumulator::new(settings.key_strategy);
        Self {
            settings,
            phase: HarvestPhase::Idle,
            accumulator,
            passes: 0,
            idle_passes: 0,
            stalled_steps: 0,
            last_metrics: None,
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub fn phase(&self) -> HarvestPhase {
        self.phase
    }

    pub fn outcome(&self) -> Option<HarvestOutcome> {
        match self.phase {
            HarvestPhase::Done(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome().is_some()
    }

    /// Extraction passes merged so far.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Consecutive passes, ending with the latest, that added no new record.
    pub fn idle_passes(&self) -> u32 {
        self.idle_passes
    }

    pub fn records(&self) -> &[Record] {
        self.accumulator.records()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.accumulator.into_records()
    }

    pub(crate) fn merge_pass(&mut self, batch: Vec<Record>) -> usize {
        let added = self.accumulator.merge(batch);
        self.passes += 1;
        if added == 0 {
            self.idle_passes += 1;
        } else {
            self.idle_passes = 0;
        }
        added
    }

    pub(crate) fn pass_limit_reached(&self) -> bool {
        self.settings
            .max_passes
            .is_some_and(|max| self.passes >= max)
    }
}
