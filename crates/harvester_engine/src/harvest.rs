use std::collections::VecDeque;
use std::time::Duration;

use harvest_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::{
    board_label, update, Effect, HarvestOutcome, HarvestSettings, HarvestState, Msg, Record,
    TruncationReason,
};
use tokio::time::Instant;

use crate::extract::Extractor;
use crate::surface::{SurfaceDriver, SurfaceError};

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestReport {
    pub location: String,
    pub board_label: Option<String>,
    pub records: Vec<Record>,
    pub outcome: HarvestOutcome,
    pub passes: u32,
}

/// Drives a surface through the convergence state machine.
///
/// Only one effect is in flight at a time; replies are fed back in order.
pub struct Harvester {
    extractor: Box<dyn Extractor>,
    settings: HarvestSettings,
    deadline: Option<Duration>,
}

impl Harvester {
    pub fn new(extractor: Box<dyn Extractor>, settings: HarvestSettings) -> Self {
        Self {
            extractor,
            settings,
            deadline: None,
        }
    }

    /// Wall-clock ceiling for one run; reaching it truncates the harvest.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fails only when the surface breaks before the first pass is merged;
    /// later failures truncate the harvest and keep what was gathered.
    pub async fn run(&self, driver: &dyn SurfaceDriver) -> Result<HarvestReport, SurfaceError> {
        let location = driver.location().await?;
        let started = Instant::now();
        engine_info!("Harvest started location={}", location);

        let mut state = HarvestState::new(self.settings.clone());
        let mut inbox = VecDeque::from([Msg::Start]);
        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;

            let expired = self
                .deadline
                .is_some_and(|limit| started.elapsed() >= limit);
            if expired && !state.is_done() {
                inbox.push_back(Msg::DeadlineReached);
                continue;
            }

            for effect in effects {
                match self.apply(driver, effect, &location).await {
                    Ok(Some(reply)) => inbox.push_back(reply),
                    Ok(None) => {}
                    // Nothing harvested yet; the caller gets the failure.
                    Err(err) if state.passes() == 0 => return Err(err),
                    Err(err) => {
                        engine_warn!(
                            "Surface failed after {} passes, keeping {} records: {}",
                            state.passes(),
                            state.records().len(),
                            err
                        );
                        inbox.push_back(Msg::SurfaceFailed);
                        break;
                    }
                }
            }
        }

        let outcome = match state.outcome() {
            Some(outcome) => outcome,
            None => {
                engine_error!("Harvest loop ran dry before finishing; treating as stalled");
                HarvestOutcome::Truncated(TruncationReason::Stalled)
            }
        };
        let passes = state.passes();
        let records = state.into_records();
        engine_info!(
            "Harvest finished outcome={:?} passes={} records={} elapsed_ms={}",
            outcome,
            passes,
            records.len(),
            started.elapsed().as_millis()
        );

        Ok(HarvestReport {
            board_label: board_label(&location),
            location,
            records,
            outcome,
            passes,
        })
    }

    async fn apply(
        &self,
        driver: &dyn SurfaceDriver,
        effect: Effect,
        location: &str,
    ) -> Result<Option<Msg>, SurfaceError> {
        match effect {
            Effect::ScrollToTop => driver.scroll_to_top().await?,
            Effect::ScrollBy { fraction } => driver.scroll_by(fraction).await?,
            Effect::Pause(duration) => driver.pause(duration).await,
            Effect::Extract => {
                let markup = driver.snapshot().await?;
                let records = self.extractor.extract(&markup, Some(location));
                engine_debug!(
                    "Extraction pass found {} cards in {} bytes of markup",
                    records.len(),
                    markup.len()
                );
                return Ok(Some(Msg::Extracted(records)));
            }
            Effect::Measure => {
                let metrics = driver.metrics().await?;
                engine_debug!(
                    "Surface offset={} visible={} total={}",
                    metrics.scroll_offset,
                    metrics.visible_extent,
                    metrics.total_extent
                );
                return Ok(Some(Msg::Measured(metrics)));
            }
            Effect::Finish(HarvestOutcome::Converged) => {}
            Effect::Finish(HarvestOutcome::Truncated(reason)) => {
                engine_warn!("Harvest truncated: {:?}", reason);
            }
        }
        Ok(None)
    }
}
