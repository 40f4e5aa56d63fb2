use std::time::Duration;

use crate::state::HarvestOutcome;

/// Instructions for the surface driver, executed in order.
///
/// `Extract` and `Measure` each answer with exactly one message
/// (`Msg::Extracted` / `Msg::Measured`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    ScrollToTop,
    ScrollBy { fraction: f64 },
    Pause(Duration),
    Extract,
    Measure,
    Finish(HarvestOutcome),
}
