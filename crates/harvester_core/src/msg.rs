use crate::record::Record;
use crate::state::SurfaceMetrics;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Begin a harvest from an idle state.
    Start,
    /// Records produced by one extraction pass over the current render.
    Extracted(Vec<Record>),
    /// Surface geometry read after the previous effects ran.
    Measured(SurfaceMetrics),
    /// The driver's wall-clock ceiling elapsed.
    DeadlineReached,
    /// The driver could not run the last effect.
    SurfaceFailed,
}
