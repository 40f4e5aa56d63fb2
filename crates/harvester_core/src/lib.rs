//! Harvester core: record model, deduplication and the pure convergence state machine.
mod accumulator;
mod effect;
mod labels;
mod msg;
mod record;
mod state;
mod update;

pub use accumulator::RecordAccumulator;
pub use effect::Effect;
pub use labels::{board_label, slug_label, title_case};
pub use msg::Msg;
pub use record::{canonical_link, ItemMatch, KeyStrategy, LinkCandidate, Record, RecordKey};
pub use state::{
    HarvestOutcome, HarvestPhase, HarvestSettings, HarvestState, SurfaceMetrics,
    TruncationReason,
};
pub use update::update;
