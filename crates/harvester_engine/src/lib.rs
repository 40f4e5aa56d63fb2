//! Harvester engine: surface driving, extraction, enrichment IO and export.
mod boilerplate;
mod decode;
mod export;
mod extract;
mod fetch;
mod filename;
mod harvest;
mod inference;
mod links;
mod pacing;
mod parse;
mod payload;
mod pipeline;
mod prompt;
mod retry;
mod session;
mod surface;
mod types;

pub use boilerplate::{is_boilerplate, usable_text};
pub use decode::{decode_markup, DecodedMarkup};
pub use export::{write_session_manifest, ExportError};
pub use extract::{CardExtractor, ExtractError, Extractor, ExtractorSettings};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::manifest_filename;
pub use harvest::{HarvestReport, Harvester};
pub use inference::{
    advised_delay, enrich_record, EnrichError, EnrichStep, Enricher, InferenceClient,
    InferenceSettings,
};
pub use links::{is_web_url, resolve_url, SearchLinkBuilder, DEFAULT_SEARCH_BASE};
pub use pacing::{IntervalPacer, PacingSettings};
pub use parse::{parse_item_matches, parse_raw_items, ParseError, RawItem};
pub use payload::{
    normalize_image, HttpPayloadSource, ImagePayload, NormalizeSettings, PayloadError,
    PayloadSource, JPEG_MIME,
};
pub use pipeline::{
    ChannelProgressSink, EnrichmentPipeline, NullProgressSink, PipelineEvent, PipelineOutput,
    PipelineStats, ProgressSink, RecordDisposition,
};
pub use prompt::{build_instructions, CallMode};
pub use retry::{Backoff, CallFailure, RetryError, RetryPolicy};
pub use session::{run_session, Session, SessionConfig, SessionError, SessionOutput};
pub use surface::{StaticPageSurface, SurfaceDriver, SurfaceError};
pub use types::{FailureKind, FetchError, FetchOutput, PreferenceHints};
