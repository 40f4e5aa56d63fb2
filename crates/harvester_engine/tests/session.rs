use std::fs;

use harvester_core::{HarvestOutcome, HarvestSettings, ItemMatch, TruncationReason};
use harvester_engine::{
    manifest_filename, write_session_manifest, CardExtractor, EnrichError, Enricher,
    EnrichmentPipeline, ExtractorSettings, Harvester, ImagePayload, NullProgressSink,
    PacingSettings, PayloadError, PayloadSource, PipelineStats, PreferenceHints, Session,
    SessionConfig, SessionOutput, StaticPageSurface, JPEG_MIME,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

const LOCATION: &str = "https://www.pinterest.com/jane/linen-summer/";

const BOARD: &str = r#"
<html><body>
  <div data-test-id="pin">
    <a href="/pin/1/"><img src="https://i.pinimg.com/736x/1.jpg" aria-label="Linen camp shirt"></a>
  </div>
  <div data-test-id="pin">
    <a href="/pin/2/"><img src="https://i.pinimg.com/736x/2.jpg" aria-label="Wide-leg linen trousers"></a>
  </div>
</body></html>
"#;

struct StubPayloads;

#[async_trait::async_trait]
impl PayloadSource for StubPayloads {
    async fn prepare(&self, _media_url: &str) -> Result<ImagePayload, PayloadError> {
        Ok(ImagePayload {
            mime_type: JPEG_MIME,
            bytes: vec![0xff, 0xd8],
            width: 1,
            height: 1,
        })
    }
}

struct StubEnricher;

#[async_trait::async_trait]
impl Enricher for StubEnricher {
    fn uses_remote_service(&self) -> bool {
        false
    }

    async fn identify(
        &self,
        _payload: &ImagePayload,
        _credential: &str,
        hints: &PreferenceHints,
    ) -> Result<Vec<ItemMatch>, EnrichError> {
        Ok(vec![ItemMatch {
            item: "Natural linen shirt".to_string(),
            direct_url: "https://shop.example/s?q=natural+linen+shirt".to_string(),
            preferred_url: (!hints.is_empty())
                .then(|| "https://shop.example/s?q=natural+linen+shirt+men".to_string()),
        }])
    }
}

fn session(enrich: bool) -> Session {
    let extractor = CardExtractor::new(&ExtractorSettings::default()).unwrap();
    let harvester = Harvester::new(Box::new(extractor), HarvestSettings::default());
    let pipeline = enrich.then(|| {
        EnrichmentPipeline::new(
            Box::new(StubPayloads),
            Box::new(StubEnricher),
            PacingSettings::default(),
        )
    });
    Session::new(harvester, pipeline)
}

#[tokio::test(start_paused = true)]
async fn session_harvests_then_enriches() {
    let surface = StaticPageSurface::new(LOCATION, BOARD);
    let hints = PreferenceHints::new(Some("men"), "");

    let output = session(true)
        .run(&surface, Some("key"), &hints, &NullProgressSink)
        .await
        .unwrap();

    assert_eq!(output.board_label.as_deref(), Some("Linen Summer"));
    assert_eq!(output.outcome, HarvestOutcome::Converged);
    assert_eq!(output.records.len(), 2);
    assert!(output.records.iter().all(|r| r.is_enriched()));
    assert!(output.records[0].preferred_links.is_some());
    assert_eq!(output.stats.enriched, 2);
}

#[tokio::test]
async fn session_without_enrichment_keeps_records_as_harvested() {
    let surface = StaticPageSurface::new(LOCATION, BOARD);

    let output = session(false)
        .run(&surface, Some("key"), &PreferenceHints::default(), &NullProgressSink)
        .await
        .unwrap();

    assert!(output.records.iter().all(|r| !r.is_enriched()));
    assert_eq!(
        output.stats,
        PipelineStats {
            total: 2,
            skipped: 2,
            ..PipelineStats::default()
        }
    );
}

#[test]
fn default_config_builds_the_stock_session() {
    assert!(Session::from_config(&SessionConfig::default()).is_ok());
}

#[tokio::test(start_paused = true)]
async fn manifest_is_written_under_deterministic_name() {
    let surface = StaticPageSurface::new(LOCATION, BOARD);
    let output = session(true)
        .run(&surface, Some("key"), &PreferenceHints::default(), &NullProgressSink)
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("exports");

    let path = write_session_manifest(&out_dir, &output, "2026-10-18T09:30:00Z").unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        manifest_filename(Some("Linen Summer"), LOCATION)
    );
    let manifest: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(manifest["board"], "Linen Summer");
    assert_eq!(manifest["location"], LOCATION);
    assert_eq!(manifest["harvestedUtc"], "2026-10-18T09:30:00Z");
    assert_eq!(manifest["outcome"], "converged");
    assert_eq!(manifest["enrichment"]["enriched"], 2);
    assert_eq!(manifest["records"].as_array().unwrap().len(), 2);
    assert_eq!(manifest["records"][0]["title"], "Linen camp shirt");
    assert_eq!(
        manifest["records"][0]["analysisItems"][0],
        "Natural linen shirt"
    );
}

#[test]
fn manifest_rewrite_replaces_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut output = SessionOutput {
        location: LOCATION.to_string(),
        board_label: None,
        outcome: HarvestOutcome::Truncated(TruncationReason::PassLimit),
        passes: 400,
        records: Vec::new(),
        stats: PipelineStats::default(),
    };

    let first = write_session_manifest(dir.path(), &output, "2026-10-18T09:00:00Z").unwrap();
    output.passes = 12;
    let second = write_session_manifest(dir.path(), &output, "2026-10-18T10:00:00Z").unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    let manifest: Value = serde_json::from_str(&fs::read_to_string(&second).unwrap()).unwrap();
    assert_eq!(manifest["passes"], 12);
    assert_eq!(manifest["board"], Value::Null);
    assert_eq!(manifest["outcome"]["truncated"], "pass_limit");
    assert!(second
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("board--"));
}
