use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvester_core::{ItemMatch, Record};
use harvester_engine::{
    ChannelProgressSink, EnrichError, Enricher, EnrichmentPipeline, ImagePayload,
    NullProgressSink, PacingSettings, ParseError, PayloadError, PayloadSource, PipelineEvent,
    PipelineStats, PreferenceHints, RecordDisposition, JPEG_MIME,
};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

fn record(id: u32) -> Record {
    Record::new(
        format!("https://www.pinterest.com/pin/{id}/"),
        format!("https://i.pinimg.com/736x/{id}.jpg"),
    )
}

fn records(count: u32) -> Vec<Record> {
    (1..=count).map(record).collect()
}

/// Hands the media URL through as the payload bytes so the enricher can
/// tell records apart.
struct EchoPayloads;

#[async_trait::async_trait]
impl PayloadSource for EchoPayloads {
    async fn prepare(&self, media_url: &str) -> Result<ImagePayload, PayloadError> {
        if media_url.contains("/broken/") {
            return Err(PayloadError::Decode("not an image".to_string()));
        }
        Ok(ImagePayload {
            mime_type: JPEG_MIME,
            bytes: media_url.as_bytes().to_vec(),
            width: 1,
            height: 1,
        })
    }
}

#[derive(Clone, Copy)]
enum Reply {
    Items,
    Nothing,
    Fail,
    Reject,
    Panic,
}

struct ScriptedEnricher {
    remote: bool,
    script: fn(&str) -> Reply,
    calls: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl ScriptedEnricher {
    fn new(script: fn(&str) -> Reply) -> (Self, Arc<Mutex<Vec<(String, Instant)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                remote: true,
                script,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait::async_trait]
impl Enricher for ScriptedEnricher {
    fn uses_remote_service(&self) -> bool {
        self.remote
    }

    async fn identify(
        &self,
        payload: &ImagePayload,
        _credential: &str,
        _hints: &PreferenceHints,
    ) -> Result<Vec<ItemMatch>, EnrichError> {
        let media_url = String::from_utf8(payload.bytes.clone()).unwrap();
        self.calls
            .lock()
            .unwrap()
            .push((media_url.clone(), Instant::now()));
        match (self.script)(&media_url) {
            Reply::Items => Ok(vec![ItemMatch {
                item: "Rust corduroy overshirt".to_string(),
                direct_url: "https://shop.example/s?q=rust+corduroy+overshirt".to_string(),
                preferred_url: None,
            }]),
            Reply::Nothing => Err(EnrichError::Parse(ParseError::NoStructuredPayload)),
            Reply::Fail => Err(EnrichError::RateLimited { attempts: 3 }),
            Reply::Reject => Err(EnrichError::Unauthorized { status: 403 }),
            Reply::Panic => panic!("model client exploded"),
        }
    }
}

fn pipeline(enricher: ScriptedEnricher) -> EnrichmentPipeline {
    EnrichmentPipeline::new(
        Box::new(EchoPayloads),
        Box::new(enricher),
        PacingSettings::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn failing_record_is_kept_unenriched_in_place() {
    let (enricher, calls) = ScriptedEnricher::new(|url| {
        if url.ends_with("/2.jpg") {
            Reply::Fail
        } else {
            Reply::Items
        }
    });

    let output = pipeline(enricher)
        .run(records(3), Some("key"), &PreferenceHints::default(), &NullProgressSink)
        .await;

    assert_eq!(output.records.len(), 3);
    let links: Vec<&str> = output.records.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(
        links,
        vec![
            "https://www.pinterest.com/pin/1/",
            "https://www.pinterest.com/pin/2/",
            "https://www.pinterest.com/pin/3/"
        ]
    );
    assert!(output.records[0].is_enriched());
    assert_eq!(output.records[1], record(2));
    assert!(output.records[2].is_enriched());
    assert_eq!(
        output.records[0].analysis_items,
        Some(vec!["Rust corduroy overshirt".to_string()])
    );
    assert_eq!(
        output.stats,
        PipelineStats {
            total: 3,
            enriched: 2,
            unmatched: 0,
            skipped: 0,
            failed: 1,
        }
    );
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn panicking_enricher_only_costs_one_record() {
    let (enricher, _calls) = ScriptedEnricher::new(|url| {
        if url.ends_with("/2.jpg") {
            Reply::Panic
        } else {
            Reply::Items
        }
    });
    let (tx, rx) = mpsc::channel();
    let sink = ChannelProgressSink::new(tx);

    let output = pipeline(enricher)
        .run(records(3), Some("key"), &PreferenceHints::default(), &sink)
        .await;

    assert_eq!(output.records.len(), 3);
    assert_eq!(output.stats.enriched, 2);
    assert_eq!(output.stats.failed, 1);
    let failure = rx.try_iter().find_map(|event| match event {
        PipelineEvent::RecordFinished {
            index: 1,
            disposition: RecordDisposition::Failed { reason },
        } => Some(reason),
        _ => None,
    });
    assert_eq!(
        failure.as_deref(),
        Some("enricher panicked: model client exploded")
    );
}

#[tokio::test(start_paused = true)]
async fn unmatched_and_unpreparable_records_pass_through() {
    let (enricher, calls) = ScriptedEnricher::new(|url| {
        if url.ends_with("/1.jpg") {
            Reply::Nothing
        } else {
            Reply::Items
        }
    });
    let mut input = records(2);
    input[1].media_url = "https://i.pinimg.com/broken/2.jpg".to_string();

    let output = pipeline(enricher)
        .run(input.clone(), Some("key"), &PreferenceHints::default(), &NullProgressSink)
        .await;

    assert_eq!(output.records, input);
    assert_eq!(output.stats.unmatched, 1);
    assert_eq!(output.stats.skipped, 1);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_credential_disables_the_service() {
    let (enricher, calls) = ScriptedEnricher::new(|_| Reply::Reject);
    let (tx, rx) = mpsc::channel();

    let output = pipeline(enricher)
        .run(
            records(4),
            Some("revoked"),
            &PreferenceHints::default(),
            &ChannelProgressSink::new(tx),
        )
        .await;

    assert_eq!(output.records, records(4));
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(output.stats.failed, 1);
    assert_eq!(output.stats.skipped, 3);
    let events: Vec<PipelineEvent> = rx.try_iter().collect();
    assert!(events.contains(&PipelineEvent::ServiceDisabled { status: 403 }));
    assert_eq!(events.last(), Some(&PipelineEvent::Finished(output.stats)));
}

#[tokio::test(start_paused = true)]
async fn blank_credential_makes_no_calls() {
    for credential in [None, Some(""), Some("   ")] {
        let (enricher, calls) = ScriptedEnricher::new(|_| Reply::Items);
        let started = Instant::now();

        let output = pipeline(enricher)
            .run(records(3), credential, &PreferenceHints::default(), &NullProgressSink)
            .await;

        assert_eq!(output.records, records(3));
        assert_eq!(output.stats.skipped, 3);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn record_starts_are_paced() {
    let (enricher, calls) = ScriptedEnricher::new(|_| Reply::Items);
    let started = Instant::now();

    pipeline(enricher)
        .run(records(3), Some("key"), &PreferenceHints::default(), &NullProgressSink)
        .await;

    let offsets: Vec<Duration> = calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, at)| at.duration_since(started))
        .collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn local_enrichers_use_the_shorter_interval() {
    let (mut enricher, calls) = ScriptedEnricher::new(|_| Reply::Items);
    enricher.remote = false;
    let started = Instant::now();

    pipeline(enricher)
        .run(records(3), Some("key"), &PreferenceHints::default(), &NullProgressSink)
        .await;

    let last = calls.lock().unwrap().last().map(|(_, at)| *at).unwrap();
    assert_eq!(last.duration_since(started), Duration::from_secs(2));
}
