use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use harvest_logging::{engine_info, engine_warn, level_from_name, redact};
use harvester_engine::{
    decode_markup, run_session, write_session_manifest, ChannelProgressSink, FetchSettings,
    PipelineEvent, PreferenceHints, RecordDisposition, ReqwestFetcher, StaticPageSurface,
};

use crate::args::Args;
use crate::config::AppConfig;
use crate::logging;

pub async fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply_to(&mut config);

    let level = level_from_name(&config.log_level)
        .ok_or_else(|| anyhow!("unknown log level `{}`", config.log_level))?;
    logging::initialize(args.log_to.into(), level);
    if let Some(path) = &args.config {
        engine_info!("Loaded configuration from {:?}", path);
    }

    let credential = args
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty());
    match credential {
        Some(key) => engine_info!("Inference credential {}", redact(key)),
        None if config.enrich => {
            engine_warn!("HARVEST_API_KEY is not set; records will be exported unenriched")
        }
        None => {}
    }
    let hints = PreferenceHints::new(args.audience.as_deref(), &args.brands);

    let surface = load_surface(&args).await?;
    let session_config = config.session_config();

    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || {
        for event in rx {
            print_progress(&event);
        }
    });
    let sink = ChannelProgressSink::new(tx);
    let output = run_session(&surface, &session_config, credential, &hints, &sink).await;
    drop(sink);
    let _ = printer.join();
    let output = output?;

    let harvested_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let path = write_session_manifest(&config.output_dir, &output, &harvested_utc)?;

    println!(
        "{}: {} records ({:?}, {} passes), {} enriched, {} unmatched, {} skipped, {} failed",
        output.board_label.as_deref().unwrap_or("board"),
        output.records.len(),
        output.outcome,
        output.passes,
        output.stats.enriched,
        output.stats.unmatched,
        output.stats.skipped,
        output.stats.failed
    );
    println!("Manifest: {}", path.display());
    Ok(())
}

async fn load_surface(args: &Args) -> Result<StaticPageSurface> {
    if args.is_remote_target() {
        let fetcher = ReqwestFetcher::new(FetchSettings::pages())?;
        return StaticPageSurface::load(&fetcher, args.target.trim())
            .await
            .with_context(|| format!("failed to load {}", args.target));
    }

    let path = Path::new(&args.target);
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let location = args
        .location
        .clone()
        .context("--location is required when harvesting a saved file")?;
    let decoded = decode_markup(&bytes, None);
    engine_info!(
        "Read {} ({} bytes, {})",
        path.display(),
        bytes.len(),
        decoded.encoding
    );
    Ok(StaticPageSurface::new(location, decoded.text))
}

fn print_progress(event: &PipelineEvent) {
    match event {
        PipelineEvent::Started { total } => println!("Enriching {total} records"),
        PipelineEvent::RecordFinished { index, disposition } => match disposition {
            RecordDisposition::Enriched { items } => println!("  #{}: {items} items", index + 1),
            RecordDisposition::Unmatched => println!("  #{}: no match", index + 1),
            RecordDisposition::Skipped => println!("  #{}: skipped", index + 1),
            RecordDisposition::Failed { reason } => println!("  #{}: failed ({reason})", index + 1),
        },
        PipelineEvent::ServiceDisabled { status } => {
            println!("Credential rejected (status {status}); remaining records left as-is")
        }
        PipelineEvent::RecordStarted { .. } | PipelineEvent::Finished(_) => {}
    }
}
