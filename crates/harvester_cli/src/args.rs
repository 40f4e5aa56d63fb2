use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{AppConfig, CallModeName};
use crate::logging::LogDestination;

/// Harvest media cards from a board page and identify the items they show.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(version)]
pub struct Args {
    /// Board URL to fetch, or a saved HTML file (see --location).
    pub target: String,

    /// Page location a saved HTML file was captured from; used to resolve links.
    #[arg(long)]
    pub location: Option<String>,

    /// RON configuration file.
    #[arg(short, long, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory that receives the session manifest.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Inference service credential.
    #[arg(long, env = "HARVEST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Audience for preferred shopping links, e.g. "women".
    #[arg(long)]
    pub audience: Option<String>,

    /// Comma-separated brands for preferred shopping links.
    #[arg(long, default_value = "")]
    pub brands: String,

    /// Harvest only; skip enrichment.
    #[arg(long)]
    pub no_enrich: bool,

    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Wall-clock ceiling for the harvest, in seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// off, error, warn, info, debug or trace.
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log_to: LogTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    IdentifyOnly,
    IdentifyAndSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Args {
    /// Command-line values win over the file.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
        if self.no_enrich {
            config.enrich = false;
        }
        if let Some(mode) = self.mode {
            config.inference.mode = match mode {
                ModeArg::IdentifyOnly => CallModeName::IdentifyOnly,
                ModeArg::IdentifyAndSearch => CallModeName::IdentifyAndSearch,
            };
        }
        if let Some(secs) = self.deadline_secs {
            config.harvest.deadline_secs = Some(secs);
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }

    pub fn is_remote_target(&self) -> bool {
        let lower = self.target.trim().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}
