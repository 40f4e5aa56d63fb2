//! RON configuration file for the `harvest` command.
//!
//! Every field is optional; missing fields take the engine defaults. Unknown
//! keys are rejected. The inference credential is never read from the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::{HarvestSettings, KeyStrategy};
use harvester_engine::{
    CallMode, ExtractorSettings, InferenceSettings, NormalizeSettings, PacingSettings,
    RetryPolicy, SessionConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub log_level: String,
    pub enrich: bool,
    pub harvest: HarvestConfig,
    pub extractor: ExtractorConfig,
    pub normalize: NormalizeConfig,
    pub inference: InferenceConfig,
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStrategyName {
    LinkAndMedia,
    LinkOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallModeName {
    IdentifyOnly,
    IdentifyAndSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub step_fraction: f64,
    pub mount_delay_ms: u64,
    pub scroll_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub bottom_tolerance: f64,
    pub max_passes: Option<u32>,
    pub max_stalled_steps: Option<u32>,
    pub deadline_secs: Option<u64>,
    pub key_strategy: KeyStrategyName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub card_selector: String,
    pub media_host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    pub max_edge: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub temperature: f32,
    pub mode: CallModeName,
    pub max_attempts: u32,
    pub search_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    pub service_interval_ms: u64,
    pub local_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./harvest-output"),
            log_level: "info".to_string(),
            enrich: true,
            harvest: HarvestConfig::default(),
            extractor: ExtractorConfig::default(),
            normalize: NormalizeConfig::default(),
            inference: InferenceConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let settings = HarvestSettings::default();
        let deadline = SessionConfig::default().deadline;
        Self {
            step_fraction: settings.step_fraction,
            mount_delay_ms: millis(settings.mount_delay),
            scroll_delay_ms: millis(settings.scroll_delay),
            settle_delay_ms: millis(settings.settle_delay),
            bottom_tolerance: settings.bottom_tolerance,
            max_passes: settings.max_passes,
            max_stalled_steps: settings.max_stalled_steps,
            deadline_secs: deadline.map(|d| d.as_secs()),
            key_strategy: match settings.key_strategy {
                KeyStrategy::LinkAndMedia => KeyStrategyName::LinkAndMedia,
                KeyStrategy::LinkOnly => KeyStrategyName::LinkOnly,
            },
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let settings = ExtractorSettings::default();
        Self {
            card_selector: settings.card_selector,
            media_host: settings.media_host,
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        let settings = NormalizeSettings::default();
        Self {
            max_edge: settings.max_edge,
            jpeg_quality: settings.jpeg_quality,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        let settings = InferenceSettings::default();
        Self {
            endpoint: settings.endpoint,
            model: settings.model,
            request_timeout_secs: settings.request_timeout.as_secs(),
            temperature: settings.temperature,
            mode: settings.mode.into(),
            max_attempts: settings.retry.max_attempts,
            search_base: settings.search_base,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        let settings = PacingSettings::default();
        Self {
            service_interval_ms: millis(settings.service_interval),
            local_interval_ms: millis(settings.local_interval),
        }
    }
}

impl From<CallMode> for CallModeName {
    fn from(mode: CallMode) -> Self {
        match mode {
            CallMode::IdentifyOnly => CallModeName::IdentifyOnly,
            CallMode::IdentifyAndSearch => CallModeName::IdentifyAndSearch,
        }
    }
}

impl From<CallModeName> for CallMode {
    fn from(mode: CallModeName) -> Self {
        match mode {
            CallModeName::IdentifyOnly => CallMode::IdentifyOnly,
            CallModeName::IdentifyAndSearch => CallMode::IdentifyAndSearch,
        }
    }
}

impl AppConfig {
    /// Reads `path` when given; otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_ron(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_ron(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::new(),
        )?)
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        let harvest = &self.harvest;
        let inference = &self.inference;

        SessionConfig {
            harvest: HarvestSettings {
                step_fraction: harvest.step_fraction,
                mount_delay: Duration::from_millis(harvest.mount_delay_ms),
                scroll_delay: Duration::from_millis(harvest.scroll_delay_ms),
                settle_delay: Duration::from_millis(harvest.settle_delay_ms),
                bottom_tolerance: harvest.bottom_tolerance,
                max_passes: harvest.max_passes,
                max_stalled_steps: harvest.max_stalled_steps,
                key_strategy: match harvest.key_strategy {
                    KeyStrategyName::LinkAndMedia => KeyStrategy::LinkAndMedia,
                    KeyStrategyName::LinkOnly => KeyStrategy::LinkOnly,
                },
            },
            deadline: harvest.deadline_secs.map(Duration::from_secs),
            extractor: ExtractorSettings {
                card_selector: self.extractor.card_selector.clone(),
                media_host: self.extractor.media_host.clone(),
            },
            normalize: NormalizeSettings {
                max_edge: self.normalize.max_edge,
                jpeg_quality: self.normalize.jpeg_quality.clamp(1, 100),
            },
            inference: InferenceSettings {
                endpoint: inference.endpoint.clone(),
                model: inference.model.clone(),
                request_timeout: Duration::from_secs(inference.request_timeout_secs),
                temperature: inference.temperature,
                mode: inference.mode.into(),
                retry: RetryPolicy {
                    max_attempts: inference.max_attempts.max(1),
                    ..defaults.inference.retry
                },
                search_base: inference.search_base.clone(),
            },
            pacing: PacingSettings {
                service_interval: Duration::from_millis(self.pacing.service_interval_ms),
                local_interval: Duration::from_millis(self.pacing.local_interval_ms),
            },
            enrich: self.enrich,
            image_fetch: defaults.image_fetch,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
