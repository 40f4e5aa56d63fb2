use std::time::Duration;

use harvest_logging::engine_debug;
use harvester_core::SurfaceMetrics;

use crate::decode::decode_markup;
use crate::fetch::Fetcher;
use crate::types::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface unavailable: {0}")]
    Unavailable(String),
    #[error("surface command `{command}` failed: {message}")]
    Command { command: &'static str, message: String },
    #[error("failed to load surface: {0}")]
    Load(#[from] FetchError),
}

/// The live, lazily-rendered feed the harvester drives.
///
/// Extents are in pixels. Implementations own their own scroll state, so the
/// harvester only ever holds a shared reference.
#[async_trait::async_trait]
pub trait SurfaceDriver: Send + Sync {
    /// Absolute location of the surface; used as the extraction base URL.
    async fn location(&self) -> Result<String, SurfaceError>;
    async fn visible_extent(&self) -> Result<f64, SurfaceError>;
    async fn total_extent(&self) -> Result<f64, SurfaceError>;
    async fn scroll_offset(&self) -> Result<f64, SurfaceError>;
    /// Advances the view by `fraction` of the visible extent.
    async fn scroll_by(&self, fraction: f64) -> Result<(), SurfaceError>;
    async fn scroll_to_top(&self) -> Result<(), SurfaceError>;
    /// Markup of the current render.
    async fn snapshot(&self) -> Result<String, SurfaceError>;

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn metrics(&self) -> Result<SurfaceMetrics, SurfaceError> {
        Ok(SurfaceMetrics {
            scroll_offset: self.scroll_offset().await?,
            visible_extent: self.visible_extent().await?,
            total_extent: self.total_extent().await?,
        })
    }
}

/// A fully rendered document that never scrolls or grows.
///
/// Converges after the seeding pass; useful for saved snapshots and
/// server-rendered pages.
#[derive(Debug, Clone)]
pub struct StaticPageSurface {
    location: String,
    markup: String,
}

impl StaticPageSurface {
    pub fn new(location: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            markup: markup.into(),
        }
    }

    pub async fn load(fetcher: &dyn Fetcher, url: &str) -> Result<Self, SurfaceError> {
        let output = fetcher.fetch(url).await?;
        let decoded = decode_markup(&output.bytes, output.content_type.as_deref());
        engine_debug!(
            "Loaded static surface {} ({} bytes, {}{})",
            output.final_url,
            output.bytes.len(),
            decoded.encoding,
            if decoded.lossy { ", lossy" } else { "" }
        );
        Ok(Self::new(output.final_url, decoded.text))
    }
}

#[async_trait::async_trait]
impl SurfaceDriver for StaticPageSurface {
    async fn location(&self) -> Result<String, SurfaceError> {
        Ok(self.location.clone())
    }

    async fn visible_extent(&self) -> Result<f64, SurfaceError> {
        Ok(1.0)
    }

    async fn total_extent(&self) -> Result<f64, SurfaceError> {
        Ok(1.0)
    }

    async fn scroll_offset(&self) -> Result<f64, SurfaceError> {
        Ok(0.0)
    }

    async fn scroll_by(&self, _fraction: f64) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<String, SurfaceError> {
        Ok(self.markup.clone())
    }

    async fn pause(&self, _duration: Duration) {}
}
