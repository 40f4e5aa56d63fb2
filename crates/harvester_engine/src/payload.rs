use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::fetch::Fetcher;
use crate::types::FetchError;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeSettings {
    /// Cap on the longer edge, in pixels. Smaller images are not upscaled.
    pub max_edge: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            max_edge: 800,
            jpeg_quality: 85,
        }
    }
}

/// A size-bounded image ready to embed in an inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImagePayload {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("image fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("image could not be encoded: {0}")]
    Encode(String),
}

/// Obtains the normalized payload for a record's media URL.
#[async_trait::async_trait]
pub trait PayloadSource: Send + Sync {
    async fn prepare(&self, media_url: &str) -> Result<ImagePayload, PayloadError>;
}

/// Fetches card images over HTTP and normalizes them.
pub struct HttpPayloadSource {
    fetcher: Box<dyn Fetcher>,
    settings: NormalizeSettings,
}

impl HttpPayloadSource {
    pub fn new(fetcher: Box<dyn Fetcher>, settings: NormalizeSettings) -> Self {
        Self { fetcher, settings }
    }
}

#[async_trait::async_trait]
impl PayloadSource for HttpPayloadSource {
    async fn prepare(&self, media_url: &str) -> Result<ImagePayload, PayloadError> {
        let output = self.fetcher.fetch(media_url).await?;
        normalize_image(&output.bytes, &self.settings)
    }
}

/// Decodes `bytes`, caps the longer edge preserving aspect ratio, and
/// re-encodes as JPEG.
pub fn normalize_image(
    bytes: &[u8],
    settings: &NormalizeSettings,
) -> Result<ImagePayload, PayloadError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| PayloadError::Decode(err.to_string()))?;

    let (width, height) = decoded.dimensions();
    let (target_w, target_h) = fit_within(width, height, settings.max_edge);
    let resized = if (target_w, target_h) == (width, height) {
        decoded
    } else {
        DynamicImage::ImageRgba8(image::imageops::resize(
            &decoded,
            target_w,
            target_h,
            FilterType::Triangle,
        ))
    };

    let rgb = resized.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, settings.jpeg_quality)
        .encode_image(&rgb)
        .map_err(|err| PayloadError::Encode(err.to_string()))?;

    Ok(ImagePayload {
        mime_type: JPEG_MIME,
        bytes: buffer.into_inner(),
        width: rgb.width(),
        height: rgb.height(),
    })
}

fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width, height);
    }
    let scale = f64::from(max_edge) / f64::from(longest);
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
