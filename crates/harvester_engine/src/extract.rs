use harvester_core::{canonical_link, slug_label, Record};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::boilerplate::usable_text;
use crate::links::resolve_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSettings {
    /// CSS selector matching one media card.
    pub card_selector: String,
    /// Host serving card images; images from anywhere else (avatars, icons,
    /// UI chrome) do not qualify a card.
    pub media_host: String,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            card_selector: r#"[data-test-id="pin"], [data-grid-item="true"]"#.to_string(),
            media_host: "i.pinimg.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Produces the qualifying records visible in one rendered snapshot.
pub trait Extractor: Send + Sync {
    fn extract(&self, markup: &str, base_url: Option<&str>) -> Vec<Record>;
}

/// Card extractor for masonry-style media feeds.
///
/// Per card:
/// - link: first anchor with a resolvable `href`, canonicalized
/// - image: widest `srcset` candidate, else `src`, restricted to the media host
/// - title: image label, link label, heading text, card label (boilerplate
///   skipped), else a label built from the link slug
/// - description: image `alt`, else first paragraph
/// - video: direct `src`, else first nested `<source>`; `blob:` URLs never qualify
#[derive(Debug)]
pub struct CardExtractor {
    media_host: String,
    cards: Selector,
    anchors: Selector,
    images: Selector,
    headings: Selector,
    paragraphs: Selector,
    videos: Selector,
    sources: Selector,
}

impl CardExtractor {
    pub fn new(settings: &ExtractorSettings) -> Result<Self, ExtractError> {
        Ok(Self {
            media_host: settings.media_host.to_ascii_lowercase(),
            cards: parse_selector(&settings.card_selector)?,
            anchors: parse_selector("a[href]")?,
            images: parse_selector("img")?,
            headings: parse_selector(r#"h1, h2, h3, h4, h5, h6, [role="heading"]"#)?,
            paragraphs: parse_selector("p")?,
            videos: parse_selector("video")?,
            sources: parse_selector("source[src]")?,
        })
    }

    fn extract_card(&self, card: ElementRef<'_>, base: Option<&Url>) -> Option<Record> {
        let (anchor, link) = card.select(&self.anchors).find_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let resolved = resolve_url(href, base)?;
            canonical_link(resolved.as_str()).map(|link| (anchor, link))
        })?;

        let (image, media_url) = card
            .select(&self.images)
            .find_map(|img| self.qualifying_image(img, base).map(|url| (img, url)))?;

        let heading_text = card
            .select(&self.headings)
            .map(|heading| heading.text().collect::<String>());

        let title = image
            .value()
            .attr("aria-label")
            .map(str::to_string)
            .into_iter()
            .chain(anchor.value().attr("aria-label").map(str::to_string))
            .chain(heading_text)
            .chain(card.value().attr("aria-label").map(str::to_string))
            .find_map(|candidate| usable_text(&candidate))
            .or_else(|| slug_label(&link))
            .unwrap_or_default();

        let description = image
            .value()
            .attr("alt")
            .map(str::to_string)
            .into_iter()
            .chain(
                card.select(&self.paragraphs)
                    .map(|p| p.text().collect::<String>()),
            )
            .filter_map(|candidate| usable_text(&candidate))
            .find(|text| !text.eq_ignore_ascii_case(&title))
            .unwrap_or_default();

        let mut record = Record::new(link, media_url);
        record.title = title;
        record.description = description;
        record.secondary_media_url = self.video_url(card, base);
        Some(record)
    }

    fn qualifying_image(&self, img: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        let attrs = img.value();
        widest_srcset_candidate(attrs.attr("srcset").unwrap_or_default())
            .into_iter()
            .chain(attrs.attr("src"))
            .filter_map(|candidate| resolve_url(candidate, base))
            .find(|url| self.is_media_host(url))
            .map(String::from)
    }

    fn is_media_host(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host == self.media_host || host.ends_with(&format!(".{}", self.media_host))
            }
            None => false,
        }
    }

    fn video_url(&self, card: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        card.select(&self.videos).find_map(|video| {
            video
                .value()
                .attr("src")
                .and_then(|src| resolve_url(src, base))
                .or_else(|| {
                    video
                        .select(&self.sources)
                        .filter_map(|source| source.value().attr("src"))
                        .find_map(|src| resolve_url(src, base))
                })
                .map(String::from)
        })
    }
}

impl Extractor for CardExtractor {
    fn extract(&self, markup: &str, base_url: Option<&str>) -> Vec<Record> {
        let document = Html::parse_document(markup);
        let base = base_url.and_then(|b| Url::parse(b).ok());
        document
            .select(&self.cards)
            .filter_map(|card| self.extract_card(card, base.as_ref()))
            .collect()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|err| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{err:?}"),
    })
}

/// Picks the candidate with the largest `w`/`x` descriptor from a `srcset` value.
fn widest_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let weight = parts
                .next()
                .and_then(|d| d.trim_end_matches(['w', 'x']).parse::<f64>().ok())
                .unwrap_or(1.0);
            Some((url, weight))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(url, _)| url)
}
