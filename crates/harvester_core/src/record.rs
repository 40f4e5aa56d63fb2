use serde::{Deserialize, Serialize};
use url::Url;

/// One harvested media card.
///
/// Descriptive fields are filled by the extractor; the enrichment fields stay
/// `None` until the enrichment pipeline attaches a non-empty result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub link: String,
    pub media_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_media_url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_links: Option<Vec<LinkCandidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_links: Option<Vec<LinkCandidate>>,
}

/// A shopping-link candidate for one identified item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub item: String,
    pub url: String,
}

/// One item identified in a record's image by the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMatch {
    pub item: String,
    pub direct_url: String,
    pub preferred_url: Option<String>,
}

impl Record {
    pub fn new(link: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            media_url: media_url.into(),
            secondary_media_url: None,
            title: String::new(),
            description: String::new(),
            analysis_items: None,
            direct_links: None,
            preferred_links: None,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.analysis_items.is_some()
    }

    /// Attaches an enrichment result. Returns `false` and leaves the record
    /// untouched when `matches` is empty.
    pub fn attach_matches(&mut self, matches: &[ItemMatch]) -> bool {
        if matches.is_empty() {
            return false;
        }

        let mut items: Vec<String> = Vec::with_capacity(matches.len());
        for m in matches {
            if !items.iter().any(|existing| existing.eq_ignore_ascii_case(&m.item)) {
                items.push(m.item.clone());
            }
        }

        let direct: Vec<LinkCandidate> = matches
            .iter()
            .map(|m| LinkCandidate {
                item: m.item.clone(),
                url: m.direct_url.clone(),
            })
            .collect();

        let preferred: Vec<LinkCandidate> = matches
            .iter()
            .filter_map(|m| {
                m.preferred_url.as_ref().map(|url| LinkCandidate {
                    item: m.item.clone(),
                    url: url.clone(),
                })
            })
            .collect();

        self.analysis_items = Some(items);
        self.direct_links = Some(direct);
        self.preferred_links = if preferred.is_empty() {
            None
        } else {
            Some(preferred)
        };
        true
    }
}

/// Identity of a record within one harvested set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub link: String,
    pub media_url: Option<String>,
}

/// Which fields make up a record's identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// `(link, media_url)`; two cards sharing a link but showing different
    /// images are kept apart.
    #[default]
    LinkAndMedia,
    /// `link` alone.
    LinkOnly,
}

impl KeyStrategy {
    pub fn key(self, record: &Record) -> RecordKey {
        match self {
            KeyStrategy::LinkAndMedia => RecordKey {
                link: record.link.clone(),
                media_url: Some(record.media_url.clone()),
            },
            KeyStrategy::LinkOnly => RecordKey {
                link: record.link.clone(),
                media_url: None,
            },
        }
    }
}

/// Canonical form of an item link: absolute http(s) URL without query or fragment.
pub fn canonical_link(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    url.set_query(None);
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(label: &str, preferred: Option<&str>) -> ItemMatch {
        ItemMatch {
            item: label.to_string(),
            direct_url: format!("https://shop.example/s?q={label}"),
            preferred_url: preferred.map(str::to_string),
        }
    }

    #[test]
    fn canonical_link_drops_query_and_fragment() {
        assert_eq!(
            canonical_link(" https://www.pinterest.com/pin/123/?nic=1#top ").as_deref(),
            Some("https://www.pinterest.com/pin/123/")
        );
        assert_eq!(canonical_link("javascript:void(0)"), None);
        assert_eq!(canonical_link("/pin/123/"), None);
    }

    #[test]
    fn empty_matches_leave_record_unenriched() {
        let mut record = Record::new("https://a.example/pin/1/", "https://i.pinimg.com/1.jpg");
        assert!(!record.attach_matches(&[]));
        assert!(!record.is_enriched());
        assert_eq!(record.direct_links, None);
    }

    #[test]
    fn attach_matches_fills_summary_and_link_lists() {
        let mut record = Record::new("https://a.example/pin/1/", "https://i.pinimg.com/1.jpg");
        let matches = vec![
            item("Rust linen blazer", Some("https://shop.example/pref/blazer")),
            item("rust linen blazer", None),
            item("Tan suede loafers", None),
        ];
        assert!(record.attach_matches(&matches));
        assert_eq!(
            record.analysis_items,
            Some(vec![
                "Rust linen blazer".to_string(),
                "Tan suede loafers".to_string()
            ])
        );
        assert_eq!(record.direct_links.as_ref().map(Vec::len), Some(3));
        assert_eq!(
            record.preferred_links,
            Some(vec![LinkCandidate {
                item: "Rust linen blazer".to_string(),
                url: "https://shop.example/pref/blazer".to_string(),
            }])
        );
    }

    #[test]
    fn link_only_strategy_ignores_media() {
        let a = Record::new("https://a.example/pin/1/", "https://i.pinimg.com/1.jpg");
        let b = Record::new("https://a.example/pin/1/", "https://i.pinimg.com/2.jpg");
        assert_ne!(KeyStrategy::LinkAndMedia.key(&a), KeyStrategy::LinkAndMedia.key(&b));
        assert_eq!(KeyStrategy::LinkOnly.key(&a), KeyStrategy::LinkOnly.key(&b));
    }
}
