use url::Url;

use crate::types::PreferenceHints;

pub const DEFAULT_SEARCH_BASE: &str = "https://www.google.com/search?tbm=shop";

/// Builds retailer-search redirect URLs for identified items.
///
/// The base URL's existing query pairs are kept; the item terms go into `q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLinkBuilder {
    base: Url,
}

impl SearchLinkBuilder {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn direct_url(&self, item: &str) -> String {
        self.with_terms(item.trim())
    }

    /// Search biased toward the hints; `None` when there are no hints.
    pub fn preferred_url(&self, item: &str, hints: &PreferenceHints) -> Option<String> {
        if hints.is_empty() {
            return None;
        }
        Some(self.with_terms(&format!("{} {}", item.trim(), hints.search_terms())))
    }

    fn with_terms(&self, terms: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("q", terms);
        url.into()
    }
}

impl Default for SearchLinkBuilder {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_SEARCH_BASE).expect("constant input is valid"),
        }
    }
}

/// Absolute http(s) URL check for links returned by the inference service.
pub fn is_web_url(candidate: &str) -> bool {
    Url::parse(candidate.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Resolves `reference` against `base`, rejecting fragments, scripts and ephemeral blobs.
pub fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("data:")
        || lower.starts_with("blob:")
    {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) => Some(url),
        Err(_) => base.and_then(|base| base.join(trimmed).ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_url_encodes_item_terms() {
        let builder = SearchLinkBuilder::default();
        assert_eq!(
            builder.direct_url(" cognac leather ankle boots "),
            "https://www.google.com/search?tbm=shop&q=cognac+leather+ankle+boots"
        );
    }

    #[test]
    fn preferred_url_requires_hints() {
        let builder = SearchLinkBuilder::default();
        assert_eq!(builder.preferred_url("trench coat", &PreferenceHints::default()), None);

        let hints = PreferenceHints::new(Some("women"), "Everlane");
        assert_eq!(
            builder.preferred_url("trench coat", &hints).as_deref(),
            Some("https://www.google.com/search?tbm=shop&q=trench+coat+women+Everlane")
        );
    }

    #[test]
    fn resolve_rejects_blob_and_joins_relative() {
        let base = Url::parse("https://www.pinterest.com/jane/board/").unwrap();
        assert_eq!(resolve_url("blob:https://www.pinterest.com/abc", Some(&base)), None);
        assert_eq!(
            resolve_url("/pin/42/", Some(&base)).map(String::from).as_deref(),
            Some("https://www.pinterest.com/pin/42/")
        );
        assert_eq!(resolve_url("/pin/42/", None), None);
    }

    #[test]
    fn web_url_check() {
        assert!(is_web_url("https://shop.example/p/1"));
        assert!(!is_web_url("ftp://shop.example/p/1"));
        assert!(!is_web_url("not a url"));
    }
}
