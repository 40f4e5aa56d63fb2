use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub final_url: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Optional steering for the "preferred" shopping link of each item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreferenceHints {
    /// Target audience, e.g. "women", "kids", "petite".
    pub audience: Option<String>,
    /// Brands to favour, in priority order.
    pub brands: Vec<String>,
}

impl PreferenceHints {
    pub fn new(audience: Option<&str>, brands: &str) -> Self {
        let audience = audience
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let brands = brands
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        Self { audience, brands }
    }

    pub fn is_empty(&self) -> bool {
        self.audience.is_none() && self.brands.is_empty()
    }

    /// Search terms appended to an item label for the preferred link.
    pub fn search_terms(&self) -> String {
        let mut terms: Vec<&str> = Vec::new();
        if let Some(audience) = self.audience.as_deref() {
            terms.push(audience);
        }
        terms.extend(self.brands.iter().map(String::as_str));
        terms.join(" ")
    }
}
