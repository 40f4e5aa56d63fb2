use std::sync::LazyLock;

use regex::RegexSet;

/// Auto-generated or platform-chrome phrases that carry no information about
/// the depicted item. Matched against whitespace-collapsed text.
static BOILERPLATE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^(an? |the )?(image|photo|picture|screenshot|pin)( may contain| of)\b",
        r"(?i)\bma(y|ight) contain\b",
        r"(?i)^this (image |photo |pin )?contains\b",
        r"(?i)^no (description|alt text|caption)( available| provided)?\.?$",
        r"(?i)^(pinterest|pin|pins|image|photo|picture|untitled|video)\.?$",
        r"(?i)^(saved |found |uploaded )?(via|by) @[\w.\-]+",
        r"(?i)^(more|see more|visit site|open|save)$",
    ])
    .expect("constant input is valid")
});

pub fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE.is_match(text.trim())
}

/// Collapses whitespace and returns the text only if it is neither empty nor boilerplate.
pub fn usable_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() || is_boilerplate(&collapsed) {
        None
    } else {
        Some(collapsed)
    }
}
