use harvester_core::ItemMatch;
use serde::Deserialize;
use serde_json::Value;

use crate::links::{is_web_url, SearchLinkBuilder};
use crate::types::PreferenceHints;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON array of objects found in response text")]
    NoStructuredPayload,
    #[error("response array held no usable items")]
    EmptyPayload,
}

/// One element of the array the inference service is asked to return.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawItem {
    #[serde(alias = "label", alias = "name")]
    pub item: String,
    #[serde(default, alias = "exactUrl", alias = "url")]
    pub exact_url: Option<String>,
    #[serde(default, alias = "preferredUrl")]
    pub preferred_url: Option<String>,
}

/// Finds the first well-formed JSON array of objects embedded in free text.
///
/// Models wrap the array in prose or code fences often enough that the text
/// is never parsed as a whole. Elements without a non-blank `item` are dropped.
pub fn parse_raw_items(text: &str) -> Result<Vec<RawItem>, ParseError> {
    for (start, _) in text.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<Value>>();
        let values = match stream.next() {
            Some(Ok(values)) => values,
            _ => continue,
        };
        if !values.iter().all(Value::is_object) {
            continue;
        }

        let items: Vec<RawItem> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value::<RawItem>(value).ok())
            .filter(|raw| !raw.item.trim().is_empty())
            .collect();
        if items.is_empty() {
            return Err(ParseError::EmptyPayload);
        }
        return Ok(items);
    }
    Err(ParseError::NoStructuredPayload)
}

/// Parses response text into item matches, filling missing or malformed
/// links with locally built searches.
pub fn parse_item_matches(
    text: &str,
    links: &SearchLinkBuilder,
    hints: &PreferenceHints,
) -> Result<Vec<ItemMatch>, ParseError> {
    let raw = parse_raw_items(text)?;
    Ok(raw
        .into_iter()
        .map(|raw| {
            let item = raw.item.split_whitespace().collect::<Vec<_>>().join(" ");
            let direct_url = raw
                .exact_url
                .filter(|url| is_web_url(url))
                .map(|url| url.trim().to_string())
                .unwrap_or_else(|| links.direct_url(&item));
            let preferred_url = raw
                .preferred_url
                .filter(|url| is_web_url(url))
                .map(|url| url.trim().to_string())
                .or_else(|| links.preferred_url(&item, hints));
            ItemMatch {
                item,
                direct_url,
                preferred_url,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_array_inside_fenced_prose() {
        let text = "Here are the items [as requested]:\n```json\n[{\"item\": \"Cream cable-knit sweater\", \"exact_url\": \"https://shop.example/s?q=cream\"}]\n```";
        let items = parse_raw_items(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item, "Cream cable-knit sweater");
        assert_eq!(items[0].exact_url.as_deref(), Some("https://shop.example/s?q=cream"));
    }

    #[test]
    fn skips_arrays_of_scalars() {
        let text = "scores [1, 2, 3] then [{\"item\": \"Walnut side table\"}]";
        let items = parse_raw_items(text).unwrap();
        assert_eq!(items[0].item, "Walnut side table");
    }

    #[test]
    fn reports_missing_and_empty_payloads() {
        assert_eq!(
            parse_raw_items("I could not identify anything."),
            Err(ParseError::NoStructuredPayload)
        );
        assert_eq!(parse_raw_items("[]"), Err(ParseError::EmptyPayload));
        assert_eq!(
            parse_raw_items("[{\"item\": \"  \"}, {\"colour\": \"red\"}]"),
            Err(ParseError::EmptyPayload)
        );
    }

    #[test]
    fn malformed_links_are_rebuilt() {
        let builder = SearchLinkBuilder::default();
        let hints = PreferenceHints::new(Some("men"), "");
        let text = r#"[{"item": "Olive  field jacket", "exact_url": "see store", "preferred_url": "https://shop.example/p/olive"}]"#;
        let matches = parse_item_matches(text, &builder, &hints).unwrap();
        assert_eq!(
            matches,
            vec![ItemMatch {
                item: "Olive field jacket".to_string(),
                direct_url: "https://www.google.com/search?tbm=shop&q=Olive+field+jacket"
                    .to_string(),
                preferred_url: Some("https://shop.example/p/olive".to_string()),
            }]
        );
    }
}
