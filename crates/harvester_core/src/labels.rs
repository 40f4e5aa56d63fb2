use url::Url;

/// Title-cases a slug: `summer-linen_dress` becomes `Summer Linen Dress`.
pub fn title_case(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_' || c == '+' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Label derived from the last path segment of `link`, with purely numeric
/// tokens (item ids) removed. `None` when nothing readable remains.
pub fn slug_label(link: &str) -> Option<String> {
    let segment = last_segment(link)?;
    let words: Vec<&str> = segment
        .split(['-', '_'])
        .filter(|token| !token.is_empty() && !token.chars().all(|c| c.is_ascii_digit()))
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(title_case(&words.join(" ")))
}

/// Human label for a harvested surface, taken from its location's last path segment.
pub fn board_label(location: &str) -> Option<String> {
    let segment = last_segment(location)?;
    let label = title_case(&segment);
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

fn last_segment(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?
        .to_string();
    Some(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_handles_mixed_separators() {
        assert_eq!(title_case("summer-LINEN_dress"), "Summer Linen Dress");
        assert_eq!(title_case("--"), "");
    }

    #[test]
    fn slug_label_drops_numeric_ids() {
        assert_eq!(
            slug_label("https://www.pinterest.com/pin/boho-living-room-ideas--8412734/").as_deref(),
            Some("Boho Living Room Ideas")
        );
        assert_eq!(slug_label("https://www.pinterest.com/pin/8412734/"), None);
    }

    #[test]
    fn board_label_uses_last_segment() {
        assert_eq!(
            board_label("https://www.pinterest.com/jane/fall-outfits/").as_deref(),
            Some("Fall Outfits")
        );
        assert_eq!(board_label("https://www.pinterest.com/"), None);
        assert_eq!(board_label("not a url"), None);
    }
}
