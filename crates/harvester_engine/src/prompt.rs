use url::Url;

use crate::types::PreferenceHints;

/// What a single inference call is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Labels only; shopping links are built locally from the labels.
    IdentifyOnly,
    /// Labels plus service-constructed search links, in one call.
    #[default]
    IdentifyAndSearch,
}

/// `search_base` is the retailer search the service should build links against.
pub fn build_instructions(mode: CallMode, hints: &PreferenceHints, search_base: &Url) -> String {
    let mut text = String::from(
        "You are a product identification assistant. Look at the image and identify each \
         distinct purchasable item that is clearly visible (clothing, footwear, accessories, \
         furniture, decor, tableware, and similar).\n\
         Name every item with specific descriptive terms: colour, material, cut or style, and \
         notable details (for example \"cropped cream cable-knit wool cardigan\"), never a \
         generic noun such as \"shirt\" or \"chair\".\n",
    );

    match mode {
        CallMode::IdentifyOnly => {
            text.push_str(
                "Respond with only a JSON array, one object per item: [{\"item\": \"...\"}]\n",
            );
        }
        CallMode::IdentifyAndSearch => {
            let separator = if search_base.query().is_some() { '&' } else { '?' };
            text.push_str(&format!(
                "For each item build \"exact_url\": a shopping search URL of the form \
                 {search_base}{separator}q=<url-encoded item terms>.\n"
            ));
            if !hints.is_empty() {
                text.push_str(&format!(
                    "Also build \"preferred_url\" the same way, with the search terms biased toward {}.\n",
                    describe_hints(hints)
                ));
            }
            text.push_str(
                "Respond with only a JSON array, one object per item: \
                 [{\"item\": \"...\", \"exact_url\": \"...\"",
            );
            if !hints.is_empty() {
                text.push_str(", \"preferred_url\": \"...\"");
            }
            text.push_str("}]\n");
        }
    }

    text.push_str("If no purchasable item is visible, respond with [].");
    text
}

fn describe_hints(hints: &PreferenceHints) -> String {
    let mut parts = Vec::new();
    if let Some(audience) = hints.audience.as_deref() {
        parts.push(format!("the target audience \"{audience}\""));
    }
    if !hints.brands.is_empty() {
        parts.push(format!("the brands {}", hints.brands.join(", ")));
    }
    parts.join(" and ")
}
