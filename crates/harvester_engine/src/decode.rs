use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Markup decoded to UTF-8, with the encoding that was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMarkup {
    pub text: String,
    pub encoding: &'static str,
    /// Malformed sequences were replaced with U+FFFD.
    pub lossy: bool,
}

/// Decodes a rendered document for extraction.
///
/// Order: BOM, then the `charset` parameter of `content_type`, then chardetng.
/// Never fails; malformed sequences are replaced.
pub fn decode_markup(bytes: &[u8], content_type: Option<&str>) -> DecodedMarkup {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| {
            content_type
                .and_then(charset_param)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });

    let (text, used, lossy) = encoding.decode(bytes);
    DecodedMarkup {
        text: text.into_owned(),
        encoding: used.name(),
        lossy,
    }
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches(['"', '\'']).to_string())
        } else {
            None
        }
    })
}
