use std::fmt::Write as _;

use sha2::{Digest, Sha256};

const MAX_STEM_CHARS: usize = 64;
const FALLBACK_STEM: &str = "board";

/// `{sanitized board label}--{short sha256 of location}.json`.
///
/// Same board and location always give the same name; two boards with the
/// same label at different locations never collide.
pub fn manifest_filename(board_label: Option<&str>, location: &str) -> String {
    let stem = sanitize_stem(board_label.unwrap_or(FALLBACK_STEM));
    format!("{stem}--{}.json", short_hash(location))
}

/// Keeps alphanumeric runs joined by single dashes.
fn sanitize_stem(label: &str) -> String {
    let mut stem = String::with_capacity(label.len());
    let mut pending_dash = false;
    for c in label.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !stem.is_empty() {
                stem.push('-');
            }
            pending_dash = false;
            stem.push(c);
        } else {
            pending_dash = true;
        }
    }

    if stem.chars().count() > MAX_STEM_CHARS {
        stem = stem.chars().take(MAX_STEM_CHARS).collect();
        stem = stem.trim_end_matches('-').to_string();
    }
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    if is_reserved_device_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_reserved_device_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
