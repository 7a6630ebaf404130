//! MIME hint resolution.
//!
//! Platforms report file types inconsistently: Telegram hands out full MIME
//! types (`image/jpeg`), other sources only extensions (`jpg`). Both are
//! reduced to a bare subtype key and looked up in a hint table.

use std::collections::{BTreeSet, HashMap};

/// Built-in hint → canonical MIME table.
const DEFAULT_HINTS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("pjpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("gif", "image/gif"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("plain", "text/plain"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("mp3", "audio/mp3"),
    ("mpeg", "audio/mp3"),
    ("wav", "audio/wav"),
    ("x-wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("mov", "video/mov"),
    ("quicktime", "video/mov"),
    ("webm", "video/webm"),
];

/// MIME types the remote agent accepts as inline data.
const DEFAULT_SUPPORTED: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
    "application/pdf",
    "text/plain",
    "text/csv",
    "text/markdown",
    "text/html",
    "audio/mp3",
    "audio/wav",
    "audio/ogg",
    "video/mp4",
    "video/mov",
    "video/webm",
];

pub fn default_hint_map() -> HashMap<String, String> {
    DEFAULT_HINTS
        .iter()
        .map(|(hint, mime)| ((*hint).to_string(), (*mime).to_string()))
        .collect()
}

pub fn default_supported() -> BTreeSet<String> {
    DEFAULT_SUPPORTED.iter().map(|m| (*m).to_string()).collect()
}

/// Reduce a type hint to its lookup key.
///
/// Drops MIME parameters, the leading `category/` prefix and a leading dot,
/// then lower-cases: `"Image/PNG; q=1"`, `"png"` and `".png"` all become
/// `"png"`.
pub fn hint_key(hint: &str) -> Option<String> {
    let without_params = hint.split(';').next().unwrap_or_default().trim();
    let subtype = without_params
        .rsplit_once('/')
        .map_or(without_params, |(_, sub)| sub);
    let key = subtype.trim().trim_start_matches('.').to_ascii_lowercase();
    (!key.is_empty()).then_some(key)
}

/// Resolve a hint to a canonical MIME type via `map`.
pub fn resolve<'a>(hint: &str, map: &'a HashMap<String, String>) -> Option<&'a str> {
    let key = hint_key(hint)?;
    map.get(&key).map(String::as_str)
}
