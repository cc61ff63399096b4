//! Object key and filename helpers.

use chrono::{DateTime, Utc};
use reqwest::Url;
use uuid::Uuid;

use craftgen_core::defaults::DEFAULT_ASSET_FILENAME;

/// Derive a filename from the last path segment of `url`.
///
/// The query string and fragment are ignored. An empty segment yields
/// `image.png`, and a name without an extension gets `.png` appended.
pub fn filename_from_url(url: &str) -> String {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
            .unwrap_or_default(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    };

    if segment.is_empty() {
        return DEFAULT_ASSET_FILENAME.to_string();
    }
    if segment.contains('.') {
        segment
    } else {
        format!("{}.png", segment)
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build `{prefix}/{yyyy}/{mm}/{dd}/{8 hex}_{sanitized filename}`.
///
/// Every call produces a fresh random component.
pub fn object_key(prefix: &str, filename: &str, now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}/{}_{}",
        prefix.trim_end_matches('/'),
        now.format("%Y/%m/%d"),
        &random[..8],
        sanitize_filename(filename)
    )
}

/// Guess a content type from the filename extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Percent-encode every byte outside the RFC 3986 unreserved set.
pub fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Encode each `/`-separated segment of a key.
pub fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}
