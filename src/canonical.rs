//! URL canonicalization
//!
//! Every link is identified by its canonical URL, so canonicalization runs
//! before any lookup or write. The function is pure and idempotent:
//! canonicalizing an already-canonical URL returns it unchanged.

use crate::ingest::IngestError;
use url::Url;

/// Canonicalize a raw user- or CSV-supplied URL.
///
/// Steps: default the scheme to `https` when missing, parse into
/// scheme/host/path, rebuild with the path's trailing `/` stripped, then
/// percent-encode anything outside the safe set. The query string survives
/// (encoded); fragments are dropped with the rest of the tail.
pub fn canonicalize(raw: &str) -> Result<String, IngestError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IngestError::InvalidUrl(raw.to_string()));
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|_| IngestError::InvalidUrl(raw.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| IngestError::InvalidUrl(raw.to_string()))?;

    let mut rebuilt = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        rebuilt.push_str(&format!(":{}", port));
    }
    rebuilt.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        rebuilt.push('?');
        rebuilt.push_str(query);
    }

    Ok(encode_unsafe_chars(&rebuilt))
}

/// Percent-encode bytes outside the safe set.
///
/// Safe set: ASCII alphanumerics, `_.-~`, and the URL structure chars `:/?=&`.
/// Existing `%XX` escapes pass through untouched, which is what makes repeated
/// canonicalization a fixed point rather than a double-encode.
fn encode_unsafe_chars(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push('%');
            out.push(bytes[i + 1] as char);
            out.push(bytes[i + 2] as char);
            i += 3;
            continue;
        }

        if b.is_ascii_alphanumeric()
            || matches!(b, b'_' | b'.' | b'-' | b'~' | b':' | b'/' | b'?' | b'=' | b'&')
        {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
        i += 1;
    }

    out
}
