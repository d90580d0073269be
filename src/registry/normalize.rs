//! URL normalization
//!
//! Every registry key goes through [`normalize_url`], so `ws://host` and
//! `ws://host/` address the same entry.

use url::Url;

/// Parse and normalize a URL, inserting a `/` path when none is present
pub fn normalize_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut parsed = Url::parse(raw)?;
    if parsed.path().is_empty() && !parsed.cannot_be_a_base() {
        parsed.set_path("/");
    }
    Ok(parsed)
}
