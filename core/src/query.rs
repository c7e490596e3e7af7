//! Request URL construction.

use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::config::lookup_encoding;
use crate::error::{Error, Result};
use crate::types::Params;

/// Append `query` to `base_url` and parse the result.
///
/// The query string is concatenated verbatim: a `base_url` that already
/// carries a query ends up with a second `?` inside its query component.
pub fn build_url(base_url: &str, query: &Params, encoding: &str) -> Result<Url> {
    let text = if query.is_empty() {
        base_url.to_string()
    } else {
        if base_url.contains('?') {
            tracing::warn!(
                url = base_url,
                "target URL already has a query string; query parameters are appended as-is"
            );
        }
        let mut text = String::from(base_url);
        for (index, (name, value)) in query.iter().enumerate() {
            text.push(if index == 0 { '?' } else { '&' });
            text.push_str(&form_encode(name, encoding)?);
            text.push('=');
            text.push_str(&form_encode(value, encoding)?);
        }
        text
    };
    Url::parse(&text).map_err(|e| Error::config(format!("Invalid request URL '{text}': {e}")))
}

/// `application/x-www-form-urlencoded` form of `value` in `encoding`.
pub fn form_encode(value: &str, encoding: &str) -> Result<String> {
    let (bytes, _, _) = lookup_encoding(encoding)?.encode(value);
    Ok(byte_serialize(&bytes).collect())
}
