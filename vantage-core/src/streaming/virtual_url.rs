//! Custom-scheme URLs handed to the playback engine.
//!
//! Playback engines only consult a custom data source for schemes they do
//! not handle natively, so the real URL is rewritten onto
//! [`VIRTUAL_SCHEME`] with the original scheme carried in a query
//! parameter.

use url::Url;

use crate::error::{EngineError, Result};

pub const VIRTUAL_SCHEME: &str = "vantage-stream";
const SCHEME_PARAM: &str = "scheme";

/// `https://host/p?q=1` -> `vantage-stream://host/p?q=1&scheme=https`
pub fn encode(real: &Url) -> Result<Url> {
    let rest = &real[url::Position::BeforeUsername..];
    let mut virtual_url = Url::parse(&format!("{VIRTUAL_SCHEME}://{rest}"))
        .map_err(|e| EngineError::Config(format!("cannot encode {real}: {e}")))?;
    virtual_url
        .query_pairs_mut()
        .append_pair(SCHEME_PARAM, real.scheme());
    Ok(virtual_url)
}

/// Inverse of [`encode`].
pub fn decode(virtual_url: &Url) -> Result<Url> {
    if virtual_url.scheme() != VIRTUAL_SCHEME {
        return Err(EngineError::Config(format!(
            "not a {VIRTUAL_SCHEME} URL: {virtual_url}"
        )));
    }

    let mut scheme = None;
    let mut kept = Vec::new();
    for (key, value) in virtual_url.query_pairs() {
        if key == SCHEME_PARAM && scheme.is_none() {
            scheme = Some(value.into_owned());
        } else {
            kept.push((key.into_owned(), value.into_owned()));
        }
    }
    let scheme = scheme.ok_or_else(|| {
        EngineError::Config(format!("missing `{SCHEME_PARAM}` in {virtual_url}"))
    })?;

    let mut stripped = virtual_url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    let rest = &stripped[url::Position::BeforeUsername..];
    Url::parse(&format!("{scheme}://{rest}"))
        .map_err(|e| EngineError::Config(format!("cannot decode {virtual_url}: {e}")))
}
