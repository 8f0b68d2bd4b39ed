use url::Url;
use vantage_model::{AssetId, RemoteVariant};

use crate::error::{EngineError, Result};

/// URL layout of the remote asset service.
///
/// ```text
/// {base}/api/assets/{id}/thumbnail?size=thumbnail
/// {base}/api/assets/{id}/thumbnail?size=preview
/// {base}/api/assets/{id}/original
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEndpoints {
    base: Url,
}

impl AssetEndpoints {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Parse a base URL, adding `http://` when the scheme is missing and
    /// trimming trailing slashes.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        let with_scheme = if trimmed.starts_with("http://")
            || trimmed.starts_with("https://")
        {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let base = Url::parse(&with_scheme).map_err(|e| {
            EngineError::Config(format!("invalid asset service URL {raw:?}: {e}"))
        })?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url_for(&self, id: AssetId, variant: RemoteVariant) -> Result<Url> {
        let path = match variant {
            RemoteVariant::Thumbnail | RemoteVariant::Preview => {
                format!("api/assets/{id}/thumbnail")
            }
            RemoteVariant::Original => format!("api/assets/{id}/original"),
        };
        let mut url = self.join(&path)?;
        match variant {
            RemoteVariant::Thumbnail => {
                url.query_pairs_mut().append_pair("size", "thumbnail");
            }
            RemoteVariant::Preview => {
                url.query_pairs_mut().append_pair("size", "preview");
            }
            RemoteVariant::Original => {}
        }
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url> {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path).map_err(|e| {
            EngineError::Config(format!("cannot build URL for {path}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id() -> AssetId {
        AssetId(Uuid::parse_str("01234567-89ab-cdef-0123-456789abcdef").unwrap())
    }

    #[test]
    fn variants_map_to_service_paths() {
        let endpoints = AssetEndpoints::parse("photos.local:2283/").unwrap();
        assert_eq!(
            endpoints.url_for(id(), RemoteVariant::Preview).unwrap().as_str(),
            "http://photos.local:2283/api/assets/01234567-89ab-cdef-0123-456789abcdef/thumbnail?size=preview"
        );
        assert_eq!(
            endpoints.url_for(id(), RemoteVariant::Original).unwrap().as_str(),
            "http://photos.local:2283/api/assets/01234567-89ab-cdef-0123-456789abcdef/original"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let endpoints =
            AssetEndpoints::parse("https://example.org/photos").unwrap();
        let url = endpoints.url_for(id(), RemoteVariant::Thumbnail).unwrap();
        assert!(url.as_str().starts_with(
            "https://example.org/photos/api/assets/"
        ));
        assert!(url.as_str().ends_with("?size=thumbnail"));
    }
}
