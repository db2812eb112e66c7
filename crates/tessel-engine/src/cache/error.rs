use std::io;

use crate::decode::DecodeError;
use crate::upload::UploadError;

use super::CacheKey;

/// Why a synchronous load produced no texture.
///
/// Asynchronous loads report every one of these as a `None` handle.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("texture not found: {0}")]
    NotFound(CacheKey),

    #[error("failed to read {key}")]
    Read {
        key: CacheKey,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {key}")]
    Decode {
        key: CacheKey,
        #[source]
        source: DecodeError,
    },

    #[error("failed to upload {key}")]
    Upload {
        key: CacheKey,
        #[source]
        source: UploadError,
    },
}

impl LoadError {
    pub fn key(&self) -> &CacheKey {
        match self {
            LoadError::NotFound(key) => key,
            LoadError::Read { key, .. }
            | LoadError::Decode { key, .. }
            | LoadError::Upload { key, .. } => key,
        }
    }
}

/// Formats an error with its source chain, `outer: inner: ...`.
pub(crate) fn describe(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_includes_sources() {
        let err = LoadError::Read {
            key: CacheKey::from("a.png"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(describe(&err), "failed to read a.png: denied");
        assert_eq!(err.key().as_str(), "a.png");
    }
}
