use std::path::PathBuf;

use url::Url;

/// Failure to retrieve a linked page.
///
/// Unrecognized charsets and documents without a head are not errors; they
/// are logged and recovered where they happen.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid link url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported link scheme: {0}")]
    UnsupportedScheme(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("link does not name a local file: {0}")]
    NotAFilePath(Url),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
