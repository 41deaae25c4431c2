//! Failure taxonomy for asset loads.
//!
//! A malformed marker row is not an error: the coordinate parser drops it and
//! keeps going, so it never shows up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// Non-2xx status, transport error or unreadable local file.
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// The point-cloud buffer is not a well-formed PLY asset.
    #[error("{url} is not a valid point cloud: {source}")]
    Format {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Fetch { url, .. } | Self::Format { url, .. } => url,
        }
    }
}
