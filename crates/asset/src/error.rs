use thiserror::Error;

/// Failure to fetch a text or binary resource.
#[derive(Debug, Error)]
pub enum ResourceLoadError {
    /// The server (or filesystem) answered, but not with success.
    #[error("Failed to load {url}: {status_text}")]
    Status { url: String, status_text: String },

    /// `Status` raised while loading shader text.
    #[error("Failed to load shader from {url}: {status_text}")]
    ShaderStatus { url: String, status_text: String },

    #[error("Request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read {url}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource {url} is not valid UTF-8")]
    Encoding { url: String },

    #[error("Failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl ResourceLoadError {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Status { url, .. }
            | Self::ShaderStatus { url, .. }
            | Self::Transport { url, .. }
            | Self::Io { url, .. }
            | Self::Encoding { url } => Some(url),
            Self::Client(_) => None,
        }
    }
}
