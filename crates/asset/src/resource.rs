//! Resource fetching by URL or path.
//!
//! One blocking request per call: no retries, no caching, no timeout.
//! Callers run these off the render thread.

use std::{fs, io, path::PathBuf};

use crate::error::ResourceLoadError;

/// Source of raw resource bytes.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceLoadError>;
}

/// Fetch shader text, returning the body unmodified.
pub fn load_text(fetcher: &dyn ResourceFetcher, url: &str) -> Result<String, ResourceLoadError> {
    let bytes = fetcher.fetch(url).map_err(|err| match err {
        ResourceLoadError::Status { url, status_text } => {
            ResourceLoadError::ShaderStatus { url, status_text }
        }
        other => other,
    })?;
    log::debug!("Fetched {} bytes of text from {}", bytes.len(), url);
    String::from_utf8(bytes).map_err(|_| ResourceLoadError::Encoding {
        url: url.to_owned(),
    })
}

/// `true` for `http://` and `https://` URLs.
pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Join a base directory or URL with a relative file name.
pub fn join_url(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// HTTP(S) fetcher backed by a blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ResourceLoadError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(ResourceLoadError::Client)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceLoadError> {
        let transport = |source| ResourceLoadError::Transport {
            url: url.to_owned(),
            source,
        };

        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(str::to_owned)
                .unwrap_or_else(|| status.as_str().to_owned());
            return Err(ResourceLoadError::Status {
                url: url.to_owned(),
                status_text,
            });
        }

        Ok(response.bytes().map_err(transport)?.to_vec())
    }
}

/// Filesystem fetcher for plain paths and `file://` URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn path_of(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

impl ResourceFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceLoadError> {
        fs::read(Self::path_of(url)).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ResourceLoadError::Status {
                url: url.to_owned(),
                status_text: "Not Found".to_owned(),
            },
            _ => ResourceLoadError::Io {
                url: url.to_owned(),
                source,
            },
        })
    }
}

/// Dispatches on the URL scheme: HTTP(S) over the network, everything
/// else from disk.
pub struct DefaultFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Result<Self, ResourceLoadError> {
        Ok(Self {
            http: HttpFetcher::new()?,
            file: FileFetcher,
        })
    }
}

impl ResourceFetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceLoadError> {
        if is_remote(url) {
            self.http.fetch(url)
        } else {
            self.file.fetch(url)
        }
    }
}
