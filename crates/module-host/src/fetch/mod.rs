// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fetch layer for module artifacts.
//!
//! Both fetchers report an HTTP-style status line so the caller can treat a
//! missing file and a `404` from a web server the same way.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;
use reqwest::{StatusCode, Url};
use thiserror::Error;

/// Errors that prevent a response from being produced at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("invalid module URL: {0}")]
    InvalidUrl(String),
}

/// A completed fetch: status line plus the full payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Numeric status code (HTTP semantics).
    pub status: u16,
    /// Reason phrase for the status, e.g. "Not Found".
    pub status_text: String,
    /// Response payload.
    pub body: Vec<u8>,
}

impl FetchResponse {
    #[must_use]
    pub fn new(status: u16, status_text: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body,
        }
    }

    /// A `200 OK` response carrying `body`.
    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(200, "OK", body)
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of module artifacts.
///
/// A non-success status is a valid response, not an error; errors are reserved
/// for failures where no status could be obtained (connection refused, I/O).
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send + 'a;
}

/// Fetches resources relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Create a fetcher rooted at `base_url`.
    ///
    /// The base is treated as a directory even without a trailing slash, so
    /// `http://host/static` resolves `module.wasm` to `http://host/static/module.wasm`.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().build()?;
        Self::with_client(base_url, client)
    }

    /// Create a fetcher that issues requests through an existing client.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            base_url: base,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a resource name against the base URL.
    pub fn resolve(&self, resource: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(resource)
            .map_err(|e| FetchError::InvalidUrl(format!("{resource}: {e}")))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send + 'a {
        async move {
            let url = self.resolve(resource)?;
            debug!("GET {url}");

            let response = self.client.get(url).send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();

            Ok(FetchResponse::new(status.as_u16(), reason_phrase(status), body))
        }
    }
}

fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

/// Fetches resources from a local directory, mimicking a static file server.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a resource name to a path under the root.
    ///
    /// Returns `None` for names that would leave the root.
    #[must_use]
    pub fn resolve(&self, resource: &str) -> Option<PathBuf> {
        let relative = Path::new(resource);
        let mut has_name = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        has_name.then(|| self.root.join(relative))
    }
}

impl Fetcher for FileFetcher {
    fn fetch<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send + 'a {
        async move {
            let Some(path) = self.resolve(resource) else {
                return Ok(FetchResponse::new(403, reason_phrase(StatusCode::FORBIDDEN), Vec::new()));
            };
            debug!("Reading {}", path.display());

            match tokio::fs::read(&path).await {
                Ok(body) => Ok(FetchResponse::ok(body)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FetchResponse::new(
                    404,
                    reason_phrase(StatusCode::NOT_FOUND),
                    Vec::new(),
                )),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(FetchResponse::new(
                    403,
                    reason_phrase(StatusCode::FORBIDDEN),
                    Vec::new(),
                )),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Fetcher selected at startup from configuration.
#[derive(Debug, Clone)]
pub enum SourceFetcher {
    Http(HttpFetcher),
    File(FileFetcher),
}

impl Fetcher for SourceFetcher {
    fn fetch<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send + 'a {
        async move {
            match self {
                Self::Http(fetcher) => fetcher.fetch(resource).await,
                Self::File(fetcher) => fetcher.fetch(resource).await,
            }
        }
    }
}

impl fmt::Display for SourceFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(fetcher) => write!(f, "{}", fetcher.base_url()),
            Self::File(fetcher) => write!(f, "{}", fetcher.root().display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_file_fetcher_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("module.wasm"), b"\0asm").unwrap();

        let fetcher = FileFetcher::new(dir.path());
        let response = fetcher.fetch("module.wasm").await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"\0asm");
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::new(dir.path());

        let response = fetcher.fetch("module.wasm").await.unwrap();
        assert!(!response.is_success());
        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
    }

    #[tokio::test]
    async fn test_file_fetcher_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::new(dir.path());

        let response = fetcher.fetch("../module.wasm").await.unwrap();
        assert_eq!(response.status, 403);
        assert_eq!(response.status_text, "Forbidden");

        assert!(fetcher.resolve("/etc/passwd").is_none());
        assert!(fetcher.resolve("").is_none());
        assert!(fetcher.resolve("./module.wasm").is_some());
    }

    #[test]
    fn test_http_fetcher_resolves_against_directory_base() {
        let fetcher = HttpFetcher::new("http://localhost:8080/static").unwrap();
        let url = fetcher.resolve("module.wasm").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/static/module.wasm");

        let fetcher = HttpFetcher::new("http://localhost:8080/").unwrap();
        let url = fetcher.resolve("module.wasm").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/module.wasm");
    }

    #[test]
    fn test_http_fetcher_rejects_invalid_base() {
        assert!(matches!(
            HttpFetcher::new("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    /// Serve one canned HTTP response on a local port and return the base URL.
    async fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/")
    }

    fn local_fetcher(base: &str) -> HttpFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpFetcher::with_client(base, client).unwrap()
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_status_line() {
        let base = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let fetcher = local_fetcher(&base);
        let response = fetcher.fetch("module.wasm").await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_http_fetcher_reads_body() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\n\0asm",
        )
        .await;

        let fetcher = SourceFetcher::Http(local_fetcher(&base));
        let response = fetcher.fetch("module.wasm").await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.body, b"\0asm");
    }
}
