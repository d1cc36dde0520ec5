//! Unix domain socket front end.
//!
//! Every accepted connection gets one HTTP/1.1-shaped response carrying the
//! current metrics, fetched from the HTTP endpoint with bounded retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::retry::RetryPolicy;

/// Content type written on the socket.
pub const SOCKET_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Failure to fetch metrics from the HTTP endpoint.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    /// Connect failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProxyError::Client(_) => false,
            ProxyError::Request { source, .. } => source.is_connect() || source.is_timeout(),
            ProxyError::Body { source, .. } => source.is_timeout(),
        }
    }
}

/// Response relayed from the HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Fetches the metrics document from the HTTP endpoint.
pub struct MetricsProxy {
    client: reqwest::Client,
    upstream: String,
    retry: RetryPolicy,
}

impl MetricsProxy {
    pub fn new(
        upstream: String,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .no_proxy()
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self {
            client,
            upstream,
            retry,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Fetch with retries.
    pub async fn fetch(&self) -> Result<UpstreamResponse, ProxyError> {
        self.retry
            .retry(|attempt| self.fetch_once(attempt), ProxyError::is_retryable)
            .await
    }

    async fn fetch_once(&self, attempt: u32) -> Result<UpstreamResponse, ProxyError> {
        debug!(url = %self.upstream, attempt, "Fetching metrics for socket client");

        let response = self
            .client
            .get(&self.upstream)
            .send()
            .await
            .map_err(|source| ProxyError::Request {
                url: self.upstream.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ProxyError::Body {
            url: self.upstream.clone(),
            source,
        })?;

        Ok(UpstreamResponse { status, body })
    }
}

/// Frame a response the way socket clients expect it.
pub fn frame_response(status: StatusCode, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        SOCKET_CONTENT_TYPE,
        body.len(),
        body
    )
}

/// Unix socket server.
pub struct UdsServer {
    listener: UnixListener,
    path: PathBuf,
    proxy: Arc<MetricsProxy>,
}

impl UdsServer {
    /// Bind the socket, replacing a stale one, and apply `socket_mode`.
    pub fn bind(
        path: impl AsRef<Path>,
        socket_mode: u32,
        proxy: MetricsProxy,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create socket directory {}", parent.display())
                })?;
            }
        }

        if path.exists() {
            std::fs::remove_file(path).with_context(|| {
                format!("Failed to remove existing socket at {}", path.display())
            })?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind Unix socket to {}", path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(socket_mode);
            std::fs::set_permissions(path, permissions).with_context(|| {
                format!("Failed to set permissions on socket {}", path.display())
            })?;
        }

        info!(
            path = %path.display(),
            upstream = %proxy.upstream(),
            "Unix socket listening"
        );

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            proxy: Arc::new(proxy),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until the shutdown signal is received, then
    /// remove the socket file.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let UdsServer {
            listener,
            path,
            proxy,
        } = self;

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let proxy = proxy.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, proxy).await {
                                debug!("Unix connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Unix accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        drop(listener);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "Failed to remove socket: {}", e);
            }
        }

        info!(path = %path.display(), "Unix socket stopped");
        Ok(())
    }
}

/// Serve one connection: fetch, write one response, half-close.
async fn handle_connection(
    mut stream: UnixStream,
    proxy: Arc<MetricsProxy>,
) -> std::io::Result<()> {
    debug!("Unix connection accepted");

    let response = match proxy.fetch().await {
        Ok(upstream) => frame_response(upstream.status, &upstream.body),
        Err(e) => {
            warn!(error = %e, "Failed to fetch metrics for socket client");
            frame_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Error: {}\n", e),
            )
        }
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
