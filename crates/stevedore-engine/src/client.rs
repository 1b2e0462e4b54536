//! HTTP access to the container engine
//!
//! [`EngineClient`] wraps a [`reqwest::Client`] plus a [`UrlBuilder`] and
//! exposes the handful of endpoints the rest of the crate consumes:
//! container inspection, the log endpoint (one-shot or follow), image pull
//! and image build. Streamed response bodies are adapted to [`AsyncRead`]
//! so the decoders never see HTTP-level types.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::{ReaderStream, StreamReader};
use url::Url;

use stevedore_core::prelude::*;

use crate::chunked::{process_json_stream, JsonStreamHandler};

/// A readable streamed response body.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// Default request timeout for non-streaming engine calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────
// Container state, as the wait conditions consume it
// ─────────────────────────────────────────────────────────

/// The slice of `inspect` output the wait conditions care about.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStatus {
    pub running: bool,
    /// `None` while the container is still running.
    pub exit_code: Option<i64>,
    /// The configured healthcheck command, if the image/container has one.
    pub healthcheck: Option<String>,
    /// Current health verdict, if the engine reports one.
    pub healthy: Option<bool>,
}

/// Options for a log request.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub follow: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Log lines are always requested with timestamps; the reader relies on
    /// the `[<timestamp>] <text>` shape to split records.
    pub timestamps: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            follow: false,
            stdout: true,
            stderr: true,
            timestamps: true,
        }
    }
}

impl LogOptions {
    /// Options for a continuous follow-mode read.
    pub fn follow() -> Self {
        Self {
            follow: true,
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────
// EngineQuery - the query surface wait conditions poll
// ─────────────────────────────────────────────────────────

/// Engine queries consumed by the wait conditions and the log reader.
///
/// Kept behind a trait so conditions can be exercised against a scripted
/// engine in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineQuery: Send + Sync {
    /// Inspect a container by id or name.
    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus>;

    /// Open the container's log stream. With `options.follow` the body
    /// stays open and delivers frames as the container produces them.
    async fn container_logs(&self, container_id: &str, options: &LogOptions)
        -> Result<BodyReader>;
}

// ─────────────────────────────────────────────────────────
// UrlBuilder
// ─────────────────────────────────────────────────────────

/// Builds engine API URLs, optionally version-prefixed (`/v1.44/...`).
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: Url,
    api_version: Option<String>,
}

impl UrlBuilder {
    pub fn new(base: Url, api_version: Option<String>) -> Self {
        Self { base, api_version }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::config(format!("engine URL '{}' cannot be a base", self.base)))?;
            path.pop_if_empty();
            if let Some(version) = &self.api_version {
                path.push(&format!("v{version}"));
            }
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// `GET /containers/{id}/json`
    pub fn inspect_container(&self, container_id: &str) -> Result<Url> {
        self.endpoint(&["containers", container_id, "json"])
    }

    /// `GET /containers/{id}/logs?...`
    pub fn container_logs(&self, container_id: &str, options: &LogOptions) -> Result<Url> {
        let mut url = self.endpoint(&["containers", container_id, "logs"])?;
        url.query_pairs_mut()
            .append_pair("follow", bool_flag(options.follow))
            .append_pair("stdout", bool_flag(options.stdout))
            .append_pair("stderr", bool_flag(options.stderr))
            .append_pair("timestamps", bool_flag(options.timestamps));
        Ok(url)
    }

    /// `POST /images/create?fromImage={image}`
    pub fn create_image(&self, image: &str) -> Result<Url> {
        let mut url = self.endpoint(&["images", "create"])?;
        url.query_pairs_mut().append_pair("fromImage", image);
        Ok(url)
    }

    /// `POST /build?...`
    pub fn build_image(&self, options: &BuildOptions) -> Result<Url> {
        let mut url = self.endpoint(&["build"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(tag) = &options.tag {
                query.append_pair("t", tag);
            }
            if let Some(dockerfile) = &options.dockerfile {
                query.append_pair("dockerfile", dockerfile);
            }
            if options.no_cache {
                query.append_pair("nocache", "1");
            }
        }
        Ok(url)
    }
}

fn bool_flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Options for an image build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub tag: Option<String>,
    pub dockerfile: Option<String>,
    pub no_cache: bool,
}

// ─────────────────────────────────────────────────────────
// Inspect payload (engine wire format)
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectResponse {
    state: InspectState,
    #[serde(default)]
    config: Option<InspectConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    exit_code: Option<i64>,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    healthcheck: Option<InspectHealthcheck>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealthcheck {
    #[serde(default)]
    test: Option<Vec<String>>,
}

impl From<InspectResponse> for ContainerStatus {
    fn from(inspect: InspectResponse) -> Self {
        let running = inspect.state.running;
        // A stopped container always reports a code; while running the
        // field is meaningless, so mask it out.
        let exit_code = if running { None } else { inspect.state.exit_code };
        let healthcheck = inspect
            .config
            .and_then(|c| c.healthcheck)
            .and_then(|h| h.test)
            .filter(|test| !test.is_empty() && test[0] != "NONE")
            .map(|test| test.join(" "));
        let healthy = inspect.state.health.map(|h| h.status == "healthy");
        Self {
            running,
            exit_code,
            healthcheck,
            healthy,
        }
    }
}

// ─────────────────────────────────────────────────────────
// EngineClient
// ─────────────────────────────────────────────────────────

/// HTTP client for one container engine.
pub struct EngineClient {
    http: reqwest::Client,
    urls: UrlBuilder,
}

impl EngineClient {
    /// Create a client for the engine at `base`, e.g. `http://localhost:2375`.
    pub fn new(base: Url, api_version: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(e.to_string()))?;
        Ok(Self {
            http,
            urls: UrlBuilder::new(base, api_version),
        })
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    /// Pull an image, feeding the chunked JSON progress stream to `handler`.
    pub async fn pull_image<H>(&self, image: &str, handler: &mut H) -> Result<()>
    where
        H: JsonStreamHandler + Send,
    {
        let url = self.urls.create_image(image)?;
        info!("Pulling image {image}");
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| Error::http(e.to_string()))?;
        let body = Self::success_body(response).await?;
        process_json_stream(handler, body).await
    }

    /// Build an image from an already-assembled context archive, feeding
    /// the chunked JSON progress stream to `handler`.
    pub async fn build_image<H>(
        &self,
        context_tar: &Path,
        options: &BuildOptions,
        handler: &mut H,
    ) -> Result<()>
    where
        H: JsonStreamHandler + Send,
    {
        let url = self.urls.build_image(options)?;
        let archive = tokio::fs::File::open(context_tar).await?;
        info!("Building image from context {}", context_tar.display());
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/x-tar")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(archive)))
            .send()
            .await
            .map_err(|e| Error::http(e.to_string()))?;
        let body = Self::success_body(response).await?;
        process_json_stream(handler, body).await
    }

    /// Check the response status and adapt the body to a reader.
    ///
    /// A non-2xx status surfaces whatever the engine put in the body.
    async fn success_body(response: reqwest::Response) -> Result<BodyReader> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::engine_with_detail(
                format!("engine returned HTTP {status}"),
                body.trim(),
            ));
        }
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }
}

#[async_trait]
impl EngineQuery for EngineClient {
    async fn container_status(&self, container_id: &str) -> Result<ContainerStatus> {
        let url = self.urls.inspect_container(container_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::engine_with_detail(
                format!("cannot inspect container {container_id} (HTTP {status})"),
                body.trim(),
            ));
        }
        let inspect: InspectResponse = response
            .json()
            .await
            .map_err(|e| Error::http(e.to_string()))?;
        Ok(inspect.into())
    }

    async fn container_logs(
        &self,
        container_id: &str,
        options: &LogOptions,
    ) -> Result<BodyReader> {
        let url = self.urls.container_logs(container_id, options)?;
        debug!("Requesting logs: {url}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(e.to_string()))?;
        Self::success_body(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn urls() -> UrlBuilder {
        UrlBuilder::new(Url::parse("http://localhost:2375").unwrap(), None)
    }

    #[test]
    fn test_inspect_url() {
        let url = urls().inspect_container("cafe01").unwrap();
        assert_eq!(url.as_str(), "http://localhost:2375/containers/cafe01/json");
    }

    #[test]
    fn test_versioned_url() {
        let urls = UrlBuilder::new(
            Url::parse("http://localhost:2375").unwrap(),
            Some("1.44".to_string()),
        );
        let url = urls.inspect_container("cafe01").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:2375/v1.44/containers/cafe01/json"
        );
    }

    #[test]
    fn test_logs_url_flags() {
        let url = urls()
            .container_logs("cafe01", &LogOptions::follow())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:2375/containers/cafe01/logs?follow=1&stdout=1&stderr=1&timestamps=1"
        );
    }

    #[test]
    fn test_create_image_url_encodes_query() {
        let url = urls().create_image("registry.example.com/app:1.0").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:2375/images/create?fromImage=registry.example.com%2Fapp%3A1.0"
        );
    }

    #[test]
    fn test_build_url_options() {
        let options = BuildOptions {
            tag: Some("app:latest".to_string()),
            dockerfile: Some("Dockerfile.ci".to_string()),
            no_cache: true,
        };
        let url = urls().build_image(&options).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:2375/build?t=app%3Alatest&dockerfile=Dockerfile.ci&nocache=1"
        );
    }

    #[test]
    fn test_container_status_from_running_inspect() {
        let inspect: InspectResponse = serde_json::from_value(json!({
            "State": {"Running": true, "ExitCode": 0},
            "Config": {}
        }))
        .unwrap();
        let status = ContainerStatus::from(inspect);
        assert!(status.running);
        assert_eq!(status.exit_code, None);
        assert_eq!(status.healthcheck, None);
        assert_eq!(status.healthy, None);
    }

    #[test]
    fn test_container_status_from_exited_inspect() {
        let inspect: InspectResponse = serde_json::from_value(json!({
            "State": {"Running": false, "ExitCode": 137}
        }))
        .unwrap();
        let status = ContainerStatus::from(inspect);
        assert!(!status.running);
        assert_eq!(status.exit_code, Some(137));
    }

    #[test]
    fn test_container_status_healthcheck_and_health() {
        let inspect: InspectResponse = serde_json::from_value(json!({
            "State": {
                "Running": true,
                "ExitCode": 0,
                "Health": {"Status": "starting"}
            },
            "Config": {
                "Healthcheck": {"Test": ["CMD-SHELL", "curl -f http://localhost/"]}
            }
        }))
        .unwrap();
        let status = ContainerStatus::from(inspect);
        assert_eq!(
            status.healthcheck.as_deref(),
            Some("CMD-SHELL curl -f http://localhost/")
        );
        assert_eq!(status.healthy, Some(false));
    }

    #[test]
    fn test_container_status_none_healthcheck_masked() {
        let inspect: InspectResponse = serde_json::from_value(json!({
            "State": {"Running": true},
            "Config": {"Healthcheck": {"Test": ["NONE"]}}
        }))
        .unwrap();
        let status = ContainerStatus::from(inspect);
        assert_eq!(status.healthcheck, None);
    }

    mod http {
        use super::*;
        use std::net::SocketAddr;
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Minimal engine endpoint answering every request with the given
        /// status line and body.
        async fn serve(status_line: &'static str, body: &'static str) -> SocketAddr {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
            });
            addr
        }

        fn client_for(addr: SocketAddr) -> EngineClient {
            EngineClient::new(
                Url::parse(&format!("http://{addr}")).unwrap(),
                None,
                Duration::from_secs(2),
            )
            .unwrap()
        }

        #[tokio::test]
        async fn test_container_status_over_http() {
            let addr = serve(
                "200 OK",
                r#"{"State":{"Running":false,"ExitCode":3},"Config":{}}"#,
            )
            .await;
            let client = client_for(addr);

            let status = client.container_status("cafe01").await.unwrap();
            assert!(!status.running);
            assert_eq!(status.exit_code, Some(3));
        }

        #[tokio::test]
        async fn test_missing_container_surfaces_engine_error() {
            let addr = serve("404 Not Found", r#"{"message":"No such container"}"#).await;
            let client = client_for(addr);

            let err = client.container_status("gone").await.unwrap_err();
            match err {
                Error::Engine { message, detail } => {
                    assert!(message.contains("gone"));
                    assert!(message.contains("404"));
                    assert!(detail.unwrap().contains("No such container"));
                }
                other => panic!("expected engine error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_pull_decodes_chunked_progress_body() {
            struct Counting(usize);
            impl JsonStreamHandler for Counting {
                fn process(&mut self, _json: serde_json::Value) -> Result<()> {
                    self.0 += 1;
                    Ok(())
                }
            }

            let addr = serve(
                "200 OK",
                "{\"status\":\"Pulling from library/alpine\"}{\"status\":\"Pull complete\"}",
            )
            .await;
            let client = client_for(addr);

            let mut handler = Counting(0);
            client.pull_image("alpine:3.20", &mut handler).await.unwrap();
            assert_eq!(handler.0, 2);
        }
    }
}
