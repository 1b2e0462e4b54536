//! HTTP reachability condition

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Method, StatusCode};

use stevedore_core::prelude::*;

/// Default HTTP method for pings.
pub const DEFAULT_HTTP_METHOD: &str = "HEAD";

/// Default acceptable status range.
pub const DEFAULT_STATUS_RANGE: &str = "200..399";

// Timeout for pings
const HTTP_PING_TIMEOUT: Duration = Duration::from_millis(500);

static STATUS_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*\.\.+\s*(\d+)$").expect("Invalid status range regex")
});

/// Check whether a given URL is reachable.
///
/// A connection failure is "not yet", never fatal. An HTTP 501 means the
/// server rejects the configured method -- that is a configuration error,
/// not something a retry can fix.
#[derive(Debug)]
pub struct HttpPingCondition {
    url: String,
    method: Method,
    status_min: u16,
    status_max: u16,
    client: reqwest::Client,
}

impl HttpPingCondition {
    /// Ping with the default method and status range.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(&url.into(), None, None, false)
    }

    /// Ping the given URL.
    ///
    /// `status` accepts a single code (`"204"`) or an inclusive range
    /// (`"200..399"`). With `allow_insecure` TLS certificate validation is
    /// skipped, for test or ephemeral endpoints.
    pub fn with_options(
        url: &str,
        method: Option<&str>,
        status: Option<&str>,
        allow_insecure: bool,
    ) -> Result<Self> {
        let method_name = method.unwrap_or(DEFAULT_HTTP_METHOD).to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| Error::config(format!("invalid HTTP method '{method_name}'")))?;

        let (status_min, status_max) = parse_status(status.unwrap_or(DEFAULT_STATUS_RANGE))?;

        let mut builder = reqwest::Client::builder()
            .timeout(HTTP_PING_TIMEOUT)
            .connect_timeout(HTTP_PING_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none());
        if allow_insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(|e| Error::http(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            method,
            status_min,
            status_max,
            client,
        })
    }

    pub fn describe(&self) -> String {
        format!("on url {}", self.url)
    }

    pub async fn check(&mut self) -> Result<bool> {
        self.ping().await
    }

    pub async fn cleanup(&mut self) {}

    async fn ping(&self) -> Result<bool> {
        let response = match self
            .client
            .request(self.method.clone(), &self.url)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                trace!("ping {} not reachable yet: {e}", self.url);
                return Ok(false);
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_IMPLEMENTED {
            return Err(Error::config(format!(
                "invalid or unsupported HTTP method '{}' for checking {}",
                self.method, self.url
            )));
        }
        Ok((self.status_min..=self.status_max).contains(&status.as_u16()))
    }
}

fn parse_status(status: &str) -> Result<(u16, u16)> {
    if let Some(captures) = STATUS_RANGE.captures(status.trim()) {
        let min = captures[1].parse::<u16>();
        let max = captures[2].parse::<u16>();
        if let (Ok(min), Ok(max)) = (min, max) {
            return Ok((min, max));
        }
    } else if let Ok(code) = status.trim().parse::<u16>() {
        return Ok((code, code));
    }
    Err(Error::config(format!(
        "invalid status specification '{status}' (expected a code or 'min..max')"
    )))
}
