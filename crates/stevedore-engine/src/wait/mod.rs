//! Generic bounded-time condition polling
//!
//! [`wait_for`] evaluates an ordered list of conditions until one reports
//! `true` or the time budget runs out. Conditions share one uniform
//! contract ([`Condition`]); the concrete predicates live in their own
//! modules and are composed through the [`WaitCondition`] enum, so new
//! predicates never touch the poll loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use stevedore_core::prelude::*;

use crate::client::EngineQuery;

mod exit;
mod health;
mod http;
mod log_match;
mod tcp;

pub use exit::{ExitCodeCondition, ExitMatch};
pub use health::HealthyCondition;
pub use http::{HttpPingCondition, DEFAULT_HTTP_METHOD, DEFAULT_STATUS_RANGE};
pub use log_match::LogPatternCondition;
pub use tcp::TcpPortCondition;

/// Time budget substituted when the caller passes a non-positive one.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Pause between poll iterations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The uniform contract every wait predicate satisfies.
///
/// `check()` never blocks longer than its own sub-second probe timeout; a
/// transient probe failure is `Ok(false)`, never an error. `cleanup()` is
/// invoked by the poller exactly once per condition, whatever the outcome.
#[async_trait]
pub trait Condition: Send {
    /// Human-readable label used in "waited on ..." and timeout reports.
    fn describe(&self) -> String;

    async fn check(&mut self) -> Result<bool>;

    async fn cleanup(&mut self);
}

/// The predicates a caller can compose into one wait.
pub enum WaitCondition {
    HttpPing(HttpPingCondition),
    TcpPort(TcpPortCondition),
    ExitCode(ExitCodeCondition),
    Healthy(HealthyCondition),
    LogPattern(LogPatternCondition),
}

#[async_trait]
impl Condition for WaitCondition {
    fn describe(&self) -> String {
        match self {
            WaitCondition::HttpPing(c) => c.describe(),
            WaitCondition::TcpPort(c) => c.describe(),
            WaitCondition::ExitCode(c) => c.describe(),
            WaitCondition::Healthy(c) => c.describe(),
            WaitCondition::LogPattern(c) => c.describe(),
        }
    }

    async fn check(&mut self) -> Result<bool> {
        match self {
            WaitCondition::HttpPing(c) => c.check().await,
            WaitCondition::TcpPort(c) => c.check().await,
            WaitCondition::ExitCode(c) => c.check().await,
            WaitCondition::Healthy(c) => c.check().await,
            WaitCondition::LogPattern(c) => c.check().await,
        }
    }

    async fn cleanup(&mut self) {
        match self {
            WaitCondition::HttpPing(c) => c.cleanup().await,
            WaitCondition::TcpPort(c) => c.cleanup().await,
            WaitCondition::ExitCode(c) => c.cleanup().await,
            WaitCondition::Healthy(c) => c.cleanup().await,
            WaitCondition::LogPattern(c) => c.cleanup().await,
        }
    }
}

/// Wait until one condition matches or the budget elapses.
///
/// Returns the elapsed time on success. A non-positive `timeout_ms` falls
/// back to [`DEFAULT_MAX_WAIT`]. On timeout the error carries the elapsed
/// time; a fatal error from a `check()` (configuration problems, engine
/// errors) aborts the wait immediately. Every condition's `cleanup()` runs
/// exactly once before this function returns, in all three cases.
pub async fn wait_for<C>(timeout_ms: i64, conditions: &mut [C]) -> Result<Duration>
where
    C: Condition,
{
    wait_with_interval(timeout_ms, POLL_INTERVAL, conditions).await
}

/// [`wait_for`] with a caller-chosen poll interval.
pub async fn wait_with_interval<C>(
    timeout_ms: i64,
    interval: Duration,
    conditions: &mut [C],
) -> Result<Duration>
where
    C: Condition,
{
    let max = if timeout_ms > 0 {
        Duration::from_millis(timeout_ms as u64)
    } else {
        DEFAULT_MAX_WAIT
    };
    let started = Instant::now();

    let outcome = poll(max, interval, started, conditions).await;

    for condition in conditions.iter_mut() {
        condition.cleanup().await;
    }

    outcome
}

async fn poll<C>(
    max: Duration,
    interval: Duration,
    started: Instant,
    conditions: &mut [C],
) -> Result<Duration>
where
    C: Condition,
{
    loop {
        for condition in conditions.iter_mut() {
            if condition.check().await? {
                debug!("condition matched {}", condition.describe());
                return Ok(started.elapsed());
            }
        }
        if started.elapsed() >= max {
            return Err(Error::wait_timeout(started.elapsed()));
        }
        tokio::time::sleep(interval).await;
    }
}

/// Join the labels of all conditions for user-facing wait reports.
pub fn describe_all<C: Condition>(conditions: &[C]) -> String {
    conditions
        .iter()
        .map(Condition::describe)
        .collect::<Vec<_>>()
        .join(" and ")
}

// ─────────────────────────────────────────────────────────
// Declarative wait assembly
// ─────────────────────────────────────────────────────────

/// HTTP probe parameters.
#[derive(Debug, Clone)]
pub struct HttpWait {
    pub url: String,
    pub method: Option<String>,
    /// A single status code or an inclusive `min..max` range.
    pub status: Option<String>,
    pub allow_insecure: bool,
}

/// TCP probe parameters.
#[derive(Debug, Clone)]
pub struct TcpWait {
    pub host: String,
    pub ports: Vec<u16>,
}

/// A declarative description of one wait, turned into the ordered
/// condition list with [`WaitConfig::conditions`].
#[derive(Debug, Clone, Default)]
pub struct WaitConfig {
    pub http: Option<HttpWait>,
    pub log_pattern: Option<String>,
    pub tcp: Option<TcpWait>,
    pub healthy: bool,
    pub exit: Option<ExitMatch>,
    /// Non-positive means [`DEFAULT_MAX_WAIT`].
    pub timeout_ms: i64,
}

impl WaitConfig {
    /// Build the conditions in their evaluation order: http, log, tcp,
    /// health, exit.
    pub fn conditions(
        &self,
        engine: Arc<dyn EngineQuery>,
        container_id: &str,
    ) -> Result<Vec<WaitCondition>> {
        let mut conditions = Vec::new();

        if let Some(http) = &self.http {
            conditions.push(WaitCondition::HttpPing(HttpPingCondition::with_options(
                &http.url,
                http.method.as_deref(),
                http.status.as_deref(),
                http.allow_insecure,
            )?));
        }

        if let Some(pattern) = &self.log_pattern {
            conditions.push(WaitCondition::LogPattern(LogPatternCondition::new(
                Arc::clone(&engine),
                container_id,
                pattern,
            )?));
        }

        if let Some(tcp) = &self.tcp {
            conditions.push(WaitCondition::TcpPort(TcpPortCondition::new(
                &tcp.host,
                tcp.ports.clone(),
            )));
        }

        if self.healthy {
            conditions.push(WaitCondition::Healthy(HealthyCondition::new(
                Arc::clone(&engine),
                container_id,
            )));
        }

        if let Some(exit) = self.exit {
            conditions.push(WaitCondition::ExitCode(ExitCodeCondition::new(
                engine,
                container_id,
                exit,
            )));
        }

        Ok(conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted condition: a fixed sequence of answers, then the last one
    /// repeats. Counts cleanup calls.
    struct Scripted {
        answers: Vec<bool>,
        calls: usize,
        cleanups: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(answers: Vec<bool>, cleanups: Arc<AtomicUsize>) -> Self {
            Self {
                answers,
                calls: 0,
                cleanups,
            }
        }
    }

    #[async_trait]
    impl Condition for Scripted {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn check(&mut self) -> Result<bool> {
            let index = self.calls.min(self.answers.len() - 1);
            self.calls += 1;
            Ok(self.answers[index])
        }

        async fn cleanup(&mut self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_first_true_condition_wins() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut conditions = vec![
            Scripted::new(vec![false], Arc::clone(&cleanups)),
            Scripted::new(vec![false], Arc::clone(&cleanups)),
            Scripted::new(vec![true], Arc::clone(&cleanups)),
        ];

        let elapsed = wait_with_interval(5_000, Duration::from_millis(10), &mut conditions)
            .await
            .expect("third condition should match");

        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(cleanups.load(Ordering::SeqCst), 3, "each cleaned up once");
    }

    #[tokio::test]
    async fn test_match_on_a_later_iteration() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut conditions = vec![Scripted::new(
            vec![false, false, true],
            Arc::clone(&cleanups),
        )];

        let elapsed = wait_with_interval(5_000, Duration::from_millis(10), &mut conditions)
            .await
            .expect("matches on third iteration");

        assert!(elapsed >= Duration::from_millis(20));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_carries_elapsed_and_cleans_up() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut conditions = vec![
            Scripted::new(vec![false], Arc::clone(&cleanups)),
            Scripted::new(vec![false], Arc::clone(&cleanups)),
        ];

        let err = wait_with_interval(50, Duration::from_millis(10), &mut conditions)
            .await
            .expect_err("must time out");

        let waited = err.waited().expect("timeout carries elapsed");
        assert!(waited >= Duration::from_millis(50));
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_check_error_aborts_but_cleans_up() {
        struct Exploding {
            cleanups: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Condition for Exploding {
            fn describe(&self) -> String {
                "exploding".to_string()
            }
            async fn check(&mut self) -> Result<bool> {
                Err(Error::config("no HEALTHCHECK configured"))
            }
            async fn cleanup(&mut self) {
                self.cleanups.fetch_add(1, Ordering::SeqCst);
            }
        }

        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut conditions = vec![Exploding {
            cleanups: Arc::clone(&cleanups),
        }];

        let err = wait_with_interval(1_000, Duration::from_millis(10), &mut conditions)
            .await
            .expect_err("configuration error aborts");

        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_positive_timeout_uses_default() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut conditions = vec![Scripted::new(vec![true], Arc::clone(&cleanups))];

        // Matching immediately, so the default budget is never exhausted.
        let elapsed = wait_with_interval(0, Duration::from_millis(10), &mut conditions)
            .await
            .expect("immediate match");
        assert!(elapsed < DEFAULT_MAX_WAIT);
    }

    #[test]
    fn test_describe_all_joins_labels() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let conditions = vec![
            Scripted::new(vec![false], Arc::clone(&cleanups)),
            Scripted::new(vec![false], cleanups),
        ];
        assert_eq!(describe_all(&conditions), "scripted and scripted");
    }
}
