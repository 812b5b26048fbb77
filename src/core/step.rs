//! Step execution with retry, backoff and per-attempt timeouts.
//!
//! Every call site supplies a [`StepPolicy`]; the retry loop lives here
//! and nowhere else.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::error::{is_termination, StepTimeout};
use super::metrics::{MetricStatus, MetricsCollector, StepMetric};

/// Delay strategy between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Always `base_delay`
    Fixed,

    /// `base_delay * 2^k` before retry k (0-indexed)
    Exponential,
}

/// Retry and timeout policy for one step invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPolicy {
    /// Retries after the first attempt (total attempts = retry_limit + 1)
    pub retry_limit: u32,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    pub backoff: Backoff,

    /// Timeout for each individual attempt in milliseconds
    pub timeout_ms: u64,
}

impl StepPolicy {
    pub fn new(retry_limit: u32, base_delay: Duration, backoff: Backoff, timeout: Duration) -> Self {
        Self {
            retry_limit,
            base_delay_ms: base_delay.as_millis() as u64,
            backoff,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn exponential(retry_limit: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self::new(retry_limit, base_delay, Backoff::Exponential, timeout)
    }

    pub fn fixed(retry_limit: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self::new(retry_limit, base_delay, Backoff::Fixed, timeout)
    }

    /// Single attempt, no retries
    pub fn once(timeout: Duration) -> Self {
        Self::new(0, Duration::ZERO, Backoff::Fixed, timeout)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before retry `retry` (0-indexed)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay(),
            Backoff::Exponential => {
                let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
                Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
            }
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-indexed) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.retry_limit
    }
}

/// Executes named steps for one workflow run and records their metrics
#[derive(Debug, Clone)]
pub struct StepExecutor {
    metrics: Arc<MetricsCollector>,
    workflow_id: String,
    event_id: String,
}

impl StepExecutor {
    pub fn new(
        metrics: Arc<MetricsCollector>,
        workflow_id: impl Into<String>,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            metrics,
            workflow_id: workflow_id.into(),
            event_id: event_id.into(),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Run `action` under `policy`.
    ///
    /// A [`TerminationSignal`](super::error::TerminationSignal) is returned
    /// immediately without retrying. Any other error, including a
    /// [`StepTimeout`], is retried until the policy is exhausted. Exactly
    /// one [`StepMetric`] is recorded per call.
    pub async fn run<T, F, Fut>(&self, name: &str, policy: &StepPolicy, mut action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let step_id = format!("{}:{}", self.event_id, name);
        let start_time = Utc::now();
        let timeout = policy.timeout();
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;

            // Dropping the attempt future on expiry abandons it
            let result = match tokio::time::timeout(timeout, action()).await {
                Ok(result) => result,
                Err(_) => Err(StepTimeout {
                    step: name.to_string(),
                    attempt,
                    timeout,
                }
                .into()),
            };

            match result {
                Ok(value) => {
                    debug!(step = name, attempt, "Step completed");
                    break Ok(value);
                }
                Err(e) if is_termination(&e) => {
                    warn!(step = name, attempt, reason = %e, "Step terminated the workflow");
                    break Err(e);
                }
                Err(e) if policy.should_retry(attempt) => {
                    let delay = policy.delay_for_retry(attempt - 1);
                    warn!(
                        step = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(step = name, attempt, error = %e, "Step failed permanently");
                    break Err(e);
                }
            }
        };

        let status = if outcome.is_ok() {
            MetricStatus::Success
        } else {
            MetricStatus::Failure
        };
        let mut metric = StepMetric::new(
            step_id,
            name.to_string(),
            start_time,
            Utc::now(),
            status,
            attempt,
        );
        if let Err(ref e) = outcome {
            metric = metric.with_error(format!("{:#}", e));
        }
        self.metrics
            .record_step(&self.workflow_id, &self.event_id, metric);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{terminate, termination_signal};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn executor() -> (Arc<MetricsCollector>, StepExecutor) {
        let metrics = Arc::new(MetricsCollector::new());
        metrics.start_workflow("wf", "evt");
        let step = StepExecutor::new(metrics.clone(), "wf", "evt");
        (metrics, step)
    }

    #[test]
    fn test_delay_schedule() {
        let exp = StepPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(exp.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(exp.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(exp.delay_for_retry(2), Duration::from_millis(400));
        assert_eq!(exp.delay_for_retry(70), Duration::from_millis(u64::MAX));

        let fixed = StepPolicy::fixed(5, Duration::from_millis(250), Duration::from_secs(1));
        assert_eq!(fixed.delay_for_retry(0), Duration::from_millis(250));
        assert_eq!(fixed.delay_for_retry(3), Duration::from_millis(250));
    }

    #[test]
    fn test_policy_yaml() {
        let policy: StepPolicy = serde_yaml::from_str(
            "retry_limit: 2\nbase_delay_ms: 5000\nbackoff: exponential\ntimeout_ms: 900000\n",
        )
        .unwrap();
        assert_eq!(policy.retry_limit, 2);
        assert_eq!(policy.backoff, Backoff::Exponential);
        assert_eq!(policy.timeout(), Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retries() {
        let (metrics, step) = executor();
        let calls = AtomicU32::new(0);
        let policy = StepPolicy::fixed(3, Duration::from_millis(10), Duration::from_secs(1));

        let value = step
            .run("flaky", &policy, || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        anyhow::bail!("attempt {} failed", n);
                    }
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        let metric = metrics.get_workflow_event_metrics("wf", "evt").unwrap();
        assert_eq!(metric.steps.len(), 1);
        assert_eq!(metric.steps[0].attempts, 3);
        assert_eq!(metric.steps[0].status, MetricStatus::Success);
        assert_eq!(metric.steps[0].step_id, "evt:flaky");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retry_limit() {
        let (metrics, step) = executor();
        let calls = AtomicU32::new(0);
        let policy = StepPolicy::exponential(2, Duration::from_millis(10), Duration::from_secs(1));

        let err = step
            .run("always-fails", &policy, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(anyhow::anyhow!("upstream 503")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("upstream 503"));

        let metric = metrics.get_workflow_event_metrics("wf", "evt").unwrap();
        assert_eq!(metric.steps[0].attempts, 3);
        assert_eq!(metric.steps[0].status, MetricStatus::Failure);
        assert_eq!(metric.steps[0].error.as_deref(), Some("upstream 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_termination_is_not_retried() {
        let (metrics, step) = executor();
        let calls = AtomicU32::new(0);
        let policy = StepPolicy::exponential(5, Duration::from_millis(10), Duration::from_secs(1));

        let err = step
            .run("fetch-sources", &policy, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { terminate::<()>("no sources configured") }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(termination_signal(&err).unwrap().reason, "no sources configured");

        let metric = metrics.get_workflow_event_metrics("wf", "evt").unwrap();
        assert_eq!(metric.steps[0].attempts, 1);
        assert_eq!(metric.steps[0].status, MetricStatus::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_timing() {
        let (_metrics, step) = executor();
        let starts = Mutex::new(Vec::new());
        let policy = StepPolicy::exponential(3, Duration::from_millis(100), Duration::from_secs(1));

        let _ = step
            .run("backoff", &policy, || {
                starts.lock().unwrap().push(Instant::now());
                async { Err::<(), _>(anyhow::anyhow!("nope")) }
            })
            .await;

        let starts = starts.into_inner().unwrap();
        assert_eq!(starts.len(), 4);
        let gaps: Vec<u128> = starts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        for (gap, expected) in gaps.iter().zip([100u128, 200, 400]) {
            assert!(*gap >= expected && *gap <= expected + 5, "gap {} vs {}", gap, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable_failure() {
        let (metrics, step) = executor();
        let calls = AtomicU32::new(0);
        let policy = StepPolicy::fixed(1, Duration::from_millis(10), Duration::from_millis(500));

        let err = step
            .run("slow", &policy, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let timeout = err.downcast_ref::<StepTimeout>().unwrap();
        assert_eq!(timeout.attempt, 2);

        let metric = metrics.get_workflow_event_metrics("wf", "evt").unwrap();
        assert_eq!(metric.steps[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_steps_recorded_in_call_order() {
        let (metrics, step) = executor();
        let policy = StepPolicy::once(Duration::from_secs(1));

        for name in ["scrape", "dedup", "rank"] {
            step.run(name, &policy, || async { Ok(()) }).await.unwrap();
        }

        let metric = metrics.get_workflow_event_metrics("wf", "evt").unwrap();
        let names: Vec<&str> = metric.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["scrape", "dedup", "rank"]);
    }
}
