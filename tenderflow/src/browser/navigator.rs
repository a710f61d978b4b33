//! Resilient navigation with bounded retries.
//!
//! Navigation failures are expected operating conditions for portal
//! scraping, so [`Navigator::goto`] never returns an error: it reports a
//! terminal [`NavigationOutcome`] and leaves the reaction to the caller.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::NavigationConfig;

/// Delay between element-presence polls while waiting for a selector.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One navigable rendering surface.
///
/// Production surfaces are Chromium pages; tests substitute scripted
/// fakes to exercise the retry loop.
#[async_trait]
pub trait NavigationSurface: Send + Sync {
    /// Drives the surface to `url`. Yields the response status, `None`
    /// when no response document arrived, or an error description.
    async fn navigate(&self, url: &str) -> Result<Option<i64>, String>;

    /// Whether an element matching `selector` is currently present.
    async fn element_exists(&self, selector: &str) -> bool;
}

#[async_trait]
impl NavigationSurface for Page {
    async fn navigate(&self, url: &str) -> Result<Option<i64>, String> {
        self.goto(url).await.map_err(|e| e.to_string())?;
        let request = self
            .wait_for_navigation_response()
            .await
            .map_err(|e| e.to_string())?;
        Ok(request.and_then(|req| req.response.as_ref().map(|resp| resp.status)))
    }

    async fn element_exists(&self, selector: &str) -> bool {
        self.find_element(selector).await.is_ok()
    }
}

/// Terminal result of a navigation across all retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// An ok-classified response arrived.
    Success {
        /// 1-based attempt count consumed, including the winner.
        attempts: u32,
    },
    /// Every attempt failed.
    Failed {
        /// Attempts consumed.
        attempts: u32,
        /// Cause of the final failure.
        cause: String,
    },
}

impl NavigationOutcome {
    /// Whether the navigation landed an ok-classified response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Drives surfaces to URLs with timeouts, retries, and doubling backoff.
#[derive(Debug, Clone)]
pub struct Navigator {
    config: NavigationConfig,
}

impl Navigator {
    /// Creates a navigator with the given retry policy.
    #[must_use]
    pub const fn new(config: NavigationConfig) -> Self {
        Self { config }
    }

    /// Drives `surface` to `url`.
    ///
    /// An attempt succeeds only when a response arrives and its status is
    /// ok-classified. Failed attempts back off with doubling delays; no
    /// delay follows the final one. With `max_retries` of zero, no attempt
    /// is made at all.
    pub async fn goto<S>(&self, surface: &S, url: &str) -> NavigationOutcome
    where
        S: NavigationSurface + ?Sized,
    {
        let mut last_cause = String::from("no attempts made");

        for attempt in 0..self.config.max_retries {
            debug!(url, attempt = attempt + 1, "navigating");

            match timeout(self.config.timeout(), surface.navigate(url)).await {
                Ok(Ok(Some(status))) if is_ok_status(status) => {
                    debug!(url, attempt = attempt + 1, status, "navigation succeeded");
                    return NavigationOutcome::Success {
                        attempts: attempt + 1,
                    };
                }
                Ok(Ok(Some(status))) => {
                    last_cause = format!("response status {status}");
                }
                Ok(Ok(None)) => {
                    last_cause = "no response document".to_string();
                }
                Ok(Err(cause)) => {
                    last_cause = cause;
                }
                Err(_) => {
                    last_cause = format!("timed out after {}s", self.config.timeout_secs);
                }
            }
            warn!(url, attempt = attempt + 1, cause = %last_cause, "navigation attempt failed");

            if attempt + 1 < self.config.max_retries {
                tokio::time::sleep(self.config.backoff_delay(attempt)).await;
            }
        }

        warn!(
            url,
            attempts = self.config.max_retries,
            cause = %last_cause,
            "navigation gave up"
        );
        NavigationOutcome::Failed {
            attempts: self.config.max_retries,
            cause: last_cause,
        }
    }

    /// Waits for an element matching `selector`, polling until the
    /// configured selector timeout elapses.
    pub async fn wait_for_selector<S>(&self, surface: &S, selector: &str) -> bool
    where
        S: NavigationSurface + ?Sized,
    {
        let appeared = timeout(self.config.selector_wait(), async {
            loop {
                if surface.element_exists(selector).await {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok();

        if !appeared {
            warn!(
                selector,
                timeout_secs = self.config.selector_wait_secs,
                "element never appeared"
            );
        }
        appeared
    }
}

/// 2xx and 3xx responses count as ok.
const fn is_ok_status(status: i64) -> bool {
    status >= 200 && status < 400
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedSurface {
        outcomes: Mutex<VecDeque<Result<Option<i64>, String>>>,
        calls: AtomicU32,
        element_present: bool,
    }

    impl ScriptedSurface {
        fn new(outcomes: Vec<Result<Option<i64>, String>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
                element_present: true,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NavigationSurface for ScriptedSurface {
        async fn navigate(&self, _url: &str) -> Result<Option<i64>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().pop_front().unwrap_or(Ok(Some(200)))
        }

        async fn element_exists(&self, _selector: &str) -> bool {
            self.element_present
        }
    }

    fn navigator(max_retries: u32) -> Navigator {
        Navigator::new(NavigationConfig {
            timeout_secs: 2,
            max_retries,
            backoff_base_secs: 0.001,
            selector_wait_secs: 0,
        })
    }

    #[tokio::test]
    async fn ok_response_succeeds_on_first_attempt() {
        let surface = ScriptedSurface::new(vec![Ok(Some(200))]);
        let outcome = navigator(3).goto(&surface, "https://e.org").await;

        assert_eq!(outcome, NavigationOutcome::Success { attempts: 1 });
        assert_eq!(surface.calls(), 1);
    }

    #[tokio::test]
    async fn not_ok_status_retries_until_ok() {
        let surface = ScriptedSurface::new(vec![Ok(Some(503)), Ok(Some(302))]);
        let outcome = navigator(3).goto(&surface, "https://e.org").await;

        // A redirect status still counts as ok.
        assert_eq!(outcome, NavigationOutcome::Success { attempts: 2 });
        assert_eq!(surface.calls(), 2);
    }

    #[tokio::test]
    async fn two_failures_back_off_then_succeed() {
        let surface = ScriptedSurface::new(vec![
            Err("connection reset".to_string()),
            Ok(Some(500)),
            Ok(Some(200)),
        ]);
        let outcome = navigator(3).goto(&surface, "https://e.org").await;

        // Attempts 1 and 2 each back off; the winning attempt does not.
        assert_eq!(outcome, NavigationOutcome::Success { attempts: 3 });
        assert_eq!(surface.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_report_the_final_cause() {
        let surface = ScriptedSurface::new(vec![
            Err("dns failure".to_string()),
            Ok(None),
            Err("connection reset".to_string()),
        ]);
        let outcome = navigator(3).goto(&surface, "https://e.org").await;

        assert_eq!(
            outcome,
            NavigationOutcome::Failed {
                attempts: 3,
                cause: "connection reset".to_string(),
            }
        );
        assert_eq!(surface.calls(), 3);
    }

    #[tokio::test]
    async fn missing_response_document_is_a_failure() {
        let surface = ScriptedSurface::new(vec![Ok(None)]);
        let outcome = navigator(1).goto(&surface, "https://e.org").await;

        assert_eq!(
            outcome,
            NavigationOutcome::Failed {
                attempts: 1,
                cause: "no response document".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn zero_retries_never_navigates() {
        let surface = ScriptedSurface::new(vec![Ok(Some(200))]);
        let outcome = navigator(0).goto(&surface, "https://e.org").await;

        assert!(!outcome.is_success());
        assert_eq!(surface.calls(), 0);
    }

    #[tokio::test]
    async fn selector_wait_reports_presence() {
        let mut surface = ScriptedSurface::new(Vec::new());
        assert!(navigator(1).wait_for_selector(&surface, "table").await);

        surface.element_present = false;
        assert!(!navigator(1).wait_for_selector(&surface, "table").await);
    }
}
