//! Chromium session lifecycle.
//!
//! A session owns the launched browser and its CDP event pump, and tracks
//! every surface it opens. Surfaces are closed through [`SurfaceGuard`]:
//! explicitly on the normal path, or from a spawned task when a guard is
//! dropped on an error path. Shutdown drains whatever is still tracked
//! before closing the browser itself.

use std::ops::Deref;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScraperConfig;
use crate::errors::BrowserError;

/// Hides `navigator.webdriver` from pages, as automation-aware portals
/// check it before rendering listings.
const INIT_SCRIPT: &str = r"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });
";

type SurfaceRegistry = Arc<Mutex<Vec<(Uuid, Page)>>>;

struct Engine {
    browser: Browser,
    event_pump: JoinHandle<()>,
}

/// Owns the browser process for one run.
///
/// Surfaces can only be opened between [`start`](Self::start) and
/// [`shutdown`](Self::shutdown).
pub struct BrowserSession {
    config: ScraperConfig,
    engine: Option<Engine>,
    surfaces: SurfaceRegistry,
}

impl BrowserSession {
    /// Creates a stopped session. No browser process exists yet.
    #[must_use]
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            engine: None,
            surfaces: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Launches the browser process and its event pump.
    ///
    /// Starting an already started session is a no-op.
    pub async fn start(&mut self) -> Result<(), BrowserError> {
        if self.engine.is_some() {
            return Ok(());
        }
        info!(headless = self.config.headless, "launching browser");

        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
        if !self.config.headless {
            // with_head turns headless off.
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let event_pump = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.engine = Some(Engine {
            browser,
            event_pump,
        });
        info!("browser launched");
        Ok(())
    }

    /// Whether [`start`](Self::start) has completed.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.engine.is_some()
    }

    /// Opens a fresh tracked surface with the configured user agent.
    ///
    /// # Errors
    ///
    /// [`BrowserError::NotStarted`] when the session was never started, or
    /// a CDP failure from page creation.
    pub async fn open_surface(&self) -> Result<SurfaceGuard, BrowserError> {
        let engine = self.engine.as_ref().ok_or(BrowserError::NotStarted)?;

        let page = engine.browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent.clone(),
        ))
        .await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(INIT_SCRIPT))
            .await?;

        let id = Uuid::new_v4();
        let open = {
            let mut surfaces = self.surfaces.lock();
            surfaces.push((id, page.clone()));
            surfaces.len()
        };
        debug!(surface = %id, open, "opened surface");

        Ok(SurfaceGuard::new(id, page, Arc::clone(&self.surfaces)))
    }

    /// Closes any surfaces still tracked, then the browser process.
    ///
    /// Safe to call on a session that never started.
    pub async fn shutdown(&mut self) -> Result<(), BrowserError> {
        let Some(mut engine) = self.engine.take() else {
            return Ok(());
        };

        let leftovers: Vec<(Uuid, Page)> = {
            let mut surfaces = self.surfaces.lock();
            surfaces.drain(..).collect()
        };
        if !leftovers.is_empty() {
            debug!(count = leftovers.len(), "draining leftover surfaces");
        }
        for (id, page) in leftovers {
            if let Err(error) = page.close().await {
                warn!(surface = %id, %error, "failed to close leftover surface");
            }
        }

        engine.browser.close().await?;
        let _ = engine.browser.wait().await;
        engine.event_pump.abort();
        let _ = engine.event_pump.await;

        info!("browser shut down");
        Ok(())
    }
}

/// Scoped handle to one open surface.
///
/// Prefer [`SurfaceGuard::close`]: it awaits the close and reports
/// failures. Dropping the guard still closes the page, but from a spawned
/// task whose outcome nobody observes.
#[derive(Debug)]
pub struct SurfaceGuard {
    id: Uuid,
    page: Option<Page>,
    registry: SurfaceRegistry,
    runtime: tokio::runtime::Handle,
}

impl SurfaceGuard {
    fn new(id: Uuid, page: Page, registry: SurfaceRegistry) -> Self {
        Self {
            id,
            page: Some(page),
            registry,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// The wrapped page. Present until the guard is consumed by
    /// [`close`](Self::close) or dropped.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("surface already closed")
    }

    /// Closes the page and stops tracking it.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.registry.lock().retain(|(id, _)| *id != self.id);
        if let Some(page) = self.page.take() {
            page.close().await?;
            debug!(surface = %self.id, "closed surface");
        }
        Ok(())
    }
}

impl Deref for SurfaceGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        self.page()
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let id = self.id;
            self.registry.lock().retain(|(rid, _)| *rid != id);
            self.runtime.spawn(async move {
                if let Err(error) = page.close().await {
                    warn!(surface = %id, %error, "surface close from drop failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn surfaces_require_a_started_session() {
        let session = BrowserSession::new(ScraperConfig::default());
        assert!(!session.is_started());

        let err = session.open_surface().await.expect_err("not started");
        assert!(matches!(err, BrowserError::NotStarted));
    }

    #[tokio::test]
    async fn shutdown_without_start_is_a_no_op() {
        let mut session = BrowserSession::new(ScraperConfig::default());
        session.shutdown().await.expect("no-op shutdown");
    }
}
