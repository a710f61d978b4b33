//! Managed Chromium sessions and resilient page navigation.
//!
//! [`BrowserSession`] owns the browser process and hands out tracked
//! [`SurfaceGuard`]s; [`Navigator`] drives those surfaces to URLs with
//! retries and backoff.

mod navigator;
mod session;

pub use navigator::{NavigationOutcome, NavigationSurface, Navigator};
pub use session::{BrowserSession, SurfaceGuard};
