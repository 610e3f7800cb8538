//! Rendered-page automation.
//!
//! The scraper engine and media resolver only ever need a handful of
//! primitives against a rendered document: navigate, wait until visible,
//! evaluate a script, click, and read the rendered HTML. [`PageDriver`]
//! captures exactly those, and [`BrowserLauncher`] hands out one isolated
//! session per call so concurrent runs never share navigation state.

mod chromium;
mod config;

pub use chromium::ChromiumLauncher;
pub use config::BrowserEngineConfig;

use std::time::Duration;

use async_trait::async_trait;

/// Errors from the browser automation surface.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("failed to start browser session: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { what: String, after: Duration },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("no element matches {0}")]
    ElementNotFound(String),
    #[error("browser support not compiled. Rebuild with: cargo build --features browser")]
    Unsupported,
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

/// One rendered browser tab.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait for the navigation to commit.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait until an element matching `selector` is visible.
    async fn wait_visible(&mut self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// The rendered document's outer HTML.
    async fn content(&mut self) -> Result<String, BrowserError>;

    async fn evaluate_bool(&mut self, script: &str) -> Result<bool, BrowserError>;

    async fn evaluate_string(&mut self, script: &str) -> Result<String, BrowserError>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Whether an element matching `selector` is currently visible.
    async fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError> {
        self.evaluate_bool(&visibility_script(selector)).await
    }

    /// Whether any element matches `selector`, visible or not.
    async fn exists(&mut self, selector: &str) -> Result<bool, BrowserError> {
        self.evaluate_bool(&format!(
            "document.querySelector({}) !== null",
            js_string(selector)
        ))
        .await
    }

    /// Tear the session down. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Opens isolated browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageDriver>, BrowserError>;
}

/// Quote a string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Script that evaluates to `true` when `selector` matches a visible element.
///
/// Visible means present, with a non-empty bounding box, and not hidden by
/// `display` or `visibility`.
pub fn visibility_script(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({});
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}})()"#,
        js_string(selector)
    )
}

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
