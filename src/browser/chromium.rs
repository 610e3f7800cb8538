//! chromiumoxide-backed sessions.

use async_trait::async_trait;

use super::{BrowserEngineConfig, BrowserError, BrowserLauncher, PageDriver};

#[cfg(feature = "browser")]
pub use imp::ChromiumLauncher;

#[cfg(feature = "browser")]
mod imp {
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::*;

    /// How often `wait_visible` re-checks the document.
    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Launches (or connects to) Chrome once per session.
    #[derive(Debug, Clone)]
    pub struct ChromiumLauncher {
        config: BrowserEngineConfig,
        user_agent: String,
    }

    impl ChromiumLauncher {
        /// Common Chrome executable paths to check.
        const CHROME_PATHS: &'static [&'static str] = &[
            // Linux
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            // macOS
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            // Common install locations
            "/opt/google/chrome/google-chrome",
        ];

        pub fn new(config: BrowserEngineConfig, user_agent: impl Into<String>) -> Self {
            Self {
                config,
                user_agent: user_agent.into(),
            }
        }

        /// Find the Chrome executable.
        fn find_chrome(&self) -> Result<PathBuf, BrowserError> {
            if let Some(path) = &self.config.chrome_path {
                return Ok(PathBuf::from(shellexpand::tilde(path).as_ref()));
            }

            for path in Self::CHROME_PATHS {
                let p = std::path::Path::new(path);
                if p.exists() {
                    debug!("Found Chrome at: {}", path);
                    return Ok(p.to_path_buf());
                }
            }

            Err(BrowserError::Launch(
                "Chrome/Chromium not found. Please install it:\n\
                 - Arch/Manjaro: sudo pacman -S chromium\n\
                 - Ubuntu/Debian: sudo apt install chromium-browser\n\
                 - Fedora: sudo dnf install chromium\n\
                 - Or set browser.chrome_path / BROWSER_URL"
                    .to_string(),
            ))
        }

        async fn launch(&self) -> Result<(Browser, JoinHandle<()>), BrowserError> {
            info!("Launching browser (headless={})", self.config.headless);

            let mut builder = BrowserConfig::builder().chrome_executable(self.find_chrome()?);

            // with_head means NOT headless
            if !self.config.headless {
                builder = builder.with_head();
            }

            if let Some(ref proxy) = self.config.proxy {
                builder = builder.arg(format!("--proxy-server={}", proxy));
            }

            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-background-networking")
                .arg("--disable-sync")
                .arg("--disable-translate")
                .arg("--no-sandbox") // Often needed for headless in containers
                .arg("--disable-gpu")
                .arg("--mute-audio");

            for arg in &self.config.chrome_args {
                builder = builder.arg(arg);
            }

            let config = builder
                .build()
                .map_err(|e| BrowserError::Launch(format!("invalid browser config: {}", e)))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok((browser, handle))
        }

        /// Connect to a remote Chrome instance.
        async fn connect_remote(&self, url: &str) -> Result<(Browser, JoinHandle<()>), BrowserError> {
            info!("Connecting to remote browser at {}", url);

            // Get WebSocket URL from the /json/version endpoint
            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .send()
                .await
                .map_err(|e| BrowserError::Launch(format!("remote browser unreachable: {}", e)))?
                .json()
                .await
                .map_err(|e| BrowserError::Launch(format!("bad version info: {}", e)))?;

            let ws_url = resp
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    BrowserError::Launch("no webSocketDebuggerUrl in response".to_string())
                })?;

            let handler_config = chromiumoxide::handler::HandlerConfig {
                request_timeout: Duration::from_secs(self.config.timeout),
                ..Default::default()
            };

            let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok((browser, handle))
        }
    }

    #[async_trait]
    impl BrowserLauncher for ChromiumLauncher {
        async fn open(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
            let remote = self.config.remote_url.is_some();
            let (browser, handler) = match &self.config.remote_url {
                Some(url) => self.connect_remote(url).await?,
                None => self.launch().await?,
            };

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            Ok(Box::new(ChromiumPage {
                browser,
                page,
                handler: HandlerTask(Some(handler)),
                remote,
                closed: false,
                nav_timeout: Duration::from_secs(self.config.timeout),
            }))
        }
    }

    /// The CDP event loop of one session, aborted when dropped.
    struct HandlerTask(Option<JoinHandle<()>>);

    impl HandlerTask {
        fn take(&mut self) -> Option<JoinHandle<()>> {
            self.0.take()
        }
    }

    impl Drop for HandlerTask {
        fn drop(&mut self) {
            if let Some(handle) = self.0.take() {
                handle.abort();
            }
        }
    }

    /// A single tab in its own browser session.
    ///
    /// Sessions dropped without `close()`, such as those owned by a cancelled
    /// acquisition task or a dropped discovery stream, still stop their
    /// handler. A launched Chrome child is killed when `Browser` drops; on a
    /// remote browser the tab is closed from a background task.
    struct ChromiumPage {
        browser: Browser,
        page: Page,
        handler: HandlerTask,
        /// Remote browsers are shared; only our tab is closed on teardown.
        remote: bool,
        closed: bool,
        nav_timeout: Duration,
    }

    impl Drop for ChromiumPage {
        fn drop(&mut self) {
            if self.closed || !self.remote {
                return;
            }
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                return;
            };
            // The handler has to outlive the close command.
            let Some(handler) = self.handler.take() else {
                return;
            };
            let page = self.page.clone();
            let timeout = self.nav_timeout;
            runtime.spawn(async move {
                match tokio::time::timeout(timeout, page.close()).await {
                    Ok(Ok(())) => debug!("Closed abandoned remote tab"),
                    Ok(Err(e)) => debug!("Failed to close abandoned tab: {}", e),
                    Err(_) => debug!("Timed out closing abandoned tab"),
                }
                handler.abort();
            });
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumPage {
        async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
            debug!(url = %url, "Navigating");
            let nav_error = |reason: String| BrowserError::Navigation {
                url: url.to_string(),
                reason,
            };

            let params = NavigateParams::builder()
                .url(url)
                .build()
                .map_err(nav_error)?;

            tokio::time::timeout(self.nav_timeout, self.page.execute(params))
                .await
                .map_err(|_| BrowserError::Timeout {
                    what: format!("navigation to {}", url),
                    after: self.nav_timeout,
                })?
                .map_err(|e| nav_error(e.to_string()))?;

            Ok(())
        }

        async fn wait_visible(
            &mut self,
            selector: &str,
            timeout: Duration,
        ) -> Result<(), BrowserError> {
            let deadline = Instant::now() + timeout;
            loop {
                match self.is_visible(selector).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => {}
                    // The document may be mid-navigation; keep polling.
                    Err(e) => debug!("visibility check failed: {}", e),
                }
                if Instant::now() >= deadline {
                    return Err(BrowserError::Timeout {
                        what: selector.to_string(),
                        after: timeout,
                    });
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        async fn content(&mut self) -> Result<String, BrowserError> {
            self.page
                .content()
                .await
                .map_err(|e| BrowserError::Script(e.to_string()))
        }

        async fn evaluate_bool(&mut self, script: &str) -> Result<bool, BrowserError> {
            self.page
                .evaluate(script.to_string())
                .await
                .map_err(|e| BrowserError::Script(e.to_string()))?
                .into_value()
                .map_err(|e| BrowserError::Script(e.to_string()))
        }

        async fn evaluate_string(&mut self, script: &str) -> Result<String, BrowserError> {
            self.page
                .evaluate(script.to_string())
                .await
                .map_err(|e| BrowserError::Script(e.to_string()))?
                .into_value()
                .map_err(|e| BrowserError::Script(e.to_string()))
        }

        async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| BrowserError::Script(e.to_string()))?;
            Ok(())
        }

        async fn close(&mut self) {
            if let Err(e) = self.page.clone().close().await {
                debug!("Failed to close page: {}", e);
            }
            if !self.remote {
                if let Err(e) = self.browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                let _ = self.browser.wait().await;
            }
            if let Some(handler) = self.handler.take() {
                handler.abort();
            }
            self.closed = true;
        }
    }

}

/// Stub for when the browser feature is disabled.
#[cfg(not(feature = "browser"))]
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl ChromiumLauncher {
    pub fn new(config: BrowserEngineConfig, _user_agent: impl Into<String>) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let _ = &self.config;
        Err(BrowserError::Unsupported)
    }
}
