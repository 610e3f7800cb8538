//! Scripted in-memory page driver for tests.
//!
//! Serves a fixed sequence of HTML documents. Selectors are matched against
//! the current document with the `scraper` crate, clicking an element that
//! exists advances to the next document. Elements carrying a `hidden`
//! attribute exist but are not visible.
//!
//! Available to integration tests through the `test-util` feature.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{BrowserError, BrowserLauncher, PageDriver};

#[derive(Debug, Default)]
pub struct ScriptLog {
    pub sessions: usize,
    pub closed: usize,
    pub navigations: Vec<String>,
    pub clicks: usize,
    pub evaluations: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedLauncher {
    pages: Vec<String>,
    eval_result: Option<String>,
    hang: bool,
    pub log: Arc<Mutex<ScriptLog>>,
}

impl ScriptedLauncher {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    /// Value returned by `evaluate_string`.
    pub fn with_eval(mut self, value: &str) -> Self {
        self.eval_result = Some(value.to_string());
        self
    }

    /// Make every `wait_visible` time out.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn sessions(&self) -> usize {
        self.log.lock().unwrap().sessions
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn open(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        self.log.lock().unwrap().sessions += 1;
        Ok(Box::new(ScriptedPage {
            launcher: self.clone(),
            index: 0,
        }))
    }
}

struct ScriptedPage {
    launcher: ScriptedLauncher,
    index: usize,
}

impl ScriptedPage {
    fn current(&self) -> &str {
        self.launcher
            .pages
            .get(self.index)
            .map(String::as_str)
            .unwrap_or("")
    }

    fn matches(&self, selector: &str) -> bool {
        let selector = Selector::parse(selector).unwrap();
        Html::parse_document(self.current())
            .select(&selector)
            .next()
            .is_some()
    }

    fn visible(&self, selector: &str) -> bool {
        let selector = Selector::parse(selector).unwrap();
        Html::parse_document(self.current())
            .select(&selector)
            .any(|el| el.value().attr("hidden").is_none())
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.launcher.log.lock().unwrap().navigations.push(url.to_string());
        self.index = 0;
        Ok(())
    }

    async fn wait_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if !self.launcher.hang && self.visible(selector) {
            return Ok(());
        }
        Err(BrowserError::Timeout {
            what: selector.to_string(),
            after: timeout,
        })
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.current().to_string())
    }

    async fn evaluate_bool(&mut self, _script: &str) -> Result<bool, BrowserError> {
        Err(BrowserError::Script("not scripted".into()))
    }

    async fn evaluate_string(&mut self, _script: &str) -> Result<String, BrowserError> {
        self.launcher.log.lock().unwrap().evaluations += 1;
        self.launcher
            .eval_result
            .clone()
            .ok_or_else(|| BrowserError::Script("not scripted".into()))
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        if !self.matches(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        self.launcher.log.lock().unwrap().clicks += 1;
        self.index += 1;
        Ok(())
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.visible(selector))
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.matches(selector))
    }

    async fn close(&mut self) {
        self.launcher.log.lock().unwrap().closed += 1;
    }
}
