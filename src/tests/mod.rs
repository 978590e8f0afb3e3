mod web;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::metadata::types::{CookieSet, RenderedPage, RequestProfile};
use crate::metadata::RenderError;
use crate::scrape::headless::BrowserRenderer;

/// Profile without default cookies and with a short timeout.
pub fn test_profile() -> RequestProfile {
    RequestProfile {
        cookies: CookieSet::default(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Renderer returning canned html, recording every call.
#[derive(Default)]
pub struct FakeRenderer {
    html: Option<String>,
    cookies: CookieSet,
    calls: AtomicUsize,
    seeds: Mutex<Vec<CookieSet>>,
}

impl FakeRenderer {
    pub fn serving(html: &str) -> Arc<Self> {
        Arc::new(Self {
            html: Some(html.to_string()),
            ..Default::default()
        })
    }

    pub fn serving_with_cookies(html: &str, cookies: &str) -> Arc<Self> {
        Arc::new(Self {
            html: Some(html.to_string()),
            cookies: CookieSet::from_header(cookies),
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seeds(&self) -> Vec<CookieSet> {
        self.seeds.lock().unwrap().clone()
    }
}

impl BrowserRenderer for FakeRenderer {
    async fn render(&self, url: &str, cookie_seed: &CookieSet) -> Result<RenderedPage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seeds.lock().unwrap().push(cookie_seed.clone());

        match &self.html {
            Some(html) => Ok(RenderedPage {
                html: html.clone(),
                cookies: self.cookies.clone(),
            }),
            None => Err(RenderError::Navigation(format!("{url}: renderer crashed"))),
        }
    }
}
