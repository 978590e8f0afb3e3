use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::metadata::errors::RenderError;
use crate::metadata::types::{CookieSet, RenderedPage, RENDER_USER_AGENT_DEFAULT};

pub const RENDER_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);
pub const MAX_SESSIONS_DEFAULT: usize = 2;

/// Renders a page in a real browser engine and returns the post-JavaScript
/// document plus the cookies the session ended up with.
pub trait BrowserRenderer: Send + Sync {
    fn render(
        &self,
        url: &str,
        cookie_seed: &CookieSet,
    ) -> impl Future<Output = Result<RenderedPage, RenderError>> + Send;
}

impl<R: BrowserRenderer> BrowserRenderer for Arc<R> {
    fn render(
        &self,
        url: &str,
        cookie_seed: &CookieSet,
    ) -> impl Future<Output = Result<RenderedPage, RenderError>> + Send {
        (**self).render(url, cookie_seed)
    }
}

/// Renderer used when headless rendering is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

impl BrowserRenderer for DisabledRenderer {
    async fn render(&self, url: &str, _: &CookieSet) -> Result<RenderedPage, RenderError> {
        log::debug!("{url}: headless rendering disabled");
        Err(RenderError::Disabled)
    }
}

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    /// Bound on the whole session: launch, navigation and extraction.
    pub timeout: Duration,
    pub max_sessions: usize,
    pub sandbox: bool,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            chrome_path: std::env::var("CHROME_PATH").ok().map(PathBuf::from),
            user_agent: RENDER_USER_AGENT_DEFAULT.to_string(),
            timeout: RENDER_TIMEOUT_DEFAULT,
            max_sessions: MAX_SESSIONS_DEFAULT,
            sandbox: false,
        }
    }
}

/// Renderer picked at startup from configuration and CLI flags.
pub enum Renderer {
    Disabled(DisabledRenderer),
    #[cfg(feature = "headless")]
    Chrome(ChromeRenderer),
}

impl Renderer {
    pub fn new(enabled: bool, options: ChromeOptions) -> Self {
        match enabled {
            #[cfg(feature = "headless")]
            true => Self::Chrome(ChromeRenderer::new(options)),
            _ => {
                if enabled {
                    log::warn!("built without headless support, rendering disabled");
                }
                drop(options);
                Self::Disabled(DisabledRenderer)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled(_))
    }
}

impl BrowserRenderer for Renderer {
    async fn render(
        &self,
        url: &str,
        cookie_seed: &CookieSet,
    ) -> Result<RenderedPage, RenderError> {
        match self {
            Self::Disabled(renderer) => renderer.render(url, cookie_seed).await,
            #[cfg(feature = "headless")]
            Self::Chrome(renderer) => renderer.render(url, cookie_seed).await,
        }
    }
}

#[cfg(feature = "headless")]
pub use chrome::ChromeRenderer;

#[cfg(feature = "headless")]
mod chrome {
    use super::*;
    use headless_chrome::protocol::cdp::Network::CookieParam;
    use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
    use tokio::sync::Semaphore;

    /// Grace on top of the render timeout for browser launch and teardown.
    const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

    /// Spawns one isolated browser process per render. Concurrent sessions
    /// are capped by `max_sessions`.
    pub struct ChromeRenderer {
        options: ChromeOptions,
        sessions: Arc<Semaphore>,
    }

    impl ChromeRenderer {
        pub fn new(options: ChromeOptions) -> Self {
            let sessions = Arc::new(Semaphore::new(options.max_sessions.max(1)));
            Self { options, sessions }
        }
    }

    impl Default for ChromeRenderer {
        fn default() -> Self {
            Self::new(ChromeOptions::default())
        }
    }

    impl BrowserRenderer for ChromeRenderer {
        async fn render(
            &self,
            url: &str,
            cookie_seed: &CookieSet,
        ) -> Result<RenderedPage, RenderError> {
            let timeout = self.options.timeout;

            // waiting for a free session slot is bounded by the render timeout
            let permit = match tokio::time::timeout(
                timeout,
                self.sessions.clone().acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(err)) => return Err(RenderError::Launch(err.to_string())),
                Err(_) => {
                    log::warn!("{url}: no browser session free within {timeout:?}");
                    return Err(RenderError::Timeout(timeout));
                }
            };

            let url = url.to_string();
            let seed = cookie_seed.clone();
            let options = self.options.clone();

            // the permit travels with the blocking task so it is only released
            // once the browser process is actually gone
            let task = tokio::task::spawn_blocking(move || {
                let result = render_blocking(&url, &seed, &options);
                drop(permit);
                result
            });

            match tokio::time::timeout(timeout + TEARDOWN_GRACE, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => Err(RenderError::Crashed(err.to_string())),
                Err(_) => Err(RenderError::Timeout(timeout)),
            }
        }
    }

    /// Seed cookies scoped to the target site, so the browser only sends them
    /// there and the site can still overwrite them during the session.
    fn seed_cookie_params(url: &str, seed: &CookieSet) -> Result<Vec<CookieParam>, RenderError> {
        let target = url::Url::parse(url).map_err(|e| RenderError::Navigation(e.to_string()))?;
        let scope = crate::metadata::normalize::site_root(&target);

        seed.iter()
            .map(|(name, value)| {
                serde_json::from_value(serde_json::json!({
                    "name": name,
                    "value": value,
                    "url": scope.as_str(),
                }))
                .map_err(|e| RenderError::Navigation(format!("cookie {name}: {e}")))
            })
            .collect()
    }

    /// Owns the browser for the duration of one render. Dropping it closes
    /// the tab and kills the browser process, whichever way the render ends.
    struct BrowserSession {
        tab: Arc<Tab>,
        _browser: Browser,
        host: String,
    }

    impl Drop for BrowserSession {
        fn drop(&mut self) {
            if let Err(err) = self.tab.close(true) {
                log::debug!("{}: closing tab: {err}", self.host);
            }
            log::debug!("{}: browser session closed", self.host);
        }
    }

    fn launch(url: &str, options: &ChromeOptions) -> Result<BrowserSession, RenderError> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let launch_options = LaunchOptionsBuilder::default()
            .headless(true)
            .sandbox(options.sandbox)
            .path(options.chrome_path.clone())
            .window_size(Some((1280, 720)))
            .idle_browser_timeout(options.timeout)
            .build()
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let browser = Browser::new(launch_options).map_err(|e| {
            log::error!("failed to start chrome: {e}");
            RenderError::Launch(e.to_string())
        })?;
        let tab = browser
            .new_tab()
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        Ok(BrowserSession {
            tab,
            _browser: browser,
            host,
        })
    }

    fn render_blocking(
        url: &str,
        seed: &CookieSet,
        options: &ChromeOptions,
    ) -> Result<RenderedPage, RenderError> {
        let session = launch(url, options)?;
        let tab = &session.tab;
        let host = session.host.as_str();
        let nav = |e: anyhow::Error| RenderError::Navigation(e.to_string());

        tab.set_default_timeout(options.timeout);
        tab.enable_stealth_mode().map_err(nav)?;
        tab.set_user_agent(&options.user_agent, Some("en-US,en"), None)
            .map_err(nav)?;

        if !seed.is_empty() {
            tab.set_cookies(seed_cookie_params(url, seed)?)
                .map_err(nav)?;
        }

        log::debug!("{host}: navigating");
        tab.navigate_to(url).map_err(nav)?;
        tab.wait_until_navigated().map_err(nav)?;
        // DOMContentLoaded has fired once a body is queryable
        tab.wait_for_element("body").map_err(nav)?;

        let html = tab
            .evaluate("document.documentElement.outerHTML", false)
            .ok()
            .and_then(|obj| obj.value)
            .and_then(|value| value.as_str().map(str::to_string))
            .map(Ok)
            .unwrap_or_else(|| tab.get_content().map_err(nav))?;

        if crate::scrape::looks_like_challenge(&html) {
            log::info!("{host}: challenge detected after render");
            return Err(RenderError::Challenge);
        }

        let mut cookies = CookieSet::default();
        match tab.get_cookies() {
            Ok(jar) => {
                for cookie in jar {
                    cookies.insert(&cookie.name, &cookie.value);
                }
            }
            Err(err) => log::debug!("{host}: reading cookies: {err}"),
        }

        log::debug!(
            "{host}: rendered {} bytes, {} cookies",
            html.len(),
            cookies.len()
        );
        Ok(RenderedPage { html, cookies })
    }

}
