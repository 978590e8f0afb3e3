pub mod headless;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use std::collections::HashSet;
use std::error::Error;
use url::Url;

use crate::metadata::errors::{ExtractError, ValidationFailure};
use crate::metadata::normalize::resolve_against;
use crate::metadata::types::{FetchOutcome, RequestProfile};

/// Markers of interstitial anti-bot pages served with a 200.
const CHALLENGE_MARKERS: &[&str] = &[
    "<title>just a moment...</title>",
    "sorry, you have been blocked",
    "verify you are human by completing the action below",
    "cf-chl-bypass",
    "/cdn-cgi/challenge-platform/",
];

fn get_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return format!("timed out: {error}");
    }
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

pub fn looks_like_challenge(html: &str) -> bool {
    // challenge pages are small; skip scanning large documents end to end
    let head: String = html.chars().take(64 * 1024).collect::<String>().to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| head.contains(marker))
}

fn iden(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or_default(), url.path())
}

/// Where a redirect chase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    Page { html: String, final_url: Url },
    Blocked { status: u16, url: Url },
}

/// HTTP client pair derived from one [`RequestProfile`].
///
/// Page fetches never follow redirects themselves; the caller chases them
/// through [`PageFetcher::fetch_landing`]. Asset validation follows redirects
/// up to the same hop bound.
pub struct PageFetcher {
    profile: RequestProfile,
    page_client: reqwest::Client,
    asset_client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(profile: &RequestProfile) -> Result<Self, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            "sec-fetch-mode",
            HeaderValue::from_str(&profile.fetch_mode)
                .map_err(|e| ExtractError::Client(format!("fetch mode: {e}")))?,
        );
        if !profile.cookies.is_empty() {
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(&profile.cookies.to_header())
                    .map_err(|e| ExtractError::Client(format!("cookie: {e}")))?,
            );
        }

        let build = |policy: Policy| {
            reqwest::Client::builder()
                .user_agent(&profile.user_agent)
                .default_headers(headers.clone())
                .redirect(policy)
                .timeout(profile.timeout)
                .connect_timeout(profile.timeout)
                .danger_accept_invalid_certs(profile.accept_invalid_certs)
                .build()
                .map_err(|e| ExtractError::Client(get_error(&e)))
        };

        Ok(Self {
            page_client: build(Policy::none())?,
            asset_client: build(Policy::limited(profile.max_redirects))?,
            profile: profile.clone(),
        })
    }

    pub fn profile(&self) -> &RequestProfile {
        &self.profile
    }

    /// Issues one GET and classifies the response. Never retries.
    pub async fn fetch_page(&self, url: &Url) -> FetchOutcome {
        let iden = iden(url);
        log::debug!("{iden}: requesting");

        let resp = match self.page_client.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let reason = get_error(&err);
                log::warn!("{iden}: {reason}");
                return FetchOutcome::NetworkError(reason);
            }
        };

        let status = resp.status();
        if status.is_redirection() {
            let location = resp
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| resolve_against(location, url));
            return match location {
                Some(location) => {
                    log::debug!("{iden}: {} -> {location}", status.as_u16());
                    FetchOutcome::Redirect(location)
                }
                None => FetchOutcome::NetworkError(format!(
                    "{} redirect without a usable location",
                    status.as_u16()
                )),
            };
        }

        if !status.is_success() {
            log::debug!("{iden}: {status}");
            return FetchOutcome::Blocked(status.as_u16());
        }

        let final_url = resp.url().clone();
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                let reason = get_error(&err);
                log::warn!("{iden}: reading body: {reason}");
                return FetchOutcome::NetworkError(reason);
            }
        };
        let html = String::from_utf8_lossy(&bytes).to_string();

        if looks_like_challenge(&html) {
            log::info!("{iden}: challenge page detected");
            return FetchOutcome::Blocked(status.as_u16());
        }

        FetchOutcome::Success { html, final_url }
    }

    /// Fetches `url`, chasing redirects one hop at a time until a page or a
    /// blocked response is reached. Each hop fetches the resolved `Location`
    /// exactly once; revisiting a URL or exceeding the hop bound fails.
    pub async fn fetch_landing(&self, url: &Url) -> Result<Landing, ExtractError> {
        let limit = self.profile.max_redirects;
        let mut current = url.clone();
        let mut visited = HashSet::from([current.to_string()]);
        let mut hops = 0;

        loop {
            match self.fetch_page(&current).await {
                FetchOutcome::Success { html, final_url } => {
                    return Ok(Landing::Page { html, final_url });
                }
                FetchOutcome::Blocked(status) => {
                    return Ok(Landing::Blocked {
                        status,
                        url: current,
                    });
                }
                FetchOutcome::NetworkError(reason) => {
                    return Err(ExtractError::Network(reason));
                }
                FetchOutcome::Redirect(location) => {
                    hops += 1;
                    if hops > limit {
                        log::warn!("{}: more than {limit} redirects", iden(url));
                        return Err(ExtractError::RedirectLimit { limit });
                    }
                    if !matches!(location.scheme(), "http" | "https") {
                        return Err(ExtractError::Network(format!(
                            "redirect to unsupported scheme: {location}"
                        )));
                    }
                    if !visited.insert(location.to_string()) {
                        log::warn!("{}: redirect loop at {location}", iden(url));
                        return Err(ExtractError::RedirectLoop(location.to_string()));
                    }
                    log::debug!("{}: redirect hop {hops}/{limit}", iden(&location));
                    current = location;
                }
            }
        }
    }

    /// Live check that an icon/image URL actually serves something.
    /// Tries HEAD first and falls back to GET for servers that reject HEAD.
    pub async fn check_reachable(&self, url: &Url) -> Result<(), ValidationFailure> {
        let fail = |reason: String| ValidationFailure {
            url: url.to_string(),
            reason,
        };

        if !matches!(url.scheme(), "http" | "https") {
            return Err(fail(format!("scheme '{}' is not fetchable", url.scheme())));
        }

        match self.asset_client.head(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => log::debug!("{}: HEAD {}", iden(url), resp.status()),
            Err(err) => log::debug!("{}: HEAD failed: {}", iden(url), get_error(&err)),
        }

        let resp = self
            .asset_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fail(get_error(&e)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(fail(format!("status {}", resp.status())))
        }
    }
}

/// One-off fetch with a fresh client built from `profile`.
pub async fn fetch_page(url: &Url, profile: &RequestProfile) -> FetchOutcome {
    match PageFetcher::new(profile) {
        Ok(fetcher) => fetcher.fetch_page(url).await,
        Err(err) => FetchOutcome::NetworkError(err.to_string()),
    }
}
