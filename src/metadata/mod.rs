pub mod errors;
pub mod extractors;
pub mod favicons;
pub mod normalize;
pub mod parse;
pub mod types;

pub use errors::{ExtractError, InvalidUrlError, RenderError, ValidationFailure};
pub use types::{BookmarkMetadata, CookieSet, FetchOutcome, RenderedPage, RequestProfile};

use futures::FutureExt;
use once_cell::sync::Lazy;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use url::Url;

use crate::scrape::headless::BrowserRenderer;
use crate::scrape::{Landing, PageFetcher};
use extractors::{extract_favicon_url, extract_og_image_url, extract_title, ExtractionContext};

#[cfg(feature = "headless")]
pub type DefaultRenderer = crate::scrape::headless::ChromeRenderer;
#[cfg(not(feature = "headless"))]
pub type DefaultRenderer = crate::scrape::headless::DisabledRenderer;

/// Process-wide renderer for [`get_bookmark_metadata`], so its session cap
/// applies across concurrent calls.
static DEFAULT_RENDERER: Lazy<Arc<DefaultRenderer>> =
    Lazy::new(|| Arc::new(DefaultRenderer::default()));

/// Best-effort metadata for `url`. Never fails: any error along the way
/// yields [`BookmarkMetadata::empty`].
pub async fn get_bookmark_metadata(url: &str, options: Option<RequestProfile>) -> BookmarkMetadata {
    let extractor = MetadataExtractor::new(options.unwrap_or_default(), DEFAULT_RENDERER.clone());
    extractor.extract(url).await
}

/// What the fetch stage handed to the parser.
struct FetchedPage {
    html: String,
    url: Url,
    /// Profile for the rest of the call, carrying cookies from a headless render.
    profile: Option<RequestProfile>,
}

/// Fetch → (redirect)* → parse, with a headless render when the plain
/// fetch is blocked.
pub struct MetadataExtractor<R> {
    profile: RequestProfile,
    renderer: R,
}

impl<R: BrowserRenderer> MetadataExtractor<R> {
    pub fn new(profile: RequestProfile, renderer: R) -> Self {
        Self { profile, renderer }
    }

    pub fn profile(&self) -> &RequestProfile {
        &self.profile
    }

    pub async fn extract(&self, url: &str) -> BookmarkMetadata {
        match AssertUnwindSafe(self.try_extract(url)).catch_unwind().await {
            Ok(Ok(meta)) => meta,
            Ok(Err(err)) => {
                log::warn!("{url}: metadata extraction failed: {err}");
                BookmarkMetadata::empty()
            }
            Err(_) => {
                log::error!("{url}: metadata extraction panicked");
                BookmarkMetadata::empty()
            }
        }
    }

    pub async fn try_extract(&self, url: &str) -> Result<BookmarkMetadata, ExtractError> {
        let normalized = normalize::normalize_url(url);
        let start = normalize::parse_http_url(&normalized)?;
        let known_favicon = favicons::lookup_known_favicon(start.as_str());
        if let Some(known) = known_favicon {
            log::debug!("{start}: known favicon {known}");
        }

        let fetcher = PageFetcher::new(&self.profile)?;
        let page = self.fetch(&fetcher, &start).await?;

        let fetcher = match &page.profile {
            Some(derived) => PageFetcher::new(derived)?,
            None => fetcher,
        };

        log::debug!("{}: parsing", page.url);
        let doc = parse::parse_html(&page.html);
        let ctx = ExtractionContext::new(&fetcher).with_known_favicon(known_favicon);
        let (title, favicon_url, og_image_url) = tokio::join!(
            extract_title(&doc, &page.url, &ctx, 0),
            extract_favicon_url(&doc, &page.url, &ctx, 0),
            extract_og_image_url(&doc, &page.url, &ctx, 0),
        );

        Ok(BookmarkMetadata {
            title,
            favicon_url,
            og_image_url,
        })
    }

    async fn fetch(&self, fetcher: &PageFetcher, url: &Url) -> Result<FetchedPage, ExtractError> {
        match fetcher.fetch_landing(url).await? {
            Landing::Page { html, final_url } => Ok(FetchedPage {
                html,
                url: final_url,
                profile: None,
            }),
            Landing::Blocked { status, url } => {
                log::info!("{url}: blocked with {status}, rendering with browser");
                let seed = self.profile.cookies_for(url.host_str().unwrap_or_default());
                let rendered = self.renderer.render(url.as_str(), &seed).await?;
                Ok(FetchedPage {
                    html: rendered.html,
                    profile: Some(self.profile.with_cookies(&rendered.cookies)),
                    url,
                })
            }
        }
    }
}
