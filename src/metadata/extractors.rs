//! Title, favicon and preview-image extraction.
//!
//! Each extractor walks an ordered list of candidates on the page and, when
//! nothing usable is found, retries once against the site root. The root page
//! is fetched at most once per extraction call and shared by all three.

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;
use url::{Host, Url};

use crate::metadata::favicons::{lookup_known_favicon, site_identifier};
use crate::metadata::normalize::{is_site_root, resolve_against, site_root};
use crate::metadata::parse::{parse_html, PageDocument};
use crate::scrape::{Landing, PageFetcher};

/// Only one level of root fallback is meaningful.
pub const MAX_ROOT_DEPTH: u8 = 1;

const UNTITLED: &str = "Untitled";

/// The site root page, as fetched and parsed once for this call.
#[derive(Debug, Clone)]
pub struct RootPage {
    pub doc: PageDocument,
    pub url: Url,
}

/// Per-call state shared by the extractors.
pub struct ExtractionContext<'a> {
    fetcher: &'a PageFetcher,
    root: OnceCell<Option<RootPage>>,
    /// Table hit for the URL as requested, looked up before any fetch.
    known_favicon: Option<&'static str>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(fetcher: &'a PageFetcher) -> Self {
        Self {
            fetcher,
            root: OnceCell::new(),
            known_favicon: None,
        }
    }

    pub fn with_known_favicon(mut self, known_favicon: Option<&'static str>) -> Self {
        self.known_favicon = known_favicon;
        self
    }

    /// Fetches and parses the root of `url`'s site. Blocked or failing roots
    /// yield `None`; headless rendering is not attempted for the root.
    pub async fn root_document(&self, url: &Url) -> Option<&RootPage> {
        let fetcher = self.fetcher;
        self.root
            .get_or_init(|| async move {
                let root = site_root(url);
                log::debug!("{}: falling back to site root", root);
                match fetcher.fetch_landing(&root).await {
                    Ok(Landing::Page { html, final_url }) => Some(RootPage {
                        doc: parse_html(&html),
                        url: final_url,
                    }),
                    Ok(Landing::Blocked { status, .. }) => {
                        log::debug!("{root}: root page unavailable ({status})");
                        None
                    }
                    Err(err) => {
                        log::debug!("{root}: root page failed: {err}");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    async fn is_reachable(&self, candidate: &Url) -> bool {
        match self.fetcher.check_reachable(candidate).await {
            Ok(()) => true,
            Err(failure) => {
                log::debug!("discarding candidate: {failure}");
                false
            }
        }
    }

    async fn root_fallback(&self, url: &Url, depth: u8) -> Option<&RootPage> {
        if depth >= MAX_ROOT_DEPTH || is_site_root(url) {
            return None;
        }
        self.root_document(url).await
    }
}

/// Resolves an href found on the page. Malformed references and inline
/// `data:` payloads never become icon/image URLs.
fn candidate_url(href: Option<&str>, page_url: &Url) -> Option<Url> {
    let href = href?;
    if href.trim_start().get(..5).is_some_and(|s| s.eq_ignore_ascii_case("data:")) {
        log::debug!("base64 images are not supported");
        return None;
    }
    resolve_against(href, page_url)
}

/// Title derived from the hostname: `www.example.com` → `Example`.
pub fn title_from_host(url: &Url) -> String {
    let label = match url.host() {
        Some(Host::Domain(domain)) => site_identifier(domain),
        Some(host) => Some(host.to_string()),
        None => None,
    };

    let Some(label) = label.filter(|l| !l.is_empty()) else {
        return UNTITLED.to_string();
    };
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => UNTITLED.to_string(),
    }
}

/// `<title>`, then `og:title`, then the same on the site root, then a
/// hostname-derived title. Never empty.
pub fn extract_title<'a>(
    doc: &'a PageDocument,
    url: &'a Url,
    ctx: &'a ExtractionContext<'_>,
    depth: u8,
) -> BoxFuture<'a, String> {
    async move {
        if let Some(title) = doc.title.as_ref().or(doc.og_title.as_ref()) {
            return title.clone();
        }

        if let Some(root) = ctx.root_fallback(url, depth).await {
            return extract_title(&root.doc, &root.url, ctx, depth + 1).await;
        }

        title_from_host(url)
    }
    .boxed()
}

async fn first_reachable(
    candidates: &[Option<&String>],
    page_url: &Url,
    ctx: &ExtractionContext<'_>,
) -> Option<Url> {
    for href in candidates {
        let Some(candidate) = candidate_url(href.map(String::as_str), page_url) else {
            continue;
        };
        if ctx.is_reachable(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// Known-site table (requested URL, then final URL), then validated `apple-touch-icon`, `icon` and
/// `shortcut icon` links, then the same links on the site root, then
/// `{origin}/favicon.ico`.
pub fn extract_favicon_url<'a>(
    doc: &'a PageDocument,
    url: &'a Url,
    ctx: &'a ExtractionContext<'_>,
    depth: u8,
) -> BoxFuture<'a, Option<String>> {
    async move {
        if depth == 0 {
            // requested URL first, then wherever the redirects landed
            if let Some(known) = ctx
                .known_favicon
                .or_else(|| lookup_known_favicon(url.as_str()))
            {
                return Some(known.to_string());
            }
        }

        let links = [
            doc.apple_touch_icon.as_ref(),
            doc.icon.as_ref(),
            doc.shortcut_icon.as_ref(),
        ];
        if let Some(found) = first_reachable(&links, url, ctx).await {
            return Some(found.to_string());
        }

        if let Some(root) = ctx.root_fallback(url, depth).await {
            return extract_favicon_url(&root.doc, &root.url, ctx, depth + 1).await;
        }

        url.join("/favicon.ico").ok().map(String::from)
    }
    .boxed()
}

/// `og:image` (property, then name) as declared, then validated
/// `twitter:image` and first `<img>`, then the same on the site root.
/// Absence is a valid answer.
pub fn extract_og_image_url<'a>(
    doc: &'a PageDocument,
    url: &'a Url,
    ctx: &'a ExtractionContext<'_>,
    depth: u8,
) -> BoxFuture<'a, Option<String>> {
    async move {
        let declared = [doc.og_image_property.as_ref(), doc.og_image_name.as_ref()];
        if let Some(og) = declared
            .into_iter()
            .find_map(|href| candidate_url(href.map(String::as_str), url))
        {
            return Some(og.to_string());
        }

        let validated = [doc.twitter_image.as_ref(), doc.first_img.as_ref()];
        if let Some(found) = first_reachable(&validated, url, ctx).await {
            return Some(found.to_string());
        }

        if let Some(root) = ctx.root_fallback(url, depth).await {
            return extract_og_image_url(&root.doc, &root.url, ctx, depth + 1).await;
        }

        None
    }
    .boxed()
}
