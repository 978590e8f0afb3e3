use url::Url;

use crate::metadata::errors::InvalidUrlError;

const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "mc_cid",
    "mc_eid",
];

/// Canonicalizes a user-submitted URL before it is fetched.
///
/// - protocol-relative `//host/...` becomes `https://host/...`
/// - host is lowercased
/// - tracking query parameters are dropped
/// - a trailing path slash is removed (root `/` is kept)
///
/// Input that does not parse is returned unchanged; the caller reports it.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let candidate = match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    };

    let Ok(mut parsed) = Url::parse(&candidate) else {
        return url.to_string();
    };

    // the url crate already lowercases special-scheme hosts; this covers the rest
    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        if parsed.set_host(Some(&host)).is_err() {
            return url.to_string();
        }
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if parsed.query().is_some() {
        parsed.set_query(None);
        if !kept.is_empty() {
            parsed.query_pairs_mut().extend_pairs(kept);
        }
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.to_string()
}

/// Resolves a possibly relative reference against an absolute base URL.
///
/// Fails only when `base` is not an absolute URL. A reference that cannot be
/// joined is treated as empty, which resolves to the base itself.
pub fn resolve(maybe_relative: &str, base: &str) -> Result<String, InvalidUrlError> {
    let base = Url::parse(base).map_err(|e| InvalidUrlError::new(base, e))?;
    let resolved = resolve_against(maybe_relative, &base)
        .or_else(|| base.join("").ok())
        .unwrap_or(base);
    Ok(resolved.to_string())
}

/// Joins `maybe_relative` onto `base`; `None` when the reference is malformed.
pub(crate) fn resolve_against(maybe_relative: &str, base: &Url) -> Option<Url> {
    match base.join(maybe_relative.trim()) {
        Ok(url) => Some(url),
        Err(err) => {
            log::debug!("{base}: unusable reference {maybe_relative:?}: {err}");
            None
        }
    }
}

/// `scheme://host[:port]/` for the given page.
pub fn site_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

pub fn is_site_root(url: &Url) -> bool {
    url.path() == "/" || url.path().is_empty()
}

/// Only http(s) pages are fetched.
pub fn parse_http_url(url: &str) -> Result<Url, InvalidUrlError> {
    let parsed = Url::parse(url).map_err(|e| InvalidUrlError::new(url, e))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(InvalidUrlError::new(
            url,
            format!("scheme '{scheme}' is not fetchable"),
        )),
    }
}
