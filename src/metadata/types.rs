use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

pub const RENDER_USER_AGENT_DEFAULT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";

/// Placeholder consent/guest identifiers. Some sites only serve real markup
/// once a consent or guest cookie is present.
pub const COOKIE_DEFAULT: &str =
    "CONSENT=YES+cb.20210328-17-p0.en+FX+000; SOCS=CAI; guest_id=v1%3A000000000000000000; euconsent-v2=placeholder";

pub const FETCH_MODE_DEFAULT: &str = "same-origin";
pub const MAX_REDIRECTS_DEFAULT: usize = 20;
pub const TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// Result of a metadata extraction. Always fully populated; a failed
/// extraction yields [`BookmarkMetadata::empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMetadata {
    pub title: String,
    pub favicon_url: Option<String>,
    pub og_image_url: Option<String>,
}

impl BookmarkMetadata {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.favicon_url.is_none() && self.og_image_url.is_none()
    }
}

/// Outcome of a single GET without automatic redirect following.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { html: String, final_url: Url },
    Redirect(Url),
    Blocked(u16),
    NetworkError(String),
}

/// Ordered cookie name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSet(Vec<(String, String)>);

impl CookieSet {
    /// Parses a `Cookie` header value (`a=1; b=2`). Malformed pairs are skipped.
    pub fn from_header(header: &str) -> Self {
        let mut set = Self::default();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            set.insert(name, value.trim());
        }
        set
    }

    /// Inserts or replaces a cookie, keeping the original position on replace.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }

    pub fn merge(&mut self, other: &CookieSet) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_header(&self) -> String {
        self.0
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Fixed configuration used for every fetch of one extraction call.
///
/// Never mutated after construction; a call that needs different cookies
/// (after a headless render) derives a new profile with [`RequestProfile::with_cookies`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub user_agent: String,
    pub cookies: CookieSet,
    /// Extra cookies seeded per host, keyed by lowercased hostname.
    pub host_cookies: HashMap<String, CookieSet>,
    pub fetch_mode: String,
    pub max_redirects: usize,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT_DEFAULT.to_string(),
            cookies: CookieSet::from_header(COOKIE_DEFAULT),
            host_cookies: HashMap::new(),
            fetch_mode: FETCH_MODE_DEFAULT.to_string(),
            max_redirects: MAX_REDIRECTS_DEFAULT,
            timeout: TIMEOUT_DEFAULT,
            accept_invalid_certs: false,
        }
    }
}

impl RequestProfile {
    /// Cookies to seed a headless session for `host`: the base cookie
    /// string plus any host-specific additions.
    pub fn cookies_for(&self, host: &str) -> CookieSet {
        let mut seed = self.cookies.clone();
        let host = host.to_lowercase();
        let bare = host.strip_prefix("www.").unwrap_or(&host);
        for key in [host.as_str(), bare] {
            if let Some(extra) = self.host_cookies.get(key) {
                seed.merge(extra);
            }
        }
        seed
    }

    pub fn with_cookies(&self, cookies: &CookieSet) -> Self {
        let mut derived = self.clone();
        derived.cookies.merge(cookies);
        derived
    }
}

/// Output of a headless render.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub html: String,
    pub cookies: CookieSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_parsing() {
        let set = CookieSet::from_header("a=1; b = two ;broken; =x; c=");
        assert_eq!(set.get("a"), Some("1"));
        assert_eq!(set.get("b"), Some("two"));
        assert_eq!(set.get("c"), Some(""));
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_header(), "a=1; b=two; c=");
    }

    #[test]
    fn test_cookie_insert_replaces_in_place() {
        let mut set = CookieSet::from_header("a=1; b=2");
        set.insert("a", "3");
        assert_eq!(set.to_header(), "a=3; b=2");
    }

    #[test]
    fn test_default_profile_seeds_consent_cookie() {
        let profile = RequestProfile::default();
        assert_eq!(profile.max_redirects, 20);
        assert_eq!(profile.fetch_mode, "same-origin");
        assert!(profile.cookies.get("CONSENT").is_some());
        assert!(profile.cookies.get("guest_id").is_some());
    }

    #[test]
    fn test_host_cookies_merged_into_seed() {
        let mut profile = RequestProfile::default();
        profile
            .host_cookies
            .insert("example.com".into(), CookieSet::from_header("session=abc"));

        let seed = profile.cookies_for("WWW.Example.com");
        assert_eq!(seed.get("session"), Some("abc"));
        assert!(seed.get("CONSENT").is_some());

        let other = profile.cookies_for("other.org");
        assert_eq!(other.get("session"), None);
    }

    #[test]
    fn test_with_cookies_derives_without_mutating() {
        let profile = RequestProfile::default();
        let derived = profile.with_cookies(&CookieSet::from_header("cf_clearance=ok"));
        assert_eq!(derived.cookies.get("cf_clearance"), Some("ok"));
        assert_eq!(profile.cookies.get("cf_clearance"), None);
    }

    #[test]
    fn test_empty_metadata_serializes_camel_case() {
        let json = serde_json::to_value(BookmarkMetadata::empty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title": "", "faviconUrl": null, "ogImageUrl": null})
        );
    }
}
