//! Known-good favicons for large sites, checked before any network I/O.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use url::{Host, Url};

/// Leading labels that never identify the site itself.
const NOISE_PREFIXES: &[&str] = &["www", "m", "mobile"];

/// Second-level labels that sit between the brand and the TLD (`bbc.co.uk`).
const GENERIC_SECOND_LEVEL: &[&str] = &["com", "co", "org", "net", "io", "dev", "gov", "edu", "ac"];

static KNOWN_FAVICONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("youtube", "https://www.youtube.com/s/desktop/favicon.ico"),
        ("youtu", "https://www.youtube.com/s/desktop/favicon.ico"),
        ("reddit", "https://www.redditstatic.com/shreddit/assets/favicon/192x192.png"),
        ("github", "https://github.githubassets.com/favicons/favicon.svg"),
        ("twitter", "https://abs.twimg.com/favicons/twitter.3.ico"),
        ("x", "https://abs.twimg.com/favicons/twitter.3.ico"),
        ("facebook", "https://static.xx.fbcdn.net/rsrc.php/yb/r/hLRJ1GG_y0J.ico"),
        ("instagram", "https://static.cdninstagram.com/rsrc.php/v3/yI/r/VsNE-OHk_8a.png"),
        ("linkedin", "https://static.licdn.com/aero-v1/sc/h/al2o9zrvru7aqj8e1x2rzsrca"),
        ("stackoverflow", "https://cdn.sstatic.net/Sites/stackoverflow/Img/apple-touch-icon.png"),
        ("wikipedia", "https://en.wikipedia.org/static/apple-touch/wikipedia.png"),
        ("google", "https://www.google.com/favicon.ico"),
        ("amazon", "https://www.amazon.com/favicon.ico"),
        ("netflix", "https://assets.nflxext.com/us/ffe/siteui/common/icons/nficon2016.ico"),
        ("spotify", "https://open.spotifycdn.com/cdn/images/favicon32.b64ecc03.png"),
        ("medium", "https://miro.medium.com/v2/1*m-R_BkNf1Qjr1YbyOIJY2w.png"),
        ("ycombinator", "https://news.ycombinator.com/y18.svg"),
        ("twitch", "https://static.twitchcdn.net/assets/favicon-32-e29e246c157142c94346.png"),
        ("tiktok", "https://www.tiktok.com/favicon.ico"),
        ("pinterest", "https://s.pinimg.com/webapp/favicon-56d11a4a.png"),
        ("discord", "https://discord.com/assets/favicon.ico"),
        ("gitlab", "https://gitlab.com/assets/favicon-72a2cad5025aa931d6ea56c3201d1f18e68a8cd39788c7c80d5b2b82aa5143ef.png"),
    ])
});

fn is_locale_label(label: &str) -> bool {
    label.len() == 2 && label.bytes().all(|b| b.is_ascii_lowercase())
}

/// Reduces a hostname to the label that names the site:
/// `www.youtube.com` → `youtube`, `en.m.wikipedia.org` → `wikipedia`,
/// `bbc.co.uk` → `bbc`, `news.ycombinator.com` → `ycombinator`.
///
/// Returns `None` for IP addresses and empty hosts.
pub fn site_identifier(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.').to_lowercase();
    if host.is_empty() || host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }

    let mut labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    while labels.len() > 2
        && (NOISE_PREFIXES.contains(&labels[0]) || is_locale_label(labels[0]))
    {
        labels.remove(0);
    }
    if labels.len() == 2 && NOISE_PREFIXES.contains(&labels[0]) {
        // `www.com`-style hosts have nothing left to strip
        return Some(labels[0].to_string());
    }

    let identifier = match labels.as_slice() {
        [] => return None,
        [only] => *only,
        [.., brand, sld, _tld] if GENERIC_SECOND_LEVEL.contains(sld) => *brand,
        [.., brand, _tld] => *brand,
    };
    Some(identifier.to_string())
}

/// Static favicon for well-known sites. Malformed input yields `None`.
pub fn lookup_known_favicon(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    let host = match parsed.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(_) | Host::Ipv6(_) => return None,
    };
    let identifier = site_identifier(&host)?;
    KNOWN_FAVICONS.get(identifier.as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_identifier_strips_prefixes() {
        assert_eq!(site_identifier("www.youtube.com").as_deref(), Some("youtube"));
        assert_eq!(site_identifier("m.youtube.com").as_deref(), Some("youtube"));
        assert_eq!(site_identifier("mobile.twitter.com").as_deref(), Some("twitter"));
        assert_eq!(site_identifier("en.m.wikipedia.org").as_deref(), Some("wikipedia"));
        assert_eq!(site_identifier("old.reddit.com").as_deref(), Some("reddit"));
    }

    #[test]
    fn test_site_identifier_generic_second_level() {
        assert_eq!(site_identifier("bbc.co.uk").as_deref(), Some("bbc"));
        assert_eq!(site_identifier("www.amazon.co.jp").as_deref(), Some("amazon"));
        assert_eq!(site_identifier("news.ycombinator.com").as_deref(), Some("ycombinator"));
    }

    #[test]
    fn test_site_identifier_short_hosts() {
        assert_eq!(site_identifier("x.com").as_deref(), Some("x"));
        assert_eq!(site_identifier("fb.com").as_deref(), Some("fb"));
        assert_eq!(site_identifier("localhost").as_deref(), Some("localhost"));
        assert_eq!(site_identifier("127.0.0.1"), None);
        assert_eq!(site_identifier(""), None);
    }

    #[test]
    fn test_lookup_known_favicon() {
        let yt = lookup_known_favicon("https://youtube.com/watch?v=x");
        assert_eq!(yt, Some("https://www.youtube.com/s/desktop/favicon.ico"));
        assert_eq!(lookup_known_favicon("https://youtu.be/abc"), yt);
        assert!(lookup_known_favicon("https://www.reddit.com/r/rust").is_some());
        assert!(lookup_known_favicon("https://gist.github.com/a/b").is_some());
    }

    #[test]
    fn test_lookup_misses() {
        assert_eq!(lookup_known_favicon("https://example.com/page"), None);
        assert_eq!(lookup_known_favicon("http://127.0.0.1:8080/"), None);
        assert_eq!(lookup_known_favicon("not a url"), None);
    }
}
