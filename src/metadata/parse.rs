use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static META: Lazy<Selector> = Lazy::new(|| selector("meta[content]"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("link[rel][href]"));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img[src]"));

/// Everything the extractors read from a page, pulled out in one pass.
///
/// `scraper::Html` is not `Send`, so the DOM is walked once here and dropped
/// before any extractor awaits a network call. Values are trimmed and empty
/// values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDocument {
    pub title: Option<String>,
    pub og_title: Option<String>,
    pub apple_touch_icon: Option<String>,
    pub icon: Option<String>,
    pub shortcut_icon: Option<String>,
    /// `<meta property="og:image">`
    pub og_image_property: Option<String>,
    /// `<meta name="og:image">`
    pub og_image_name: Option<String>,
    pub twitter_image: Option<String>,
    pub first_img: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn text_of(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<String>();
    non_empty(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn fill(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = non_empty(value);
    }
}

pub fn parse_html(html: &str) -> PageDocument {
    let document = Html::parse_document(html);
    let mut page = PageDocument {
        title: document.select(&TITLE).find_map(text_of),
        ..Default::default()
    };

    for element in document.select(&META) {
        let content = element.attr("content").unwrap_or_default();
        let property = element.attr("property").unwrap_or_default().trim();
        let name = element.attr("name").unwrap_or_default().trim();

        if property.eq_ignore_ascii_case("og:title") {
            fill(&mut page.og_title, content);
        }
        if property.eq_ignore_ascii_case("og:image") {
            fill(&mut page.og_image_property, content);
        }
        if name.eq_ignore_ascii_case("og:image") {
            fill(&mut page.og_image_name, content);
        }
        if name.eq_ignore_ascii_case("twitter:image")
            || property.eq_ignore_ascii_case("twitter:image")
        {
            fill(&mut page.twitter_image, content);
        }
    }

    for element in document.select(&LINK) {
        let href = element.attr("href").unwrap_or_default();
        let rel = element
            .attr("rel")
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        match rel.as_str() {
            "apple-touch-icon" => fill(&mut page.apple_touch_icon, href),
            "icon" => fill(&mut page.icon, href),
            "shortcut icon" => fill(&mut page.shortcut_icon, href),
            _ => {}
        }
    }

    page.first_img = document
        .select(&IMG)
        .next()
        .and_then(|img| img.attr("src"))
        .and_then(non_empty);

    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_candidates() {
        let page = parse_html(
            r#"<html><head>
                <title>
                    Example
                    Page
                </title>
                <meta property="og:title" content="OG Example">
                <meta property="og:image" content="/og.png">
                <meta name="og:image" content="/og-name.png">
                <meta name="twitter:image" content="https://cdn.example.com/tw.png">
                <link rel="apple-touch-icon" href="/apple.png">
                <link rel="icon" type="image/png" href="/icon.png">
                <link rel="Shortcut  Icon" href="/favicon.ico">
            </head><body><img src="/first.jpg"><img src="/second.jpg"></body></html>"#,
        );

        assert_eq!(page.title.as_deref(), Some("Example Page"));
        assert_eq!(page.og_title.as_deref(), Some("OG Example"));
        assert_eq!(page.og_image_property.as_deref(), Some("/og.png"));
        assert_eq!(page.og_image_name.as_deref(), Some("/og-name.png"));
        assert_eq!(
            page.twitter_image.as_deref(),
            Some("https://cdn.example.com/tw.png")
        );
        assert_eq!(page.apple_touch_icon.as_deref(), Some("/apple.png"));
        assert_eq!(page.icon.as_deref(), Some("/icon.png"));
        assert_eq!(page.shortcut_icon.as_deref(), Some("/favicon.ico"));
        assert_eq!(page.first_img.as_deref(), Some("/first.jpg"));
    }

    #[test]
    fn test_empty_values_are_absent() {
        let page = parse_html(
            r#"<html><head><title>   </title>
                <meta property="og:title" content="">
                <link rel="icon" href=" ">
            </head><body><img src=""></body></html>"#,
        );
        assert_eq!(page, PageDocument::default());
    }

    #[test]
    fn test_first_match_wins() {
        let page = parse_html(
            r#"<head>
                <link rel="icon" href="/a.png"><link rel="icon" href="/b.png">
                <meta property="og:image" content="/one.png">
                <meta property="og:image" content="/two.png">
            </head>"#,
        );
        assert_eq!(page.icon.as_deref(), Some("/a.png"));
        assert_eq!(page.og_image_property.as_deref(), Some("/one.png"));
    }

    #[test]
    fn test_garbage_input_yields_empty_document() {
        assert_eq!(parse_html("\u{0}<<<>>>not html"), PageDocument::default());
        assert_eq!(parse_html(""), PageDocument::default());
    }

    #[test]
    fn test_entities_decoded() {
        let page = parse_html("<title>Tom &amp; Jerry</title>");
        assert_eq!(page.title.as_deref(), Some("Tom & Jerry"));
    }
}
