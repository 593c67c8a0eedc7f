// ── News extraction ────────────────────────────────────────────────────────
// Pure HTML → article rows. Item selectors are probed in order of
// specificity and the first one that matches anything wins; within an item
// the title, body and link are probed the same way. Items without a title
// are dropped. Relative links are resolved against the page URL.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::store::news::NewsArticle;

/// Item containers, most specific first.
const ITEM_SELECTORS: &[&str] = &[
    "article",
    "li.news_list_item",
    "div.news-item",
    "div.post",
    "li.post",
    "div.entry",
];

const TITLE_SELECTORS: &[&str] = &["h1", "h2", "h3", ".title", "a"];
const BODY_SELECTORS: &[&str] = &["p", ".summary", ".excerpt", ".description"];

const MAX_ARTICLES_PER_PAGE: usize = 20;

fn first_match<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(element) = scope.select(&selector).next() {
            return Some(element);
        }
    }
    None
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_link(scope: ElementRef<'_>, base_url: &str) -> String {
    let href = if scope.value().name() == "a" {
        scope.value().attr("href")
    } else {
        let anchor = Selector::parse("a").ok();
        anchor
            .as_ref()
            .and_then(|sel| scope.select(sel).next())
            .and_then(|a| a.value().attr("href"))
    };
    let Some(href) = href else {
        return base_url.to_string();
    };
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(absolute) => absolute.to_string(),
        Err(_) => base_url.to_string(),
    }
}

/// Extract article rows from one listing page.
pub fn parse_articles(html: &str, base_url: &str) -> Vec<NewsArticle> {
    let document = Html::parse_document(html);

    let mut items: Vec<ElementRef<'_>> = Vec::new();
    for raw in ITEM_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else { continue };
        items = document.select(&selector).collect();
        if !items.is_empty() {
            break;
        }
    }

    let mut articles = Vec::new();
    for item in items.into_iter().take(MAX_ARTICLES_PER_PAGE) {
        let Some(title_el) = first_match(item, TITLE_SELECTORS) else { continue };
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }
        let content = first_match(item, BODY_SELECTORS)
            .map(element_text)
            .unwrap_or_default();
        articles.push(NewsArticle {
            title,
            content,
            url: resolve_link(item, base_url),
        });
    }
    articles
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_articles_with_relative_links() {
        let html = r#"
            <html><body>
              <article>
                <h2>新曲カバー公開</h2>
                <p>本日プレミア公開します。</p>
                <a href="/news/123/">続きを読む</a>
              </article>
              <article>
                <h2>3D Live announced</h2>
                <p>Tickets on sale now.</p>
                <a href="https://other.example/live">link</a>
              </article>
            </body></html>"#;
        let articles = parse_articles(html, "https://hololive.hololivepro.com/news/");
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "新曲カバー公開");
        assert_eq!(articles[0].content, "本日プレミア公開します。");
        assert_eq!(articles[0].url, "https://hololive.hololivepro.com/news/123/");
        assert_eq!(articles[1].url, "https://other.example/live");
    }

    #[test]
    fn falls_back_through_item_selectors() {
        // No <article> elements; the div.news-item probe should pick these up.
        let html = r#"
            <div class="news-item"><h3>Fallback title</h3><p>body</p></div>
            <div class="news-item"><h3>Second</h3></div>"#;
        let articles = parse_articles(html, "https://example.com/");
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Fallback title");
        // No body paragraph on the second item
        assert_eq!(articles[1].content, "");
        // No anchor — link falls back to the page itself
        assert_eq!(articles[1].url, "https://example.com/");
    }

    #[test]
    fn untitled_items_are_dropped() {
        let html = r#"<article><span>decoration only</span></article>
                      <article><h2>Real</h2></article>"#;
        let articles = parse_articles(html, "https://example.com/");
        // The first article still has an <a>-less, heading-less body; the "a"
        // probe finds nothing, so it is dropped.
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Real");
    }

    #[test]
    fn page_cap_limits_output() {
        let mut html = String::new();
        for i in 0..40 {
            html.push_str(&format!("<article><h2>t{}</h2></article>", i));
        }
        assert_eq!(parse_articles(&html, "https://example.com/").len(), 20);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let html = "<article><h2>  spread \n  out\t title </h2></article>";
        let articles = parse_articles(html, "https://example.com/");
        assert_eq!(articles[0].title, "spread out title");
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_articles("<html><body></body></html>", "https://example.com/").is_empty());
    }
}
