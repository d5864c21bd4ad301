//! Pure extraction of feed items from a document snapshot.

use feedlens_core::ExtractionError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const ARTICLE: &str = r#"article[data-testid="tweet"]"#;
const TWEET_TEXT: &str = r#"[data-testid="tweetText"]"#;
const USER_NAME: &str = r#"[data-testid="User-Name"]"#;
const USER_NAME_LINKS: &str = r#"[data-testid="User-Name"] a"#;
const STATUS_LINKS: &str = r#"a[href*="/status/"]"#;
const TIME: &str = "time";

/// Whole-article text shorter than this is not worth classifying.
const MIN_FALLBACK_LEN: usize = 20;

/// One `article` element as found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub text: Option<String>,
    pub author: Option<String>,
    pub is_retweet: bool,
    pub status_id: Option<String>,
}

pub struct FeedSelectors {
    article: Selector,
    tweet_text: Selector,
    user_name: Selector,
    user_name_links: Selector,
    status_links: Selector,
    time: Selector,
    status_id: Regex,
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::InvalidSelector {
        selector: css.to_string(),
    })
}

impl FeedSelectors {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            article: selector(ARTICLE)?,
            tweet_text: selector(TWEET_TEXT)?,
            user_name: selector(USER_NAME)?,
            user_name_links: selector(USER_NAME_LINKS)?,
            status_links: selector(STATUS_LINKS)?,
            time: selector(TIME)?,
            status_id: Regex::new(r"/status/(\d+)").map_err(|_| {
                ExtractionError::InvalidSelector {
                    selector: "/status/(\\d+)".to_string(),
                }
            })?,
        })
    }

    /// Parses every feed item in document order.
    pub fn parse(&self, html: &str, fallback_len: usize) -> Vec<FeedItem> {
        let document = Html::parse_document(html);
        document
            .select(&self.article)
            .map(|article| FeedItem {
                text: self.text(&article, fallback_len),
                author: self.author(&article),
                is_retweet: is_repost(&article),
                status_id: self.status_id(&article),
            })
            .collect()
    }

    fn text(&self, article: &ElementRef, fallback_len: usize) -> Option<String> {
        if let Some(text_el) = article.select(&self.tweet_text).next() {
            return Some(text_el.text().collect::<String>().trim().to_string());
        }

        article.select(&self.user_name).next()?;
        let all = rendered_text(article);
        if all.chars().count() > MIN_FALLBACK_LEN {
            let head: String = all.chars().take(fallback_len).collect();
            return Some(head.trim().to_string());
        }
        None
    }

    fn author(&self, article: &ElementRef) -> Option<String> {
        article
            .select(&self.user_name_links)
            .filter_map(|link| link.value().attr("href"))
            .find(|href| href.starts_with('/') && !href.contains("/status/"))
            .map(|href| href[1..].to_string())
    }

    fn status_id(&self, article: &ElementRef) -> Option<String> {
        let from_links = article
            .select(&self.status_links)
            .filter_map(|link| link.value().attr("href"))
            .find_map(|href| self.id_from_href(href));
        if from_links.is_some() {
            return from_links;
        }

        let time = article.select(&self.time).next()?;
        let link = closest_anchor(&time)?;
        self.id_from_href(link.value().attr("href")?)
    }

    fn id_from_href(&self, href: &str) -> Option<String> {
        self.status_id
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Text nodes joined by single spaces.
fn rendered_text(element: &ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn is_repost(article: &ElementRef) -> bool {
    let text = rendered_text(article).to_lowercase();
    text.contains("retweeted") || text.contains(" reposted")
}

fn closest_anchor<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut current = Some(**element);
    while let Some(node) = current {
        if let Some(el) = ElementRef::wrap(node) {
            if el.value().name() == "a" {
                return Some(el);
            }
        }
        current = node.parent();
    }
    None
}

pub fn is_results_page(url: &str) -> bool {
    url.contains("/search?") || url.contains("/search/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Vec<FeedItem> {
        FeedSelectors::new().unwrap().parse(html, 500)
    }

    #[test]
    fn test_extracts_text_author_and_id() {
        let items = parse(
            r#"<article data-testid="tweet">
                <div data-testid="User-Name">
                  <a href="/alice">Alice</a>
                  <a href="/alice/status/123456">2h</a>
                </div>
                <div data-testid="tweetText"><span>Hello </span><span>world</span></div>
              </article>"#,
        );

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text.as_deref(), Some("Hello world"));
        assert_eq!(items[0].author.as_deref(), Some("alice"));
        assert_eq!(items[0].status_id.as_deref(), Some("123456"));
        assert!(!items[0].is_retweet);
    }

    #[test]
    fn test_author_skips_status_links() {
        let items = parse(
            r#"<article data-testid="tweet">
                <div data-testid="User-Name"><a href="/bob/status/9">x</a><a href="/bob">Bob</a></div>
                <div data-testid="tweetText">hi</div>
              </article>"#,
        );
        assert_eq!(items[0].author.as_deref(), Some("bob"));
    }

    #[test]
    fn test_fallback_text_requires_user_name_and_length() {
        let items = parse(
            r#"<article data-testid="tweet">
                <div data-testid="User-Name"><a href="/carol">Carol</a></div>
                <p>no dedicated text node here but enough words</p>
              </article>
              <article data-testid="tweet"><p>an article without any user name block</p></article>
              <article data-testid="tweet"><div data-testid="User-Name">short</div></article>"#,
        );

        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0].text.as_deref(),
            Some("Carol no dedicated text node here but enough words")
        );
        assert!(items[1].text.is_none());
        assert!(items[2].text.is_none());
    }

    #[test]
    fn test_fallback_text_is_truncated() {
        let body = "word ".repeat(200);
        let html = format!(
            r#"<article data-testid="tweet"><div data-testid="User-Name">Dan</div><p>{body}</p></article>"#
        );
        let items = FeedSelectors::new().unwrap().parse(&html, 30);
        assert!(items[0].text.as_ref().unwrap().chars().count() <= 30);
    }

    #[test]
    fn test_repost_marker() {
        let items = parse(
            r#"<article data-testid="tweet"><span>Erin reposted</span><div data-testid="tweetText">a</div></article>
              <article data-testid="tweet"><span>Frank Retweeted</span><div data-testid="tweetText">b</div></article>
              <article data-testid="tweet"><span>unreposted</span><div data-testid="tweetText">c</div></article>"#,
        );
        assert!(items[0].is_retweet);
        assert!(items[1].is_retweet);
        assert!(!items[2].is_retweet);
    }

    #[test]
    fn test_status_id_from_time_link() {
        let items = parse(
            r#"<article data-testid="tweet">
                <a href="/gina/status/abc"><time datetime="2024-01-01">Jan 1</time></a>
                <div data-testid="tweetText">text</div>
              </article>"#,
        );
        assert!(items[0].status_id.is_none());

        let items = parse(
            r#"<article data-testid="tweet">
                <a href="/i/web/status/777?s=20"><time>now</time></a>
                <div data-testid="tweetText">text</div>
              </article>"#,
        );
        assert_eq!(items[0].status_id.as_deref(), Some("777"));
    }

    #[test]
    fn test_results_page_detection() {
        assert!(is_results_page("https://x.com/search?q=rust"));
        assert!(is_results_page("https://x.com/search/live"));
        assert!(!is_results_page("https://x.com/home"));
    }
}
