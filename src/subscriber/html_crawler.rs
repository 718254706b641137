use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::Level;

use super::util::is_of_content_type;
use super::{Decision, Subscriber, SubscriberLogger};
use crate::error::Result;
use crate::escargot::CrawlContext;
use crate::transport::{Chunk, Response};
use crate::uri::{is_http, normalize_uri, CrawlUri};

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid CSS selector: a[href]"));

/// Follows `<a href>` links of HTML pages
///
/// Never forces a request or a body download on its own; when another
/// subscriber does, links of `text/html` responses are added to the queue one
/// level below the page.
#[derive(Debug, Clone)]
pub struct HtmlCrawlerSubscriber {
    logger: SubscriberLogger,
}

impl HtmlCrawlerSubscriber {
    /// Tag for links with `rel="nofollow"`
    pub const TAG_REL_NOFOLLOW: &'static str = "rel-nofollow";

    /// Tag for links whose `type` attribute is something other than `text/html`
    pub const TAG_NO_TEXT_HTML_TYPE: &'static str = "no-txt-html-type";

    pub fn new() -> Self {
        Self {
            logger: SubscriberLogger::new("HtmlCrawlerSubscriber"),
        }
    }
}

impl Default for HtmlCrawlerSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

struct Link {
    href: String,
    nofollow: bool,
    non_html_type: bool,
}

fn extract_links(html: &str) -> Vec<Link> {
    let document = Html::parse_document(html);

    document
        .select(&LINK_SELECTOR)
        .filter_map(|element| {
            let attrs = element.value();
            Some(Link {
                href: attrs.attr("href")?.trim().to_string(),
                nofollow: attrs.attr("rel").is_some_and(|rel| rel.contains("nofollow")),
                non_html_type: attrs.attr("type").is_some_and(|t| t != "text/html"),
            })
        })
        .collect()
}

impl Subscriber for HtmlCrawlerSubscriber {
    fn should_request(&mut self, _ctx: &CrawlContext, _crawl_uri: &mut CrawlUri) -> Result<Decision> {
        Ok(Decision::Abstain)
    }

    fn needs_content(
        &mut self,
        _ctx: &CrawlContext,
        _crawl_uri: &mut CrawlUri,
        response: &Response,
        _chunk: &Chunk,
    ) -> Result<Decision> {
        if !is_of_content_type(response, "text/html")? {
            return Ok(Decision::Negative);
        }

        Ok(Decision::Abstain)
    }

    fn on_last_chunk(
        &mut self,
        ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        response: &Response,
        _chunk: &Chunk,
    ) -> Result<()> {
        if ctx.is_max_depth_reached(crawl_uri) {
            self.logger.log_with_crawl_uri(
                crawl_uri,
                Level::DEBUG,
                "Did not extract links because the maximum depth is reached.",
            );
            return Ok(());
        }

        let links = extract_links(&response.text()?);
        let page = response.url();

        for link in links {
            let target = match page.join(&link.href) {
                Ok(target) if is_http(&target) => normalize_uri(target),
                Ok(_) => continue,
                Err(_) => {
                    self.logger.log_with_crawl_uri(
                        crawl_uri,
                        Level::DEBUG,
                        &format!(
                            "Could not add \"{}\" to the queue because the link is invalid.",
                            link.href
                        ),
                    );
                    continue;
                }
            };

            let mut discovered = ctx.add_uri_to_queue(target, crawl_uri, false)?;

            let mut tagged = false;
            if link.nofollow && !discovered.has_tag(Self::TAG_REL_NOFOLLOW) {
                discovered.add_tag(Self::TAG_REL_NOFOLLOW)?;
                tagged = true;
            }
            if link.non_html_type && !discovered.has_tag(Self::TAG_NO_TEXT_HTML_TYPE) {
                discovered.add_tag(Self::TAG_NO_TEXT_HTML_TYPE)?;
                tagged = true;
            }
            if tagged {
                ctx.update_crawl_uri(&discovered)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_links() {
        let links = extract_links(
            r#"<html><body>
                <a href="/a">A</a>
                <a href=" b ">B</a>
                <a>no href</a>
                <a href="/c" rel="external nofollow">C</a>
                <a href="/d" type="application/pdf">D</a>
                <a href="/e" type="text/html">E</a>
            </body></html>"#,
        );

        let hrefs: Vec<_> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, ["/a", "b", "/c", "/d", "/e"]);
        assert!(links[2].nofollow);
        assert!(!links[0].nofollow);
        assert!(links[3].non_html_type);
        assert!(!links[4].non_html_type);
    }
}
