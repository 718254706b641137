//! Subscriber protocol
//!
//! Subscribers vote on every URI at two points of its exchange:
//!
//! ```text
//! should_request ──Positive from anyone──▶ request sent
//!                                              │ first chunk
//! needs_content ───Positive from anyone──▶ body streamed
//!                                              │ last chunk
//! on_last_chunk  (every subscriber that did not vote Negative)
//! ```
//!
//! A [`Decision::Positive`] forces the step for everybody. A
//! [`Decision::Negative`] only opts the voting subscriber out of the later
//! callbacks of the same exchange. Optional capabilities (exception handling,
//! end-of-crawl notification, tag value resolution) are probed once when a
//! subscriber is registered.

mod html_crawler;
mod logger;
pub mod util;

pub use html_crawler::HtmlCrawlerSubscriber;
pub use logger::SubscriberLogger;

use crate::error::Result;
use crate::escargot::CrawlContext;
use crate::transport::{Chunk, Response};
use crate::uri::CrawlUri;
use crate::utils::error::{HttpError, TransportError};

/// A subscriber's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    Positive,
    #[default]
    Abstain,
    Negative,
}

impl Decision {
    pub fn is_positive(self) -> bool {
        self == Self::Positive
    }

    pub fn is_negative(self) -> bool {
        self == Self::Negative
    }

    /// OR-reduce votes: positive iff any vote is positive
    ///
    /// Without a positive vote the result is negative only when every vote was
    /// negative, otherwise abstain. No votes at all abstain.
    pub fn reduce(decisions: impl IntoIterator<Item = Decision>) -> Decision {
        let mut all_negative = None;
        for decision in decisions {
            match decision {
                Self::Positive => return Self::Positive,
                Self::Negative => {
                    all_negative.get_or_insert(true);
                }
                Self::Abstain => all_negative = Some(false),
            }
        }

        match all_negative {
            Some(true) => Self::Negative,
            _ => Self::Abstain,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Positive => "positive",
            Self::Abstain => "abstain",
            Self::Negative => "negative",
        })
    }
}

/// Participant in the crawl
///
/// Callbacks may tag the [`CrawlUri`] they receive; the scheduler writes it
/// back to the queue when the exchange finishes. Returning an
/// [`Error::Http`](crate::Error::Http) or
/// [`Error::Transport`](crate::Error::Transport) sends the exchange down the
/// exception path, any other error aborts the crawl.
pub trait Subscriber: Send {
    /// Name stamped on log events as `source`
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Called once at registration, before any other callback
    fn attach(&mut self, _ctx: &CrawlContext) {}

    /// Vote on whether the URI is requested
    fn should_request(&mut self, ctx: &CrawlContext, crawl_uri: &mut CrawlUri) -> Result<Decision>;

    /// Vote on whether the body is streamed, called on the first chunk
    fn needs_content(
        &mut self,
        ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        response: &Response,
        chunk: &Chunk,
    ) -> Result<Decision>;

    /// Called once the body is complete
    fn on_last_chunk(
        &mut self,
        ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        response: &Response,
        chunk: &Chunk,
    ) -> Result<()>;

    fn as_exception_subscriber(&mut self) -> Option<&mut dyn ExceptionSubscriber> {
        None
    }

    fn as_finished_subscriber(&mut self) -> Option<&mut dyn FinishedCrawlingSubscriber> {
        None
    }

    fn as_tag_value_resolver(&self) -> Option<&dyn TagValueResolvingSubscriber> {
        None
    }
}

/// Receives failed exchanges
///
/// Not called when the subscriber voted Negative for the URI in either phase.
pub trait ExceptionSubscriber {
    fn on_transport_exception(
        &mut self,
        ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        error: &TransportError,
        response: &Response,
    ) -> Result<()>;

    fn on_http_exception(
        &mut self,
        ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        error: &HttpError,
        response: &Response,
        chunk: &Chunk,
    ) -> Result<()>;
}

/// Notified once when a crawl ends
pub trait FinishedCrawlingSubscriber {
    fn finished_crawling(&mut self, ctx: &CrawlContext) -> Result<()>;
}

/// Resolves values for tags it knows about
pub trait TagValueResolvingSubscriber {
    fn resolve_tag_value(&self, tag: &str) -> Option<serde_json::Value>;
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A subscriber with its capabilities probed at registration
pub(crate) struct RegisteredSubscriber {
    pub(crate) name: String,
    pub(crate) inner: Box<dyn Subscriber>,
    pub(crate) handles_exceptions: bool,
    pub(crate) handles_finished: bool,
    pub(crate) resolves_tags: bool,
}

impl RegisteredSubscriber {
    pub(crate) fn new(mut inner: Box<dyn Subscriber>) -> Self {
        let name = inner.name();
        let handles_exceptions = inner.as_exception_subscriber().is_some();
        let handles_finished = inner.as_finished_subscriber().is_some();
        let resolves_tags = inner.as_tag_value_resolver().is_some();

        Self {
            name,
            inner,
            handles_exceptions,
            handles_finished,
            resolves_tags,
        }
    }
}

impl std::fmt::Debug for RegisteredSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSubscriber")
            .field("name", &self.name)
            .field("handles_exceptions", &self.handles_exceptions)
            .field("handles_finished", &self.handles_finished)
            .field("resolves_tags", &self.resolves_tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Decision::{Abstain, Negative, Positive};

    #[test]
    fn test_reduce_is_or() {
        assert_eq!(Decision::reduce([Abstain, Positive, Negative]), Positive);
        assert_eq!(Decision::reduce([Negative, Positive]), Positive);
        assert_eq!(Decision::reduce([Abstain, Negative]), Abstain);
        assert_eq!(Decision::reduce([Negative, Negative]), Negative);
        assert_eq!(Decision::reduce([]), Abstain);
    }

    #[test]
    fn test_default_is_abstain() {
        assert_eq!(Decision::default(), Abstain);
        assert_eq!(Positive.to_string(), "positive");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(
            short_type_name("escargot::subscriber::HtmlCrawlerSubscriber"),
            "HtmlCrawlerSubscriber"
        );
        assert_eq!(short_type_name("my::Wrapper<other::Inner>"), "Wrapper");
    }

    struct Plain;

    impl Subscriber for Plain {
        fn should_request(&mut self, _: &CrawlContext, _: &mut CrawlUri) -> Result<Decision> {
            Ok(Positive)
        }

        fn needs_content(
            &mut self,
            _: &CrawlContext,
            _: &mut CrawlUri,
            _: &Response,
            _: &Chunk,
        ) -> Result<Decision> {
            Ok(Abstain)
        }

        fn on_last_chunk(
            &mut self,
            _: &CrawlContext,
            _: &mut CrawlUri,
            _: &Response,
            _: &Chunk,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_probes_capabilities() {
        let registered = RegisteredSubscriber::new(Box::new(Plain));
        assert_eq!(registered.name, "Plain");
        assert!(!registered.handles_exceptions);
        assert!(!registered.handles_finished);
        assert!(!registered.resolves_tags);

        let registered = RegisteredSubscriber::new(Box::new(HtmlCrawlerSubscriber::new()));
        assert_eq!(registered.name, "HtmlCrawlerSubscriber");
    }
}
