use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use super::decisions::Phase;
use super::{Escargot, Exchange};
use crate::error::{Error, Result};
use crate::subscriber::Decision;
use crate::transport::{Chunk, ResponseEvent, ResponseHead, ResponseStream};
use crate::uri::is_http;
use crate::utils::error::{HttpError, TransportError};

const SOURCE: &str = "Escargot";

type NextEvent = BoxFuture<'static, (String, Option<std::result::Result<ResponseEvent, TransportError>>, ResponseStream)>;

fn next_event(key: String, mut stream: ResponseStream) -> NextEvent {
    async move {
        let event = stream.next().await;
        (key, event, stream)
    }
    .boxed()
}

/// A failed exchange on its way to the exception subscribers
enum Failure {
    Transport(TransportError),
    Http(HttpError),
}

impl Failure {
    /// Split exchange failures from errors that abort the crawl
    fn from_error(err: Error) -> Result<Self> {
        match err {
            Error::Transport(e) => Ok(Self::Transport(e)),
            Error::Http(e) => Ok(Self::Http(e)),
            other => Err(other),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Transport(e) => format!("Exception of type \"TransportError\" occurred: {e}"),
            Self::Http(e) => format!("Exception of type \"HttpError\" occurred: {e}"),
        }
    }
}

impl Escargot {
    /// Crawl until the queue is exhausted or a budget is hit
    ///
    /// Transport and HTTP failures are handed to exception subscribers and
    /// never end the crawl. Queue errors and other subscriber errors do.
    pub async fn crawl(&mut self) -> Result<()> {
        self.started_at = Some(self.clock.now());

        loop {
            let started = self.prepare_responses().await?;

            if started.is_empty() && self.running_requests.is_empty() {
                break;
            }

            self.process_responses(started).await?;
        }

        tracing::debug!(
            source = SOURCE,
            job_id = %self.context.job_id,
            "Finished crawling! Sent {} request(s).",
            self.requests_sent
        );

        for subscriber in self.subscribers.iter_mut().filter(|s| s.handles_finished) {
            let span = tracing::debug_span!("subscriber", source = %subscriber.name);
            let _enter = span.enter();

            if let Some(finished) = subscriber.inner.as_finished_subscriber() {
                finished.finished_crawling(&self.context)?;
            }
        }

        Ok(())
    }

    /// Start as many requests as budgets and concurrency allow
    async fn prepare_responses(&mut self) -> Result<Vec<(String, ResponseStream)>> {
        let mut started = Vec::new();

        loop {
            if self.is_max_requests_reached() || self.is_max_duration_reached() {
                tracing::debug!(
                    source = SOURCE,
                    requests_sent = self.requests_sent,
                    "Stopped starting requests because a crawl budget is exhausted."
                );
                break;
            }

            if self.is_max_concurrency_reached() {
                break;
            }

            let Some(mut crawl_uri) = self.context.queue.get_next(&self.context.job_id, 0)? else {
                break;
            };

            if crawl_uri.is_processed() {
                continue;
            }

            crawl_uri.mark_processed();
            self.context.queue.add(&self.context.job_id, &crawl_uri)?;

            if !is_http(crawl_uri.uri()) {
                tracing::debug!(
                    source = SOURCE,
                    crawl_uri = %crawl_uri,
                    "Skipped because it's not a valid http(s) URI."
                );
                continue;
            }

            let key = crawl_uri.uri().to_string();
            let mut votes = Vec::with_capacity(self.subscribers.len());
            let mut failed = None;

            for (idx, subscriber) in self.subscribers.iter_mut().enumerate() {
                let span = tracing::debug_span!("subscriber", source = %subscriber.name);
                let _enter = span.enter();

                match subscriber.inner.should_request(&self.context, &mut crawl_uri) {
                    Ok(decision) => {
                        self.decisions.record(&key, idx, Phase::ShouldRequest, decision);
                        votes.push(decision);
                    }
                    Err(err) => {
                        failed = Some(err);
                        break;
                    }
                }
            }

            if let Some(err) = failed {
                let failure = Failure::from_error(err)?;
                self.handle_exception(&key, Exchange::new(crawl_uri), failure, None)?;
                continue;
            }

            if !Decision::reduce(votes).is_positive() {
                self.decisions.forget(&key);
                self.context.queue.add(&self.context.job_id, &crawl_uri)?;
                continue;
            }

            let delay = self.config.request_delay();
            if !delay.is_zero() {
                self.clock.sleep(delay).await;
            }

            let transport = self.transport()?;
            match transport.request(crawl_uri.uri()) {
                Ok(stream) => {
                    if self.running_requests.insert(key.clone()) {
                        self.requests_sent += 1;
                    }
                    tracing::trace!(source = SOURCE, crawl_uri = %crawl_uri, "Started request");
                    self.exchanges.insert(key.clone(), Exchange::new(crawl_uri));
                    started.push((key, stream));
                }
                Err(err) => {
                    self.handle_exception(&key, Exchange::new(crawl_uri), Failure::Transport(err), None)?;
                }
            }
        }

        Ok(started)
    }

    /// Drive the started exchanges until all of them finished
    async fn process_responses(&mut self, started: Vec<(String, ResponseStream)>) -> Result<()> {
        let mut pending: FuturesUnordered<NextEvent> = started
            .into_iter()
            .map(|(key, stream)| next_event(key, stream))
            .collect();

        while let Some((key, event, stream)) = pending.next().await {
            let Some(exchange) = self.exchanges.remove(&key) else {
                continue;
            };

            let open = match event {
                Some(Ok(ResponseEvent::Head(head))) => self.on_first_chunk(&key, exchange, head)?,
                Some(Ok(ResponseEvent::Body(bytes))) => {
                    let mut exchange = exchange;
                    exchange.response.append(&bytes);
                    self.exchanges.insert(key.clone(), exchange);
                    true
                }
                Some(Err(err)) => {
                    self.handle_exception(&key, exchange, Failure::Transport(err), None)?;
                    false
                }
                None if exchange.response.has_head() => {
                    self.on_last_chunk(&key, exchange)?;
                    false
                }
                None => {
                    let err = TransportError::Incomplete {
                        url: exchange.response.requested_url().to_string(),
                    };
                    self.handle_exception(&key, exchange, Failure::Transport(err), None)?;
                    false
                }
            };

            // Dropping the stream of a closed exchange cancels the request
            if open {
                pending.push(next_event(key, stream));
            }
        }

        Ok(())
    }

    /// Returns whether the body should be streamed
    fn on_first_chunk(&mut self, key: &str, mut exchange: Exchange, head: ResponseHead) -> Result<bool> {
        exchange.response.set_head(head);

        if exchange.response.redirect_count() > 0
            && self
                .context
                .queue
                .get(&self.context.job_id, exchange.response.url())?
                .is_some()
        {
            tracing::debug!(
                source = SOURCE,
                crawl_uri = %exchange.crawl_uri,
                "Skipped further response processing because crawler got redirected to an URI that's already been crawled."
            );
            self.finish(key, exchange)?;
            return Ok(false);
        }

        let chunk = Chunk::first();

        if let Err(err) = exchange.response.headers().map(|_| ()) {
            self.handle_exception(key, exchange, Failure::Http(err), Some(chunk))?;
            return Ok(false);
        }

        let mut votes = Vec::with_capacity(self.subscribers.len());
        let mut failed = None;

        for (idx, subscriber) in self.subscribers.iter_mut().enumerate() {
            if self.decisions.get(key, idx, Phase::ShouldRequest).is_negative() {
                continue;
            }

            let span = tracing::debug_span!("subscriber", source = %subscriber.name);
            let _enter = span.enter();

            match subscriber.inner.needs_content(
                &self.context,
                &mut exchange.crawl_uri,
                &exchange.response,
                &chunk,
            ) {
                Ok(decision) => {
                    self.decisions.record(key, idx, Phase::NeedsContent, decision);
                    votes.push(decision);
                }
                Err(err) => {
                    failed = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failed {
            let failure = Failure::from_error(err)?;
            self.handle_exception(key, exchange, failure, Some(chunk))?;
            return Ok(false);
        }

        if !Decision::reduce(votes).is_positive() {
            self.finish(key, exchange)?;
            return Ok(false);
        }

        self.exchanges.insert(key.to_string(), exchange);
        Ok(true)
    }

    fn on_last_chunk(&mut self, key: &str, mut exchange: Exchange) -> Result<()> {
        let chunk = Chunk::last();
        let mut failed = None;

        for (idx, subscriber) in self.subscribers.iter_mut().enumerate() {
            if self.decisions.get(key, idx, Phase::NeedsContent) == Decision::Negative {
                continue;
            }

            let span = tracing::debug_span!("subscriber", source = %subscriber.name);
            let _enter = span.enter();

            if let Err(err) = subscriber.inner.on_last_chunk(
                &self.context,
                &mut exchange.crawl_uri,
                &exchange.response,
                &chunk,
            ) {
                failed = Some(err);
                break;
            }
        }

        match failed {
            Some(err) => {
                let failure = Failure::from_error(err)?;
                self.handle_exception(key, exchange, failure, Some(chunk))
            }
            None => self.finish(key, exchange),
        }
    }

    /// Release the slot, write the entry back and forget its votes
    fn finish(&mut self, key: &str, exchange: Exchange) -> Result<()> {
        self.running_requests.remove(key);
        self.decisions.forget(key);
        self.context
            .queue
            .add(&self.context.job_id, &exchange.crawl_uri)?;
        Ok(())
    }

    fn handle_exception(
        &mut self,
        key: &str,
        mut exchange: Exchange,
        failure: Failure,
        chunk: Option<Chunk>,
    ) -> Result<()> {
        tracing::debug!(
            source = SOURCE,
            crawl_uri = %exchange.crawl_uri,
            "{}",
            failure.describe()
        );

        self.running_requests.remove(key);
        let chunk = chunk.unwrap_or_default();

        for (idx, subscriber) in self.subscribers.iter_mut().enumerate() {
            if !subscriber.handles_exceptions || self.decisions.opted_out(key, idx) {
                continue;
            }

            let span = tracing::debug_span!("subscriber", source = %subscriber.name);
            let _enter = span.enter();

            let Some(handler) = subscriber.inner.as_exception_subscriber() else {
                continue;
            };

            let result = match &failure {
                Failure::Transport(err) => handler.on_transport_exception(
                    &self.context,
                    &mut exchange.crawl_uri,
                    err,
                    &exchange.response,
                ),
                Failure::Http(err) => handler.on_http_exception(
                    &self.context,
                    &mut exchange.crawl_uri,
                    err,
                    &exchange.response,
                    &chunk,
                ),
            };

            match result {
                Ok(()) => {}
                Err(err) if err.is_exchange_failure() => {
                    tracing::warn!(error = %err, "Exception subscriber failed on an exchange error");
                }
                Err(err) => return Err(err),
            }
        }

        self.finish(key, exchange)
    }
}
