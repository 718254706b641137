//! ReqwestTransport and full crawls against a wiremock server

mod common;

use std::sync::Arc;

use common::Recorder;
use escargot::prelude::*;
use escargot::transport::{ReqwestTransport, ResponseEvent, ResponseHead, Transport};
use escargot::utils::error::TransportError;
use futures::StreamExt;
use reqwest::StatusCode;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::with_user_agent("escargot-test/1.0").unwrap()
}

/// Split a finished stream into its head and concatenated body
async fn drain(
    transport: &ReqwestTransport,
    url: &str,
) -> (Option<ResponseHead>, Vec<u8>, Vec<TransportError>) {
    let mut stream = transport.request(&Url::parse(url).unwrap()).unwrap();
    let mut head = None;
    let mut body = Vec::new();
    let mut errors = Vec::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(ResponseEvent::Head(h)) => head = Some(h),
            Ok(ResponseEvent::Body(bytes)) => body.extend_from_slice(&bytes),
            Err(err) => errors.push(err),
        }
    }

    (head, body, errors)
}

#[tokio::test]
async fn test_streams_head_then_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>Hello</body></html>"),
        )
        .mount(&server)
        .await;

    let (head, body, errors) = drain(&transport(), &format!("{}/page", server.uri())).await;

    let head = head.expect("head event");
    assert_eq!(head.status, StatusCode::OK);
    assert_eq!(head.redirect_count, 0);
    assert_eq!(head.headers.get("content-type").unwrap(), "text/html");
    assert_eq!(body, b"<html><body>Hello</body></html>");
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_error_status_is_not_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (head, _, errors) = drain(&transport(), &format!("{}/missing", server.uri())).await;

    assert_eq!(head.unwrap().status, StatusCode::NOT_FOUND);
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let (head, body, _) = drain(&transport(), &format!("{}/old", server.uri())).await;

    let head = head.unwrap();
    assert_eq!(head.url.path(), "/new");
    assert_eq!(head.redirect_count, 1);
    assert_eq!(body, b"moved");
}

#[tokio::test]
async fn test_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "escargot-test/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (head, _, _) = drain(&transport(), &server.uri()).await;
    assert_eq!(head.unwrap().status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_connection_failure_is_reported_on_the_stream() {
    // Port 9 (discard) is closed on test machines
    let (head, _, errors) = drain(&transport(), "http://127.0.0.1:9/").await;

    assert!(head.is_none());
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_crawl_with_default_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(r#"<a href="/about">About</a><a href="/gone">Gone</a>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .and(header("user-agent", "escargot-crawl/1.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<p>About us</p>"),
        )
        .mount(&server)
        .await;

    let base_uris: BaseUriCollection = [Url::parse(&format!("{}/", server.uri())).unwrap()]
        .into_iter()
        .collect();
    let recorder = Recorder::positive("Recorder");

    let mut escargot = Escargot::create(base_uris, Arc::new(InMemoryQueue::new()))
        .unwrap()
        .with_user_agent("escargot-crawl/1.0")
        .unwrap()
        .with_subscriber(recorder.clone())
        .with_subscriber(HtmlCrawlerSubscriber::new());
    escargot.crawl().await.unwrap();

    assert_eq!(escargot.requests_sent(), 3);
    assert_eq!(escargot.queue().count_pending(escargot.job_id()).unwrap(), 0);

    let events = recorder.events();
    assert_eq!(events.last_chunk.len(), 2);
    assert_eq!(events.http_exceptions.len(), 1);
    assert!(events.http_exceptions[0].0.ends_with("/gone"));
    assert_eq!(events.http_exceptions[0].1, Some(404));
}
