//! End-to-end tests for the recovering middleware.
//!
//! Each test spawns a real listener so panics unwind through the full
//! hyper/tokio stack before the middleware catches them.

mod helpers;

use async_trait::async_trait;
use http::{Request, StatusCode};
use hyper::body::Incoming;
use std::sync::Arc;

use recoverer::config::{Mode, RecovererConfig};
use recoverer::handler::Handler;
use recoverer::response::ResponseSink;

/// Writes a fixed body and returns without setting a status.
struct WritesBody(&'static str);

#[async_trait]
impl Handler for WritesBody {
    async fn handle(&self, _req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        res.write_body(self.0.as_bytes());
    }
}

/// Sets an explicit status before writing.
struct WritesStatusAndBody(StatusCode, &'static str);

#[async_trait]
impl Handler for WritesStatusAndBody {
    async fn handle(&self, _req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        res.set_status(self.0);
        res.write_body(self.1.as_bytes());
    }
}

/// Panics before writing anything.
struct FaultsImmediately;

#[async_trait]
impl Handler for FaultsImmediately {
    async fn handle(&self, _req: Request<Incoming>, _res: &mut (dyn ResponseSink + Send)) {
        deeply_nested_fault();
    }
}

/// Writes a partial body, then panics.
struct FaultsAfterPartialWrite;

#[async_trait]
impl Handler for FaultsAfterPartialWrite {
    async fn handle(&self, _req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        res.write_body(b"partial");
        deeply_nested_fault();
    }
}

fn deeply_nested_fault() {
    fn innermost() {
        panic!("Oh no!");
    }
    innermost();
}

#[tokio::test]
async fn test_happy_path_is_transparent() {
    let addr = helpers::spawn_server(
        Arc::new(WritesBody("<h1>Hello!</h1>")),
        RecovererConfig::default(),
    )
    .await;

    let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK.as_u16());
    assert_eq!(response.text().await.unwrap(), "<h1>Hello!</h1>");
}

#[tokio::test]
async fn test_happy_path_preserves_handler_status() {
    let addr = helpers::spawn_server(
        Arc::new(WritesStatusAndBody(StatusCode::CREATED, "created")),
        RecovererConfig::default(),
    )
    .await;

    let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED.as_u16());
    assert_eq!(response.text().await.unwrap(), "created");
}

#[tokio::test]
async fn test_production_fault_yields_generic_message() {
    let addr = helpers::spawn_server(
        Arc::new(FaultsImmediately),
        RecovererConfig::for_mode(Mode::Production),
    )
    .await;

    let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::INTERNAL_SERVER_ERROR.as_u16()
    );
    let body = response.text().await.unwrap();
    assert_eq!(body, "Something went wrong");
}

#[tokio::test]
async fn test_development_fault_renders_diagnostics() {
    let addr = helpers::spawn_server(
        Arc::new(FaultsImmediately),
        RecovererConfig::for_mode(Mode::Development),
    )
    .await;

    let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::INTERNAL_SERVER_ERROR.as_u16()
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("Oh no!"), "fault text missing: {body}");
    assert!(
        body.contains(r#"<a href="/debug/?path="#),
        "no source-viewer links in: {body}"
    );
    assert!(body.contains("<pre>"));
}

#[tokio::test]
async fn test_partial_output_is_never_observed() {
    let addr = helpers::spawn_server(
        Arc::new(FaultsAfterPartialWrite),
        RecovererConfig::for_mode(Mode::Production),
    )
    .await;

    let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::INTERNAL_SERVER_ERROR.as_u16()
    );
    let body = response.text().await.unwrap();
    assert!(!body.contains("partial"));
    assert_eq!(body, "Something went wrong");
}

#[tokio::test]
async fn test_custom_status_and_message_are_honored() {
    let config = RecovererConfig {
        status_code: StatusCode::SERVICE_UNAVAILABLE,
        message: "temporarily unavailable".to_string(),
        diagnostics: false,
    };
    let addr = helpers::spawn_server(Arc::new(FaultsImmediately), config).await;

    let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::SERVICE_UNAVAILABLE.as_u16()
    );
    assert_eq!(response.text().await.unwrap(), "temporarily unavailable");
}

#[tokio::test]
async fn test_identical_configurations_yield_identical_shape() {
    // Two independently constructed middlewares around the same handler and
    // mode; independent requests to each must agree on status and on whether
    // diagnostic content is present.
    let first_addr = helpers::spawn_server(
        Arc::new(FaultsImmediately),
        RecovererConfig::for_mode(Mode::Development),
    )
    .await;
    let second_addr = helpers::spawn_server(
        Arc::new(FaultsImmediately),
        RecovererConfig::for_mode(Mode::Development),
    )
    .await;

    let first = reqwest::get(helpers::url(first_addr, "/")).await.unwrap();
    let first_status = first.status();
    let first_body = first.text().await.unwrap();

    let second = reqwest::get(helpers::url(second_addr, "/")).await.unwrap();
    let second_status = second.status();
    let second_body = second.text().await.unwrap();

    assert_eq!(first_status, second_status);
    assert!(first_body.contains("Oh no!") && second_body.contains("Oh no!"));
    assert_eq!(
        first_body.contains(r#"<a href="/debug/?path="#),
        second_body.contains(r#"<a href="/debug/?path="#)
    );
}

#[tokio::test]
async fn test_server_survives_a_fault_and_keeps_serving() {
    let addr = helpers::spawn_server(
        Arc::new(FaultsImmediately),
        RecovererConfig::for_mode(Mode::Production),
    )
    .await;

    for _ in 0..3 {
        let response = reqwest::get(helpers::url(addr, "/")).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR.as_u16()
        );
    }
}
