//! The recovering middleware.
//!
//! Wraps a [`Handler`] and supervises every invocation: the handler writes
//! into a fresh [`ResponseBuffer`], and the buffered output reaches the
//! client only if the handler returns without panicking. A panic at any
//! depth inside the handler is caught at this one boundary, logged with its
//! stack snapshot, and answered with the configured fault response instead
//! of whatever the handler managed to write first.
//!
//! A fault inside the recovery path itself is not protected; that path is
//! plain string formatting and two log calls.

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::FutureExt;
use http::{header, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use tower::Service;
use tracing::error;

use crate::config::RecovererConfig;
use crate::handler::Handler;
use crate::response::ResponseBuffer;
use crate::stack;

/// Panic-recovering wrapper around a downstream [`Handler`].
///
/// Construction fixes the fault status code, the generic client message,
/// and the diagnostics flag; the same read-only configuration serves every
/// concurrent request.
#[derive(Clone)]
pub struct Recoverer {
    status_code: StatusCode,
    message: String,
    handler: Arc<dyn Handler>,
    diagnostics: bool,
}

impl Recoverer {
    /// Wrap `handler` with the given configuration.
    ///
    /// Also installs the stack-capture panic hook (idempotent), so faults
    /// caught later carry a snapshot of their fault site.
    pub fn new(handler: Arc<dyn Handler>, config: RecovererConfig) -> Self {
        stack::install_capture_hook();
        Self {
            status_code: config.status_code,
            message: config.message,
            handler,
            diagnostics: config.diagnostics,
        }
    }

    /// Handle one request under panic supervision.
    pub async fn serve(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let mut buffer = ResponseBuffer::new();

        // AssertUnwindSafe: the only state the future touches across the
        // catch boundary is `buffer`, and the fault path below never reads
        // it again, so a half-written buffer is unobservable.
        let outcome = AssertUnwindSafe(self.handler.handle(req, &mut buffer))
            .catch_unwind()
            .await;

        match outcome {
            Ok(()) => buffer.into_response(),
            // Partial writes die with the buffer.
            Err(payload) => self.recovered_response(payload),
        }
    }

    /// Build the client response for a caught fault.
    fn recovered_response(&self, payload: Box<dyn Any + Send>) -> Response<Full<Bytes>> {
        let fault = fault_text(payload.as_ref());
        let snapshot = stack::take_snapshot().unwrap_or_else(stack::capture);

        // Operator log lines, emitted regardless of mode.
        error!(fault = %fault, "recovered from handler panic");
        error!(stack = %snapshot, "fault stack snapshot");

        let body = if self.diagnostics {
            render_diagnostic_page(&fault, &snapshot)
        } else {
            self.message.clone()
        };

        Response::builder()
            .status(self.status_code)
            .header(header::CONTENT_TYPE, "text/html")
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }
}

impl Service<Request<Incoming>> for Recoverer {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Incoming>) -> Self::Future {
        let recoverer = self.clone();
        Box::pin(async move { Ok(recoverer.serve(req).await) })
    }
}

/// Extract displayable text from an opaque panic payload.
fn fault_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Render the diagnostic HTML page: fault text plus the stack snapshot with
/// every frame location turned into a source-viewer link.
fn render_diagnostic_page(fault: &str, snapshot: &str) -> String {
    let stack_html = stack::link_frames(&htmlescape::encode_minimal(snapshot));
    format!(
        "<h1>Uh oh!</h1><h3>Error</h3>{}\n\n<h3>Stack trace</h3><pre>{}</pre>",
        htmlescape::encode_minimal(fault),
        stack_html
    )
}
