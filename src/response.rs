//! Response buffering.
//!
//! Handlers never talk to the client connection directly. They write through
//! the [`ResponseSink`] capability, and the recovering middleware hands them
//! a [`ResponseBuffer`] that holds everything in memory. Status and body
//! reach the wire only when the buffer is flushed after the handler has
//! returned without panicking; a handler that faults mid-write leaves
//! nothing behind but a buffer that is dropped.

use bytes::{Bytes, BytesMut};
use http::{Response, StatusCode};
use http_body_util::Full;

/// Response-writing capability presented to downstream handlers.
///
/// Mirrors the contract of a real client connection with transmission
/// deferred: neither operation has an observable side effect until the
/// buffer holding the writes is flushed.
pub trait ResponseSink: Send {
    /// Record the status code to send. Last write wins.
    fn set_status(&mut self, status: StatusCode);

    /// Append body bytes, returning the number of bytes accepted.
    ///
    /// Always accepts the full chunk; nothing is transmitted yet, so there
    /// is no failure to report.
    fn write_body(&mut self, chunk: &[u8]) -> usize;
}

/// In-memory buffer for one request's response.
///
/// Exclusively owned by the request that created it. Flushing consumes the
/// buffer, so the single status + body write per request is enforced by
/// move semantics.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    body: BytesMut,
}

impl ResponseBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flush the buffered writes into the single response the client sees.
    ///
    /// A handler that never set a status gets `200 OK`.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        Response::builder()
            .status(self.status.unwrap_or(StatusCode::OK))
            .body(Full::new(self.body.freeze()))
            .unwrap()
    }
}

impl ResponseSink for ResponseBuffer {
    fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write_body(&mut self, chunk: &[u8]) -> usize {
        self.body.extend_from_slice(chunk);
        chunk.len()
    }
}

/// Write a status and a complete plain-text body in one step.
pub fn respond(sink: &mut (dyn ResponseSink + Send), status: StatusCode, body: &str) {
    sink.set_status(status);
    sink.write_body(body.as_bytes());
}
