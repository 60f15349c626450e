//! The downstream handler abstraction.

use async_trait::async_trait;
use http::Request;
use hyper::body::Incoming;

use crate::response::ResponseSink;

/// A request handler that writes its response through a [`ResponseSink`].
///
/// This is the single capability the recovering middleware supervises: any
/// type implementing `handle` can be wrapped, and anything it does to the
/// sink stays buffered until the middleware decides the handler finished
/// cleanly.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one request, writing status and body to `res`.
    async fn handle(&self, req: Request<Incoming>, res: &mut (dyn ResponseSink + Send));
}
