//! Path-prefix request multiplexer.

use async_trait::async_trait;
use http::{Request, StatusCode};
use hyper::body::Incoming;
use std::sync::Arc;

use crate::handler::Handler;
use crate::response::{respond, ResponseSink};

/// Routes requests to handlers by path pattern.
///
/// Patterns ending in `/` match their whole subtree; other patterns match
/// exactly. When several patterns match, the longest wins, so `/` acts as
/// the catch-all.
#[derive(Default)]
pub struct Mux {
    routes: Vec<(String, Arc<dyn Handler>)>,
}

impl Mux {
    /// Create an empty mux.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`.
    pub fn register(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) {
        self.routes.push((pattern.into(), handler));
    }

    fn route(&self, path: &str) -> Option<&Arc<dyn Handler>> {
        self.routes
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, path))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, handler)| handler)
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(stem) = pattern.strip_suffix('/') {
        path.starts_with(pattern) || path == stem
    } else {
        path == pattern
    }
}

#[async_trait]
impl Handler for Mux {
    async fn handle(&self, req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        match self.route(req.uri().path()) {
            Some(handler) => handler.handle(req, res).await,
            None => respond(res, StatusCode::NOT_FOUND, "404 page not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtree_pattern_matches_prefix() {
        assert!(pattern_matches("/panic/", "/panic/"));
        assert!(pattern_matches("/panic/", "/panic/deep/path"));
        assert!(pattern_matches("/panic/", "/panic"));
        assert!(!pattern_matches("/panic/", "/panicky"));
    }

    #[test]
    fn test_exact_pattern_requires_exact_path() {
        assert!(pattern_matches("/status", "/status"));
        assert!(!pattern_matches("/status", "/status/"));
        assert!(!pattern_matches("/status", "/status/extra"));
    }

    #[test]
    fn test_longest_pattern_wins() {
        struct Nop;

        #[async_trait]
        impl Handler for Nop {
            async fn handle(&self, _req: Request<Incoming>, _res: &mut (dyn ResponseSink + Send)) {}
        }

        let mut mux = Mux::new();
        mux.register("/", Arc::new(Nop));
        mux.register("/debug/", Arc::new(Nop));

        let root = mux.route("/anything").expect("catch-all should match");
        let debug = mux.route("/debug/view").expect("debug subtree should match");
        // Different registrations resolved: the catch-all and the subtree
        // handler are distinct Arcs.
        assert!(!Arc::ptr_eq(root, debug));
        assert!(mux.route("/debug/source").is_some());
    }
}
