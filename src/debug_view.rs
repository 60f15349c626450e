//! Source viewer for diagnostic stack-frame links.
//!
//! Serves `GET /debug/?path=<file>&line=<n>`: the named file rendered as
//! numbered, HTML-escaped lines with the requested line highlighted. This
//! is the target of every anchor the diagnostic fault page generates.

use async_trait::async_trait;
use http::{Request, StatusCode};
use hyper::body::Incoming;
use std::fmt::Write as _;
use tracing::warn;
use url::form_urlencoded;

use crate::handler::Handler;
use crate::response::{respond, ResponseSink};

/// Handler rendering a line-highlighted view of a source file.
pub struct SourceView;

#[async_trait]
impl Handler for SourceView {
    async fn handle(&self, req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        let query = req.uri().query().unwrap_or("");
        let mut path = None;
        let mut line = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "path" => path = Some(value.into_owned()),
                "line" => line = Some(value.into_owned()),
                _ => {}
            }
        }

        let Some(path) = path else {
            respond(res, StatusCode::NOT_FOUND, "missing path query param");
            return;
        };
        let Some(line) = line else {
            respond(res, StatusCode::NOT_FOUND, "missing line query param");
            return;
        };
        let line: usize = match line.parse() {
            Ok(n) => n,
            Err(_) => {
                respond(res, StatusCode::BAD_REQUEST, "line is not a number");
                return;
            }
        };

        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %path, error = %e, "source file unreadable");
                respond(res, StatusCode::NOT_FOUND, "cannot read file");
                return;
            }
        };

        res.set_status(StatusCode::OK);
        res.write_body(render_source(&path, &source, line).as_bytes());
    }
}

/// Render `source` as an HTML page with `highlight` (1-based) marked.
fn render_source(path: &str, source: &str, highlight: usize) -> String {
    let mut out = String::with_capacity(source.len() * 2);
    out.push_str("<!DOCTYPE html>\n<html><head>\n");
    let _ = writeln!(out, "<title>{}</title>", htmlescape::encode_minimal(path));
    out.push_str(
        "<style>\n\
         pre { font-family: monospace; line-height: 1.4; }\n\
         .ln { color: #999; }\n\
         .hl { background: #fdf2b2; display: inline-block; width: 100%; }\n\
         </style>\n</head><body>\n<pre>\n",
    );
    for (idx, text) in source.lines().enumerate() {
        let number = idx + 1;
        let escaped = htmlescape::encode_minimal(text);
        if number == highlight {
            let _ = writeln!(
                out,
                r#"<span class="hl"><span class="ln">{number:>5}</span> {escaped}</span>"#
            );
        } else {
            let _ = writeln!(out, r#"<span class="ln">{number:>5}</span> {escaped}"#);
        }
    }
    out.push_str("</pre>\n</body></html>\n");
    out
}
