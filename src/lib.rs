//! Recoverer - panic-recovering HTTP middleware with fault diagnostics.
//!
//! This library wraps any request handler so that a panic raised while
//! handling a request can never crash the server process or leak a partial
//! response. Handler output is buffered until the handler finishes cleanly;
//! a caught fault discards the buffer and answers with a controlled error
//! response instead.
//!
//! # Fault Paths
//!
//! - **Flush path:** the handler returns normally and its buffered status
//!   and body are sent verbatim.
//! - **Recovery path:** a panic at any depth is caught at the middleware
//!   boundary, logged together with a stack snapshot of the fault site,
//!   and replaced by either a generic message (production) or a diagnostic
//!   HTML page with clickable stack frames (development).
//!
//! # Diagnostics
//!
//! In development mode each stack-frame location links to the `/debug/`
//! source viewer, which renders the named file with the offending line
//! highlighted.

pub mod config;
pub mod debug_view;
pub mod error;
pub mod handler;
pub mod logging;
pub mod mux;
pub mod recover;
pub mod response;
pub mod stack;
