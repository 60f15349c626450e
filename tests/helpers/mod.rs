//! Test server plumbing shared by the integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;

use recoverer::config::RecovererConfig;
use recoverer::handler::Handler;
use recoverer::recover::Recoverer;

/// Spawn a listener serving `handler` behind the recovering middleware and
/// return its address.
pub async fn spawn_server(handler: Arc<dyn Handler>, config: RecovererConfig) -> SocketAddr {
    let recoverer = Recoverer::new(handler, config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let recoverer = recoverer.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let svc = hyper::service::service_fn(move |req| {
                    let recoverer = recoverer.clone();
                    async move { Ok::<_, Infallible>(recoverer.serve(req).await) }
                });
                let _ = auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, svc)
                    .await;
            });
        }
    });

    addr
}

/// Build a request URL for the spawned server.
pub fn url(addr: SocketAddr, path_and_query: &str) -> String {
    format!("http://{addr}{path_and_query}")
}
