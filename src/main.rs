//! Recoverer server binary.
//!
//! Wires the demo handlers and the source viewer into a mux, wraps the mux
//! with the recovering middleware, and serves it with hyper. Deployment
//! mode comes from the environment once at startup; production is the
//! default when the value is unset or unrecognized.

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use http::{Request, Response};
use http_body::Body;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{error, info};

use recoverer::config::{Mode, RecovererConfig};
use recoverer::debug_view::SourceView;
use recoverer::error::{ServerError, ServerResult};
use recoverer::handler::Handler;
use recoverer::logging::logging_layer;
use recoverer::mux::Mux;
use recoverer::recover::Recoverer;
use recoverer::response::ResponseSink;

/// Command-line configuration for the server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "RECOVERER_PORT", default_value = "3000")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Graceful shutdown timeout in seconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value = "30")]
    shutdown_timeout: u64,

    /// Deployment environment ("dev" enables fault diagnostics)
    #[arg(long, env = "APP_ENV", default_value = "production")]
    environment: String,
}

/// Counts in-flight connections for graceful shutdown.
#[derive(Clone)]
struct ConnectionTracker {
    active_connections: Arc<AtomicUsize>,
}

impl ConnectionTracker {
    fn new() -> Self {
        Self {
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn increment(&self) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    fn count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mode = Mode::parse(&cli.environment);

    let mut mux = Mux::new();
    mux.register("/panic/", Arc::new(PanicDemo));
    mux.register("/panic-after/", Arc::new(PanicAfterDemo));
    mux.register("/debug/", Arc::new(SourceView));
    mux.register("/", Arc::new(Hello));

    let recoverer = Recoverer::new(Arc::new(mux), RecovererConfig::for_mode(mode));
    let service_stack = ServiceBuilder::new()
        .layer(logging_layer())
        .service(recoverer);

    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(
        bind = %cli.bind,
        port = cli.port,
        mode = ?mode,
        shutdown_timeout = cli.shutdown_timeout,
        "recoverer server starting"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let tracker = ConnectionTracker::new();

    spawn_signal_listeners(&shutdown_tx);

    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        let service = service_stack.clone();
                        let mut conn_shutdown_rx = shutdown_tx.subscribe();
                        let tracker = tracker.clone();
                        tracker.increment();

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, service, &mut conn_shutdown_rx).await
                            {
                                error!(peer = %peer_addr, error = %e, "connection handling error");
                            }
                            tracker.decrement();
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                info!("shutdown signal received, stopping new connections");
                break;
            }
        }
    }

    drain_connections(&tracker, Duration::from_secs(cli.shutdown_timeout)).await;
    Ok(())
}

/// Serve one connection until it closes or shutdown is requested.
async fn handle_connection<S, B>(
    stream: TcpStream,
    service: S,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> ServerResult<()>
where
    S: Service<Request<Incoming>, Response = Response<B>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let io = TokioIo::new(stream);

    let svc_fn = hyper::service::service_fn(move |req| {
        let service = service.clone();
        async move { service.oneshot(req).await }
    });

    let builder = auto::Builder::new(hyper_util::rt::TokioExecutor::new());
    let conn = builder.serve_connection(io, svc_fn);
    tokio::pin!(conn);

    tokio::select! {
        result = &mut conn => {
            result.map_err(|e| ServerError::Connection(e.to_string()))?;
        }
        _ = shutdown_rx.recv() => {
            conn.as_mut().graceful_shutdown();
            let _ = tokio::time::timeout(Duration::from_secs(5), conn).await;
        }
    }

    Ok(())
}

/// Broadcast shutdown on SIGINT (and SIGTERM on unix).
fn spawn_signal_listeners(shutdown_tx: &broadcast::Sender<()>) {
    let tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, initiating graceful shutdown");
                let _ = tx.send(());
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGINT");
            }
        }
    });

    #[cfg(unix)]
    {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("received SIGTERM, initiating graceful shutdown");
                    let _ = tx.send(());
                }
                Err(e) => {
                    error!(error = %e, "failed to listen for SIGTERM");
                }
            }
        });
    }
}

/// Wait for in-flight connections to finish, up to `deadline`.
async fn drain_connections(tracker: &ConnectionTracker, deadline: Duration) {
    info!(
        active_connections = tracker.count(),
        timeout_seconds = deadline.as_secs(),
        "waiting for active connections to drain"
    );

    let start = std::time::Instant::now();
    while tracker.count() > 0 {
        if start.elapsed() >= deadline {
            error!(
                active_connections = tracker.count(),
                "shutdown timeout reached, forcing exit"
            );
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }

    info!("all connections drained, shutting down cleanly");
}

/// Plain greeting handler.
struct Hello;

#[async_trait]
impl Handler for Hello {
    async fn handle(&self, _req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        res.write_body(b"<h1>Hello!</h1>\n");
    }
}

/// Demo handler that faults before writing anything.
struct PanicDemo;

#[async_trait]
impl Handler for PanicDemo {
    async fn handle(&self, _req: Request<Incoming>, _res: &mut (dyn ResponseSink + Send)) {
        fail_on_purpose();
    }
}

/// Demo handler that faults after writing a partial body.
struct PanicAfterDemo;

#[async_trait]
impl Handler for PanicAfterDemo {
    async fn handle(&self, _req: Request<Incoming>, res: &mut (dyn ResponseSink + Send)) {
        res.write_body(b"<h1>Hello!</h1>");
        fail_on_purpose();
    }
}

fn fail_on_purpose() {
    panic!("Oh no!");
}
