//! HTTP server and graceful shutdown.
//!
//! # Threading
//!
//! Connections are accepted and served on the tokio runtime. Each request's
//! pipeline runs on its own blocking thread via `spawn_blocking`. Handlers
//! and middleware are plain synchronous code and may do ordinary blocking
//! I/O, such as reading the request body. The finished response comes back
//! to the connection task through the [`Outbound`] sink.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or the future passed to
//! [`serve_with_shutdown`](Server::serve_with_shutdown)) the server:
//! 1. stops calling `listener.accept()`, so no new connections are made,
//! 2. lets every in-flight connection task run to completion,
//! 3. returns from `serve`, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tracing::{error, info};

use crate::body::BodyReader;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::request::Request;
use crate::sink::Outbound;

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use jsonpipe::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { bind: Bind::Addr(addr.into()) }
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Accepts connections and dispatches them until SIGTERM or Ctrl-C, then
    /// drains in-flight connections.
    pub async fn serve<A>(self, dispatcher: Dispatcher<A>) -> Result<(), Error>
    where
        A: Send + Sync + 'static,
    {
        self.serve_with_shutdown(dispatcher, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), stopping when `signal` resolves.
    pub async fn serve_with_shutdown<A, S>(
        self,
        dispatcher: Dispatcher<A>,
        signal: S,
    ) -> Result<(), Error>
    where
        A: Send + Sync + 'static,
        S: Future<Output = ()>,
    {
        let listener = match self.bind {
            Bind::Listener(listener) => listener,
            Bind::Addr(addr) => {
                let addr: SocketAddr = addr.parse().map_err(|_| Error::Addr(addr.clone()))?;
                TcpListener::bind(addr).await?
            }
        };
        let local = listener.local_addr()?;

        // Shared by every connection task; read-only from here on.
        let dispatcher = Arc::new(dispatcher);

        info!(addr = %local, "jsonpipe listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move { dispatch(dispatcher, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("jsonpipe stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Bridges one hyper request into the blocking pipeline and waits for the
/// sink to be released.
///
/// Infallible towards hyper: if the pipeline dies without releasing its
/// sink, the client gets a bare `500`.
async fn dispatch<A>(
    dispatcher: Arc<Dispatcher<A>>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    A: Send + Sync + 'static,
{
    let (parts, body) = req.into_parts();
    let request = Request::from_parts(parts, BodyReader::new(body, Handle::current()));
    let (sink, delivery) = Outbound::channel();

    let task = tokio::task::spawn_blocking(move || {
        dispatcher.dispatch(request, Box::new(sink));
    });

    match delivery.await {
        Ok(parts) => Ok(parts.into_response()),
        Err(_) => {
            if let Err(e) = task.await {
                error!(error = %e, "request task failed");
            }
            let mut res = http::Response::new(Full::new(Bytes::new()));
            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            Ok(res)
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT the process receives.
///
/// A signal handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
