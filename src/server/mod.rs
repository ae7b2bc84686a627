//! HTTP servers
//!
//! Both listeners (the order API and the ops endpoints) share one accept
//! loop built on raw hyper connections. Handlers are plain async functions
//! from a request to a response; they never fail at the transport level.

pub mod api;
pub mod ops;

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

pub use api::ApiState;
pub use ops::OpsState;

/// Connection handling limits
#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    /// Time allowed for a client to send its request headers
    pub read_timeout: Duration,
    /// Time in-flight connections get to finish after shutdown starts
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Bind a listener, naming the server in the error.
pub async fn bind(addr: &str, name: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        Error::Internal(format!("Failed to bind {} server to {}: {}", name, addr, e))
    })?;
    info!("{} server listening on {}", name, addr);
    Ok(listener)
}

/// Accept connections until `ctx` is cancelled, then drain open ones.
pub async fn serve<H, Fut>(
    listener: TcpListener,
    name: &'static str,
    handler: H,
    options: ServeOptions,
    ctx: CancellationToken,
) -> Result<()>
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let connections = TaskTracker::new();

    loop {
        let (stream, peer) = tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("{} server accept error: {}", name, e);
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let handler = handler.clone();
        let ctx = ctx.clone();

        connections.spawn(async move {
            let service = service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler(req).await) }
            });

            let mut builder = http1::Builder::new();
            builder
                .timer(TokioTimer::new())
                .header_read_timeout(options.read_timeout);
            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = ctx.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };

            if let Err(e) = result {
                debug!(%peer, "{} server connection error: {}", name, e);
            }
        });
    }

    connections.close();
    info!(open = connections.len(), "{} server stopping", name);

    if tokio::time::timeout(options.shutdown_timeout, connections.wait())
        .await
        .is_err()
    {
        error!("{} server shutdown timed out", name);
        return Err(Error::Internal(format!("{} server shutdown timed out", name)));
    }

    info!("{} server stopped", name);
    Ok(())
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    respond(status, "text/plain; charset=utf-8", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn hello(_req: Request<Incoming>) -> Response<Full<Bytes>> {
        text(StatusCode::OK, "hello")
    }

    #[tokio::test]
    async fn test_serve_answers_and_stops_on_cancel() {
        let listener = bind("127.0.0.1:0", "test").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let ctx = CancellationToken::new();
        let server = tokio::spawn(serve(
            listener,
            "test",
            hello,
            ServeOptions::default(),
            ctx.clone(),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.ends_with("hello"));

        ctx.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_reports_bad_address() {
        let result = bind("not-an-address", "api").await;
        assert!(matches!(result, Err(Error::Internal(msg)) if msg.contains("api")));
    }
}
