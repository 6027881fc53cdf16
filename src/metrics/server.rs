//! HTTP exporter serving `GET /metrics` in Prometheus text format.
//!
//! The listener is bound eagerly in [`bind_metrics_listener`] so that an
//! unavailable port fails process startup; everything after that point is
//! non-fatal. The serve loop itself is spawned onto the runtime and runs for
//! the life of the process.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::error;

use super::registry::MetricsRegistry;

/// Binds the metrics listener. Failure here is the only fatal startup error
/// in the exporter.
pub async fn bind_metrics_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Accept loop for the metrics endpoint. Intended to be spawned:
///
/// ```ignore
/// let listener = bind_metrics_listener(addr).await?;
/// tokio::spawn(serve_metrics(listener, metrics.clone()));
/// ```
pub async fn serve_metrics(listener: TcpListener, metrics: Arc<MetricsRegistry>) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("metrics listener accept failed: {e}");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                error!("metrics HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            Ok(response)
        }
        _ => {
            let mut response = Response::new(Full::new(Bytes::from("not found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}
