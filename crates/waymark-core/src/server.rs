//! HTTP server loop.
//!
//! One task per connection, one buffered body per request. The body is
//! read fully (capped by the configured limit) before the dispatcher
//! sees the request, so route probing can retry entity decoding across
//! routes without re-reading the stream.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::response::{plain, HttpResponse};

/// Default request body cap: 1MB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

pub(crate) struct Server {
    dispatcher: Arc<Dispatcher>,
    body_limit: Option<usize>,
}

impl Server {
    pub fn new(dispatcher: Dispatcher, body_limit: Option<usize>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            body_limit,
        }
    }

    /// Accepts connections until the process is killed.
    pub async fn run(self, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!(
            routes = self.dispatcher.route_count(),
            mode = ?self.dispatcher.mode(),
            "🚀 waymark serving on http://{}",
            addr
        );

        loop {
            let (stream, _remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let dispatcher = self.dispatcher.clone();
            let body_limit = self.body_limit;

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let dispatcher = dispatcher.clone();
                    async move {
                        let response = handle_request(dispatcher, req, body_limit).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("connection error: {}", err);
                }
            });
        }
    }
}

/// Buffers the body and hands the request to the dispatcher.
async fn handle_request(
    dispatcher: Arc<Dispatcher>,
    req: hyper::Request<Incoming>,
    body_limit: Option<usize>,
) -> HttpResponse {
    let (parts, body) = req.into_parts();

    // Reject on the declared length before reading anything.
    if let Some(limit) = body_limit {
        let declared = parts
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared.is_some_and(|length| length > limit) {
            return too_large(limit);
        }
    }

    let body = match buffer_body(body, body_limit).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    dispatcher.dispatch(parts, body).await
}

/// Collects the whole body into one `Bytes`, enforcing the limit while
/// reading so a missing or lying `Content-Length` cannot bypass it.
async fn buffer_body<B>(body: B, limit: Option<usize>) -> Result<Bytes, HttpResponse>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match limit {
        Some(limit) => match Limited::new(body, limit).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.is::<http_body_util::LengthLimitError>() => {
                warn!(limit, "request body over limit");
                Err(too_large(limit))
            }
            Err(err) => {
                warn!(error = %err, "failed to read request body");
                Err(plain(StatusCode::BAD_REQUEST, "failed to read request body"))
            }
        },
        None => match body.collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) => {
                let err = err.into();
                warn!(error = %err, "failed to read request body");
                Err(plain(StatusCode::BAD_REQUEST, "failed to read request body"))
            }
        },
    }
}

pub(crate) fn too_large(limit: usize) -> HttpResponse {
    plain(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds limit of {limit} bytes"),
    )
}
