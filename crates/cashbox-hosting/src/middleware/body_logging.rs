//! Request/response body logging.
//!
//! Installed only at the most detailed log level. The whole body is
//! buffered, logged, and handed downstream as a fresh body with the same
//! bytes, so handlers see exactly what the client sent.

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{trace, warn};

/// Body logging layer
#[derive(Clone)]
pub struct BodyLoggingLayer {
    limit: usize,
}

impl BodyLoggingLayer {
    /// Bodies larger than `limit` are rejected with 413, matching the
    /// listener's request body limit.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl<S> Layer<S> for BodyLoggingLayer {
    type Service = BodyLoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BodyLoggingService {
            inner,
            limit: self.limit,
        }
    }
}

/// Body logging service
#[derive(Clone)]
pub struct BodyLoggingService<S> {
    inner: S,
    limit: usize,
}

impl<S> Service<Request<Body>> for BodyLoggingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let limit = self.limit;

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();

            let (parts, body) = req.into_parts();
            let bytes = match to_bytes(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(%method, %path, error = %e, "Request body could not be buffered");
                    return Ok(StatusCode::PAYLOAD_TOO_LARGE.into_response());
                }
            };
            trace!(%method, %path, body = %render(&bytes), "Request body");

            let response = inner
                .call(Request::from_parts(parts, Body::from(bytes)))
                .await?;

            let (parts, body) = response.into_parts();
            let bytes = match to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(%method, %path, error = %e, "Response body could not be buffered");
                    return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
                }
            };
            trace!(%method, %path, status = %parts.status, body = %render(&bytes), "Response body");

            Ok(Response::from_parts(parts, Body::from(bytes)))
        })
    }
}

fn render(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
