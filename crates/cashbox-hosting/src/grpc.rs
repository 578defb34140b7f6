//! # gRPC Front End
//!
//! Business services are exposed over gRPC (HTTP/2 cleartext) without
//! generated stubs: messages travel as JSON documents through [`JsonCodec`],
//! and the method path `/<service_name>/<Operation>` selects the operation.
//!
//! ```text
//! POST /cashbox.pos.v2.Pos/Echo  ──► GrpcService ──► UnaryOperation ──► BusinessService::invoke
//!        (h2c, grpc framing)          (path)          (timeout, trace)
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::Response;
use bytes::{Buf, BufMut};
use futures::future::BoxFuture;
use serde_json::Value;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;
use tower::Service;
use tracing::{debug, trace, warn};

use crate::domain::config::HostingOptions;
use crate::domain::error::grpc_status;
use crate::services::BusinessService;

/// gRPC codec carrying `serde_json::Value` messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Encode = Value;
    type Decode = Value;
    type Encoder = JsonEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    type Item = Value;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        serde_json::to_writer(dst.writer(), &item)
            .map_err(|e| Status::internal(format!("failed to encode message: {e}")))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    type Item = Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        // An empty message is the JSON equivalent of an empty protobuf.
        if !src.has_remaining() {
            return Ok(Some(Value::Null));
        }
        let bytes = src.copy_to_bytes(src.remaining());
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Status::invalid_argument(format!("message is not valid JSON: {e}")))
    }
}

/// Routes gRPC calls to one business service.
#[derive(Clone)]
pub struct GrpcService {
    service: Arc<dyn BusinessService>,
    timeout: Duration,
    max_message_size: usize,
}

impl GrpcService {
    pub fn new(service: Arc<dyn BusinessService>, options: &HostingOptions) -> Self {
        Self {
            service,
            timeout: options.request_timeout,
            max_message_size: options.max_request_body_bytes,
        }
    }

    /// Operation named by a `/<service>/<Operation>` path, if this
    /// service owns it.
    fn operation_for(&self, path: &str) -> Option<&'static str> {
        let (service_name, method) = path.trim_start_matches('/').split_once('/')?;
        if service_name != self.service.service_name() {
            return None;
        }
        self.service
            .operations()
            .iter()
            .copied()
            .find(|op| *op == method)
    }
}

impl Service<Request<Body>> for GrpcService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let path = req.uri().path().to_string();
        let Some(operation) = self.operation_for(&path) else {
            debug!(path = %path, "Unknown gRPC method");
            return Box::pin(async move { Ok(unimplemented(&path)) });
        };

        let unary = UnaryOperation {
            service: self.service.clone(),
            operation,
            timeout: self.timeout,
        };

        let max_message_size = self.max_message_size;
        Box::pin(async move {
            let mut grpc =
                tonic::server::Grpc::new(JsonCodec).max_decoding_message_size(max_message_size);
            let response = grpc.unary(unary, req).await;
            Ok(response.map(Body::new))
        })
    }
}

/// One resolved unary call.
struct UnaryOperation {
    service: Arc<dyn BusinessService>,
    operation: &'static str,
    timeout: Duration,
}

impl tonic::server::UnaryService<Value> for UnaryOperation {
    type Response = Value;
    type Future = BoxFuture<'static, Result<tonic::Response<Value>, Status>>;

    fn call(&mut self, request: tonic::Request<Value>) -> Self::Future {
        let service = self.service.clone();
        let operation = self.operation;
        let timeout = self.timeout;

        Box::pin(async move {
            let payload = request.into_inner();
            trace!(service = service.service_name(), operation, request = %payload, "gRPC request");

            let result = tokio::time::timeout(timeout, service.invoke(operation, payload)).await;
            match result {
                Ok(Ok(value)) => {
                    trace!(service = service.service_name(), operation, response = %value, "gRPC response");
                    Ok(tonic::Response::new(value))
                }
                Ok(Err(e)) => {
                    debug!(service = service.service_name(), operation, error = %e, "gRPC call failed");
                    Err(grpc_status(&e))
                }
                Err(_) => {
                    warn!(
                        service = service.service_name(),
                        operation,
                        timeout_ms = timeout.as_millis() as u64,
                        "gRPC call timed out"
                    );
                    Err(Status::deadline_exceeded(format!(
                        "{operation} exceeded {}ms",
                        timeout.as_millis()
                    )))
                }
            }
        })
    }
}

/// Trailers-only `UNIMPLEMENTED` response.
fn unimplemented(path: &str) -> Response {
    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/grpc"),
    );
    headers.insert("grpc-status", HeaderValue::from(tonic::Code::Unimplemented as i32));
    if let Ok(message) = HeaderValue::from_str(&format!("unknown method {path}")) {
        headers.insert("grpc-message", message);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cashbox_types::ServiceError;

    struct Dummy;

    #[async_trait]
    impl BusinessService for Dummy {
        fn service_name(&self) -> &'static str {
            "test.v1.Dummy"
        }

        fn operations(&self) -> &'static [&'static str] {
            &["Echo"]
        }

        async fn invoke(&self, _operation: &str, payload: Value) -> Result<Value, ServiceError> {
            Ok(payload)
        }
    }

    #[test]
    fn test_operation_for_path() {
        let grpc = GrpcService::new(Arc::new(Dummy), &HostingOptions::default());
        assert_eq!(grpc.operation_for("/test.v1.Dummy/Echo"), Some("Echo"));
        assert_eq!(grpc.operation_for("/test.v1.Dummy/echo"), None);
        assert_eq!(grpc.operation_for("/test.v1.Other/Echo"), None);
        assert_eq!(grpc.operation_for("/Echo"), None);
    }

    #[tokio::test]
    async fn test_unknown_method_is_unimplemented() {
        let mut grpc = GrpcService::new(Arc::new(Dummy), &HostingOptions::default());
        let response = grpc
            .call(
                Request::builder()
                    .uri("/test.v1.Dummy/Refund")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["grpc-status"], "12");
    }
}
