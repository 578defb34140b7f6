//! # Legacy Document RPC
//!
//! The `http://`, `https://` and `net.tcp://` bindings carry JSON-RPC 2.0
//! documents. The method names an operation of the hosted service (any
//! `Service.` prefix and case are ignored) and `params` holds its request:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"Echo","params":[{"Message":"hi"}]}
//! {"jsonrpc":"2.0","id":1,"result":{"Message":"hi"}}
//! ```
//!
//! Over HTTP a document is POSTed at the bind URI's path. Over `net.tcp`
//! each line of the connection is one document and each reply is one line.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::domain::error::ApiError;
use crate::services::BusinessService;

/// Longest accepted string id.
const MAX_ID_LEN: usize = 256;

/// Shared state of a document RPC endpoint.
#[derive(Clone)]
pub struct DocumentState {
    service: Arc<dyn BusinessService>,
    timeout: Duration,
}

impl DocumentState {
    pub fn new(service: Arc<dyn BusinessService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Process one document, single or batch.
    ///
    /// Returns `Err` with a ready error reply when the text is not JSON.
    pub async fn process_document(&self, text: &str) -> Result<Value, Value> {
        let request: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => return Err(error_reply(None, &ApiError::parse_error(e.to_string()))),
        };

        match request {
            Value::Array(requests) => {
                if requests.is_empty() {
                    return Ok(error_reply(None, &ApiError::invalid_request("empty batch")));
                }
                let mut responses = Vec::with_capacity(requests.len());
                for req in &requests {
                    responses.push(self.process_single_request(req).await);
                }
                Ok(Value::Array(responses))
            }
            single => Ok(self.process_single_request(&single).await),
        }
    }

    async fn process_single_request(&self, request: &Value) -> Value {
        if !request.is_object() {
            return error_reply(None, &ApiError::invalid_request("request must be an object"));
        }

        let id = request.get("id").cloned();
        if let Some(ref id_val) = id {
            if let Err(e) = validate_id(id_val) {
                return error_reply(None, &e);
            }
        }

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let payload = document_param(request.get("params"));

        match self.route_method(method, payload).await {
            Ok(value) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": value
            }),
            Err(e) => error_reply(id, &e),
        }
    }

    async fn route_method(&self, method: &str, payload: Value) -> Result<Value, ApiError> {
        let Some(operation) = self.service.resolve_operation(method) else {
            return Err(ApiError::method_not_found(method));
        };
        trace!(service = self.service.service_name(), operation, request = %payload, "Document request");

        match tokio::time::timeout(self.timeout, self.service.invoke(operation, payload)).await {
            Ok(Ok(value)) => {
                trace!(service = self.service.service_name(), operation, response = %value, "Document response");
                Ok(value)
            }
            Ok(Err(e)) => {
                debug!(service = self.service.service_name(), operation, error = %e, "Document call failed");
                Err(ApiError::from(&e))
            }
            Err(_) => Err(ApiError::timeout(operation)),
        }
    }
}

/// Null ids would be notifications, which get no reply; they are rejected.
fn validate_id(id: &Value) -> Result<(), ApiError> {
    if id.is_null() {
        return Err(ApiError::invalid_request("null id (notifications not supported)"));
    }
    if let Some(s) = id.as_str() {
        if s.is_empty() {
            return Err(ApiError::invalid_request("empty string id"));
        }
        if s.len() > MAX_ID_LEN {
            return Err(ApiError::invalid_request(format!(
                "id string too long (max {MAX_ID_LEN} chars)"
            )));
        }
    }
    if !id.is_string() && !id.is_number() {
        return Err(ApiError::invalid_request("id must be string or number"));
    }
    Ok(())
}

/// Operation payload carried by `params`: the first element of an array,
/// an object as is, and `null` when absent.
fn document_param(params: Option<&Value>) -> Value {
    match params {
        None | Some(Value::Null) => Value::Null,
        Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
    }
}

fn error_reply(id: Option<Value>, error: &ApiError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": error,
        "id": id
    })
}

/// HTTP handler for document RPC.
pub async fn handle_document(State(state): State<DocumentState>, body: String) -> impl IntoResponse {
    match state.process_document(&body).await {
        Ok(reply) => (StatusCode::OK, Json(reply)),
        Err(reply) => (StatusCode::BAD_REQUEST, Json(reply)),
    }
}

/// Serve `net.tcp` connections until `token` is cancelled, then wait for
/// open connections to finish their current document.
pub async fn serve_net_tcp(
    listener: TcpListener,
    state: DocumentState,
    max_line_len: usize,
    token: CancellationToken,
) {
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "net.tcp connection accepted");
                    let state = state.clone();
                    let token = token.clone();
                    tracker.spawn(async move {
                        serve_connection(stream, state, max_line_len, token).await;
                        debug!(%peer, "net.tcp connection closed");
                    });
                }
                Err(e) => {
                    warn!(error = %e, "net.tcp accept failed");
                }
            }
        }
    }

    tracker.close();
    tracker.wait().await;
    info!("net.tcp listener stopped");
}

async fn serve_connection(
    stream: TcpStream,
    state: DocumentState,
    max_line_len: usize,
    token: CancellationToken,
) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_line_len));

    loop {
        let line = tokio::select! {
            _ = token.cancelled() => return,
            next = framed.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!(error = %e, "net.tcp read failed");
                    return;
                }
                None => return,
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let reply = match state.process_document(&line).await {
            Ok(reply) | Err(reply) => reply,
        };
        if let Err(e) = framed.send(reply.to_string()).await {
            warn!(error = %e, "net.tcp write failed");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::codes;
    use async_trait::async_trait;
    use cashbox_types::ServiceError;

    struct Dummy;

    #[async_trait]
    impl BusinessService for Dummy {
        fn service_name(&self) -> &'static str {
            "test.v1.Dummy"
        }

        fn operations(&self) -> &'static [&'static str] {
            &["Echo", "Fail", "Slow"]
        }

        async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, ServiceError> {
            match operation {
                "Fail" => Err(ServiceError::Unavailable("device offline".into())),
                "Slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(payload)
                }
                _ => Ok(payload),
            }
        }
    }

    fn state() -> DocumentState {
        DocumentState::new(Arc::new(Dummy), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_single_request() {
        let reply = state()
            .process_document(r#"{"jsonrpc":"2.0","id":1,"method":"IPOS.echo","params":[{"Message":"hi"}]}"#)
            .await
            .unwrap();

        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["Message"], "hi");
    }

    #[tokio::test]
    async fn test_object_params_and_missing_params() {
        let state = state();
        let reply = state
            .process_document(r#"{"jsonrpc":"2.0","id":"a","method":"Echo","params":{"Message":"x"}}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"]["Message"], "x");

        let reply = state
            .process_document(r#"{"jsonrpc":"2.0","id":"b","method":"Echo"}"#)
            .await
            .unwrap();
        assert!(reply["result"].is_null());
    }

    #[tokio::test]
    async fn test_batch_request() {
        let reply = state()
            .process_document(
                r#"[{"jsonrpc":"2.0","id":1,"method":"Echo","params":[1]},
                    {"jsonrpc":"2.0","id":2,"method":"Refund","params":[]}]"#,
            )
            .await
            .unwrap();

        let replies = reply.as_array().unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"], 1);
        assert_eq!(replies[1]["error"]["code"], codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid() {
        let reply = state().process_document("[]").await.unwrap();
        assert_eq!(reply["error"]["code"], codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let reply = state().process_document("{not json").await.unwrap_err();
        assert_eq!(reply["error"]["code"], codes::PARSE_ERROR);
        assert!(reply["id"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let state = state();
        for doc in [
            r#"{"jsonrpc":"2.0","id":null,"method":"Echo"}"#,
            r#"{"jsonrpc":"2.0","id":"","method":"Echo"}"#,
            r#"{"jsonrpc":"2.0","id":{"a":1},"method":"Echo"}"#,
        ] {
            let reply = state.process_document(doc).await.unwrap();
            assert_eq!(reply["error"]["code"], codes::INVALID_REQUEST, "{doc}");
        }

        let long_id = "x".repeat(MAX_ID_LEN + 1);
        let doc = json!({"jsonrpc":"2.0","id":long_id,"method":"Echo"}).to_string();
        let reply = state.process_document(&doc).await.unwrap();
        assert_eq!(reply["error"]["code"], codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_service_error_and_timeout() {
        let state = state();
        let reply = state
            .process_document(r#"{"jsonrpc":"2.0","id":7,"method":"Fail"}"#)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], codes::COMPONENT_UNAVAILABLE);
        assert_eq!(reply["id"], 7);

        let reply = state
            .process_document(r#"{"jsonrpc":"2.0","id":8,"method":"Slow"}"#)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], codes::TIMEOUT);
    }
}
