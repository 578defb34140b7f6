//! # REST Front End
//!
//! Routes come from an [`EndpointBinder`] and are mounted under the bind
//! URI's base path:
//!
//! ```text
//! rest://localhost:1503/pos  +  post("v2/echo", "Echo")  →  POST /pos/v2/echo
//! ```
//!
//! POST routes take the request as a JSON body; GET routes pass `null`.
//! Business errors map to an HTTP status with the JSON error object as body.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::domain::bind::check_route_path;
use crate::domain::error::{ApiError, HostingError};
use crate::services::{BusinessService, EndpointBinder, RestMethod, RestRoutes};

#[derive(Clone)]
struct RouteState {
    service: Arc<dyn BusinessService>,
    operation: &'static str,
    timeout: Duration,
}

/// Build the REST router for `service` under `base_path`.
pub fn rest_router(
    service: Arc<dyn BusinessService>,
    binder: &dyn EndpointBinder,
    base_path: &str,
    timeout: Duration,
) -> Result<Router, HostingError> {
    let mut routes = RestRoutes::new();
    binder.bind(&mut routes);
    if routes.is_empty() {
        return Err(HostingError::InvalidRoute(format!(
            "binder registered no routes for {}",
            service.service_name()
        )));
    }

    check_route_path(base_path)?;
    let base = base_path.trim_matches('/');
    let mut seen = HashSet::new();
    let mut router = Router::new();
    for route in routes.routes() {
        if !service.operations().contains(&route.operation) {
            return Err(HostingError::InvalidRoute(format!(
                "{} has no operation {}",
                service.service_name(),
                route.operation
            )));
        }

        let path = if base.is_empty() {
            format!("/{}", route.path)
        } else {
            format!("/{}/{}", base, route.path)
        };
        if !seen.insert((route.method, path.clone())) {
            return Err(HostingError::InvalidRoute(format!(
                "{:?} {} registered twice",
                route.method, path
            )));
        }
        let state = RouteState {
            service: service.clone(),
            operation: route.operation,
            timeout,
        };
        debug!(path = %path, operation = route.operation, method = ?route.method, "REST route");

        let method_router = match route.method {
            RestMethod::Post => post(handle_post).with_state(state),
            RestMethod::Get => get(handle_get).with_state(state),
        };
        router = router.route(&path, method_router);
    }

    Ok(router)
}

async fn handle_post(State(state): State<RouteState>, body: Bytes) -> Response {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => return error_response(ApiError::from(e)),
        }
    };
    invoke(state, payload).await
}

async fn handle_get(State(state): State<RouteState>) -> Response {
    invoke(state, Value::Null).await
}

async fn invoke(state: RouteState, payload: Value) -> Response {
    let RouteState {
        service,
        operation,
        timeout,
    } = state;
    trace!(service = service.service_name(), operation, request = %payload, "REST request");

    match tokio::time::timeout(timeout, service.invoke(operation, payload)).await {
        Ok(Ok(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(Err(e)) => {
            debug!(service = service.service_name(), operation, error = %e, "REST call failed");
            error_response(ApiError::from(&e))
        }
        Err(_) => error_response(ApiError::timeout(operation)),
    }
}

pub(crate) fn error_response(error: ApiError) -> Response {
    (error.http_status(), Json(json!({ "error": error }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use cashbox_types::ServiceError;
    use tower::ServiceExt;

    struct Dummy;

    #[async_trait]
    impl BusinessService for Dummy {
        fn service_name(&self) -> &'static str {
            "test.v1.Dummy"
        }

        fn operations(&self) -> &'static [&'static str] {
            &["Echo", "Info", "Fail"]
        }

        async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, ServiceError> {
            match operation {
                "Info" => Ok(json!({ "Version": "1" })),
                "Fail" => Err(ServiceError::InvalidRequest("Message is required".into())),
                _ => Ok(payload),
            }
        }
    }

    struct Routes;

    impl EndpointBinder for Routes {
        fn bind(&self, routes: &mut RestRoutes) {
            routes
                .post("v2/echo", "Echo")
                .get("v2/info", "Info")
                .post("v2/fail", "Fail");
        }
    }

    struct BadRoutes;

    impl EndpointBinder for BadRoutes {
        fn bind(&self, routes: &mut RestRoutes) {
            routes.post("v2/refund", "Refund");
        }
    }

    fn router() -> Router {
        rest_router(Arc::new(Dummy), &Routes, "/pos/", Duration::from_secs(1)).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_echo_under_base_path() {
        let response = router()
            .oneshot(
                Request::post("/pos/v2/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"Message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["Message"], "hi");
    }

    #[tokio::test]
    async fn test_get_route() {
        let response = router()
            .oneshot(Request::get("/pos/v2/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["Version"], "1");
    }

    #[tokio::test]
    async fn test_business_error_maps_to_status() {
        let response = router()
            .oneshot(Request::post("/pos/v2/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Message is required"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let response = router()
            .oneshot(Request::post("/pos/v2/echo").body(Body::from("{oops")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_route_to_unknown_operation_rejected() {
        let result = rest_router(Arc::new(Dummy), &BadRoutes, "", Duration::from_secs(1));
        assert!(matches!(result, Err(HostingError::InvalidRoute(_))));
    }
}
