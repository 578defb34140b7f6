//! # Listener Lifecycle
//!
//! [`host`] binds one URI for one business service and returns a handle
//! that owns the serving task.
//!
//! ```text
//! host("grpc://localhost:1502", service)
//!   ├── parse URI ─────────────── UnsupportedProtocol / InvalidUri
//!   ├── build router ──────────── MissingEndpointBinder / InvalidRoute / TlsNotConfigured
//!   ├── bind socket ───────────── Bind
//!   └── spawn serve task ──────── ListenerHandle { token, task }
//! ```
//!
//! Shutdown cancels the listener's token: servers stop accepting, in-flight
//! requests finish, and the task exits. A task still running when the
//! shutdown timeout expires is aborted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::domain::bind::{check_route_path, BindUri, Protocol};
use crate::domain::config::HostingOptions;
use crate::domain::error::HostingError;
use crate::grpc::GrpcService;
use crate::jsonrpc::{handle_document, serve_net_tcp, DocumentState};
use crate::middleware::apply_stack;
use crate::rest::rest_router;
use crate::services::{BusinessService, EndpointBinder};

/// A running listener.
#[derive(Debug)]
pub struct ListenerHandle {
    protocol: Protocol,
    uri: String,
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Stop accepting and wait up to `timeout` for in-flight requests.
    ///
    /// Returns `false` if the serving task had to be aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        self.token.cancel();
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(uri = %self.uri, error = %e, "Listener task failed");
                true
            }
            Err(_) => {
                warn!(uri = %self.uri, "Listener did not drain in time, aborting");
                self.task.abort();
                false
            }
        }
    }

    /// Stop immediately.
    pub fn abort(self) {
        self.token.cancel();
        self.task.abort();
    }
}

/// Host `service` on `bind_uri`.
///
/// `binder` is required for `rest://` and ignored otherwise. The listener
/// stops when `parent` is cancelled or the handle is shut down.
pub async fn host(
    service: Arc<dyn BusinessService>,
    bind_uri: &str,
    binder: Option<&dyn EndpointBinder>,
    options: &HostingOptions,
    parent: &CancellationToken,
) -> Result<ListenerHandle, HostingError> {
    let uri = BindUri::parse(bind_uri)?;

    let app = match uri.protocol {
        Protocol::Https => {
            return Err(HostingError::TlsNotConfigured {
                uri: uri.to_string(),
            })
        }
        Protocol::Grpc => Some(
            Router::new()
                .route("/health", health(service.service_name()))
                .fallback_service(GrpcService::new(service.clone(), options))
                .layer(TraceLayer::new_for_http()),
        ),
        Protocol::Rest => {
            let Some(binder) = binder else {
                error!(uri = %uri, service = service.service_name(), "REST binding requires an endpoint binder");
                return Err(HostingError::MissingEndpointBinder {
                    uri: uri.to_string(),
                });
            };
            let router = rest_router(service.clone(), binder, &uri.path, options.request_timeout)?
                .route("/health", health(service.service_name()));
            Some(apply_stack(router, options))
        }
        Protocol::Http => {
            let path = uri.route_path();
            check_route_path(&path)?;
            let state = DocumentState::new(service.clone(), options.request_timeout);
            let router = Router::new()
                .route(&path, post(handle_document))
                .with_state(state)
                .route("/health", health(service.service_name()));
            Some(apply_stack(router, options))
        }
        Protocol::NetTcp => None,
    };

    let addr = uri.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| HostingError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| HostingError::Bind { addr, source })?;

    let token = parent.child_token();
    let task = match app {
        Some(router) => {
            let shutdown = token.clone().cancelled_owned();
            let uri_text = uri.to_string();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
                {
                    error!(uri = %uri_text, error = %e, "Listener failed");
                }
            })
        }
        None => {
            let state = DocumentState::new(service.clone(), options.request_timeout);
            tokio::spawn(serve_net_tcp(
                listener,
                state,
                options.max_request_body_bytes,
                token.clone(),
            ))
        }
    };

    info!(
        protocol = %uri.protocol,
        uri = %uri,
        addr = %local_addr,
        service = service.service_name(),
        "Listening"
    );

    Ok(ListenerHandle {
        protocol: uri.protocol,
        uri: uri.to_string(),
        local_addr,
        token,
        task,
    })
}

/// Health check endpoint
fn health(service: &'static str) -> axum::routing::MethodRouter {
    get(move || async move {
        Json(json!({
            "status": "healthy",
            "service": service,
            "version": env!("CARGO_PKG_VERSION")
        }))
    })
}
