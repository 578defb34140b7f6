//! # Control Plane Server
//!
//! Runs inside the supervisor. One task accepts connections; each
//! connection gets its own task processing request/response pairs in order.
//!
//! The server owns its cancellation token. Workers keep pinging while the
//! supervisor stops them, so only [`ControlPlaneServer::shutdown`] closes
//! the endpoint.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ControlPlaneError;
use crate::framing::{framed, receive, send};
use crate::messages::{ControlRequest, ControlResponse};
use crate::transport::{BoxedStream, ControlPlaneAddress, LocalListener};
use crate::ControlPlane;

/// Handle to a running control-plane server.
pub struct ControlPlaneServer {
    address: ControlPlaneAddress,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ControlPlaneServer {
    /// Bind the local endpoint and start serving `handler`.
    pub fn start(
        address: ControlPlaneAddress,
        handler: Arc<dyn ControlPlane>,
    ) -> Result<Self, ControlPlaneError> {
        let listener = LocalListener::bind(&address)?;
        let token = CancellationToken::new();

        info!(address = %address, "Control plane listening");

        let task = tokio::spawn(accept_loop(listener, handler, token.clone()));
        Ok(Self {
            address,
            token,
            task,
        })
    }

    pub fn address(&self) -> &ControlPlaneAddress {
        &self.address
    }

    /// Stop accepting, drop open connections and wait for the accept loop.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

async fn accept_loop(
    mut listener: LocalListener,
    handler: Arc<dyn ControlPlane>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    debug!("Control plane connection accepted");
                    tokio::spawn(serve_connection(stream, handler.clone(), token.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "Control plane accept failed");
                }
            }
        }
    }
    debug!("Control plane accept loop stopped");
}

async fn serve_connection(
    stream: BoxedStream,
    handler: Arc<dyn ControlPlane>,
    token: CancellationToken,
) {
    let mut connection = framed(stream);

    loop {
        let request: ControlRequest = tokio::select! {
            _ = token.cancelled() => return,
            frame = receive(&mut connection) => match frame {
                Ok(Some(request)) => request,
                Ok(None) => return,
                Err(e) => {
                    debug!(error = %e, "Control plane connection dropped");
                    return;
                }
            }
        };

        let name = request.name();
        let result = dispatch(handler.as_ref(), request).await;
        if let Err(e) = &result {
            warn!(request = name, error = %e, "Control plane request failed");
        }

        if let Err(e) = send(&mut connection, &ControlResponse::from_result(result)).await {
            debug!(error = %e, "Control plane reply failed");
            return;
        }
    }
}

async fn dispatch(
    handler: &dyn ControlPlane,
    request: ControlRequest,
) -> Result<(), ControlPlaneError> {
    match request {
        ControlRequest::ReportStarted { component_id } => handler.report_started(component_id).await,
        ControlRequest::Ping => handler.ping().await,
        ControlRequest::RelayLog { record, tags } => handler.relay_log(record, tags).await,
    }
}
