//! Middleware stack for HTTP listeners.
//!
//! Layer order: Request → Trace → BodyLogging (trace level only) → Timeout → BodyLimit → Handler

pub mod body_logging;
pub mod timeout;

pub use body_logging::BodyLoggingLayer;
pub use timeout::TimeoutLayer;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::domain::config::HostingOptions;

/// Wrap a router in the standard middleware stack.
pub fn apply_stack(router: Router, options: &HostingOptions) -> Router {
    let router = router
        .layer(DefaultBodyLimit::max(options.max_request_body_bytes))
        .layer(TimeoutLayer::new(options.request_timeout));

    let router = if options.body_logging {
        router.layer(BodyLoggingLayer::new(options.max_request_body_bytes))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
