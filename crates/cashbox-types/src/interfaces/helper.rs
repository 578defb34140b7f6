//! Helper lifecycle hooks.

use async_trait::async_trait;

use crate::errors::ServiceError;

/// A helper has no network surface; it only reacts to its worker's lifecycle.
///
/// `begin_startup` and `end_startup` run in that order before the worker
/// reports readiness. `stop` runs once on cancellation.
#[async_trait]
pub trait Helper: Send + Sync {
    async fn begin_startup(&self) -> Result<(), ServiceError>;

    async fn end_startup(&self) -> Result<(), ServiceError>;

    async fn stop(&self) -> Result<(), ServiceError>;
}
