//! Proxy layer: the pluggable backend I/O collaborator.
//!
//! A [`Proxy`] executes [`Operation`]s against some external store (HTTP,
//! local storage, an in-process map) and returns them completed. Record sets
//! and records never talk to a store directly.

pub mod memory;
pub mod operation;

use async_trait::async_trait;

use crate::error::ProxyError;

pub use memory::MemoryProxy;
pub use operation::{Action, Batch, Operation, ResultSet};

/// User-implemented backend for reads and writes.
///
/// A single proxy may be shared by many record sets and records, so
/// implementations must accept concurrent independent requests.
///
/// Only [`read`](Proxy::read) is required. Write actions default to
/// [`ProxyErrorKind::Unsupported`](crate::error::ProxyErrorKind::Unsupported).
#[async_trait]
pub trait Proxy: Send + Sync {
    /// Execute a read. The returned operation must carry a result set.
    async fn read(&self, operation: Operation) -> Result<Operation, ProxyError>;

    /// Persist new records. The result set should echo the stored records,
    /// including any backend-assigned id.
    async fn create(&self, _operation: Operation) -> Result<Operation, ProxyError> {
        Err(ProxyError::unsupported(Action::Create.as_str()))
    }

    async fn update(&self, _operation: Operation) -> Result<Operation, ProxyError> {
        Err(ProxyError::unsupported(Action::Update.as_str()))
    }

    async fn destroy(&self, _operation: Operation) -> Result<Operation, ProxyError> {
        Err(ProxyError::unsupported(Action::Destroy.as_str()))
    }

    /// Dispatch on [`Operation::action`].
    async fn execute(&self, operation: Operation) -> Result<Operation, ProxyError> {
        match operation.action {
            Action::Read => self.read(operation).await,
            Action::Create => self.create(operation).await,
            Action::Update => self.update(operation).await,
            Action::Destroy => self.destroy(operation).await,
        }
    }
}
