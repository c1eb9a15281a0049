//! Remote work item service
//!
//! Provides the interface the engine submits through, plus the Azure DevOps
//! implementation of it.

mod azure;
mod payload;

pub use azure::AzureDevOpsClient;
pub use payload::build_create_payload;

use crate::types::{FailureCause, Record};
use async_trait::async_trait;

/// Result of a single remote call
pub type RemoteResult<T> = std::result::Result<T, FailureCause>;

/// Remote service trait for work item operations
///
/// One call per attempt: implementations must not retry internally, and
/// must classify every failure into a [`FailureCause`] so the retry policy
/// never has to look at error text.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Create a work item for `record`, returning its remote id
    async fn submit(&self, record: &Record) -> RemoteResult<String>;

    /// Delete the work item referenced by `record`
    async fn delete(&self, record: &Record) -> RemoteResult<()>;
}
