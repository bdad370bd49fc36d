//! Backend boundary: where domain graphs come from.
//!
//! - [`GraphSource`] - Async query interface the engine fetches through
//! - [`FileGraphSource`] - Reads per-project JSON files from a data directory

mod file;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{GraphQuery, GraphResponse, GraphStatistics};

pub use file::FileGraphSource;

/// A queryable store of project graphs.
///
/// Filtering by type, search and limit happens on the source side; the
/// engine only applies the connection threshold afterwards.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Fetch the part of `project`'s graph that matches `query`.
    async fn query_graph(&self, project: &str, query: &GraphQuery)
        -> Result<GraphResponse, AppError>;

    /// Per-type counts over the whole project graph.
    async fn statistics(&self, project: &str) -> Result<GraphStatistics, AppError>;
}
