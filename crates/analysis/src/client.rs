use async_trait::async_trait;
use std::path::Path;

use crate::errors::ClientError;
use crate::types::{MaintainabilityRecord, RatingRecord, SourceStatsRecord, ToolVersion};

/// The external analysis tool, seen through its four calls.
///
/// Implementations validate the tool's output at this boundary and hand back
/// fixed-shape records. Ratings come back with `resolved_range: None`; the
/// coordinator maps locators onto the current document text itself.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn tool_version(&self) -> Result<ToolVersion, ClientError>;

    async fn complexity(&self, path: &Path) -> Result<Vec<RatingRecord>, ClientError>;

    async fn maintainability(&self, path: &Path) -> Result<MaintainabilityRecord, ClientError>;

    async fn raw_stats(&self, path: &Path) -> Result<SourceStatsRecord, ClientError>;
}
