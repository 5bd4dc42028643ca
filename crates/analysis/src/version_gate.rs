//! Process-wide tool version check.
//!
//! The version is queried lazily and memoized after the first successful
//! answer. Callers that arrive while a query is running await that same query
//! instead of starting their own. A memoized version is never re-queried, so
//! upgrading the tool while the process runs goes unnoticed.

use event_bus::SuggestedAction;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

use crate::client::AnalysisClient;
use crate::errors::{AnalysisError, Result};
use crate::types::ToolVersion;

type VersionQuery = Shared<BoxFuture<'static, Result<ToolVersion>>>;

pub struct VersionGate {
    client: Arc<dyn AnalysisClient>,
    minimum: ToolVersion,
    resolved: OnceLock<ToolVersion>,
    in_flight: Mutex<Option<(u64, VersionQuery)>>,
    queries_started: AtomicU64,
}

impl VersionGate {
    pub fn new(client: Arc<dyn AnalysisClient>, minimum: ToolVersion) -> Self {
        Self {
            client,
            minimum,
            resolved: OnceLock::new(),
            in_flight: Mutex::new(None),
            queries_started: AtomicU64::new(0),
        }
    }

    pub fn minimum(&self) -> ToolVersion {
        self.minimum
    }

    /// The memoized version, if one has been resolved.
    pub fn cached(&self) -> Option<ToolVersion> {
        self.resolved.get().copied()
    }

    /// Returns the tool version, querying the tool at most once at a time.
    ///
    /// A failed query is not memoized; the next call asks again.
    pub async fn resolve(&self) -> Result<ToolVersion> {
        if let Some(version) = self.cached() {
            return Ok(version);
        }

        let (query_id, query) = self.join_or_start_query();
        let result = query.await;

        match &result {
            Ok(version) => {
                if self.resolved.set(*version).is_ok() {
                    info!("Resolved analysis tool version {}", version);
                }
            }
            Err(e) => warn!("Analysis tool version query failed: {}", e),
        }

        self.finish_query(query_id);
        result
    }

    pub fn check_supported(&self, version: ToolVersion) -> Result<()> {
        if version < self.minimum {
            return Err(AnalysisError::UnsupportedVersion {
                message: format!(
                    "Analysis tool version {} is not supported, version {} or newer is required",
                    version, self.minimum
                ),
                action: SuggestedAction::UpgradeTool,
            });
        }
        Ok(())
    }

    /// [`VersionGate::resolve`] followed by [`VersionGate::check_supported`].
    pub async fn ensure_supported(&self) -> Result<ToolVersion> {
        let version = self.resolve().await?;
        self.check_supported(version)?;
        Ok(version)
    }

    fn join_or_start_query(&self) -> (u64, VersionQuery) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        // A query may have completed between the caller's fast-path check and
        // taking the lock; its result is already memoized.
        if let Some(version) = self.cached() {
            let ready: BoxFuture<'static, Result<ToolVersion>> =
                futures::future::ready(Ok(version)).boxed();
            return (0, ready.shared());
        }

        if let Some((query_id, query)) = slot.as_ref() {
            debug!("Joining in-flight tool version query {}", query_id);
            return (*query_id, query.clone());
        }

        let query_id = self.queries_started.fetch_add(1, Ordering::SeqCst) + 1;
        let client = Arc::clone(&self.client);
        let query = async move {
            client
                .tool_version()
                .await
                .map_err(|e| AnalysisError::UnsupportedVersion {
                    message: format!("Unable to determine the analysis tool version: {e}"),
                    action: SuggestedAction::InstallTool,
                })
        }
        .boxed()
        .shared();

        debug!("Starting tool version query {}", query_id);
        *slot = Some((query_id, query.clone()));
        (query_id, query)
    }

    fn finish_query(&self, query_id: u64) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.as_ref(), Some((current, _)) if *current == query_id) {
            *slot = None;
        }
    }
}
