//! In-memory [`AnalysisClient`] for tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

use crate::client::AnalysisClient;
use crate::errors::ClientError;
use crate::types::{
    Locator, MaintainabilityRecord, Rank, RatingRecord, SourceStatsRecord, ToolVersion, UnitType,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub version: usize,
    pub complexity: usize,
    pub maintainability: usize,
    pub stats: usize,
}

impl CallCounts {
    pub fn analysis_calls(&self) -> usize {
        self.complexity + self.maintainability + self.stats
    }
}

/// Scripted analysis client. Every call waits on a shared gate, so tests can
/// hold pipelines mid-flight with [`FakeAnalysisClient::hold`] and let them
/// go with [`FakeAnalysisClient::release`].
pub struct FakeAnalysisClient {
    version: Mutex<Result<ToolVersion, String>>,
    ratings: Mutex<Vec<RatingRecord>>,
    maintainability: Mutex<MaintainabilityRecord>,
    stats: Mutex<SourceStatsRecord>,
    complexity_failure: Mutex<Option<String>>,
    tool_removed: AtomicBool,
    gate: watch::Sender<bool>,
    version_calls: AtomicUsize,
    complexity_calls: AtomicUsize,
    maintainability_calls: AtomicUsize,
    stats_calls: AtomicUsize,
}

impl FakeAnalysisClient {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            version: Mutex::new(Ok(ToolVersion::new(6, 0))),
            ratings: Mutex::new(Vec::new()),
            maintainability: Mutex::new(MaintainabilityRecord {
                index: 100.0,
                rank: Rank::A,
            }),
            stats: Mutex::new(SourceStatsRecord::default()),
            complexity_failure: Mutex::new(None),
            tool_removed: AtomicBool::new(false),
            gate,
            version_calls: AtomicUsize::new(0),
            complexity_calls: AtomicUsize::new(0),
            maintainability_calls: AtomicUsize::new(0),
            stats_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_version(self, version: ToolVersion) -> Self {
        self.set_version(Ok(version));
        self
    }

    pub fn with_ratings(self, ratings: Vec<RatingRecord>) -> Self {
        self.set_ratings(ratings);
        self
    }

    pub fn with_maintainability(self, index: f64, rank: Rank) -> Self {
        *lock(&self.maintainability) = MaintainabilityRecord { index, rank };
        self
    }

    pub fn with_stats(self, stats: SourceStatsRecord) -> Self {
        *lock(&self.stats) = stats;
        self
    }

    pub fn set_version(&self, version: Result<ToolVersion, String>) {
        *lock(&self.version) = version;
    }

    pub fn set_ratings(&self, ratings: Vec<RatingRecord>) {
        *lock(&self.ratings) = ratings;
    }

    pub fn fail_complexity(&self, message: Option<&str>) {
        *lock(&self.complexity_failure) = message.map(str::to_string);
    }

    /// Makes every analysis call report the tool as missing. Version queries
    /// still follow [`FakeAnalysisClient::set_version`].
    pub fn remove_tool(&self) {
        self.tool_removed.store(true, Ordering::SeqCst);
    }

    fn check_installed(&self) -> Result<(), ClientError> {
        if self.tool_removed.load(Ordering::SeqCst) {
            return Err(ClientError::ToolMissing {
                tool: "radon".to_string(),
            });
        }
        Ok(())
    }

    /// Blocks every subsequent call until [`FakeAnalysisClient::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            version: self.version_calls.load(Ordering::SeqCst),
            complexity: self.complexity_calls.load(Ordering::SeqCst),
            maintainability: self.maintainability_calls.load(Ordering::SeqCst),
            stats: self.stats_calls.load(Ordering::SeqCst),
        }
    }

    async fn pass_gate(&self) {
        let mut open = self.gate.subscribe();
        // The sender lives as long as `self`, so this only ends when the gate opens.
        let _ = open.wait_for(|open| *open).await;
    }
}

impl Default for FakeAnalysisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisClient for FakeAnalysisClient {
    async fn tool_version(&self) -> Result<ToolVersion, ClientError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        lock(&self.version).clone().map_err(|tool| ClientError::ToolMissing { tool })
    }

    async fn complexity(&self, _path: &Path) -> Result<Vec<RatingRecord>, ClientError> {
        self.complexity_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.check_installed()?;
        if let Some(message) = lock(&self.complexity_failure).clone() {
            return Err(ClientError::Reported(message));
        }
        Ok(lock(&self.ratings).clone())
    }

    async fn maintainability(&self, _path: &Path) -> Result<MaintainabilityRecord, ClientError> {
        self.maintainability_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.check_installed()?;
        Ok(*lock(&self.maintainability))
    }

    async fn raw_stats(&self, _path: &Path) -> Result<SourceStatsRecord, ClientError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.check_installed()?;
        Ok(*lock(&self.stats))
    }
}

/// Unresolved function rating at the given 1-based line and 0-based column.
pub fn rating(name: &str, line: u32, column: u32) -> RatingRecord {
    RatingRecord {
        name: name.to_string(),
        unit_type: UnitType::Function,
        complexity: 1,
        rank: Rank::A,
        locator: Locator::new(line, column),
        resolved_range: None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
