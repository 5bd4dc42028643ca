//! Document lifecycle handling and the asynchronous refresh pipeline.
//!
//! The RefreshCoordinator is the only writer of the [`AnalysisCache`]. It
//! turns lifecycle events into cache mutations and refresh pipelines:
//!
//! ```text
//! opened/saved/activated ──▶ Refreshing ──▶ gate ──▶ 3 analysis calls ──▶ resolve ──▶ commit ──▶ Ready
//!                                              │               │
//!                                              └──── fail ─────┴──▶ Errored + remediation
//! edited ──▶ Stale (cache invalidated synchronously)
//! closed ──▶ forgotten (cache evicted, late results dropped)
//! ```
//!
//! Event handling never awaits. Pipelines run as spawned tasks, at most one
//! per document; triggers that arrive while one is running are coalesced
//! into it.

use dashmap::DashMap;
use event_bus::{EventBus, LensEvent};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::AnalysisCache;
use crate::client::AnalysisClient;
use crate::errors::{AnalysisError, Result};
use crate::position::PositionResolver;
use crate::types::{
    DocumentAnalysisState, DocumentKey, DocumentPhase, MaintainabilityRecord, RatingRecord,
    SourceStatsRecord,
};
use crate::version_gate::VersionGate;

/// What to do with a refresh result when the document was edited after the
/// refresh started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit anyway. The result may describe older content than the text
    /// the user now sees, and it replaces the stale sentinel.
    #[default]
    LastWriterWins,
    /// Drop results whose starting revision is older than the document's
    /// current revision. The document stays stale until the next trigger.
    DiscardSuperseded,
}

/// Document lifecycle notifications, carrying the document's current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Opened { key: DocumentKey, text: String },
    Saved { key: DocumentKey, text: String },
    ActiveChanged { key: DocumentKey, text: String },
    Edited { key: DocumentKey, text: String },
    Closed { key: DocumentKey },
}

impl DocumentEvent {
    pub fn key(&self) -> &DocumentKey {
        match self {
            DocumentEvent::Opened { key, .. }
            | DocumentEvent::Saved { key, .. }
            | DocumentEvent::ActiveChanged { key, .. }
            | DocumentEvent::Edited { key, .. }
            | DocumentEvent::Closed { key } => key,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            DocumentEvent::Opened { .. } => "opened",
            DocumentEvent::Saved { .. } => "saved",
            DocumentEvent::ActiveChanged { .. } => "active_changed",
            DocumentEvent::Edited { .. } => "edited",
            DocumentEvent::Closed { .. } => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RefreshTicket {
    id: u64,
    revision: u64,
}

#[derive(Debug)]
struct TrackedDocument {
    text: String,
    phase: DocumentPhase,
    /// Bumped whenever the text changes.
    revision: u64,
    in_flight: Option<RefreshTicket>,
    /// A trigger was coalesced into the running refresh.
    rerun_requested: bool,
}

impl TrackedDocument {
    fn new(text: String) -> Self {
        Self {
            text,
            phase: DocumentPhase::Unanalyzed,
            revision: 0,
            in_flight: None,
            rerun_requested: false,
        }
    }

    fn update_text(&mut self, text: String) {
        if self.text != text {
            self.text = text;
            self.revision += 1;
        }
    }

    fn owns(&self, ticket: RefreshTicket) -> bool {
        self.in_flight.is_some_and(|current| current.id == ticket.id)
    }

    fn start(&mut self, id: u64) -> RefreshTicket {
        let ticket = RefreshTicket {
            id,
            revision: self.revision,
        };
        self.in_flight = Some(ticket);
        self.rerun_requested = false;
        self.phase = DocumentPhase::Refreshing;
        ticket
    }
}

struct AnalysisBatch {
    ratings: Vec<RatingRecord>,
    maintainability: MaintainabilityRecord,
    stats: SourceStatsRecord,
}

pub struct RefreshCoordinator {
    client: Arc<dyn AnalysisClient>,
    gate: Arc<VersionGate>,
    cache: Arc<AnalysisCache>,
    event_bus: Arc<EventBus>,
    resolver: PositionResolver,
    policy: CommitPolicy,
    documents: DashMap<DocumentKey, TrackedDocument>,
    next_refresh_id: AtomicU64,
}

impl RefreshCoordinator {
    /// The gate, cache and bus are process-scoped and shared with whoever
    /// renders; the coordinator only borrows them.
    pub fn new(
        client: Arc<dyn AnalysisClient>,
        gate: Arc<VersionGate>,
        cache: Arc<AnalysisCache>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            gate,
            cache,
            event_bus,
            resolver: PositionResolver,
            policy: CommitPolicy::default(),
            documents: DashMap::new(),
            next_refresh_id: AtomicU64::new(1),
        }
    }

    pub fn with_policy(mut self, policy: CommitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Applies a lifecycle event. Returns the handle of the refresh pipeline
    /// if the event started one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn handle_event(self: &Arc<Self>, event: DocumentEvent) -> Option<JoinHandle<()>> {
        debug!("Document {} {}", event.key(), event.kind());

        match event {
            DocumentEvent::Opened { key, text }
            | DocumentEvent::Saved { key, text }
            | DocumentEvent::ActiveChanged { key, text } => self.request_refresh(key, text),
            DocumentEvent::Edited { key, text } => {
                self.mark_edited(key, text);
                None
            }
            DocumentEvent::Closed { key } => {
                self.forget(&key);
                None
            }
        }
    }

    pub fn snapshot(&self, key: &DocumentKey) -> Option<DocumentAnalysisState> {
        self.cache.get(key)
    }

    /// `None` for documents that are not open.
    pub fn phase(&self, key: &DocumentKey) -> Option<DocumentPhase> {
        self.documents.get(key).map(|document| document.phase)
    }

    pub fn is_refreshing(&self, key: &DocumentKey) -> bool {
        self.documents
            .get(key)
            .is_some_and(|document| document.in_flight.is_some())
    }

    pub fn open_documents(&self) -> Vec<DocumentKey> {
        let mut keys: Vec<DocumentKey> = self
            .documents
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LensEvent> {
        self.event_bus.subscribe()
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    pub fn version_gate(&self) -> &Arc<VersionGate> {
        &self.gate
    }

    fn request_refresh(self: &Arc<Self>, key: DocumentKey, text: String) -> Option<JoinHandle<()>> {
        let ticket = {
            let mut document = self
                .documents
                .entry(key.clone())
                .or_insert_with(|| TrackedDocument::new(text.clone()));
            document.update_text(text);

            if let Some(running) = document.in_flight {
                debug!(
                    "Refresh {} already running for {}, coalescing trigger",
                    running.id, key
                );
                document.rerun_requested = true;
                return None;
            }

            document.start(self.next_refresh_id.fetch_add(1, Ordering::SeqCst))
        };

        info!("Starting refresh {} for {}", ticket.id, key);
        let coordinator = Arc::clone(self);
        Some(tokio::spawn(async move {
            coordinator.run_refresh(key, ticket).await;
        }))
    }

    /// Runs synchronously so that a render arriving before the next refresh
    /// sees the stale sentinel.
    fn mark_edited(&self, key: DocumentKey, text: String) {
        {
            let mut document = self
                .documents
                .entry(key.clone())
                .or_insert_with(|| TrackedDocument::new(text.clone()));
            document.update_text(text);
            document.phase = DocumentPhase::Stale;
        }
        self.cache.invalidate(&key);
    }

    fn forget(&self, key: &DocumentKey) {
        if let Some((_, document)) = self.documents.remove(key) {
            if let Some(running) = document.in_flight {
                debug!(
                    "Closed {} with refresh {} in flight, its result will be dropped",
                    key, running.id
                );
            }
        }
        self.cache.evict(key);
        info!("Stopped tracking {}", key);
    }

    async fn run_refresh(&self, key: DocumentKey, mut ticket: RefreshTicket) {
        let path = key.to_path_buf();
        loop {
            match self.fetch(&path).await {
                Ok(batch) => match self.complete(&key, ticket, batch) {
                    Some(next) => {
                        info!(
                            "Starting refresh {} for {} to cover a coalesced trigger",
                            next.id, key
                        );
                        ticket = next;
                    }
                    None => return,
                },
                Err(e) => return self.fail(&key, ticket, e),
            }
        }
    }

    async fn fetch(&self, path: &Path) -> Result<AnalysisBatch> {
        let version = self.gate.ensure_supported().await?;
        debug!(
            "Running analysis of {} with tool version {}",
            path.display(),
            version
        );

        let (ratings, maintainability, stats) = tokio::try_join!(
            self.client.complexity(path),
            self.client.maintainability(path),
            self.client.raw_stats(path),
        )?;

        Ok(AnalysisBatch {
            ratings,
            maintainability,
            stats,
        })
    }

    /// Commits `batch` unless it no longer belongs to the document. Returns
    /// the ticket of a follow-up refresh when a discarded result had triggers
    /// coalesced into it.
    fn complete(
        &self,
        key: &DocumentKey,
        ticket: RefreshTicket,
        batch: AnalysisBatch,
    ) -> Option<RefreshTicket> {
        {
            let Some(mut document) = self.documents.get_mut(key) else {
                debug!(
                    "Dropping result of refresh {} for closed document {}",
                    ticket.id, key
                );
                return None;
            };
            if !document.owns(ticket) {
                debug!(
                    "Dropping result of refresh {} for reopened document {}",
                    ticket.id, key
                );
                return None;
            }
            document.in_flight = None;
            let rerun = std::mem::take(&mut document.rerun_requested);

            if self.policy == CommitPolicy::DiscardSuperseded
                && document.revision != ticket.revision
            {
                info!(
                    "Discarding refresh {} for {}: started at revision {}, document is at {}",
                    ticket.id, key, ticket.revision, document.revision
                );
                if rerun {
                    let id = self.next_refresh_id.fetch_add(1, Ordering::SeqCst);
                    return Some(document.start(id));
                }
                return None;
            }

            let ratings = self.resolve_ratings(key, &document.text, batch.ratings);
            self.cache
                .commit(key, ratings, Some(batch.maintainability), Some(batch.stats));
            document.phase = DocumentPhase::Ready;
        }

        info!("Refresh {} for {} completed", ticket.id, key);
        self.event_bus.send(&LensEvent::results_changed(key.as_str()));
        None
    }

    fn fail(&self, key: &DocumentKey, ticket: RefreshTicket, err: AnalysisError) {
        if let Some(mut document) = self.documents.get_mut(key) {
            if document.owns(ticket) {
                document.in_flight = None;
                document.rerun_requested = false;
                document.phase = DocumentPhase::Errored;
            }
        }

        error!("Refresh {} for {} failed: {}", ticket.id, key, err);
        self.event_bus.send(&LensEvent::remediation_needed(
            Some(key.to_string()),
            err.to_string(),
            err.suggested_action(),
        ));
    }

    /// Maps locators onto `text`, dropping ratings that no longer land on a word.
    fn resolve_ratings(
        &self,
        key: &DocumentKey,
        text: &str,
        ratings: Vec<RatingRecord>,
    ) -> Vec<RatingRecord> {
        ratings
            .into_iter()
            .filter_map(|mut rating| match self.resolver.resolve(text, rating.locator) {
                Some(range) => {
                    rating.resolved_range = Some(range);
                    Some(rating)
                }
                None => {
                    debug!(
                        "Dropping rating for {} in {}: {}:{} no longer resolves",
                        rating.name, key, rating.locator.line, rating.locator.column
                    );
                    None
                }
            })
            .collect()
    }
}
