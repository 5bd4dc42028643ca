//! # Analysis
//!
//! The per-document analysis cache and staleness coordinator behind
//! metrics-lens.
//!
//! This crate provides:
//! - [`AnalysisCache`]: the latest complexity, maintainability and source
//!   statistics known for each open document
//! - [`RefreshCoordinator`]: turns document lifecycle events into cache
//!   invalidations and asynchronous refresh pipelines
//! - [`VersionGate`]: memoized check that the analysis tool is recent enough
//! - [`PositionResolver`]: maps tool locators onto word ranges in the current text
//!
//! The analysis tool itself sits behind the [`AnalysisClient`] trait.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use analysis::{
//!     AnalysisCache, AnalysisClient, DocumentEvent, DocumentKey, RefreshCoordinator,
//!     ToolVersion, VersionGate,
//! };
//! use event_bus::EventBus;
//!
//! async fn open(client: Arc<dyn AnalysisClient>, text: String) {
//!     let gate = Arc::new(VersionGate::new(client.clone(), ToolVersion::new(5, 1)));
//!     let coordinator = Arc::new(RefreshCoordinator::new(
//!         client,
//!         gate,
//!         Arc::new(AnalysisCache::new()),
//!         Arc::new(EventBus::new()),
//!     ));
//!
//!     let key = DocumentKey::from_path("app.py");
//!     if let Some(refresh) = coordinator.handle_event(DocumentEvent::Opened { key: key.clone(), text }) {
//!         let _ = refresh.await;
//!     }
//!     println!("{:?}", coordinator.snapshot(&key));
//! }
//! ```

pub mod cache;
pub mod client;
pub mod coordinator;
pub mod errors;
pub mod position;
pub mod types;
pub mod version_gate;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::AnalysisCache;
pub use client::AnalysisClient;
pub use coordinator::{CommitPolicy, DocumentEvent, RefreshCoordinator};
pub use errors::{AnalysisError, ClientError, Result};
pub use position::PositionResolver;
pub use types::{
    DocumentAnalysisState, DocumentKey, DocumentPhase, Locator, MaintainabilityRecord, Rank,
    RatingRecord, SourceStatsRecord, TextPosition, TextRange, ToolVersion, UnitType,
};
pub use version_gate::VersionGate;
