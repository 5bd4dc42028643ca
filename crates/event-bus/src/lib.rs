//! # metrics-lens Event Bus
//!
//! The event bus broadcasts what the analysis core has accomplished to
//! whoever renders it. Two things are announced:
//!
//! - **Results changed**: a new analysis snapshot was committed for a document
//!   and any annotations shown for it should be redrawn from the cache.
//! - **Remediation needed**: a refresh failed. The payload carries a
//!   human-readable message and, when the user can fix it, a suggested action
//!   such as installing or upgrading the analysis tool.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │   Refresh       │    │  Event Bus   │    │   Consumers     │
//! │   Coordinator   │───▶│  (Broadcast) │───▶│   • CLI         │
//! │                 │    │              │    │   • serve/JSONL │
//! │ • commits       │    │              │    │   • Editor      │
//! │ • failures      │    │              │    │                 │
//! └─────────────────┘    └──────────────┘    └─────────────────┘
//! ```
//!
//! Events only name the document; consumers read the snapshot itself from
//! the cache when they re-render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Sender};
use ts_rs::TS;

#[derive(Clone, Debug, PartialEq, Serialize, TS)]
#[ts(export, export_to = "events.ts")]
#[serde(tag = "type", content = "payload")]
pub enum LensEvent {
    ResultsChanged(ResultsChanged),
    RemediationNeeded(RemediationNeeded),
}

impl LensEvent {
    pub fn results_changed(document: impl Into<String>) -> Self {
        LensEvent::ResultsChanged(ResultsChanged {
            document: document.into(),
            changed_at: Utc::now(),
        })
    }

    pub fn remediation_needed(
        document: Option<String>,
        message: impl Into<String>,
        suggested_action: Option<SuggestedAction>,
    ) -> Self {
        LensEvent::RemediationNeeded(RemediationNeeded {
            document,
            message: message.into(),
            suggested_action,
            raised_at: Utc::now(),
        })
    }

    /// The document the event is about, if any.
    pub fn document(&self) -> Option<&str> {
        match self {
            LensEvent::ResultsChanged(event) => Some(&event.document),
            LensEvent::RemediationNeeded(event) => event.document.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, TS)]
#[ts(export, export_to = "events.ts")]
pub struct ResultsChanged {
    pub document: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, TS)]
#[ts(export, export_to = "events.ts")]
pub struct RemediationNeeded {
    pub document: Option<String>,
    pub message: String,
    pub suggested_action: Option<SuggestedAction>,
    pub raised_at: DateTime<Utc>,
}

/// Corrective action a consumer can offer next to a failure message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "events.ts")]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    InstallTool,
    UpgradeTool,
}

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: Sender<LensEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn send(&self, event: &LensEvent) {
        if self.sender.send(event.clone()).is_err() {
            // Nobody is rendering yet, which is fine.
            tracing::info!("No receivers for event bus, ignoring event: {:?}", &event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LensEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
