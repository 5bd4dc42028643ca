//! JSON-lines protocol for editor hosts.
//!
//! Each input line is one request, tagged by `event`:
//!
//! ```text
//! {"event":"opened","path":"/work/app.py","text":"def main(): ..."}
//! {"event":"edited","path":"/work/app.py","text":"def main(): pass"}
//! {"event":"snapshot","path":"/work/app.py"}
//! {"event":"shutdown"}
//! ```
//!
//! Each output line is one message, tagged by `message`. Bus events are
//! forwarded as they happen and every `ResultsChanged` is followed by a
//! snapshot of the affected document. When input ends, in-flight refreshes
//! are drained before exiting.

use crate::context::LensContext;
use crate::render::{self, Annotation};
use analysis::{DocumentAnalysisState, DocumentEvent, DocumentKey, DocumentPhase};
use anyhow::{Result, anyhow};
use event_bus::LensEvent;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const OUTPUT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServeRequest {
    Opened { path: String, text: String },
    Saved { path: String, text: String },
    ActiveChanged { path: String, text: String },
    Edited { path: String, text: String },
    Closed { path: String },
    Snapshot { path: String },
    Shutdown,
}

impl ServeRequest {
    fn into_document_event(self) -> Option<DocumentEvent> {
        let event = match self {
            ServeRequest::Opened { path, text } => DocumentEvent::Opened {
                key: DocumentKey::from_path(path),
                text,
            },
            ServeRequest::Saved { path, text } => DocumentEvent::Saved {
                key: DocumentKey::from_path(path),
                text,
            },
            ServeRequest::ActiveChanged { path, text } => DocumentEvent::ActiveChanged {
                key: DocumentKey::from_path(path),
                text,
            },
            ServeRequest::Edited { path, text } => DocumentEvent::Edited {
                key: DocumentKey::from_path(path),
                text,
            },
            ServeRequest::Closed { path } => DocumentEvent::Closed {
                key: DocumentKey::from_path(path),
            },
            ServeRequest::Snapshot { .. } | ServeRequest::Shutdown => return None,
        };
        Some(event)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum ServeMessage {
    Event {
        event: LensEvent,
    },
    Snapshot {
        document: String,
        phase: Option<DocumentPhase>,
        annotations_enabled: bool,
        summary: Option<String>,
        annotations: Vec<Annotation>,
        state: Option<DocumentAnalysisState>,
    },
    Error {
        reason: String,
    },
}

fn snapshot_message(context: &LensContext, key: &DocumentKey) -> ServeMessage {
    let state = context.coordinator.snapshot(key);
    let enabled = context.annotations_enabled();
    ServeMessage::Snapshot {
        document: key.to_string(),
        phase: context.coordinator.phase(key),
        annotations_enabled: enabled,
        summary: state.as_ref().and_then(render::summary),
        annotations: state
            .as_ref()
            .map(|state| render::annotations(state, enabled))
            .unwrap_or_default(),
        state,
    }
}

pub async fn run(context: &LensContext) -> Result<()> {
    info!("Serving document events on stdin");
    let input = BufReader::new(tokio::io::stdin());
    serve(context, input, tokio::io::stdout()).await?;
    info!("Input closed, shutting down");
    Ok(())
}

/// Runs the protocol until `input` ends or a shutdown request arrives and
/// hands `output` back once every message has been written.
pub async fn serve<R, W>(context: &LensContext, input: R, output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
    let writer = tokio::spawn(write_messages(out_rx, output));

    let shutdown = CancellationToken::new();
    let forwarder = tokio::spawn(forward_events(
        context.clone(),
        context.coordinator.subscribe(),
        out_tx.clone(),
        shutdown.clone(),
    ));

    let mut pending: Vec<JoinHandle<()>> = Vec::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<ServeRequest>(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring malformed request: {e}");
                let reason = format!("Malformed request: {e}");
                send(&out_tx, ServeMessage::Error { reason }).await?;
                continue;
            }
        };

        match request {
            ServeRequest::Shutdown => break,
            ServeRequest::Snapshot { path } => {
                let key = DocumentKey::from_path(path);
                send(&out_tx, snapshot_message(context, &key)).await?;
            }
            request => {
                if let Some(handle) = request
                    .into_document_event()
                    .and_then(|event| context.coordinator.handle_event(event))
                {
                    pending.push(handle);
                }
            }
        }
        pending.retain(|handle| !handle.is_finished());
    }

    debug!("Draining {} in-flight refreshes", pending.len());
    for handle in pending {
        if let Err(e) = handle.await {
            warn!("Refresh task failed: {e}");
        }
    }

    shutdown.cancel();
    forwarder.await?;
    drop(out_tx);
    writer.await?
}

async fn send(out: &mpsc::Sender<ServeMessage>, message: ServeMessage) -> Result<()> {
    out.send(message)
        .await
        .map_err(|_| anyhow!("Output writer stopped"))
}

async fn forward_events(
    context: LensContext,
    mut events: broadcast::Receiver<LensEvent>,
    out: mpsc::Sender<ServeMessage>,
    shutdown: CancellationToken,
) {
    loop {
        // Pending events are forwarded before a shutdown is observed.
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => {
                    let snapshot = match &event {
                        LensEvent::ResultsChanged(changed) => Some(snapshot_message(
                            &context,
                            &DocumentKey::from(changed.document.as_str()),
                        )),
                        LensEvent::RemediationNeeded(_) => None,
                    };
                    if send(&out, ServeMessage::Event { event }).await.is_err() {
                        break;
                    }
                    if let Some(snapshot) = snapshot {
                        if send(&out, snapshot).await.is_err() {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn write_messages<W>(mut messages: mpsc::Receiver<ServeMessage>, mut output: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = messages.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis::ToolVersion;
    use analysis::testing::{FakeAnalysisClient, rating};
    use lens_config::{DataDirectory, LensSettings};
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    const OPEN_APP: &str =
        r#"{"event":"opened","path":"/work/app.py","text":"def main():\n    return 1\n"}"#;

    fn context(client: FakeAnalysisClient, temp_dir: &TempDir) -> LensContext {
        let data_directory = DataDirectory::new(temp_dir.path().to_path_buf()).unwrap();
        LensContext::with_client(data_directory, &LensSettings::default(), Arc::new(client))
            .unwrap()
    }

    async fn run_session(context: &LensContext, requests: &[&str]) -> Vec<Value> {
        let input = requests.join("\n");
        let output = serve(context, input.as_bytes(), Vec::new()).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_request_parsing() {
        let request: ServeRequest = serde_json::from_str(OPEN_APP).unwrap();
        assert_eq!(
            request,
            ServeRequest::Opened {
                path: "/work/app.py".to_string(),
                text: "def main():\n    return 1\n".to_string(),
            }
        );

        let request: ServeRequest =
            serde_json::from_str(r#"{"event":"active_changed","path":"a.py","text":""}"#).unwrap();
        assert!(matches!(
            request.into_document_event(),
            Some(DocumentEvent::ActiveChanged { .. })
        ));

        let request: ServeRequest = serde_json::from_str(r#"{"event":"shutdown"}"#).unwrap();
        assert_eq!(request.into_document_event(), None);
    }

    #[tokio::test]
    async fn test_open_forwards_results_and_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new().with_ratings(vec![rating("main", 1, 4)]);
        let context = context(client, &temp_dir);

        let messages = run_session(&context, &[OPEN_APP]).await;

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["message"], "event");
        assert_eq!(messages[0]["event"]["type"], "ResultsChanged");
        assert_eq!(messages[0]["event"]["payload"]["document"], "/work/app.py");

        let snapshot = &messages[1];
        assert_eq!(snapshot["message"], "snapshot");
        assert_eq!(snapshot["phase"], "Ready");
        assert_eq!(snapshot["annotations_enabled"], true);
        assert_eq!(snapshot["annotations"][0]["line"], 0);
        assert_eq!(
            snapshot["annotations"][0]["text"],
            "function main: complexity 1 (A)"
        );
    }

    #[tokio::test]
    async fn test_unsupported_version_forwards_remediation() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new().with_version(ToolVersion::new(4, 5));
        let context = context(client, &temp_dir);

        let messages = run_session(&context, &[OPEN_APP]).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["event"]["type"], "RemediationNeeded");
        assert_eq!(
            messages[0]["event"]["payload"]["suggested_action"],
            "upgrade_tool"
        );
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_requests_report_errors() {
        let temp_dir = TempDir::new().unwrap();
        let context = context(FakeAnalysisClient::new(), &temp_dir);

        let messages = run_session(
            &context,
            &["{ nope", r#"{"event":"renamed","path":"a.py"}"#, ""],
        )
        .await;

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m["message"] == "error"));
        assert!(
            messages[0]["reason"]
                .as_str()
                .unwrap()
                .starts_with("Malformed request:")
        );
        assert!(messages[1]["reason"].as_str().unwrap().contains("renamed"));
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_document() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new();
        let context = context(client, &temp_dir);

        let messages =
            run_session(&context, &[r#"{"event":"snapshot","path":"/work/other.py"}"#]).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["message"], "snapshot");
        assert!(messages[0]["phase"].is_null());
        assert!(messages[0]["state"].is_null());
        assert_eq!(messages[0]["annotations"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_disabled_annotations_keep_state() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new().with_ratings(vec![rating("main", 1, 4)]);
        let context = context(client, &temp_dir);
        LensSettings {
            annotations_enabled: false,
            ..Default::default()
        }
        .save(&context.data_directory.settings_path)
        .unwrap();

        let messages = run_session(&context, &[OPEN_APP]).await;

        let snapshot = &messages[1];
        assert_eq!(snapshot["annotations_enabled"], false);
        assert_eq!(snapshot["annotations"], Value::Array(vec![]));
        assert_eq!(snapshot["state"]["ratings"][0]["name"], "main");
    }

    #[tokio::test]
    async fn test_edit_then_snapshot_reports_stale() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new().with_ratings(vec![rating("main", 1, 4)]);
        let context = context(client, &temp_dir);

        let first = run_session(&context, &[OPEN_APP]).await;
        assert_eq!(first[1]["phase"], "Ready");

        let messages = run_session(
            &context,
            &[
                r#"{"event":"edited","path":"/work/app.py","text":"def main():\n    return 2\n"}"#,
                r#"{"event":"snapshot","path":"/work/app.py"}"#,
                r#"{"event":"shutdown"}"#,
                OPEN_APP,
            ],
        )
        .await;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["phase"], "Stale");
        assert_eq!(messages[0]["state"]["ratings"], Value::Array(vec![]));
        assert!(messages[0]["summary"].is_null());
    }
}
