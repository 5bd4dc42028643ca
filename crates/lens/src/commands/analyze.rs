use crate::context::LensContext;
use crate::render::{self, Annotation};
use analysis::{DocumentAnalysisState, DocumentEvent, DocumentKey};
use anyhow::{Context, Result};
use event_bus::{LensEvent, RemediationNeeded};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error};

#[derive(Debug)]
pub struct AnalyzeReport {
    pub key: DocumentKey,
    pub text: String,
    pub state: Option<DocumentAnalysisState>,
    pub remediation: Option<RemediationNeeded>,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    document: &'a str,
    annotations_enabled: bool,
    summary: Option<String>,
    annotations: Vec<Annotation>,
    state: Option<&'a DocumentAnalysisState>,
}

/// Opens `file` as a document and waits for its first refresh to settle.
pub async fn analyze(context: &LensContext, file: &Path) -> Result<AnalyzeReport> {
    let path = std::path::absolute(file)
        .with_context(|| format!("Failed to resolve {}", file.display()))?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let key = DocumentKey::from_path(&path);

    let mut events = context.coordinator.subscribe();
    let opened = DocumentEvent::Opened {
        key: key.clone(),
        text: text.clone(),
    };
    if let Some(handle) = context.coordinator.handle_event(opened) {
        handle.await.context("Refresh task failed")?;
    }

    let mut remediation = None;
    while let Ok(event) = events.try_recv() {
        debug!("Received {:?}", event);
        if let LensEvent::RemediationNeeded(needed) = event {
            remediation = Some(needed);
        }
    }

    Ok(AnalyzeReport {
        state: context.coordinator.snapshot(&key),
        key,
        text,
        remediation,
    })
}

/// Returns `false` when the file could not be analyzed and the user has to
/// act first.
pub async fn run(context: &LensContext, file: &Path, json: bool) -> Result<bool> {
    let report = analyze(context, file).await?;

    if let Some(remediation) = &report.remediation {
        error!("{}", remediation.message);
        eprintln!("{}", remediation.message);
        if let Some(action) = remediation.suggested_action {
            eprintln!("{}", render::remediation_hint(action));
        }
        return Ok(false);
    }

    let enabled = context.annotations_enabled();
    if json {
        let output = AnalyzeOutput {
            document: report.key.as_str(),
            annotations_enabled: enabled,
            summary: report.state.as_ref().and_then(render::summary),
            annotations: report
                .state
                .as_ref()
                .map(|state| render::annotations(state, enabled))
                .unwrap_or_default(),
            state: report.state.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!(
            "{}",
            render::report(
                report.key.as_str(),
                &report.text,
                report.state.as_ref(),
                enabled
            )
        );
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis::testing::{FakeAnalysisClient, rating};
    use analysis::{Rank, ToolVersion};
    use event_bus::SuggestedAction;
    use lens_config::{DataDirectory, LensSettings};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context(client: FakeAnalysisClient, temp_dir: &TempDir) -> LensContext {
        let data_directory = DataDirectory::new(temp_dir.path().join("data")).unwrap();
        LensContext::with_client(data_directory, &LensSettings::default(), Arc::new(client))
            .unwrap()
    }

    fn python_file(temp_dir: &TempDir) -> std::path::PathBuf {
        let path = temp_dir.path().join("app.py");
        std::fs::write(&path, "def main():\n    return 1\n").unwrap();
        path
    }

    #[tokio::test]
    async fn test_analyze_resolves_ratings_against_file_text() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new()
            .with_ratings(vec![rating("main", 1, 4)])
            .with_maintainability(72.5, Rank::A);
        let context = context(client, &temp_dir);

        let report = analyze(&context, &python_file(&temp_dir)).await.unwrap();

        assert!(report.remediation.is_none());
        let state = report.state.unwrap();
        assert_eq!(state.maintainability.unwrap().index, 72.5);
        let annotations = render::annotations(&state, true);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].line, 0);
        assert_eq!(annotations[0].character, 4);
        assert_eq!(annotations[0].text, "function main: complexity 1 (A)");
    }

    #[tokio::test]
    async fn test_unsupported_tool_reports_upgrade() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new().with_version(ToolVersion::new(5, 0));
        let context = context(client, &temp_dir);

        let report = analyze(&context, &python_file(&temp_dir)).await.unwrap();

        let remediation = report.remediation.unwrap();
        assert_eq!(
            remediation.suggested_action,
            Some(SuggestedAction::UpgradeTool)
        );
        assert!(remediation.message.contains("5.0"));
        assert!(report.state.is_none());
    }

    #[tokio::test]
    async fn test_run_fails_on_remediation() {
        let temp_dir = TempDir::new().unwrap();
        let client = FakeAnalysisClient::new();
        client.set_version(Err("radon is not installed".to_string()));
        let context = context(client, &temp_dir);

        let ok = run(&context, &python_file(&temp_dir), false).await.unwrap();

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let context = context(FakeAnalysisClient::new(), &temp_dir);

        let err = analyze(&context, &temp_dir.path().join("absent.py"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to read"));
    }
}
