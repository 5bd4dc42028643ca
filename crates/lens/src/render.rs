//! Turns cached analysis state into annotation text.
//!
//! Only ratings whose locator resolved against the current text produce an
//! annotation. Whether annotations are shown at all is decided by the caller
//! at render time; a disabled flag yields nothing but leaves the cache alone.

use analysis::{DocumentAnalysisState, RatingRecord};
use event_bus::SuggestedAction;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// 0-based line of the annotated unit's name.
    pub line: u32,
    pub character: u32,
    pub text: String,
}

pub fn rating_label(rating: &RatingRecord) -> String {
    format!(
        "{} {}: complexity {} ({})",
        rating.unit_type, rating.name, rating.complexity, rating.rank
    )
}

pub fn annotations(state: &DocumentAnalysisState, enabled: bool) -> Vec<Annotation> {
    if !enabled {
        return Vec::new();
    }

    let mut annotations: Vec<Annotation> = state
        .ratings
        .iter()
        .filter_map(|rating| {
            let range = rating.resolved_range?;
            Some(Annotation {
                line: range.start.line,
                character: range.start.character,
                text: rating_label(rating),
            })
        })
        .collect();
    annotations.sort_by_key(|a| (a.line, a.character));
    annotations
}

/// One-line file summary, or `None` when no maintainability record exists.
pub fn summary(state: &DocumentAnalysisState) -> Option<String> {
    let maintainability = state.maintainability?;
    let mut line = format!(
        "maintainability index {:.2} ({})",
        maintainability.index, maintainability.rank
    );
    if let Some(stats) = state.stats {
        let _ = write!(
            line,
            ", {} lines, {} source, {} logical, {} comments, {} blank",
            stats.total_lines,
            stats.source_lines,
            stats.logical_lines,
            stats.single_line_comments,
            stats.blank_lines
        );
    }
    Some(line)
}

/// Plain-text report of `text` with each annotation placed after its line.
pub fn report(
    document: &str,
    text: &str,
    state: Option<&DocumentAnalysisState>,
    enabled: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{document}");

    let Some(state) = state else {
        let _ = writeln!(out, "  no analysis available");
        return out;
    };
    if !enabled {
        let _ = writeln!(out, "  annotations disabled");
        return out;
    }
    if state.is_stale() {
        let _ = writeln!(out, "  stale, waiting for the next refresh");
        return out;
    }

    if let Some(summary) = summary(state) {
        let _ = writeln!(out, "  {summary}");
    }

    let lines: Vec<&str> = text.lines().collect();
    for annotation in annotations(state, enabled) {
        let source = lines
            .get(annotation.line as usize)
            .map(|l| l.trim_end())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>5} | {source}  <- {}",
            annotation.line + 1,
            annotation.text
        );
    }
    out
}

pub fn remediation_hint(action: SuggestedAction) -> &'static str {
    match action {
        SuggestedAction::InstallTool => "Install radon with: pip install radon",
        SuggestedAction::UpgradeTool => "Upgrade radon with: pip install --upgrade radon",
    }
}
