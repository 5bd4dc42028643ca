//! JSON shapes printed by `radon cc|mi|raw -j` and their conversion into
//! analysis records.
//!
//! Every subcommand prints an object keyed by file path. The value is either
//! the result for that file or `{"error": "..."}` when radon could not
//! analyze it.

use analysis::{
    ClientError, Locator, MaintainabilityRecord, Rank, RatingRecord, SourceStatsRecord,
    ToolVersion, UnitType,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileResult<T> {
    Failed { error: String },
    Analyzed(T),
}

#[derive(Debug, Deserialize)]
struct ComplexityBlock {
    #[serde(rename = "type")]
    block_type: String,
    name: String,
    lineno: u32,
    col_offset: u32,
    complexity: u32,
    rank: String,
    #[serde(default)]
    classname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaintainabilityResult {
    mi: f64,
    rank: String,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    loc: u64,
    lloc: u64,
    sloc: u64,
    multi: u64,
    blank: u64,
    single_comments: u64,
}

/// Extracts the single file entry from radon's path-keyed output.
fn single_file<T: DeserializeOwned>(stdout: &str) -> Result<T, ClientError> {
    let by_file: BTreeMap<String, FileResult<T>> =
        serde_json::from_str(stdout).map_err(|e| ClientError::Malformed(e.to_string()))?;

    let mut entries = by_file.into_iter();
    let (path, result) = entries
        .next()
        .ok_or_else(|| ClientError::Malformed("radon reported no files".to_string()))?;
    if entries.next().is_some() {
        return Err(ClientError::Malformed(
            "radon reported more than one file".to_string(),
        ));
    }

    match result {
        FileResult::Analyzed(value) => Ok(value),
        FileResult::Failed { error } => Err(ClientError::Reported(format!("{path}: {error}"))),
    }
}

fn parse_rank(rank: &str) -> Result<Rank, ClientError> {
    rank.trim()
        .parse()
        .map_err(|_| ClientError::Malformed(format!("unknown rank {rank:?}")))
}

pub fn parse_version(stdout: &str) -> Result<ToolVersion, ClientError> {
    stdout.trim().parse()
}

pub fn parse_complexity(stdout: &str) -> Result<Vec<RatingRecord>, ClientError> {
    let blocks: Vec<ComplexityBlock> = single_file(stdout)?;

    blocks
        .into_iter()
        .map(|block| {
            let unit_type: UnitType = block.block_type.parse().map_err(|_| {
                ClientError::Malformed(format!("unknown block type {:?}", block.block_type))
            })?;
            let name = match (unit_type, block.classname) {
                (UnitType::Method, Some(classname)) => format!("{classname}.{}", block.name),
                _ => block.name,
            };
            Ok(RatingRecord {
                name,
                unit_type,
                complexity: block.complexity,
                rank: parse_rank(&block.rank)?,
                locator: Locator::new(block.lineno, block.col_offset),
                resolved_range: None,
            })
        })
        .collect()
}

pub fn parse_maintainability(stdout: &str) -> Result<MaintainabilityRecord, ClientError> {
    let result: MaintainabilityResult = single_file(stdout)?;
    Ok(MaintainabilityRecord {
        index: result.mi,
        rank: parse_rank(&result.rank)?,
    })
}

pub fn parse_raw(stdout: &str) -> Result<SourceStatsRecord, ClientError> {
    let result: RawResult = single_file(stdout)?;
    Ok(SourceStatsRecord {
        total_lines: result.loc,
        logical_lines: result.lloc,
        source_lines: result.sloc,
        single_line_comments: result.single_comments,
        multi_line_strings: result.multi,
        blank_lines: result.blank,
    })
}
