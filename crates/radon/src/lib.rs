//! [`AnalysisClient`] backed by the `radon` executable.
//!
//! Each call spawns one radon process:
//!
//! | call              | command                  |
//! |-------------------|--------------------------|
//! | `tool_version`    | `radon --version`        |
//! | `complexity`      | `radon cc -j <path>`     |
//! | `maintainability` | `radon mi -j <path>`     |
//! | `raw_stats`       | `radon raw -j <path>`    |
//!
//! Output is validated here and converted into the fixed-shape records of
//! the analysis crate.

pub mod wire;

use analysis::{
    AnalysisClient, ClientError, MaintainabilityRecord, RatingRecord, SourceStatsRecord,
    ToolVersion,
};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_EXECUTABLE: &str = "radon";

#[derive(Debug, Clone)]
pub struct RadonClient {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl RadonClient {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Kills radon runs that take longer than `timeout`. No limit by default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn tool_name(&self) -> String {
        self.executable
            .file_name()
            .unwrap_or(self.executable.as_os_str())
            .to_string_lossy()
            .to_string()
    }

    async fn run<I, S>(&self, args: I) -> Result<String, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let tool = self.tool_name();
        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {:?}", command.as_std());

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| ClientError::Timeout {
                    tool: tool.clone(),
                    limit,
                })?,
            None => command.output().await,
        }
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ClientError::ToolMissing { tool: tool.clone() },
            _ => ClientError::Spawn {
                tool: tool.clone(),
                source: e,
            },
        })?;

        if !output.status.success() {
            return Err(ClientError::NonZeroExit {
                tool,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_json(&self, subcommand: &str, path: &Path) -> Result<String, ClientError> {
        self.run([OsStr::new(subcommand), OsStr::new("-j"), path.as_os_str()])
            .await
    }
}

impl Default for RadonClient {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

#[async_trait]
impl AnalysisClient for RadonClient {
    async fn tool_version(&self) -> Result<ToolVersion, ClientError> {
        let stdout = self.run(["--version"]).await?;
        wire::parse_version(&stdout)
    }

    async fn complexity(&self, path: &Path) -> Result<Vec<RatingRecord>, ClientError> {
        let stdout = self.run_json("cc", path).await?;
        wire::parse_complexity(&stdout)
    }

    async fn maintainability(&self, path: &Path) -> Result<MaintainabilityRecord, ClientError> {
        let stdout = self.run_json("mi", path).await?;
        wire::parse_maintainability(&stdout)
    }

    async fn raw_stats(&self, path: &Path) -> Result<SourceStatsRecord, ClientError> {
        let stdout = self.run_json("raw", path).await?;
        wire::parse_raw(&stdout)
    }
}
