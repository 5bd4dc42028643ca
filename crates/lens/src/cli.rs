use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lens",
    version,
    about = "Inline complexity and maintainability annotations for Python sources",
    long_about = "Runs radon over Python files and reports per-function complexity, \
                  maintainability index and source statistics as annotations."
)]
pub struct LensCli {
    #[command(subcommand)]
    pub command: Commands,
}

impl LensCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a single file and print its annotations
    Analyze {
        /// Python file to analyze
        file: PathBuf,

        /// Print the analysis snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Path to the radon executable (overrides the settings file)
        #[arg(long, value_name = "PATH")]
        radon: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Serve document lifecycle events as JSON lines on stdin/stdout
    Serve {
        /// Path to the radon executable (overrides the settings file)
        #[arg(long, value_name = "PATH")]
        radon: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}
