mod cli;
mod commands;
mod context;
mod render;

use crate::cli::{Commands, LensCli};
use crate::context::LensContext;
use lens_config::DataDirectory;
use logging::LogMode;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = LensCli::parse_args();
    let data_directory = DataDirectory::new_system_default()?;

    match cli.command {
        Commands::Analyze {
            file,
            json,
            radon,
            verbose,
        } => {
            let _guards = logging::init(LogMode::Cli, verbose)?;
            let context = LensContext::new(data_directory, radon)?;
            if !commands::analyze::run(&context, &file, json).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Serve { radon, verbose } => {
            let _guards = logging::init(LogMode::Server(&data_directory), verbose)?;
            let context = LensContext::new(data_directory, radon)?;
            commands::serve::run(&context).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
