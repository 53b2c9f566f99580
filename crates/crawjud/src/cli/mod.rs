mod normalize;
mod run;
mod show;

use std::path::PathBuf;

use crate::config::PipelineConfig;

#[derive(Debug, clap::Parser)]
#[command(name = "crawjud", version, about = "Retrieve PJe case metadata and full-text documents")]
pub struct Cli {
    /// Configuration file; `crawjud.toml` in the working directory when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    Run(run::Run),
    Normalize(normalize::Normalize),
    Config(show::ShowConfig),
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Normalize(cmd) => {
                cmd.run();
                Ok(())
            }
            Command::Run(cmd) => cmd.run(&load(self.config)?),
            Command::Config(cmd) => cmd.run(&load(self.config)?),
        }
    }
}

fn load(path: Option<PathBuf>) -> anyhow::Result<PipelineConfig> {
    use anyhow::Context;
    PipelineConfig::load(path.as_deref()).context("loading configuration")
}
