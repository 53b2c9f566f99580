use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use crawjud_fetch::{BatchReport, BotRegistry, Orchestrator, TracingReporter};
use crawjud_storage::{JsonFileCache, open_store};

use crate::batch::read_batch;
use crate::config::PipelineConfig;

/// Run the batch stored in a folder and print its report as JSON.
#[derive(Debug, clap::Args)]
pub struct Run {
    /// Folder holding `batch.json`; also the default metadata cache location.
    #[arg(long)]
    pub folder: PathBuf,

    /// Batch identifier used for progress rooms and document keys.
    /// Defaults to the folder name.
    #[arg(long)]
    pub pid: Option<String>,

    /// Tribunal system whose bot runs the batch.
    #[arg(long, default_value = "pje")]
    pub system: String,
}

impl Run {
    pub fn run(self, config: &PipelineConfig) -> anyhow::Result<()> {
        let pid = self.pid.clone().unwrap_or_else(|| default_pid(&self.folder));
        let records = read_batch(&self.folder)?;

        let store = open_store(&config.storage).context("opening object store")?;
        let bot = BotRegistry::with_defaults()
            .build(&self.system, &config.bot_deps(store))
            .with_context(|| format!("building the `{}` bot", self.system))?;
        let cache = Arc::new(JsonFileCache::new(config.cache.dir_for(&self.folder)));

        let orchestrator = Orchestrator::new(bot, cache, Arc::new(TracingReporter), config.pool);
        let report = orchestrator.run(&pid, records);

        tracing::info!(
            pid = %report.pid,
            completed = report.completed(),
            metadata_only = report.metadata_only(),
            failed = report.failed(),
            rejected = report.rejected,
            "batch report ready"
        );
        print_report(&report)
    }
}

fn default_pid(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "batch".to_string())
}

fn print_report(report: &BatchReport) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, report).context("writing report")?;
    writeln!(out).context("writing report")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_defaults_to_folder_name() {
        assert_eq!(default_pid(Path::new("runs/ab12cd")), "ab12cd");
        assert_eq!(default_pid(Path::new("/")), "batch");
    }
}
