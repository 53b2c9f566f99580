use anyhow::Context;

use crate::config::PipelineConfig;

/// Print the effective configuration as TOML.
#[derive(Debug, clap::Args)]
pub struct ShowConfig {}

impl ShowConfig {
    pub fn run(self, config: &PipelineConfig) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(config).context("rendering configuration")?;
        print!("{text}");
        Ok(())
    }
}
