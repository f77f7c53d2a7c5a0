//! Backup subcommands

use crate::cli::display::TableRenderer;
use crate::domain::backup;
use crate::domain::config::{Config, OutputFormat};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct BackupListCommand {
    /// Only include snapshots covering this path (can be used multiple times)
    #[arg(long = "filter-path", value_name = "PATH")]
    pub filter_paths: Vec<String>,

    /// Output format (json, yaml, table)
    #[arg(long, default_value = "table")]
    pub output: String,
}

#[derive(Parser, Debug)]
pub struct BackupRestoreCommand {
    /// Snapshot to restore (full or short id)
    #[arg(long)]
    pub snapshot_id: String,

    /// Only restore this path (can be used multiple times)
    #[arg(long = "filter-path", value_name = "PATH")]
    pub filter_paths: Vec<String>,

    /// Output format (json, yaml, table)
    #[arg(long, default_value = "table")]
    pub output: String,
}

impl BackupListCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let format = self
            .output
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let config = Config::load(Config::resolve_path())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let snapshots = backup::list_snapshots(&config, &self.filter_paths)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list snapshots: {}", e))?;

        let rendered = match format {
            OutputFormat::Table => TableRenderer::new().render_snapshots(&snapshots),
            _ => format.render(&snapshots)?,
        };
        println!("{}", rendered);

        Ok(())
    }
}

impl BackupRestoreCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let config = Config::load(Config::resolve_path())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        backup::restore_snapshot(&config, &self.snapshot_id, &self.filter_paths)
            .await
            .map_err(|e| anyhow::anyhow!("Restore failed: {}", e))?;

        println!("Snapshot {} restored successfully!", self.snapshot_id);
        Ok(())
    }
}
