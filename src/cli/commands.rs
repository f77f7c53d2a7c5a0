// CLI command definitions

use super::backup::{BackupListCommand, BackupRestoreCommand};
use super::replant::ReplantCommand;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "replant-kube",
    version,
    about = "Backup restore and volume replant tool for Kubernetes",
    long_about = "A standalone CLI tool for listing/restoring backup snapshots and for migrating persistent volumes (and the deployments consuming them) to new claims on Kubernetes"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Backup snapshot operations
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Migrate a PVC and its consuming deployment to a new claim
    VolumeReplant(ReplantCommand),
}

#[derive(clap::Subcommand, Debug)]
pub enum BackupCommands {
    /// List available snapshots
    List(BackupListCommand),

    /// Restore a snapshot back into place
    Restore(BackupRestoreCommand),
}
