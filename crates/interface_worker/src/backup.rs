//! Database dumps and upload archives
//!
//! Backups shell out to `pg_dump` and `tar`. The [`BackupTool`] trait keeps
//! the handler testable without either binary installed.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: &'static str,
        status: String,
        stderr: String,
    },

    #[error("cannot prepare backup directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BackupError {
    /// A missing binary will not appear on the next attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackupError::Spawn { .. })
    }
}

/// `YYYY-MM-DDTHH-MM-SS-mmmZ`, safe for file names
pub fn backup_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

pub fn database_backup_file(now: DateTime<Utc>) -> String {
    format!("backup-{}.sql", backup_timestamp(now))
}

pub fn file_backup_file(now: DateTime<Utc>) -> String {
    format!("files-backup-{}.tar.gz", backup_timestamp(now))
}

/// Produces backup artifacts on disk
#[async_trait]
pub trait BackupTool: Send + Sync {
    /// Dumps the database behind `database_url` into `target`
    async fn dump_database(&self, database_url: &str, target: &Path) -> Result<(), BackupError>;

    /// Writes a gzipped tarball of `source` to `target`
    async fn archive_directory(&self, source: &Path, target: &Path) -> Result<(), BackupError>;
}

/// Runs the system `pg_dump` and `tar` binaries
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBackupTool;

impl CommandBackupTool {
    async fn prepare(target: &Path) -> Result<(), BackupError> {
        let Some(dir) = target.parent() else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| BackupError::Directory {
                path: dir.to_path_buf(),
                source,
            })
    }

    fn check(program: &'static str, output: Output) -> Result<(), BackupError> {
        if output.status.success() {
            return Ok(());
        }
        Err(BackupError::Failed {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl BackupTool for CommandBackupTool {
    async fn dump_database(&self, database_url: &str, target: &Path) -> Result<(), BackupError> {
        Self::prepare(target).await?;
        debug!(target = %target.display(), "running pg_dump");
        let output = Command::new("pg_dump")
            .arg("--dbname")
            .arg(database_url)
            .arg("--file")
            .arg(target)
            .output()
            .await
            .map_err(|source| BackupError::Spawn { program: "pg_dump", source })?;
        Self::check("pg_dump", output)
    }

    async fn archive_directory(&self, source: &Path, target: &Path) -> Result<(), BackupError> {
        Self::prepare(target).await?;
        debug!(source = %source.display(), target = %target.display(), "running tar");
        let output = Command::new("tar")
            .arg("-czf")
            .arg(target)
            .arg("-C")
            .arg(source)
            .arg(".")
            .output()
            .await
            .map_err(|source| BackupError::Spawn { program: "tar", source })?;
        Self::check("tar", output)
    }
}
