use crate::config::ReportDefinition;
use crate::reports::target::ReportTarget;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Produces a report file at the target path as a side effect.
///
/// Returning `Ok` does not promise the file exists: a generator with nothing
/// to report may write no file at all.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, target: &ReportTarget) -> Result<()>;
}

/// Runs an external command that writes `$REPORT_FILE_PATH`.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    files_dir: PathBuf,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: String, args: Vec<String>, files_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            args,
            files_dir,
            timeout,
        }
    }

    pub fn from_definition(def: &ReportDefinition, files_dir: PathBuf) -> Self {
        Self::new(
            def.command.clone(),
            def.args.clone(),
            files_dir,
            Duration::from_secs(def.timeout_secs),
        )
    }
}

#[async_trait]
impl ReportGenerator for CommandGenerator {
    async fn generate(&self, target: &ReportTarget) -> Result<()> {
        // The child runs inside files_dir, so relative paths would resolve twice
        let files_dir = std::path::absolute(&self.files_dir)
            .with_context(|| format!("Invalid files dir {}", self.files_dir.display()))?;
        let file_path = std::path::absolute(&target.path)
            .with_context(|| format!("Invalid report path {}", target.path.display()))?;

        tokio::fs::create_dir_all(&files_dir)
            .await
            .with_context(|| format!("Failed to create {}", files_dir.display()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&files_dir)
            .env("REPORT_FILE_NAME", &target.tmp_name)
            .env("REPORT_FILE_PATH", &file_path)
            .env("REPORT_FILES_DIR", &files_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running report command {}: {:?}", self.program, cmd);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Report command '{}' timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )
            })?
            .with_context(|| format!("Failed to execute report command '{}'", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("Report command {} finished ({}): {}", self.program, output.status, stdout.trim());

        if !output.status.success() {
            anyhow::bail!(
                "Report command '{}' failed ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        Ok(())
    }
}
