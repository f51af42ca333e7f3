//! Running the external generator and converter.
//!
//! Each tool runs to completion in the working directory with inherited
//! stdio, so its own output stays visible. A non-zero exit aborts the run.

use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// An external program plus the arguments that always precede per-call ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Leading arguments (e.g. a script path when `program` is an interpreter).
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolSpec {
    /// A tool invoked without leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Builder-style leading arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Space-joined command line, for logs and errors.
    pub fn command_line(&self, extra_args: &[String]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .chain(extra_args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run `tool` with `extra_args` in `cwd` and wait for it to exit.
pub async fn run_tool(tool: &ToolSpec, extra_args: &[String], cwd: &Path) -> HarnessResult<()> {
    let command_line = tool.command_line(extra_args);
    info!("Running: {}", command_line);
    debug!("Working directory: {}", cwd.display());

    let status = Command::new(&tool.program)
        .args(&tool.args)
        .args(extra_args)
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| HarnessError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    if !status.success() {
        return Err(HarnessError::CommandFailed {
            command: command_line,
            status,
        });
    }

    debug!("Finished: {}", command_line);
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> ToolSpec {
        ToolSpec::new("sh").with_args(["-c", script, "tool"])
    }

    #[test]
    fn test_command_line() {
        let tool = ToolSpec::new("/opt/vw/image2qtree").with_args(["--verbose"]);
        let line = tool.command_line(&["-m".to_string(), "kml".to_string()]);
        assert_eq!(line, "/opt/vw/image2qtree --verbose -m kml");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = TempDir::new().unwrap();
        let tool = sh("touch created-here");

        run_tool(&tool, &[], dir.path()).await.unwrap();
        assert!(dir.path().join("created-here").exists());
    }

    #[tokio::test]
    async fn test_passes_extra_arguments() {
        let dir = TempDir::new().unwrap();
        let tool = sh("printf '%s,' \"$@\" > args.txt");
        let extra = vec!["-m".to_string(), "kml".to_string(), "a.tif".to_string()];

        run_tool(&tool, &extra, dir.path()).await.unwrap();
        let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert_eq!(args, "-m,kml,a.tif,");
    }

    #[test]
    fn test_non_zero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let tool = sh("exit 3");

        let err = tokio_test::block_on(run_tool(&tool, &[], dir.path())).unwrap_err();
        match err {
            HarnessError::CommandFailed { command, status } => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let dir = TempDir::new().unwrap();
        let tool = ToolSpec::new(dir.path().join("no-such-tool"));

        let err = run_tool(&tool, &[], dir.path()).await.unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }
}
