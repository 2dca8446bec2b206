//! External verification tools.
//!
//! Tool output is treated as opaque text: the pipeline records it in the
//! report and never parses it.

use std::path::Path;
use std::process::Command;

use crate::config::ToolCommand;

/// Captured result of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Whether the process reported success.
    pub success: bool,
    /// Standard output followed by standard error.
    pub output: String,
}

/// Runs an external tool against an artifact.
pub trait ToolRunner: Send + Sync {
    /// Run `tool` with `artifact` appended as the last argument.
    ///
    /// An `Err` means the tool could not be started at all; a tool that ran
    /// and failed is an `Ok` with `success == false`.
    fn run(&self, tool: &ToolCommand, artifact: &Path) -> std::io::Result<ToolOutput>;
}

/// Runs tools as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, tool: &ToolCommand, artifact: &Path) -> std::io::Result<ToolOutput> {
        log::debug!("running {} {:?} {}", tool.program, tool.args, artifact.display());
        let out = Command::new(&tool.program)
            .args(&tool.args)
            .arg(artifact)
            .output()?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(ToolOutput {
            code: out.status.code(),
            success: out.status.success(),
            output,
        })
    }
}
