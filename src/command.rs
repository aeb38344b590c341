//! Running external programs (git, linters) and capturing their output.
use std::process::Command;

use tracing::debug;

use crate::error::{DiffCovError, Result};

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

/// Run `program args...`, failing unless it exits with one of `exit_codes`.
pub fn execute(program: &str, args: &[String], exit_codes: &[i32]) -> Result<CommandOutput> {
    let shown = command_line(program, args);
    debug!(command = %shown, "running");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| DiffCovError::Command {
            command: shown.clone(),
            message: e.to_string(),
        })?;

    let out = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code(),
    };

    match out.code {
        Some(code) if exit_codes.contains(&code) => Ok(out),
        code => {
            let reason = match code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            };
            let stderr = out.stderr.trim();
            Err(DiffCovError::Command {
                command: shown,
                message: if stderr.is_empty() {
                    reason
                } else {
                    format!("{reason}: {stderr}")
                },
            })
        }
    }
}

/// Exit code of `program args...`, or `None` if it could not be started.
pub fn run_for_code(program: &str, args: &[&str]) -> Option<i32> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .and_then(|o| o.status.code())
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
