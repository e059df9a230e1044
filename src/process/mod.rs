use std::path::Path;
use std::process::{Command, Stdio};

use log::{info, warn};

/// Runs the downloaded package as a child process and reports its exit code.
#[derive(Clone, Debug, Default)]
pub struct ProcessLauncher {
    runner: Vec<String>,
}

impl ProcessLauncher {
    /// `runner` is the program prefix the package is executed through, e.g.
    /// ["java", "-jar"]. Empty means the package file is executed directly.
    pub fn new(runner: Vec<String>) -> Self {
        Self { runner }
    }

    /// Spawn the package with each forwarded argument as its own argv entry,
    /// wait for it to finish and return its exit code. A child killed by a
    /// signal has no code; that is reported as 1.
    pub fn launch(&self, package: &Path, args: &[String], workdir: &Path) -> Result<i32, String> {
        if !package.exists() {
            return Err(format!("package not found at {}", package.display()));
        }

        let mut cmd = match self.runner.split_first() {
            Some((program, runner_args)) => {
                let mut cmd = Command::new(program);
                cmd.args(runner_args);
                cmd.arg(package);
                cmd
            }
            None => Command::new(package),
        };
        cmd.args(args);
        cmd.current_dir(workdir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let rendered = display_args(args);
        if rendered.is_empty() {
            info!("launch: starting {}", package.display());
        } else {
            info!("launch: starting {} {}", package.display(), rendered);
        }

        let status = cmd
            .status()
            .map_err(|e| format!("failed to start package process: {e}"))?;
        let code = status.code().unwrap_or_else(|| {
            warn!("launch: child terminated without an exit code, reporting 1");
            1
        });
        info!("launch: child exited with code {code}");
        Ok(code)
    }
}

/// Quote-and-join rendering of the forwarded arguments for log lines. The
/// child receives each argument as a separate argv entry; this string is
/// display only and does not escape embedded quotes.
pub fn display_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| format!("\"{arg}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
