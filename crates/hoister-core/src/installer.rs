//! External installer invocation: one process per plan target.
//!
//! The installer command runs through the platform shell from within the
//! target folder, with the request identifiers appended in their
//! `name@"range"` form (the quotes keep ranges intact across the shell).
//! Targets install concurrently with bounded fan-out. A non-zero exit is
//! fatal; warnings on the error channel without a non-zero exit are
//! rerouted to normal output.

use crate::error::Error;
use crate::plan::PlacementPlan;
use futures::stream::{self, TryStreamExt};
use std::path::Path;
use tracing::{debug, info};

/// Maximum installer processes running at once.
const MAX_CONCURRENT_INSTALLS: usize = 8;

/// The installer command line, without the identifiers.
#[derive(Debug, Clone)]
pub struct InstallerCommand {
    pub command: String,
}

impl Default for InstallerCommand {
    fn default() -> Self {
        Self {
            // No manifest mutation, no lockfile: the plan is the only
            // source of truth for what lands where.
            command: "npm install --no-save --no-package-lock".to_string(),
        }
    }
}

/// Run the installer once per plan target.
///
/// # Errors
/// Returns [`Error::Installer`] when any invocation exits non-zero.
pub async fn run_installer(plan: &PlacementPlan, installer: &InstallerCommand) -> Result<(), Error> {
    stream::iter(plan.placements.iter().map(Ok::<_, Error>))
        .try_for_each_concurrent(MAX_CONCURRENT_INSTALLS, |(target, requests)| {
            let identifiers: Vec<String> = requests.iter().map(|r| r.identifier()).collect();
            async move { install_into(target, &identifiers, installer).await }
        })
        .await
}

async fn install_into(
    target: &Path,
    identifiers: &[String],
    installer: &InstallerCommand,
) -> Result<(), Error> {
    let command_line = format!("{} {}", installer.command, identifiers.join(" "));
    info!(target = %target.display(), command = %command_line, "installing");

    let (shell, shell_arg) = if cfg!(windows) {
        ("cmd.exe", "/C")
    } else {
        ("sh", "-c")
    };

    let output = tokio::process::Command::new(shell)
        .arg(shell_arg)
        .arg(&command_line)
        .current_dir(target)
        .output()
        .await?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(Error::Installer {
            target: target.to_path_buf(),
            code: output.status.code(),
            stderr,
        });
    }

    // Warnings without a non-zero exit are advisory; surface them on the
    // normal output channel and keep going.
    if !stderr.is_empty() {
        println!("{stderr}");
    }
    debug!(target = %target.display(), "install finished");

    Ok(())
}
