//! Symlink repair: after installation, every local module must resolve each
//! declared dependency through its own `node_modules`.
//!
//! For every `(module, dependency)` pair a source is chosen (a direct
//! install, a sibling local module, or an artifact hoisted elsewhere) and a
//! symlink (junction on Windows) makes it visible. All link operations run
//! concurrently with bounded fan-out.
//! Link failures are tolerated: an acceptable link may already be present,
//! and a directly-installed target is never overwritten.

use crate::discover::ModuleSet;
use crate::manifest::ModuleInfo;
use crate::ranges;
use crate::satisfy::{local_module_satisfies, SatisfyOptions};
use futures::stream::{self, StreamExt};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Maximum modules repaired concurrently.
const MAX_CONCURRENT_REPAIRS: usize = 16;

/// Maximum link operations in flight per module.
const MAX_CONCURRENT_LINKS: usize = 16;

/// Where a dependency resolves from.
#[derive(Debug)]
enum Source<'a> {
    /// Already materialized inside the module's own `node_modules`.
    DirectInstall,
    /// A sibling local module satisfies the range.
    LocalModule(&'a ModuleInfo),
    /// An artifact installed elsewhere satisfies the range.
    InstalledElsewhere(&'a ModuleInfo),
    /// Nothing satisfies the range yet.
    None,
}

/// Counters reported after the repair pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepairSummary {
    /// Dependency links created.
    pub linked: usize,
    /// Bin links created.
    pub bin_links: usize,
    /// Dependencies already resolvable (direct install or existing entry).
    pub satisfied: usize,
    /// Dependencies with no source; a later install may provide them.
    pub unresolved: usize,
}

impl RepairSummary {
    fn absorb(&mut self, other: RepairSummary) {
        self.linked += other.linked;
        self.bin_links += other.bin_links;
        self.satisfied += other.satisfied;
        self.unresolved += other.unresolved;
    }
}

/// Repair the resolution view of every local module.
pub async fn repair_links(set: &ModuleSet, opts: SatisfyOptions) -> RepairSummary {
    let summaries: Vec<RepairSummary> = stream::iter(set.modules.iter())
        .map(|module| repair_module(module, &set.modules, &set.installed, opts))
        .buffer_unordered(MAX_CONCURRENT_REPAIRS)
        .collect()
        .await;

    let mut total = RepairSummary::default();
    for summary in summaries {
        total.absorb(summary);
    }
    total
}

/// Link every declared dependency of one module, fanning the link
/// operations out concurrently.
async fn repair_module(
    module: &ModuleInfo,
    modules: &[ModuleInfo],
    installed: &[ModuleInfo],
    opts: SatisfyOptions,
) -> RepairSummary {
    let summaries: Vec<RepairSummary> = stream::iter(module.dependencies.iter())
        .map(|(dep, range)| async move {
            repair_dependency(module, dep, range, modules, installed, opts)
        })
        .buffer_unordered(MAX_CONCURRENT_LINKS)
        .collect()
        .await;

    let mut total = RepairSummary::default();
    for summary in summaries {
        total.absorb(summary);
    }
    total
}

/// Resolve and link one declared dependency.
fn repair_dependency(
    module: &ModuleInfo,
    dep: &str,
    range: &str,
    modules: &[ModuleInfo],
    installed: &[ModuleInfo],
    opts: SatisfyOptions,
) -> RepairSummary {
    let mut summary = RepairSummary::default();

    match choose_source(module, dep, range, modules, installed, opts) {
        Source::DirectInstall => summary.satisfied += 1,
        Source::LocalModule(source) | Source::InstalledElsewhere(source) => {
            link_dependency(module, source, &mut summary);
        }
        Source::None => {
            error!(
                module = %module.name,
                dependency = %dep,
                range = %range,
                "no source found; a later install may provide it"
            );
            summary.unresolved += 1;
        }
    }

    summary
}

fn choose_source<'a>(
    module: &ModuleInfo,
    dep: &str,
    range: &str,
    modules: &'a [ModuleInfo],
    installed: &'a [ModuleInfo],
    opts: SatisfyOptions,
) -> Source<'a> {
    // Directly installed in the module's own node_modules: nothing to do.
    let direct = installed.iter().any(|artifact| {
        artifact.name == dep
            && artifact.full_module_path()
                == module
                    .node_modules_path()
                    .join(&artifact.canonical_folder_name)
    });
    if direct {
        return Source::DirectInstall;
    }

    if opts.link_local_modules {
        let own_path = module.full_module_path();
        let local = modules.iter().find(|candidate| {
            candidate.name == dep
                && candidate.full_module_path() != own_path
                && local_module_satisfies(candidate, range, opts.trust_local_non_semver)
        });
        if let Some(source) = local {
            return Source::LocalModule(source);
        }
    }

    match installed
        .iter()
        .find(|artifact| artifact.name == dep && ranges::version_satisfies(&artifact.version, range))
    {
        Some(source) => Source::InstalledElsewhere(source),
        None => Source::None,
    }
}

fn link_dependency(module: &ModuleInfo, source: &ModuleInfo, summary: &mut RepairSummary) {
    let link_path = module
        .node_modules_path()
        .join(&source.canonical_folder_name);

    // Anything already occupying the path stays, whether it is a direct
    // install or an earlier link.
    if fs::symlink_metadata(&link_path).is_ok() {
        summary.satisfied += 1;
    } else {
        if let Some(parent) = link_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                debug!(path = %parent.display(), error = %e, "could not create link parent");
                return;
            }
        }
        match create_dir_link(&source.full_module_path(), &link_path) {
            Ok(()) => summary.linked += 1,
            Err(e) => {
                debug!(
                    link = %link_path.display(),
                    target = %source.full_module_path().display(),
                    error = %e,
                    "link creation failed; skipped"
                );
                return;
            }
        }
    }

    for (command, rel_path) in &source.bin_entries {
        let bin_dir = module.node_modules_path().join(".bin");
        if fs::create_dir_all(&bin_dir).is_err() {
            continue;
        }
        let bin_link = bin_dir.join(command);
        if fs::symlink_metadata(&bin_link).is_ok() {
            continue;
        }
        let bin_target = source.full_module_path().join(rel_path);
        match create_bin_link(&bin_target, &bin_link) {
            Ok(()) => summary.bin_links += 1,
            Err(e) => {
                debug!(
                    link = %bin_link.display(),
                    error = %e,
                    "bin link creation failed; skipped"
                );
            }
        }
    }
}

/// Create a directory link (symlink on Unix, junction on Windows).
pub fn create_dir_link(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        junction::create(target, link)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "directory links unsupported on this platform",
        ))
    }
}

/// Create an executable link (symlink on Unix, cmd shim on Windows).
fn create_bin_link(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)?;

        // The linked script must be executable for .bin resolution to work.
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(target) {
            let mut perms = metadata.permissions();
            perms.set_mode(perms.mode() | 0o111);
            let _ = fs::set_permissions(target, perms);
        }
        Ok(())
    }

    #[cfg(windows)]
    {
        let cmd_path = link.with_extension("cmd");
        let shim = format!("@ECHO off\r\nnode \"{}\" %*\r\n", target.display());
        fs::write(cmd_path, shim)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "bin links unsupported on this platform",
        ))
    }
}

/// Remove a directory tree; a missing path counts as success.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
