//! The pipeline: sequential phases separated by barriers.
//!
//! Discovery, coalescing, diagnostics, filtering, planning, installer
//! fan-out, symlink repair, post-install hooks. The pure phases (coalesce,
//! filter, plan, report) never touch the filesystem; each I/O phase runs its
//! independent operations concurrently with bounded fan-out.

use crate::coalesce::coalesce;
use crate::config::InstallContext;
use crate::discover::discover;
use crate::error::Error;
use crate::hooks::run_postinstall_hooks;
use crate::installer::run_installer;
use crate::link::{remove_tree, repair_links};
use crate::plan::plan_hoisting;
use crate::report::report_diagnostics;
use crate::satisfy::{filter_satisfied, SatisfyOptions};
use tracing::info;

/// Run the full pipeline for one project.
///
/// # Errors
/// Returns [`Error::Uncritical`] for the recognized early exits (no project
/// manifest, no modules folder) and fatal errors for everything the error
/// policy treats as such.
pub async fn run(ctx: &InstallContext) -> Result<(), Error> {
    if !ctx.project_root.join("package.json").is_file() {
        return Err(Error::uncritical(format!(
            "no package.json at {}; not a project root",
            ctx.project_root.display()
        )));
    }
    let modules_dir = ctx.project_root.join(&ctx.modules_folder);
    if !modules_dir.is_dir() {
        return Err(Error::uncritical(format!(
            "modules folder {} not found; nothing to do",
            modules_dir.display()
        )));
    }

    if ctx.cleanup {
        let set = discover(&ctx.project_root, &ctx.modules_folder, ctx.production).await?;
        for module in &set.modules {
            remove_tree(&module.node_modules_path())?;
        }
        info!(modules = set.modules.len(), "removed private node_modules folders");
    }

    let set = discover(&ctx.project_root, &ctx.modules_folder, ctx.production).await?;
    info!(
        modules = set.modules.len(),
        installed = set.installed.len(),
        "discovery finished"
    );

    let opts = SatisfyOptions {
        link_local_modules: ctx.link_local_modules,
        trust_local_non_semver: ctx.trust_local_non_semver,
    };

    let requests = coalesce(&set.modules);
    report_diagnostics(&requests, &set.modules, opts);

    if ctx.dependency_check_only {
        return Ok(());
    }

    if ctx.link_only {
        let summary = repair_links(&set, opts).await;
        info!(
            linked = summary.linked,
            bin_links = summary.bin_links,
            unresolved = summary.unresolved,
            "link repair finished"
        );
        return Ok(());
    }

    let remaining = filter_satisfied(requests, &set.modules, &set.installed, opts);
    let plan = plan_hoisting(
        remaining.into_requests(),
        &set.installed,
        &ctx.no_hoist,
        &ctx.project_root,
    )?;

    let set = if plan.is_empty() {
        info!("nothing to install");
        set
    } else {
        info!(
            placements = plan.len(),
            targets = plan.placements.len(),
            "installing planned dependencies"
        );
        run_installer(&plan, &ctx.installer).await?;
        // The installer changed the tree; refresh the artifact view before
        // repairing links.
        discover(&ctx.project_root, &ctx.modules_folder, ctx.production).await?
    };

    let summary = repair_links(&set, opts).await;
    info!(
        linked = summary.linked,
        bin_links = summary.bin_links,
        unresolved = summary.unresolved,
        "link repair finished"
    );

    run_postinstall_hooks(&set.modules, &ctx.project_root).await?;

    Ok(())
}
