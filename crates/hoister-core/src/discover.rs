//! Discovery crawler: enumerates local modules and installed artifacts.
//!
//! Starting at the project root, the crawler collects the root manifest, the
//! immediate children of `node_modules` (scoped folders recursed one extra
//! level), and the children of the local-modules folder, recursing into each
//! local module for its own contribution. Sibling recursions run in
//! parallel; manifest reads within one directory stay sequential so the
//! number of open file descriptors remains bounded.

use crate::error::Error;
use crate::manifest::{read_module, ModuleInfo};
use futures::future::{self, BoxFuture, FutureExt};
use std::path::{Path, PathBuf};

/// Discovery output: local modules (the root project included) and every
/// artifact found directly beneath a `node_modules` directory.
#[derive(Debug, Default)]
pub struct ModuleSet {
    pub modules: Vec<ModuleInfo>,
    pub installed: Vec<ModuleInfo>,
}

impl ModuleSet {
    fn add_module(&mut self, module: ModuleInfo) {
        let path = module.full_module_path();
        if !self.modules.iter().any(|m| m.full_module_path() == path) {
            self.modules.push(module);
        }
    }

    fn add_installed(&mut self, module: ModuleInfo) {
        let path = module.full_module_path();
        if !self.installed.iter().any(|m| m.full_module_path() == path) {
            self.installed.push(module);
        }
    }

    fn merge(&mut self, other: ModuleSet) {
        for module in other.modules {
            self.add_module(module);
        }
        for module in other.installed {
            self.add_installed(module);
        }
    }
}

/// Crawl the project tree rooted at `project_root`.
///
/// # Errors
/// Fails on unreadable directories and malformed manifests; directories
/// without a manifest are filtered silently.
pub async fn discover(
    project_root: &Path,
    modules_folder: &str,
    production: bool,
) -> Result<ModuleSet, Error> {
    discover_at(
        project_root.to_path_buf(),
        modules_folder.to_string(),
        production,
    )
    .await
}

fn discover_at(
    location: PathBuf,
    modules_folder: String,
    production: bool,
) -> BoxFuture<'static, Result<ModuleSet, Error>> {
    async move {
        let mut set = ModuleSet::default();

        // The module at `location` itself (for the top-level call, the root
        // project participates as a module).
        let parent = location
            .parent()
            .map_or_else(|| location.clone(), Path::to_path_buf);
        let folder = location
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        set.add_module(read_module(&parent, &folder, production)?);

        for (child_location, child_name) in
            scan_module_dirs(&location.join("node_modules")).await?
        {
            set.add_installed(read_module(&child_location, &child_name, production)?);
        }

        let mut child_paths = Vec::new();
        for (child_location, child_name) in
            scan_module_dirs(&location.join(&modules_folder)).await?
        {
            child_paths.push(child_location.join(child_name));
        }

        // Each local module contributes its own ModuleSet; sibling crawls
        // proceed in parallel.
        let results = future::join_all(
            child_paths
                .into_iter()
                .map(|child| discover_at(child, modules_folder.clone(), production)),
        )
        .await;
        for result in results {
            set.merge(result?);
        }

        Ok(set)
    }
    .boxed()
}

/// List the module directories directly inside `dir`.
///
/// Returns `(enclosing folder, folder name)` pairs. Scoped folders (names
/// beginning with `@`) are recursed one extra level. Dot-directories,
/// non-directories, and directories without a manifest are skipped. A
/// missing `dir` yields an empty list.
async fn scan_module_dirs(dir: &Path) -> Result<Vec<(PathBuf, String)>, Error> {
    let mut found = Vec::new();

    for name in sorted_entries(dir).await? {
        if name.starts_with('.') {
            continue;
        }
        let path = dir.join(&name);
        if !is_directory(&path).await {
            continue;
        }

        if name.starts_with('@') {
            for sub_name in sorted_entries(&path).await? {
                if sub_name.starts_with('.') {
                    continue;
                }
                let sub_path = path.join(&sub_name);
                if is_directory(&sub_path).await && has_manifest(&sub_path).await {
                    found.push((path.clone(), sub_name));
                }
            }
        } else if has_manifest(&path).await {
            found.push((dir.to_path_buf(), name));
        }
    }

    Ok(found)
}

/// Directory entry names sorted for a deterministic traversal order.
/// A missing directory is equivalent to an empty one.
async fn sorted_entries(dir: &Path) -> Result<Vec<String>, Error> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Stat following symlinks; the link's own path stays the module identity.
async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn has_manifest(dir: &Path) -> bool {
    tokio::fs::metadata(dir.join("package.json")).await.is_ok()
}
