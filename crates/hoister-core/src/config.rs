//! Run configuration, built once by the CLI and passed into every phase.
//! No component mutates process-wide state.

use crate::installer::InstallerCommand;
use crate::plan::NoHoistRule;
use std::path::PathBuf;

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct InstallContext {
    /// Absolute project root.
    pub project_root: PathBuf,
    /// Folder name holding the local modules (default `modules`).
    pub modules_folder: String,
    /// Whether local modules may satisfy requests (`--no-link` disables).
    pub link_local_modules: bool,
    /// Whether local modules satisfy non-semver ranges on name match alone.
    pub trust_local_non_semver: bool,
    /// Run symlink repair only.
    pub link_only: bool,
    /// Remove every module's private `node_modules` before the pipeline.
    pub cleanup: bool,
    /// Run the coalescer and diagnostics only.
    pub dependency_check_only: bool,
    /// Requests excluded from hoisting.
    pub no_hoist: Vec<NoHoistRule>,
    /// Skip development dependencies (`NODE_ENV=production`).
    pub production: bool,
    /// The external installer command line.
    pub installer: InstallerCommand,
}

impl InstallContext {
    /// Create a context with defaults for the given project root.
    #[must_use]
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            modules_folder: "modules".to_string(),
            link_local_modules: true,
            trust_local_non_semver: false,
            link_only: false,
            cleanup: false,
            dependency_check_only: false,
            no_hoist: Vec::new(),
            production: false,
            installer: InstallerCommand::default(),
        }
    }

    #[must_use]
    pub fn with_modules_folder(mut self, folder: impl Into<String>) -> Self {
        self.modules_folder = folder.into();
        self
    }

    #[must_use]
    pub fn with_link_local_modules(mut self, link: bool) -> Self {
        self.link_local_modules = link;
        self
    }

    #[must_use]
    pub fn with_trust_local_non_semver(mut self, trust: bool) -> Self {
        self.trust_local_non_semver = trust;
        self
    }

    #[must_use]
    pub fn with_no_hoist(mut self, rules: Vec<NoHoistRule>) -> Self {
        self.no_hoist = rules;
        self
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }
}
