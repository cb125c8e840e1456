#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

//! Dependency resolution and placement engine for monorepo local modules.
//!
//! Given a root project with local modules, the engine discovers every
//! module and installed artifact, coalesces declared version ranges into
//! intersected request groups, plans the shallowest conflict-free placement
//! for each surviving request, invokes an external installer per target
//! folder, and repairs each module's resolution view with symlinks.

pub mod coalesce;
pub mod config;
pub mod discover;
pub mod error;
pub mod hooks;
pub mod installer;
pub mod link;
pub mod manifest;
pub mod pipeline;
pub mod plan;
pub mod ranges;
pub mod report;
pub mod satisfy;

pub use coalesce::{coalesce, DependencyRequest, DependencyRequests, RequestGroup};
pub use config::InstallContext;
pub use discover::{discover, ModuleSet};
pub use error::Error;
pub use installer::InstallerCommand;
pub use link::{repair_links, RepairSummary};
pub use manifest::{read_module, ModuleInfo};
pub use plan::{plan_hoisting, NoHoistRule, PlacementPlan};
pub use satisfy::{filter_satisfied, SatisfyOptions};
