//! Request coalescing: per-module dependency declarations collapse into
//! intersected request groups.
//!
//! For each incoming `(name, range)` the existing groups under that name are
//! scanned in insertion order; the first non-empty intersection wins and may
//! narrow the stored range. Ranges that intersect nothing fall back to
//! exact-text grouping, which is how non-semver ranges (git URLs, tags)
//! accumulate requesters.

use crate::manifest::ModuleInfo;
use crate::ranges;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One coalesced range and the modules that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGroup {
    pub range: String,
    pub requested_by: Vec<PathBuf>,
}

/// A dependency request surviving to the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub name: String,
    pub version_range: String,
    pub requested_by: Vec<PathBuf>,
}

impl DependencyRequest {
    /// The exact identifier string handed to the installer command line.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!("{}@\"{}\"", self.name, self.version_range)
    }
}

/// Coalesced requests: dependency name to its request groups, groups in
/// insertion order. No two groups under one name have a non-empty semver
/// intersection.
#[derive(Debug, Default, Clone)]
pub struct DependencyRequests {
    pub entries: BTreeMap<String, Vec<RequestGroup>>,
}

impl DependencyRequests {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into a request list for the planner.
    #[must_use]
    pub fn into_requests(self) -> Vec<DependencyRequest> {
        self.entries
            .into_iter()
            .flat_map(|(name, groups)| {
                groups.into_iter().map(move |group| DependencyRequest {
                    name: name.clone(),
                    version_range: group.range,
                    requested_by: group.requested_by,
                })
            })
            .collect()
    }
}

/// Collapse the dependency declarations of `modules` into request groups.
#[must_use]
pub fn coalesce(modules: &[ModuleInfo]) -> DependencyRequests {
    let mut requests = DependencyRequests::default();

    for module in modules {
        let requester = module.full_module_path();
        for (name, range) in &module.dependencies {
            insert_request(&mut requests, name, range, requester.clone());
        }
    }

    requests
}

fn insert_request(requests: &mut DependencyRequests, name: &str, range: &str, requester: PathBuf) {
    let groups = requests.entries.entry(name.to_string()).or_default();

    // First non-empty intersection wins; the stored range narrows to it.
    for group in groups.iter_mut() {
        if let Some(intersection) = ranges::intersect(range, &group.range) {
            if intersection != group.range {
                group.range = intersection;
            }
            group.requested_by.push(requester);
            return;
        }
    }

    // No intersection: non-semver and disjoint ranges group by exact text.
    if let Some(group) = groups.iter_mut().find(|g| g.range == range) {
        group.requested_by.push(requester);
        return;
    }

    groups.push(RequestGroup {
        range: range.to_string(),
        requested_by: vec![requester],
    });
}
