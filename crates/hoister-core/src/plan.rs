//! Hoist planning: each surviving request is assigned the shallowest target
//! folder where it conflicts with nothing already installed or already
//! planned.
//!
//! Requests are placed most-requested first, so popular dependencies land
//! closest to the root and the total number of installs stays minimal.
//! Non-semver requests and requests matching a no-hoist rule never hoist:
//! they are pinned to every requesting module instead.

use crate::coalesce::DependencyRequest;
use crate::error::Error;
use crate::manifest::ModuleInfo;
use crate::ranges;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// A rule excluding matching requests from hoisting.
#[derive(Debug, Clone)]
pub struct NoHoistRule {
    pub name_glob: glob::Pattern,
    pub version_range: Option<String>,
}

impl NoHoistRule {
    /// Parse a `name[@range]` rule; the name part may be a glob. Scoped
    /// names keep their leading `@`.
    ///
    /// # Errors
    /// Returns a message when the glob pattern is invalid.
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("empty no-hoist pattern".to_string());
        }
        let (name, range) = match input[1..].find('@') {
            Some(pos) => {
                let (name, range) = input.split_at(pos + 1);
                (name, Some(range[1..].to_string()))
            }
            None => (input, None),
        };

        let name_glob = glob::Pattern::new(name)
            .map_err(|e| format!("invalid no-hoist pattern '{name}': {e}"))?;
        Ok(Self {
            name_glob,
            version_range: range,
        })
    }

    /// Whether the rule matches a request: the name matches the glob, and
    /// either no range was given or the ranges intersect.
    #[must_use]
    pub fn matches(&self, request: &DependencyRequest) -> bool {
        if !self.name_glob.matches(&request.name) {
            return false;
        }
        match &self.version_range {
            None => true,
            Some(range) => ranges::intersect(range, &request.version_range).is_some(),
        }
    }
}

/// The planner output: target folder to the requests installed there.
#[derive(Debug, Default)]
pub struct PlacementPlan {
    pub placements: BTreeMap<PathBuf, Vec<DependencyRequest>>,
}

impl PlacementPlan {
    fn insert(&mut self, target: PathBuf, request: DependencyRequest) {
        self.placements.entry(target).or_default().push(request);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Total number of planned placements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.placements.values().map(Vec::len).sum()
    }

    fn contains_identifier(&self, request: &DependencyRequest) -> bool {
        self.placements.values().flatten().any(|entry| {
            entry.name == request.name && entry.version_range == request.version_range
        })
    }

    fn conflicting_entry_at(&self, target: &Path, request: &DependencyRequest) -> bool {
        self.placements.get(target).is_some_and(|entries| {
            entries.iter().any(|entry| {
                entry.name == request.name && entry.version_range != request.version_range
            })
        })
    }
}

/// Assign every request a target folder.
///
/// # Errors
/// Returns [`Error::PlacementInvariant`] if a request exhausts its candidate
/// list, which cannot happen on well-formed input.
pub fn plan_hoisting(
    mut requests: Vec<DependencyRequest>,
    installed: &[ModuleInfo],
    rules: &[NoHoistRule],
    project_root: &Path,
) -> Result<PlacementPlan, Error> {
    // Most-requested first; ties go to the range admitting the newest
    // minimum version, then lexicographic order for determinism.
    requests.sort_by(|a, b| {
        b.requested_by
            .len()
            .cmp(&a.requested_by.len())
            .then_with(|| ranges::range_floor(&b.version_range).cmp(&ranges::range_floor(&a.version_range)))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.version_range.cmp(&b.version_range))
    });

    let mut plan = PlacementPlan::default();

    for request in requests {
        if !ranges::is_valid_range(&request.version_range) {
            warn!(
                name = %request.name,
                range = %request.version_range,
                requesters = ?request.requested_by,
                "non-semver range is pinned to each requester"
            );
            for requester in &request.requested_by {
                plan.insert(requester.clone(), request.clone());
            }
            continue;
        }

        if let Some(rule) = rules.iter().find(|rule| rule.matches(&request)) {
            info!(
                name = %request.name,
                range = %request.version_range,
                pattern = %rule.name_glob,
                requesters = ?request.requested_by,
                "no-hoist rule matched; pinned to each requester"
            );
            for requester in &request.requested_by {
                plan.insert(requester.clone(), request.clone());
            }
            continue;
        }

        place_request(&mut plan, request, installed, project_root)?;
    }

    Ok(plan)
}

fn place_request(
    plan: &mut PlacementPlan,
    request: DependencyRequest,
    installed: &[ModuleInfo],
    project_root: &Path,
) -> Result<(), Error> {
    let Some(first_requester) = request.requested_by.first() else {
        return Err(Error::PlacementInvariant(format!(
            "request {} has no requesters",
            request.identifier()
        )));
    };

    let segments: Vec<String> = first_requester
        .strip_prefix(project_root)
        .unwrap_or_else(|_| Path::new(""))
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str().map(String::from),
            _ => None,
        })
        .collect();

    // Descend from the root toward the requester, one segment per step;
    // every prefix is a candidate, gated only by the conflict checks.
    for depth in 0..=segments.len() {
        let mut candidate = project_root.to_path_buf();
        for segment in &segments[..depth] {
            candidate.push(segment);
        }

        if plan.contains_identifier(&request) {
            continue;
        }
        if installed_conflict(installed, &candidate, &request) {
            continue;
        }
        if plan.conflicting_entry_at(&candidate, &request) {
            continue;
        }

        plan.insert(candidate, request);
        return Ok(());
    }

    // The deepest candidate is the requester itself, which cannot conflict
    // with its own request; reaching this point is a bug.
    Err(Error::PlacementInvariant(format!(
        "no placement found for {}",
        request.identifier()
    )))
}

/// Whether an installed artifact directly inside `folder/node_modules`
/// carries the same name with a version that does not satisfy the request.
/// Artifacts deeper than `folder` never block it.
fn installed_conflict(
    installed: &[ModuleInfo],
    folder: &Path,
    request: &DependencyRequest,
) -> bool {
    installed.iter().any(|artifact| {
        artifact.name == request.name
            && installed_directly_in(artifact, folder)
            && !ranges::version_satisfies(&artifact.version, &request.version_range)
    })
}

fn installed_directly_in(artifact: &ModuleInfo, folder: &Path) -> bool {
    let node_modules = folder.join("node_modules");
    if artifact.is_scoped {
        match artifact.canonical_folder_name.components().next() {
            Some(scope) => artifact.location == node_modules.join(scope.as_os_str()),
            None => false,
        }
    } else {
        artifact.location == node_modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalesce::coalesce;
    use crate::manifest::canonical_folder_name;
    use std::collections::BTreeMap;

    fn module(path: &str, name: &str, version: &str, deps: &[(&str, &str)]) -> ModuleInfo {
        let full = Path::new(path);
        ModuleInfo {
            location: full.parent().unwrap().to_path_buf(),
            real_folder_name: full.file_name().unwrap().to_str().unwrap().to_string(),
            canonical_folder_name: canonical_folder_name(name),
            name: name.to_string(),
            version: version.to_string(),
            dependencies: deps
                .iter()
                .map(|(n, r)| ((*n).to_string(), (*r).to_string()))
                .collect::<BTreeMap<_, _>>(),
            postinstall: None,
            bin_entries: BTreeMap::new(),
            is_scoped: name.starts_with('@'),
        }
    }

    fn root_module(deps: &[(&str, &str)]) -> ModuleInfo {
        module("/proj", "root-project", "1.0.0", deps)
    }

    fn plan_for(
        modules: &[ModuleInfo],
        installed: &[ModuleInfo],
        rules: &[NoHoistRule],
    ) -> PlacementPlan {
        let requests = coalesce(modules).into_requests();
        plan_hoisting(requests, installed, rules, Path::new("/proj")).unwrap()
    }

    fn entry_ids(plan: &PlacementPlan, target: &str) -> Vec<String> {
        plan.placements
            .get(Path::new(target))
            .map(|entries| entries.iter().map(DependencyRequest::identifier).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_single_shared_range_hoists_to_root() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("lodash", "^4.17.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("lodash", "^4.17.0")]),
        ];

        let plan = plan_for(&modules, &[], &[]);
        assert_eq!(plan.len(), 1);
        assert_eq!(entry_ids(&plan, "/proj"), vec!["lodash@\"^4.17.0\""]);
    }

    #[test]
    fn test_disjoint_ranges_newer_wins_root() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("lodash", "^3.0.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("lodash", "^4.0.0")]),
        ];

        let plan = plan_for(&modules, &[], &[]);
        assert_eq!(entry_ids(&plan, "/proj"), vec!["lodash@\"^4.0.0\""]);
        // The older range descends one segment to the first conflict-free
        // prefix on the way to its requester.
        assert_eq!(
            entry_ids(&plan, "/proj/modules"),
            vec!["lodash@\"^3.0.0\""]
        );
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_intersecting_ranges_one_placement() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("pkg", "^1.2.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("pkg", "~1.4.1")]),
        ];

        let plan = plan_for(&modules, &[], &[]);
        assert_eq!(plan.len(), 1);
        assert_eq!(entry_ids(&plan, "/proj"), vec!["pkg@\"~1.4.1\""]);
    }

    #[test]
    fn test_non_semver_pinned_per_requester() {
        let modules = vec![
            root_module(&[]),
            module(
                "/proj/modules/a",
                "a",
                "1.0.0",
                &[("mytool", "github:org/repo#tag")],
            ),
            module(
                "/proj/modules/b",
                "b",
                "1.0.0",
                &[("mytool", "github:org/repo#tag")],
            ),
        ];

        let plan = plan_for(&modules, &[], &[]);
        assert_eq!(plan.len(), 2);
        assert_eq!(
            entry_ids(&plan, "/proj/modules/a"),
            vec!["mytool@\"github:org/repo#tag\""]
        );
        assert_eq!(
            entry_ids(&plan, "/proj/modules/b"),
            vec!["mytool@\"github:org/repo#tag\""]
        );
    }

    #[test]
    fn test_no_hoist_rule_pins_per_requester() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("aurelia-cli", "^1.0.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("aurelia-cli", "^1.0.0")]),
        ];
        let rules = vec![NoHoistRule::parse("aurelia-*").unwrap()];

        let plan = plan_for(&modules, &[], &rules);
        assert_eq!(plan.len(), 2);
        assert_eq!(
            entry_ids(&plan, "/proj/modules/a"),
            vec!["aurelia-cli@\"^1.0.0\""]
        );
        assert!(entry_ids(&plan, "/proj").is_empty());
    }

    #[test]
    fn test_no_hoist_rule_with_range() {
        let rule = NoHoistRule::parse("lodash@^3.0.0").unwrap();
        let matching = DependencyRequest {
            name: "lodash".to_string(),
            version_range: "~3.5.0".to_string(),
            requested_by: vec![PathBuf::from("/proj/modules/a")],
        };
        let disjoint = DependencyRequest {
            name: "lodash".to_string(),
            version_range: "^4.0.0".to_string(),
            requested_by: vec![PathBuf::from("/proj/modules/a")],
        };
        assert!(rule.matches(&matching));
        assert!(!rule.matches(&disjoint));
    }

    #[test]
    fn test_no_hoist_rule_scoped_name() {
        let rule = NoHoistRule::parse("@org/tool@^1.0.0").unwrap();
        assert_eq!(rule.name_glob.as_str(), "@org/tool");
        assert_eq!(rule.version_range.as_deref(), Some("^1.0.0"));
    }

    #[test]
    fn test_installed_conflict_forces_descent() {
        // An incompatible lodash already installed at the root pushes the
        // request down toward the requester.
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("lodash", "^4.0.0")]),
        ];
        let installed = vec![module(
            "/proj/node_modules/lodash",
            "lodash",
            "3.10.0",
            &[],
        )];

        let plan = plan_for(&modules, &installed, &[]);
        assert!(entry_ids(&plan, "/proj").is_empty());
        assert_eq!(
            entry_ids(&plan, "/proj/modules"),
            vec!["lodash@\"^4.0.0\""]
        );
    }

    #[test]
    fn test_installed_artifact_deeper_does_not_block() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("lodash", "^4.0.0")]),
        ];
        // Incompatible copy, but inside a module, not at the root.
        let installed = vec![module(
            "/proj/modules/b/node_modules/lodash",
            "lodash",
            "3.10.0",
            &[],
        )];

        let plan = plan_for(&modules, &installed, &[]);
        assert_eq!(entry_ids(&plan, "/proj"), vec!["lodash@\"^4.0.0\""]);
    }

    #[test]
    fn test_satisfying_installed_artifact_does_not_block() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("lodash", "^4.0.0")]),
        ];
        let installed = vec![module(
            "/proj/node_modules/lodash",
            "lodash",
            "4.17.21",
            &[],
        )];

        let plan = plan_for(&modules, &installed, &[]);
        assert_eq!(entry_ids(&plan, "/proj"), vec!["lodash@\"^4.0.0\""]);
    }

    #[test]
    fn test_plan_uniqueness_per_folder() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("x", "^1.0.0"), ("y", "^1.0.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("x", "^2.0.0"), ("y", "^1.0.0")]),
        ];

        let plan = plan_for(&modules, &[], &[]);
        for entries in plan.placements.values() {
            let mut names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len(), "duplicate name within one target");
        }
    }

    #[test]
    fn test_plan_non_redundancy() {
        let modules = vec![
            root_module(&[("shared", "^1.0.0")]),
            module("/proj/modules/a", "a", "1.0.0", &[("shared", "^1.0.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("shared", "^1.0.0")]),
        ];

        let plan = plan_for(&modules, &[], &[]);
        let placements: usize = plan
            .placements
            .values()
            .flatten()
            .filter(|e| e.name == "shared")
            .count();
        assert_eq!(placements, 1);
    }

    #[test]
    fn test_conflict_at_root_descends_one_segment() {
        // inner lives at /proj/modules/b/modules/inner; with the root taken
        // by a conflicting range, the next candidate down the segment walk
        // is /proj/modules, which is conflict-free.
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/b", "b", "1.0.0", &[("pkg", "^2.0.0")]),
            module(
                "/proj/modules/b/modules/inner",
                "inner",
                "1.0.0",
                &[("pkg", "^1.0.0")],
            ),
        ];

        let plan = plan_for(&modules, &[], &[]);
        assert_eq!(entry_ids(&plan, "/proj"), vec!["pkg@\"^2.0.0\""]);
        assert_eq!(entry_ids(&plan, "/proj/modules"), vec!["pkg@\"^1.0.0\""]);
    }

    #[test]
    fn test_most_requested_placed_first() {
        let modules = vec![
            root_module(&[]),
            module("/proj/modules/a", "a", "1.0.0", &[("pkg", "^1.0.0")]),
            module("/proj/modules/b", "b", "1.0.0", &[("pkg", "^1.0.0")]),
            module("/proj/modules/c", "c", "1.0.0", &[("pkg", "^9.0.0")]),
        ];

        let plan = plan_for(&modules, &[], &[]);
        // Two requesters beat the newer-but-lonelier ^9.0.0, which then
        // descends to the first conflict-free prefix.
        assert_eq!(entry_ids(&plan, "/proj"), vec!["pkg@\"^1.0.0\""]);
        assert_eq!(entry_ids(&plan, "/proj/modules"), vec!["pkg@\"^9.0.0\""]);
    }
}
