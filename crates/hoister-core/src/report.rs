//! Advisory diagnostics, emitted on the coalesced request set before the
//! satisfaction filter runs. Reports never alter downstream phases.

use crate::coalesce::DependencyRequests;
use crate::manifest::ModuleInfo;
use crate::satisfy::{local_module_satisfies, SatisfyOptions};
use tracing::warn;

/// Emit the two advisory reports.
pub fn report_diagnostics(
    requests: &DependencyRequests,
    modules: &[ModuleInfo],
    opts: SatisfyOptions,
) {
    report_split_ranges(requests);
    report_local_module_mismatches(requests, modules, opts);
}

/// Any dependency name coalescing to more than one range is a non-optimal
/// setup: some module pair disagrees enough that two copies get installed.
fn report_split_ranges(requests: &DependencyRequests) {
    for (name, groups) in &requests.entries {
        if groups.len() < 2 {
            continue;
        }

        let primary = groups
            .iter()
            .max_by_key(|group| group.requested_by.len())
            .expect("at least two groups");

        warn!(
            name = %name,
            primary = %primary.range,
            "dependency is requested with {} incompatible ranges", groups.len()
        );
        for group in groups {
            if group.range == primary.range {
                continue;
            }
            warn!(
                name = %name,
                range = %group.range,
                requesters = ?group.requested_by,
                "additional range"
            );
        }
    }
}

/// Any dependency with a local module whose version misses at least one
/// requested range means some module will receive a registry copy instead
/// of the sibling next to it.
fn report_local_module_mismatches(
    requests: &DependencyRequests,
    modules: &[ModuleInfo],
    opts: SatisfyOptions,
) {
    for (name, groups) in &requests.entries {
        let locals: Vec<&ModuleInfo> = modules.iter().filter(|m| m.name == *name).collect();
        if locals.is_empty() {
            continue;
        }

        for group in groups {
            let missed = !locals
                .iter()
                .any(|m| local_module_satisfies(m, &group.range, opts.trust_local_non_semver));
            if missed {
                warn!(
                    name = %name,
                    range = %group.range,
                    local_versions = ?locals.iter().map(|m| m.version.as_str()).collect::<Vec<_>>(),
                    requesters = ?group.requested_by,
                    "local module does not satisfy requested range"
                );
            }
        }
    }
}
