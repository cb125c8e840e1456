//! Satisfaction filtering: requests already met by an installed artifact or
//! a soon-to-be-linked local module drop out before planning.

use crate::coalesce::DependencyRequests;
use crate::manifest::ModuleInfo;
use crate::ranges;
use tracing::debug;

/// Flags shared by the satisfaction filter and symlink repair.
#[derive(Debug, Clone, Copy)]
pub struct SatisfyOptions {
    /// Whether local modules may satisfy requests (disabled by `--no-link`).
    pub link_local_modules: bool,
    /// Whether a local module satisfies a non-semver range on name match
    /// alone.
    pub trust_local_non_semver: bool,
}

/// Whether a local module satisfies the given range.
///
/// A valid semver range is checked against the module version; a non-semver
/// range is satisfied only under `trust_local_non_semver`.
#[must_use]
pub fn local_module_satisfies(module: &ModuleInfo, range: &str, trust_non_semver: bool) -> bool {
    if ranges::is_valid_range(range) {
        ranges::version_satisfies(&module.version, range)
    } else {
        trust_non_semver
    }
}

/// Drop every request group already satisfied by an installed artifact or,
/// when linking is enabled, by a local module. Names with no remaining
/// groups disappear entirely.
#[must_use]
pub fn filter_satisfied(
    mut requests: DependencyRequests,
    modules: &[ModuleInfo],
    installed: &[ModuleInfo],
    opts: SatisfyOptions,
) -> DependencyRequests {
    requests.entries.retain(|name, groups| {
        groups.retain(|group| {
            let by_installed = installed
                .iter()
                .any(|a| a.name == *name && ranges::version_satisfies(&a.version, &group.range));
            if by_installed {
                debug!(name = %name, range = %group.range, "request satisfied by installed artifact");
                return false;
            }

            if opts.link_local_modules {
                let by_local = modules.iter().any(|m| {
                    m.name == *name
                        && local_module_satisfies(m, &group.range, opts.trust_local_non_semver)
                });
                if by_local {
                    debug!(name = %name, range = %group.range, "request satisfied by local module");
                    return false;
                }
            }

            !group.requested_by.is_empty()
        });
        !groups.is_empty()
    });

    requests
}
