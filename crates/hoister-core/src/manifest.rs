//! Manifest reading: one `package.json` into a [`ModuleInfo`] record.
//!
//! Dependency kinds are merged into a single mapping: runtime dependencies
//! first, development dependencies overlaid unless running in production,
//! peer dependencies overlaid last. Version ranges are carried verbatim; no
//! semver validation happens here.

use crate::error::Error;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One resolved manifest.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// Absolute path of the folder enclosing the module's directory.
    pub location: PathBuf,
    /// On-disk folder name; may diverge from the canonical name for local
    /// modules.
    pub real_folder_name: String,
    /// Relative path the module should occupy under `node_modules` according
    /// to its name: `@scope/pkg` for scoped names, the bare name otherwise.
    pub canonical_folder_name: PathBuf,
    /// Declared package name.
    pub name: String,
    /// Declared version.
    pub version: String,
    /// Merged dependency mapping (name -> version range).
    pub dependencies: BTreeMap<String, String>,
    /// `scripts.postinstall`, when present.
    pub postinstall: Option<String>,
    /// Executable entries (command name -> relative path).
    pub bin_entries: BTreeMap<String, String>,
    /// Whether the name starts with `@`.
    pub is_scoped: bool,
}

impl ModuleInfo {
    /// The module's own directory.
    #[must_use]
    pub fn full_module_path(&self) -> PathBuf {
        self.location.join(&self.real_folder_name)
    }

    /// The module's private `node_modules` directory.
    #[must_use]
    pub fn node_modules_path(&self) -> PathBuf {
        self.full_module_path().join("node_modules")
    }
}

/// Derive the canonical `node_modules` folder for a package name.
#[must_use]
pub fn canonical_folder_name(name: &str) -> PathBuf {
    if let Some((scope, rest)) = name.split_once('/') {
        if scope.starts_with('@') {
            return PathBuf::from(scope).join(rest);
        }
    }
    PathBuf::from(name)
}

/// Read and parse the manifest of the module living at
/// `location/folder_name`.
///
/// # Errors
/// Returns [`Error::Manifest`] (with the offending path) when the file is
/// unreadable or the JSON is malformed.
pub fn read_module(location: &Path, folder_name: &str, production: bool) -> Result<ModuleInfo, Error> {
    let manifest_path = location.join(folder_name).join("package.json");

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| Error::manifest(&manifest_path, format!("Failed to read: {e}")))?;

    let manifest: Value = serde_json::from_str(&content)
        .map_err(|e| Error::manifest(&manifest_path, format!("Invalid JSON: {e}")))?;

    let root = manifest
        .as_object()
        .ok_or_else(|| Error::manifest(&manifest_path, "manifest must be a JSON object"))?;

    let name = root
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(folder_name)
        .to_string();
    let version = root
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();

    let mut dependencies = BTreeMap::new();
    overlay_section(root, "dependencies", &mut dependencies);
    if !production {
        overlay_section(root, "devDependencies", &mut dependencies);
    }
    overlay_section(root, "peerDependencies", &mut dependencies);

    let postinstall = root
        .get("scripts")
        .and_then(Value::as_object)
        .and_then(|scripts| scripts.get("postinstall"))
        .and_then(Value::as_str)
        .map(String::from);

    let bin_entries = normalize_bin(root.get("bin"), &name);
    let is_scoped = name.starts_with('@');

    Ok(ModuleInfo {
        location: location.to_path_buf(),
        real_folder_name: folder_name.to_string(),
        canonical_folder_name: canonical_folder_name(&name),
        name,
        version,
        dependencies,
        postinstall,
        bin_entries,
        is_scoped,
    })
}

/// Overlay one dependency section onto the merged mapping. Later overlays
/// overwrite earlier keys; non-string ranges are skipped.
fn overlay_section(root: &serde_json::Map<String, Value>, section: &str, out: &mut BTreeMap<String, String>) {
    let Some(section_obj) = root.get(section).and_then(Value::as_object) else {
        return;
    };
    for (name, range) in section_obj {
        if let Some(range) = range.as_str() {
            out.insert(name.clone(), range.to_string());
        }
    }
}

/// Normalize the three manifest shapes of `bin` into a mapping.
///
/// Absent becomes empty; a single string maps from the unscoped package
/// name; a mapping passes through. Keys containing path separators are
/// dropped to keep command names plain.
fn normalize_bin(bin: Option<&Value>, pkg_name: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    match bin {
        Some(Value::String(path)) => {
            let command = pkg_name.split('/').next_back().unwrap_or(pkg_name);
            entries.insert(command.to_string(), path.clone());
        }
        Some(Value::Object(bins)) => {
            for (command, path) in bins {
                if command.contains('/') || command.contains('\\') {
                    continue;
                }
                if let Some(path) = path.as_str() {
                    entries.insert(command.clone(), path.to_string());
                }
            }
        }
        _ => {}
    }
    entries
}
