//! Post-install hooks: each local module's `postinstall` command runs from
//! within the module directory once linking is done. The root project is
//! skipped by path equality.

use crate::error::Error;
use crate::manifest::ModuleInfo;
use std::path::Path;
use tracing::{debug, info};

/// Run every module's post-install hook, sequentially.
///
/// # Errors
/// Returns [`Error::Hook`] when a hook exits non-zero.
pub async fn run_postinstall_hooks(modules: &[ModuleInfo], project_root: &Path) -> Result<(), Error> {
    for module in modules {
        let module_path = module.full_module_path();
        if module_path == project_root {
            continue;
        }
        let Some(command) = &module.postinstall else {
            continue;
        };

        info!(module = %module.name, command = %command, "running postinstall");

        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd.exe", "/C")
        } else {
            ("sh", "-c")
        };

        let output = tokio::process::Command::new(shell)
            .arg(shell_arg)
            .arg(command)
            .current_dir(&module_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Hook {
                module: module_path,
                code: output.status.code(),
            });
        }
        debug!(module = %module.name, "postinstall finished");
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn module_with_hook(dir: &Path, name: &str, hook: Option<&str>) -> ModuleInfo {
        fs::create_dir_all(dir).unwrap();
        ModuleInfo {
            location: dir.parent().unwrap().to_path_buf(),
            real_folder_name: dir.file_name().unwrap().to_str().unwrap().to_string(),
            canonical_folder_name: PathBuf::from(name),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            dependencies: BTreeMap::new(),
            postinstall: hook.map(String::from),
            bin_entries: BTreeMap::new(),
            is_scoped: false,
        }
    }

    #[tokio::test]
    async fn test_hook_runs_in_module_dir() {
        let root = tempdir().unwrap();
        let module_dir = root.path().join("modules/a");
        let module = module_with_hook(&module_dir, "a", Some("touch ran.txt"));

        run_postinstall_hooks(&[module], root.path()).await.unwrap();
        assert!(module_dir.join("ran.txt").exists());
    }

    #[tokio::test]
    async fn test_root_project_skipped() {
        let root = tempdir().unwrap();
        let proj = root.path().join("proj");
        let module = module_with_hook(&proj, "root-project", Some("touch ran.txt"));

        run_postinstall_hooks(&[module], &proj).await.unwrap();
        assert!(!proj.join("ran.txt").exists());
    }

    #[tokio::test]
    async fn test_failing_hook_is_fatal() {
        let root = tempdir().unwrap();
        let module_dir = root.path().join("modules/a");
        let module = module_with_hook(&module_dir, "a", Some("exit 7"));

        let err = run_postinstall_hooks(&[module], root.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Hook { code: Some(7), .. }));
    }

    #[tokio::test]
    async fn test_modules_without_hooks_skipped() {
        let root = tempdir().unwrap();
        let module_dir = root.path().join("modules/a");
        let module = module_with_hook(&module_dir, "a", None);

        run_postinstall_hooks(&[module], root.path()).await.unwrap();
    }
}
