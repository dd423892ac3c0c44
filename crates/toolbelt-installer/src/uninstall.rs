use std::fs;

use anyhow::{anyhow, Context, Result};
use semver::Version;
use toolbelt_core::{run_action, Enlistment, PackageId, Transaction};

use crate::fs_utils::remove_dir_if_empty;
use crate::shims::ShimRepository;
use crate::store::ToolPackageStore;

#[derive(Debug, Clone)]
pub struct UninstallReport {
    pub id: PackageId,
    pub version: Version,
    pub removed_commands: Vec<String>,
}

/// Uninstalls one package version, symmetric to install: every command
/// shim is removed transactionally, then the version directory is
/// renamed into staging (still recoverable), deleted only at commit,
/// and renamed back on rollback. When `version` is None the single
/// installed version is implied.
pub fn uninstall_package(
    store: &ToolPackageStore,
    shims: &ShimRepository,
    id: &PackageId,
    version: Option<&Version>,
    transaction: &mut Transaction,
) -> Result<UninstallReport> {
    let version = match version {
        Some(version) => version.clone(),
        None => {
            let mut versions = store.enumerate_versions(id)?;
            match versions.len() {
                0 => return Err(anyhow!("tool package '{id}' is not installed")),
                1 => versions.remove(0),
                _ => {
                    return Err(anyhow!(
                        "multiple versions of tool package '{id}' are installed; specify one of: {}",
                        versions
                            .iter()
                            .map(Version::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                }
            }
        }
    };

    let package = store.get_package(id, &version)?.ok_or_else(|| {
        anyhow!("tool package '{id}' version {version} is not installed")
    })?;

    for command in &package.commands {
        shims.remove_shim(&command.name, transaction)?;
    }

    let package_dir = package.package_directory.clone();
    let package_root = store.package_root_dir(id);
    let trash_dir = store.random_staging_dir();

    run_action(
        transaction,
        "remove-package",
        || Ok(()),
        || {
            if let Some(parent) = trash_dir.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::rename(&package_dir, &trash_dir).with_context(|| {
                format!(
                    "failed to stage package removal: {} -> {}",
                    package_dir.display(),
                    trash_dir.display()
                )
            })?;

            let staged = trash_dir.clone();
            let original = package_dir.clone();
            let to_delete = trash_dir.clone();
            let root_to_prune = package_root.clone();
            let enlistment = Enlistment::new()
                .on_commit(move || {
                    fs::remove_dir_all(&to_delete).with_context(|| {
                        format!("failed to delete removed package {}", to_delete.display())
                    })?;
                    remove_dir_if_empty(&root_to_prune)
                })
                .on_rollback(move || {
                    fs::rename(&staged, &original).with_context(|| {
                        format!(
                            "failed to restore package: {} -> {}",
                            staged.display(),
                            original.display()
                        )
                    })
                });
            Ok(((), enlistment))
        },
    )?;

    Ok(UninstallReport {
        id: id.clone(),
        version,
        removed_commands: package
            .commands
            .iter()
            .map(|command| command.name.clone())
            .collect(),
    })
}
