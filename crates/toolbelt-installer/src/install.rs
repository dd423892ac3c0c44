use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use toolbelt_core::{run_action, Enlistment, PackageId, Transaction};

use crate::fs_utils::{remove_dir_all_if_exists, remove_dir_if_empty};
use crate::package::{resolve_tool_layout, tool_package_from_layout, ToolPackage};
use crate::store::ToolPackageStore;

/// Throwaway restore descriptor written into the staging directory for
/// the external restorer to consume.
pub const RESTORE_DESCRIPTOR_FILE: &str = "restore.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Detailed,
}

/// Where a package comes from: its id, an optional version constraint
/// (absent means latest), and optional feed configuration.
#[derive(Debug, Clone)]
pub struct PackageLocation {
    pub id: PackageId,
    pub version_req: Option<VersionReq>,
    pub feed_config: Option<PathBuf>,
    pub source: Option<String>,
}

/// One restore invocation handed to the external restorer. The core
/// never interprets the restore protocol; it only inspects the staged
/// directory tree afterwards.
#[derive(Debug)]
pub struct RestoreRequest<'a> {
    pub descriptor_path: &'a Path,
    pub output_dir: &'a Path,
    pub feed_config: Option<&'a Path>,
    pub source: Option<&'a str>,
    pub verbosity: Verbosity,
}

/// External collaborator that downloads/restores a package into
/// `<output_dir>/<id>/<version>/...`.
pub trait PackageRestorer {
    fn restore(&self, request: &RestoreRequest<'_>) -> Result<()>;
}

/// Serialized form of a restore request: package id, version
/// requirement (`"*"` when floating), and target framework.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreDescriptor {
    pub package: String,
    pub version: String,
    pub target_framework: String,
}

impl RestoreDescriptor {
    pub fn new(location: &PackageLocation, target_framework: &str) -> Self {
        Self {
            package: location.id.to_string(),
            version: location
                .version_req
                .as_ref()
                .map(|req| req.to_string())
                .unwrap_or_else(|| "*".to_string()),
            target_framework: target_framework.to_string(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse restore descriptor")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("failed to serialize restore descriptor")
    }

    pub fn version_req(&self) -> Result<VersionReq> {
        VersionReq::parse(&self.version)
            .with_context(|| format!("invalid version requirement '{}'", self.version))
    }
}

/// Orchestrates staging, external restore, conflict detection, and the
/// atomic commit of a package into the store.
pub struct ToolPackageInstaller<'a> {
    store: &'a ToolPackageStore,
    restorer: &'a dyn PackageRestorer,
}

impl<'a> ToolPackageInstaller<'a> {
    pub fn new(store: &'a ToolPackageStore, restorer: &'a dyn PackageRestorer) -> Self {
        Self { store, restorer }
    }

    /// Installs a package into the private store. The staged tree
    /// becomes visible through a single directory rename; on any later
    /// failure in the same transaction the enlisted rollback removes
    /// the committed version directory again (and the package-id
    /// directory, only when it ended up empty).
    pub fn install_package(
        &self,
        location: &PackageLocation,
        target_framework: &str,
        verbosity: Verbosity,
        transaction: &mut Transaction,
    ) -> Result<ToolPackage> {
        let package_root = self.store.package_root_dir(&location.id);
        let staging_dir = self.store.random_staging_dir();

        run_action(
            transaction,
            "install-package",
            || Ok(()),
            || {
                match self.stage_and_commit(
                    location,
                    target_framework,
                    verbosity,
                    &staging_dir,
                    &package_root,
                ) {
                    Ok(package) => {
                        let version_dir = package.package_directory.clone();
                        let package_root = package_root.clone();
                        let enlistment = Enlistment::new().on_rollback(move || {
                            remove_dir_all_if_exists(&version_dir)?;
                            remove_dir_if_empty(&package_root)
                        });
                        Ok((package, enlistment))
                    }
                    Err(err) => {
                        // Nothing reached the store yet; drop the
                        // staging remnants.
                        let _ = fs::remove_dir_all(&staging_dir);
                        let _ = remove_dir_if_empty(&package_root);
                        Err(err)
                    }
                }
            },
        )
    }

    fn stage_and_commit(
        &self,
        location: &PackageLocation,
        target_framework: &str,
        verbosity: Verbosity,
        staging_dir: &Path,
        package_root: &Path,
    ) -> Result<ToolPackage> {
        fs::create_dir_all(staging_dir)
            .with_context(|| format!("failed to create staging dir {}", staging_dir.display()))?;

        self.obtain_package(location, target_framework, verbosity, staging_dir)?;

        let version = self
            .store
            .staged_package_version(staging_dir, &location.id)?;

        let package_dir = self.store.package_dir(&location.id, &version);
        if package_dir.exists() {
            return Err(anyhow!(
                "tool package '{}' version {} is already installed",
                location.id,
                version
            ));
        }

        // Validate the staged tree before touching the store.
        let staged_version_dir = staging_dir.join(location.id.dir_name()).join(version.to_string());
        let layout = resolve_tool_layout(&location.id, &staged_version_dir)?;

        fs::create_dir_all(package_root)
            .with_context(|| format!("failed to create {}", package_root.display()))?;
        fs::rename(&staged_version_dir, &package_dir).with_context(|| {
            format!(
                "failed to move staged package into the store: {} -> {}",
                staged_version_dir.display(),
                package_dir.display()
            )
        })?;

        // Only the emptied staging shell is left behind at this point.
        let _ = fs::remove_dir_all(staging_dir);

        Ok(tool_package_from_layout(
            &location.id,
            &version,
            &package_dir,
            &layout,
        ))
    }

    /// Installs into the shared machine-wide package cache instead of
    /// the private store. No staging/conflict two-step: the result is
    /// unconditionally cacheable and re-restoring is harmless.
    pub fn install_package_to_shared_cache(
        &self,
        location: &PackageLocation,
        target_framework: &str,
        verbosity: Verbosity,
    ) -> Result<ToolPackage> {
        let cache_root = self.store.layout().shared_cache_dir();
        fs::create_dir_all(&cache_root)
            .with_context(|| format!("failed to create {}", cache_root.display()))?;

        self.obtain_package(location, target_framework, verbosity, &cache_root)?;

        let version = resolved_cached_version(&cache_root, location)?;
        let package_dir = cache_root
            .join(location.id.dir_name())
            .join(version.to_string());
        let layout = resolve_tool_layout(&location.id, &package_dir)?;

        Ok(tool_package_from_layout(
            &location.id,
            &version,
            &package_dir,
            &layout,
        ))
    }

    fn obtain_package(
        &self,
        location: &PackageLocation,
        target_framework: &str,
        verbosity: Verbosity,
        output_dir: &Path,
    ) -> Result<()> {
        let descriptor = RestoreDescriptor::new(location, target_framework);
        let descriptor_path = output_dir.join(RESTORE_DESCRIPTOR_FILE);
        fs::write(&descriptor_path, descriptor.to_toml_string()?).with_context(|| {
            format!(
                "failed to write restore descriptor {}",
                descriptor_path.display()
            )
        })?;

        let restore_result = self.restorer.restore(&RestoreRequest {
            descriptor_path: &descriptor_path,
            output_dir,
            feed_config: location.feed_config.as_deref(),
            source: location.source.as_deref(),
            verbosity,
        });

        // The descriptor is throwaway either way.
        let _ = fs::remove_file(&descriptor_path);

        restore_result.with_context(|| format!("failed to obtain tool package '{}'", location.id))
    }
}

/// The version the restorer resolved into the shared cache: the highest
/// cached version satisfying the requested constraint.
fn resolved_cached_version(cache_root: &Path, location: &PackageLocation) -> Result<Version> {
    let package_cache_dir = cache_root.join(location.id.dir_name());
    let entries = fs::read_dir(&package_cache_dir).with_context(|| {
        format!(
            "failed to find tool package '{}' in the shared cache",
            location.id
        )
    })?;

    let mut best: Option<Version> = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Ok(version) = Version::parse(&name) else {
            continue;
        };
        if let Some(req) = &location.version_req {
            if !req.matches(&version) {
                continue;
            }
        }
        if best.as_ref().map_or(true, |current| version > *current) {
            best = Some(version);
        }
    }

    best.ok_or_else(|| {
        anyhow!(
            "no cached version of tool package '{}' satisfies the requested constraint",
            location.id
        )
    })
}
