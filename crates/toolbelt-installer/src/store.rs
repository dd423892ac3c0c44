use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use semver::Version;
use toolbelt_core::PackageId;

use crate::fs_utils::unique_name;
use crate::layout::{StoreLayout, STAGING_DIR_NAME};
use crate::package::{tool_package_at, ToolPackage};

/// Read-only view of the installed package directories. All mutation
/// goes through the installer and the uninstall flow; a path under
/// `pkgs/<id>/<version>` either does not exist or is fully populated.
pub struct ToolPackageStore {
    layout: StoreLayout,
}

impl ToolPackageStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn package_root_dir(&self, id: &PackageId) -> PathBuf {
        self.layout.package_root_dir(id)
    }

    pub fn package_dir(&self, id: &PackageId, version: &Version) -> PathBuf {
        self.layout.package_dir(id, version)
    }

    /// A uniquely named in-flight install directory under `.stage/`.
    pub fn random_staging_dir(&self) -> PathBuf {
        self.layout.staging_dir().join(unique_name("stage"))
    }

    /// Reads back the concrete version the restorer resolved into a
    /// staging directory. Restore produces `<staging>/<id>/<version>/...`;
    /// exactly one version directory must be present.
    pub fn staged_package_version(&self, staging_dir: &Path, id: &PackageId) -> Result<Version> {
        let staged_root = staging_dir.join(id.dir_name());
        let mut versions = Vec::new();
        let entries = fs::read_dir(&staged_root).with_context(|| {
            format!(
                "failed to find staged tool package '{id}' under {}",
                staged_root.display()
            )
        })?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let version = Version::parse(&name).with_context(|| {
                format!("staged directory is not a valid package version: {name}")
            })?;
            versions.push(version);
        }

        match versions.len() {
            0 => Err(anyhow!("no staged version found for tool package '{id}'")),
            1 => Ok(versions.remove(0)),
            _ => Err(anyhow!(
                "multiple staged versions found for tool package '{id}'"
            )),
        }
    }

    /// Installed versions of one package, ascending.
    pub fn enumerate_versions(&self, id: &PackageId) -> Result<Vec<Version>> {
        let package_root = self.package_root_dir(id);
        if !package_root.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&package_root)
            .with_context(|| format!("failed to read {}", package_root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Ok(version) = Version::parse(&name) {
                versions.push(version);
            }
        }

        versions.sort();
        Ok(versions)
    }

    /// Every installed (package id, versions) pair, ordered by id. The
    /// staging directory and stray non-package entries are skipped.
    pub fn enumerate_packages(&self) -> Result<Vec<(PackageId, Vec<Version>)>> {
        let pkgs_dir = self.layout.pkgs_dir();
        if !pkgs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut packages = Vec::new();
        for entry in fs::read_dir(&pkgs_dir)
            .with_context(|| format!("failed to read {}", pkgs_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == STAGING_DIR_NAME {
                continue;
            }
            let Ok(id) = PackageId::parse(&name) else {
                continue;
            };

            let versions = self.enumerate_versions(&id)?;
            if !versions.is_empty() {
                packages.push((id, versions));
            }
        }

        packages.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(packages)
    }

    /// Loads an installed package with its commands resolved, or None
    /// when that (id, version) is not installed.
    pub fn get_package(&self, id: &PackageId, version: &Version) -> Result<Option<ToolPackage>> {
        let package_dir = self.package_dir(id, version);
        if !package_dir.exists() {
            return Ok(None);
        }
        Ok(Some(tool_package_at(id, version, &package_dir)?))
    }
}
