use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use toolbelt_core::PackageId;

/// Packages being staged live here, under the store root, so that the
/// final commit is a same-volume rename.
pub const STAGING_DIR_NAME: &str = ".stage";

/// Directory layout under one toolbelt root: the package store, the
/// shim directory, and the caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the package store: `pkgs/<id>/<version>/...`.
    pub fn pkgs_dir(&self) -> PathBuf {
        self.root.join("pkgs")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.pkgs_dir().join(STAGING_DIR_NAME)
    }

    /// Directory holding one launcher file per installed command.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Shared machine-wide package cache, keyed by package id.
    pub fn shared_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("packages")
    }

    /// Storage root handed to the versioned resolver cache.
    pub fn resolver_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("resolver")
    }

    pub fn package_root_dir(&self, id: &PackageId) -> PathBuf {
        self.pkgs_dir().join(id.dir_name())
    }

    pub fn package_dir(&self, id: &PackageId, version: &Version) -> PathBuf {
        self.package_root_dir(id).join(version.to_string())
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.pkgs_dir(),
            self.staging_dir(),
            self.bin_dir(),
            self.cache_dir(),
            self.shared_cache_dir(),
            self.resolver_cache_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user root")?;
        return Ok(PathBuf::from(app_data).join("Toolbelt"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user root")?;
    Ok(PathBuf::from(home).join(".toolbelt"))
}
