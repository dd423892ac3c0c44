use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use semver::Version;
use toolbelt_core::{
    entry_point_matches, CommandDescriptor, PackageId, ToolManifest, TOOL_MANIFEST_FILE,
};

use crate::fs_utils::{collect_relative_files, join_relative};

/// An installed (or staged) tool package: identity, location, and the
/// commands it exposes.
#[derive(Debug, Clone)]
pub struct ToolPackage {
    pub id: PackageId,
    pub version: Version,
    pub package_directory: PathBuf,
    pub commands: Vec<CommandDescriptor>,
    pub packaged_shims: Vec<PathBuf>,
}

/// What the package declares about itself, located inside the restored
/// tree without knowing the framework/runtime directory pair restore
/// actually produced.
pub(crate) struct ResolvedToolLayout {
    pub manifest: ToolManifest,
    pub entry_point_rel: String,
    pub packaged_shim_rels: Vec<String>,
}

pub(crate) fn resolve_tool_layout(id: &PackageId, package_dir: &Path) -> Result<ResolvedToolLayout> {
    let files = collect_relative_files(package_dir)?;

    let manifest_rel = files
        .iter()
        .find(|path| entry_point_matches(path, TOOL_MANIFEST_FILE))
        .ok_or_else(|| {
            anyhow!(
                "tool package '{id}' does not contain {TOOL_MANIFEST_FILE} under tools/<framework>/<runtime>"
            )
        })?;

    let manifest_path = join_relative(package_dir, manifest_rel);
    let manifest_raw = fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest = ToolManifest::from_toml_str(&manifest_raw)
        .with_context(|| format!("invalid tool manifest in package '{id}'"))?;

    let entry_point_rel = files
        .iter()
        .find(|path| entry_point_matches(path, &manifest.entry_point))
        .ok_or_else(|| {
            anyhow!(
                "tool package '{id}' does not contain declared entry point '{}'",
                manifest.entry_point
            )
        })?
        .clone();

    // Packaged shims are optional; a declared candidate that restore did
    // not produce simply yields no path here.
    let packaged_shim_rels = manifest
        .packaged_shims
        .iter()
        .filter_map(|declared| {
            files
                .iter()
                .find(|path| entry_point_matches(path, declared))
                .cloned()
        })
        .collect();

    Ok(ResolvedToolLayout {
        manifest,
        entry_point_rel,
        packaged_shim_rels,
    })
}

pub(crate) fn tool_package_from_layout(
    id: &PackageId,
    version: &Version,
    package_dir: &Path,
    layout: &ResolvedToolLayout,
) -> ToolPackage {
    let command = CommandDescriptor::new(
        layout.manifest.command_name.clone(),
        layout.manifest.runner.clone(),
        join_relative(package_dir, &layout.entry_point_rel),
    );
    let packaged_shims = layout
        .packaged_shim_rels
        .iter()
        .map(|rel| join_relative(package_dir, rel))
        .collect();

    ToolPackage {
        id: id.clone(),
        version: version.clone(),
        package_directory: package_dir.to_path_buf(),
        commands: vec![command],
        packaged_shims,
    }
}

/// Loads the package installed at `package_dir`, resolving its manifest
/// and entry point through the lock-file matcher.
pub fn tool_package_at(id: &PackageId, version: &Version, package_dir: &Path) -> Result<ToolPackage> {
    let layout = resolve_tool_layout(id, package_dir)?;
    Ok(tool_package_from_layout(id, version, package_dir, &layout))
}
