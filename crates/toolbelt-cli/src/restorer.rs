use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use semver::{Version, VersionReq};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use toolbelt_installer::{copy_dir_recursive, PackageRestorer, RestoreDescriptor, RestoreRequest};

/// The bundled package restorer: resolves a restore descriptor against
/// configured feed sources. A directory source is copied, an http(s)
/// source is downloaded as `<base>/<id>/<version>.tar.gz` and verified
/// against the digest its index declares. Sources are tried in order;
/// the first one that can satisfy the requirement wins.
pub struct FeedRestorer;

impl FeedRestorer {
    pub fn new() -> Self {
        Self
    }
}

impl PackageRestorer for FeedRestorer {
    fn restore(&self, request: &RestoreRequest<'_>) -> Result<()> {
        let raw = fs::read_to_string(request.descriptor_path).with_context(|| {
            format!(
                "failed to read restore descriptor {}",
                request.descriptor_path.display()
            )
        })?;
        let descriptor = RestoreDescriptor::from_toml_str(&raw)?;
        let requirement = descriptor.version_req()?;

        let sources = resolve_sources(request.source, request.feed_config)?;
        let mut failures = Vec::new();
        for source in &sources {
            match restore_from_source(source, &descriptor, &requirement, request.output_dir) {
                Ok(()) => return Ok(()),
                Err(err) => failures.push(format!("{source}: {err:#}")),
            }
        }

        Err(anyhow!(
            "package '{}' was not found in any configured source:\n  {}",
            descriptor.package,
            failures.join("\n  ")
        ))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedConfig {
    #[serde(default)]
    pub sources: Vec<FeedSource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedSource {
    #[allow(dead_code)]
    pub name: String,
    pub location: String,
}

impl FeedConfig {
    pub(crate) fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse feed config")
    }
}

pub(crate) fn resolve_sources(source: Option<&str>, feed_config: Option<&Path>) -> Result<Vec<String>> {
    if let Some(source) = source {
        return Ok(vec![source.to_string()]);
    }

    let config_path = feed_config
        .ok_or_else(|| anyhow!("no package source configured; pass a source or a feed config"))?;
    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read feed config {}", config_path.display()))?;
    let config = FeedConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid feed config {}", config_path.display()))?;
    if config.sources.is_empty() {
        return Err(anyhow!(
            "feed config {} declares no sources",
            config_path.display()
        ));
    }

    Ok(config
        .sources
        .into_iter()
        .map(|source| source.location)
        .collect())
}

fn restore_from_source(
    source: &str,
    descriptor: &RestoreDescriptor,
    requirement: &VersionReq,
    output_dir: &Path,
) -> Result<()> {
    if source.starts_with("http://") || source.starts_with("https://") {
        restore_from_http(source, descriptor, requirement, output_dir)
    } else {
        restore_from_directory(Path::new(source), descriptor, requirement, output_dir)
    }
}

pub(crate) fn restore_from_directory(
    feed_root: &Path,
    descriptor: &RestoreDescriptor,
    requirement: &VersionReq,
    output_dir: &Path,
) -> Result<()> {
    let package = descriptor.package.to_ascii_lowercase();
    let package_feed_dir = feed_root.join(&package);
    let entries = fs::read_dir(&package_feed_dir)
        .with_context(|| format!("package directory not found: {}", package_feed_dir.display()))?;

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
        if !requirement.matches(&version) {
            continue;
        }
        if best.as_ref().map_or(true, |current| version > *current) {
            best = Some(version);
        }
    }

    let version = best.ok_or_else(|| {
        anyhow!("no version satisfies the requirement '{requirement}'")
    })?;

    let dst = output_dir.join(&package).join(version.to_string());
    copy_dir_recursive(&package_feed_dir.join(version.to_string()), &dst)
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedIndex {
    #[serde(default)]
    pub versions: Vec<FeedIndexEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedIndexEntry {
    pub version: Version,
    #[serde(default)]
    pub sha256: Option<String>,
}

pub(crate) fn best_index_entry<'a>(
    index: &'a FeedIndex,
    requirement: &VersionReq,
) -> Result<&'a FeedIndexEntry> {
    index
        .versions
        .iter()
        .filter(|entry| requirement.matches(&entry.version))
        .max_by(|a, b| a.version.cmp(&b.version))
        .ok_or_else(|| anyhow!("no version satisfies the requirement '{requirement}'"))
}

fn restore_from_http(
    base_url: &str,
    descriptor: &RestoreDescriptor,
    requirement: &VersionReq,
    output_dir: &Path,
) -> Result<()> {
    let package = descriptor.package.to_ascii_lowercase();
    let base = base_url.trim_end_matches('/');

    let index_url = format!("{base}/{package}/index.json");
    let response = reqwest::blocking::get(&index_url)
        .with_context(|| format!("failed to fetch feed index {index_url}"))?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "feed returned {} for {index_url}",
            response.status()
        ));
    }
    let body = response
        .text()
        .with_context(|| format!("failed to read feed index {index_url}"))?;
    let index: FeedIndex = serde_json::from_str(&body)
        .with_context(|| format!("invalid feed index at {index_url}"))?;
    let entry = best_index_entry(&index, requirement)?;

    let archive_url = format!("{base}/{package}/{}.tar.gz", entry.version);
    let response = reqwest::blocking::get(&archive_url)
        .with_context(|| format!("failed to download {archive_url}"))?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "feed returned {} for {archive_url}",
            response.status()
        ));
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("failed to download {archive_url}"))?;

    if let Some(expected) = &entry.sha256 {
        verify_sha256(&bytes, expected)
            .with_context(|| format!("digest mismatch for {archive_url}"))?;
    }

    let dst = output_dir.join(&package).join(entry.version.to_string());
    fs::create_dir_all(&dst).with_context(|| format!("failed to create {}", dst.display()))?;

    let archive_path = archive_download_path(output_dir, &package, &entry.version);
    fs::write(&archive_path, &bytes)
        .with_context(|| format!("failed to write {}", archive_path.display()))?;
    let extracted = extract_tar(&archive_path, &dst);
    let _ = fs::remove_file(&archive_path);
    extracted
}

fn archive_download_path(output_dir: &Path, package: &str, version: &Version) -> PathBuf {
    output_dir.join(format!(".download-{package}-{version}.tar.gz"))
}

pub(crate) fn verify_sha256(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(anyhow!(
            "expected sha256 {expected}, computed {actual}"
        ));
    }
    Ok(())
}

fn extract_tar(archive_path: &Path, dst: &Path) -> Result<()> {
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive_path)
        .arg("-C")
        .arg(dst)
        .output()
        .context("failed to extract archive: tar failed to start")?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!(
        "failed to extract archive: status={} stderr='{}'",
        output.status,
        stderr.trim()
    ))
}
