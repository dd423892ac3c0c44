use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::{anyhow, Result};

/// Wildcard runtime identifier: the package layout is not specialized
/// for any particular runtime.
pub const ANY_RUNTIME_ID: &str = "any";

/// Identifies a tool package across versions. Comparison is
/// case-insensitive; the folded form doubles as the on-disk directory
/// name so that two spellings of one id never produce two store entries.
#[derive(Debug, Clone)]
pub struct PackageId {
    raw: String,
    folded: String,
}

impl PackageId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("package id must not be empty"));
        }
        if trimmed.chars().any(|ch| ch == '/' || ch == '\\' || ch.is_whitespace()) {
            return Err(anyhow!(
                "package id must not contain path separators or whitespace: {trimmed}"
            ));
        }
        if trimmed == "." || trimmed == ".." || trimmed.starts_with('.') {
            return Err(anyhow!("package id must not start with '.': {trimmed}"));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            folded: trimmed.to_ascii_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Directory name under the package store and the shared cache.
    pub fn dir_name(&self) -> &str {
        &self.folded
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for PackageId {}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

/// The (framework moniker, runtime identifier) pair a package was
/// restored for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    framework: String,
    runtime_id: String,
}

impl RuntimeProfile {
    pub fn new(framework: &str, runtime_id: Option<&str>) -> Result<Self> {
        let framework = framework.trim();
        if framework.is_empty() {
            return Err(anyhow!("target framework must not be empty"));
        }
        let runtime_id = match runtime_id.map(str::trim) {
            None | Some("") => ANY_RUNTIME_ID.to_string(),
            Some(rid) => rid.to_ascii_lowercase(),
        };
        Ok(Self {
            framework: framework.to_string(),
            runtime_id,
        })
    }

    pub fn framework(&self) -> &str {
        &self.framework
    }

    pub fn runtime_id(&self) -> &str {
        &self.runtime_id
    }

    pub fn is_any_runtime(&self) -> bool {
        self.runtime_id == ANY_RUNTIME_ID
    }
}

/// Runtime identifier of the machine this process is running on.
pub fn current_runtime_id() -> &'static str {
    if cfg!(target_os = "windows") {
        if cfg!(target_arch = "aarch64") {
            "win-arm64"
        } else {
            "win-x64"
        }
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            "osx-arm64"
        } else {
            "osx-x64"
        }
    } else if cfg!(target_arch = "aarch64") {
        "linux-arm64"
    } else {
        "linux-x64"
    }
}
