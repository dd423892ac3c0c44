use std::path::{Component, Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// File name of the package-declared tool manifest, located directly
/// under `tools/<framework>/<runtime>/` in the restored package.
pub const TOOL_MANIFEST_FILE: &str = "tool.toml";

/// Declared by the package itself and read once after restore: which
/// command the package exposes and which file is its entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolManifest {
    pub command_name: String,
    pub entry_point: String,
    #[serde(default)]
    pub runner: String,
    #[serde(default)]
    pub packaged_shims: Vec<String>,
}

impl ToolManifest {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse tool manifest")?;

        if manifest.command_name.trim().is_empty() {
            return Err(anyhow!("tool manifest command name must not be empty"));
        }
        if manifest
            .command_name
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_whitespace())
        {
            return Err(anyhow!(
                "tool manifest command name must not contain path separators or whitespace: {}",
                manifest.command_name
            ));
        }

        validate_relative_entry(&manifest.entry_point)
            .with_context(|| format!("invalid entry point '{}'", manifest.entry_point))?;
        for packaged_shim in &manifest.packaged_shims {
            validate_relative_entry(packaged_shim)
                .with_context(|| format!("invalid packaged shim path '{packaged_shim}'"))?;
        }

        Ok(manifest)
    }
}

fn validate_relative_entry(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(anyhow!("path must not be empty"));
    }

    let relative = Path::new(path);
    if relative.is_absolute() {
        return Err(anyhow!("path must be relative"));
    }
    if relative
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(anyhow!("path must not include '..'"));
    }

    Ok(())
}
