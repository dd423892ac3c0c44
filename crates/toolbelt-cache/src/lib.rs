use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use toolbelt_core::{
    run_action, CommandDescriptor, Enlistment, PackageId, RuntimeProfile, Transaction,
};

/// Key of one resolver-cache entry: which package, restored for which
/// version and runtime profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandListKey {
    pub id: PackageId,
    pub version: Version,
    pub profile: RuntimeProfile,
}

impl CommandListKey {
    pub fn new(id: PackageId, version: Version, profile: RuntimeProfile) -> Self {
        Self {
            id,
            version,
            profile,
        }
    }
}

/// On-disk row shape. The schema version is encoded in the storage
/// path, never in the payload; bumping it makes old entries invisible
/// instead of requiring migration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct CacheRow {
    version: String,
    target_framework: String,
    runtime_identifier: String,
    commands: Vec<CacheCommand>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct CacheCommand {
    name: String,
    runner: String,
    relative_path: String,
}

/// Versioned, on-disk cache mapping (package, version, runtime profile)
/// to resolved command launch information. Executable paths are stored
/// relative to the shared package cache root so an entry stays valid
/// when the cache is relocated or read on another machine.
pub struct LocalToolsResolverCache {
    versioned_dir: PathBuf,
}

impl LocalToolsResolverCache {
    pub fn new(cache_dir: &Path, schema_version: u32) -> Self {
        Self {
            versioned_dir: cache_dir.join(schema_version.to_string()),
        }
    }

    fn cache_file(&self, id: &PackageId) -> PathBuf {
        self.versioned_dir.join(format!("{}.json", id.dir_name()))
    }

    /// Persists the command list for `key`, replacing any existing row
    /// for the same key. The previous file contents are captured so the
    /// enlisted rollback restores them byte-for-byte.
    pub fn save(
        &self,
        key: &CommandListKey,
        commands: &[CommandDescriptor],
        shared_cache_root: &Path,
        transaction: &mut Transaction,
    ) -> Result<()> {
        let row = to_cache_row(key, commands, shared_cache_root)?;
        let cache_file = self.cache_file(&key.id);

        run_action(
            transaction,
            &format!("save-resolver-cache:{}", key.id),
            || Ok(()),
            || {
                fs::create_dir_all(&self.versioned_dir).with_context(|| {
                    format!("failed to create {}", self.versioned_dir.display())
                })?;

                let previous = match fs::read(&cache_file) {
                    Ok(bytes) => Some(bytes),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("failed to read cache file {}", cache_file.display())
                        });
                    }
                };

                // A corrupt cache file is disposable; start over from an
                // empty table rather than refusing to cache.
                let mut rows: Vec<CacheRow> = previous
                    .as_deref()
                    .and_then(|bytes| serde_json::from_slice(bytes).ok())
                    .unwrap_or_default();
                rows.retain(|existing| !row_matches_key(existing, key));
                rows.push(row);

                let payload =
                    serde_json::to_vec_pretty(&rows).context("failed to serialize cache rows")?;
                fs::write(&cache_file, payload).with_context(|| {
                    format!("failed to write cache file {}", cache_file.display())
                })?;

                let rollback_file = cache_file.clone();
                let enlistment = Enlistment::new().on_rollback(move || match previous {
                    Some(bytes) => fs::write(&rollback_file, bytes).with_context(|| {
                        format!("failed to restore cache file {}", rollback_file.display())
                    }),
                    None => {
                        if rollback_file.exists() {
                            fs::remove_file(&rollback_file).with_context(|| {
                                format!(
                                    "failed to remove cache file {}",
                                    rollback_file.display()
                                )
                            })?;
                        }
                        Ok(())
                    }
                });
                Ok(((), enlistment))
            },
        )
    }

    /// Looks up the command list for `key`, resolving stored relative
    /// paths against the caller's shared cache root. A miss (missing
    /// file, no matching row, unreadable payload) returns an empty
    /// list, never an error.
    pub fn load(
        &self,
        key: &CommandListKey,
        shared_cache_root: &Path,
    ) -> Result<Vec<CommandDescriptor>> {
        let cache_file = self.cache_file(&key.id);
        let bytes = match fs::read(&cache_file) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read cache file {}", cache_file.display())
                });
            }
        };

        let rows: Vec<CacheRow> = match serde_json::from_slice(&bytes) {
            Ok(rows) => rows,
            Err(_) => return Ok(Vec::new()),
        };

        let commands = rows
            .iter()
            .filter(|row| row_matches_key(row, key))
            .flat_map(|row| row.commands.iter())
            .map(|command| {
                CommandDescriptor::new(
                    command.name.clone(),
                    command.runner.clone(),
                    join_relative(shared_cache_root, &command.relative_path),
                )
            })
            .collect();
        Ok(commands)
    }
}

fn row_matches_key(row: &CacheRow, key: &CommandListKey) -> bool {
    row.version == key.version.to_string()
        && row.target_framework == key.profile.framework()
        && row.runtime_identifier == key.profile.runtime_id()
}

fn to_cache_row(
    key: &CommandListKey,
    commands: &[CommandDescriptor],
    shared_cache_root: &Path,
) -> Result<CacheRow> {
    let commands = commands
        .iter()
        .map(|command| {
            let relative = command
                .executable_path
                .strip_prefix(shared_cache_root)
                .map_err(|_| {
                    anyhow!(
                        "executable {} is outside the shared package cache {}",
                        command.executable_path.display(),
                        shared_cache_root.display()
                    )
                })?;
            let segments: Vec<String> = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect();
            Ok(CacheCommand {
                name: command.name.clone(),
                runner: command.runner.clone(),
                relative_path: segments.join("/"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CacheRow {
        version: key.version.to_string(),
        target_framework: key.profile.framework().to_string(),
        runtime_identifier: key.profile.runtime_id().to_string(),
        commands,
    })
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
        out.push(segment);
    }
    out
}
