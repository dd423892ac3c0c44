use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use toolbelt_core::{run_action, Enlistment, Transaction};

use crate::fs_utils::{remove_file_if_exists, unique_name};

/// Creates and removes per-command launcher files. Every mutation is
/// enlisted in the ambient transaction: a created launcher is deleted
/// on rollback, and a removal is staged as a rename that stays undoable
/// until commit.
pub struct ShimRepository {
    shim_dir: PathBuf,
}

impl ShimRepository {
    pub fn new(shim_dir: impl Into<PathBuf>) -> Self {
        Self {
            shim_dir: shim_dir.into(),
        }
    }

    pub fn shim_dir(&self) -> &Path {
        &self.shim_dir
    }

    /// Launcher path for a command, with the OS-specific executable
    /// suffix appended where required.
    pub fn shim_path(&self, command_name: &str) -> PathBuf {
        let mut file_name = command_name.to_string();
        if cfg!(windows) {
            file_name.push_str(".cmd");
        }
        self.shim_dir.join(file_name)
    }

    /// Creates the launcher for `command_name`. When the tool packages
    /// its own launcher candidates, exactly one of them must exist on
    /// disk and is copied into place; otherwise a minimal script
    /// recording runner + executable path is synthesized.
    pub fn create_shim(
        &self,
        target_executable: &Path,
        command_name: &str,
        runner: &str,
        packaged_shims: &[PathBuf],
        transaction: &mut Transaction,
    ) -> Result<()> {
        if command_name.trim().is_empty() {
            return Err(anyhow!("cannot create a shim for an empty command name"));
        }
        if target_executable.as_os_str().is_empty() {
            return Err(anyhow!(
                "cannot create a shim for an empty executable path"
            ));
        }

        let shim_path = self.shim_path(command_name);
        let existing_candidates: Vec<&PathBuf> = packaged_shims
            .iter()
            .filter(|candidate| candidate.exists())
            .collect();

        run_action(
            transaction,
            &format!("create-shim:{command_name}"),
            || {
                if !packaged_shims.is_empty() {
                    if existing_candidates.len() > 1 {
                        return Err(anyhow!(
                            "more than one packaged shim exists for command '{command_name}': {}",
                            existing_candidates
                                .iter()
                                .map(|candidate| candidate.display().to_string())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ));
                    }
                    if existing_candidates.is_empty() {
                        return Err(anyhow!(
                            "no packaged shim exists for command '{command_name}'"
                        ));
                    }
                }
                if shim_path.exists() {
                    return Err(anyhow!(
                        "command '{command_name}' already has a shim: {}",
                        shim_path.display()
                    ));
                }
                Ok(())
            },
            || {
                fs::create_dir_all(&self.shim_dir).with_context(|| {
                    format!("failed to create shim directory {}", self.shim_dir.display())
                })?;

                if let Some(packaged) = existing_candidates.first() {
                    fs::copy(packaged, &shim_path).with_context(|| {
                        format!(
                            "failed to copy packaged shim {} to {}",
                            packaged.display(),
                            shim_path.display()
                        )
                    })?;
                } else {
                    write_launcher_script(&shim_path, runner, target_executable)?;
                }
                set_user_execution_permission(&shim_path)?;

                let created = shim_path.clone();
                let enlistment = Enlistment::new().on_rollback(move || {
                    remove_file_if_exists(&created)
                        .with_context(|| format!("failed to remove shim {}", created.display()))
                });
                Ok(((), enlistment))
            },
        )
    }

    /// Removes the launcher for `command_name`; a missing launcher is a
    /// no-op. The file is first renamed to a vacated temporary name so
    /// the removal stays reversible, then deleted at commit.
    pub fn remove_shim(&self, command_name: &str, transaction: &mut Transaction) -> Result<()> {
        let shim_path = self.shim_path(command_name);
        if !shim_path.exists() {
            return Ok(());
        }

        let trash_path = self.shim_dir.join(unique_name(".trash"));
        run_action(
            transaction,
            &format!("remove-shim:{command_name}"),
            || Ok(()),
            || {
                fs::rename(&shim_path, &trash_path).with_context(|| {
                    format!(
                        "failed to stage shim removal: {} -> {}",
                        shim_path.display(),
                        trash_path.display()
                    )
                })?;

                let staged = trash_path.clone();
                let original = shim_path.clone();
                let to_delete = trash_path.clone();
                let enlistment = Enlistment::new()
                    .on_commit(move || {
                        remove_file_if_exists(&to_delete).with_context(|| {
                            format!("failed to delete removed shim {}", to_delete.display())
                        })
                    })
                    .on_rollback(move || {
                        fs::rename(&staged, &original).with_context(|| {
                            format!(
                                "failed to restore shim: {} -> {}",
                                staged.display(),
                                original.display()
                            )
                        })
                    });
                Ok(((), enlistment))
            },
        )
    }
}

fn write_launcher_script(shim_path: &Path, runner: &str, target_executable: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let launch = if runner.is_empty() {
            format!("exec \"{}\" \"$@\"\n", target_executable.display())
        } else {
            format!("exec {runner} \"{}\" \"$@\"\n", target_executable.display())
        };
        fs::write(shim_path, format!("#!/bin/sh\n{launch}"))
            .with_context(|| format!("failed to write shim {}", shim_path.display()))
    }

    #[cfg(windows)]
    {
        let launch = if runner.is_empty() {
            format!("\"{}\" %*\r\n", target_executable.display())
        } else {
            format!("{runner} \"{}\" %*\r\n", target_executable.display())
        };
        fs::write(shim_path, format!("@echo off\r\n{launch}"))
            .with_context(|| format!("failed to write shim {}", shim_path.display()))
    }
}

#[cfg(unix)]
fn set_user_execution_permission(shim_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(shim_path)
        .with_context(|| format!("failed to stat shim {}", shim_path.display()))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(shim_path, permissions)
        .with_context(|| format!("failed to mark shim executable {}", shim_path.display()))
}

#[cfg(not(unix))]
fn set_user_execution_permission(_shim_path: &Path) -> Result<()> {
    Ok(())
}
