use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use semver::{Version, VersionReq};
use toolbelt_cache::{CommandListKey, LocalToolsResolverCache};
use toolbelt_core::{current_runtime_id, run, CommandNameValidator, PackageId, RuntimeProfile};
use toolbelt_installer::{
    uninstall_package, PackageLocation, ShimRepository, StoreLayout, ToolPackage,
    ToolPackageInstaller, ToolPackageStore, Verbosity,
};

use crate::render::{current_output_style, print_status, with_spinner, OutputStyle};
use crate::restorer::FeedRestorer;

/// Framework moniker packages are restored for when the caller does not
/// ask for a specific one.
pub const DEFAULT_TARGET_FRAMEWORK: &str = "tool1.0";

/// Bump makes every existing resolver-cache entry invisible; no
/// migration code, at the cost of a cold cache.
pub const RESOLVER_CACHE_SCHEMA_VERSION: u32 = 1;

/// Installed commands must not masquerade as toolbelt itself.
pub const RESERVED_COMMAND_PREFIX: &str = "toolbelt";

pub struct InstallRequest {
    pub spec: String,
    pub version: Option<String>,
    pub framework: Option<String>,
    pub source: Option<String>,
    pub feed_config: Option<PathBuf>,
    pub cached: bool,
    pub quiet: bool,
}

pub fn install_flow(layout: &StoreLayout, request: InstallRequest) -> Result<()> {
    layout.ensure_base_dirs()?;

    let (id, spec_req) = parse_spec(&request.spec)?;
    let version_req = match &request.version {
        Some(raw) => Some(
            VersionReq::parse(raw)
                .with_context(|| format!("invalid version requirement '{raw}'"))?,
        ),
        None => spec_req,
    };
    let location = PackageLocation {
        id: id.clone(),
        version_req,
        feed_config: request.feed_config.clone(),
        source: request.source.clone(),
    };
    let profile = RuntimeProfile::new(
        request.framework.as_deref().unwrap_or(DEFAULT_TARGET_FRAMEWORK),
        Some(current_runtime_id()),
    )?;
    let verbosity = if request.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    let style = if request.quiet {
        OutputStyle::Plain
    } else {
        current_output_style()
    };

    let store = ToolPackageStore::new(layout.clone());
    let feed_restorer = FeedRestorer::new();
    let installer = ToolPackageInstaller::new(&store, &feed_restorer);
    let validator = CommandNameValidator::new(false, true, false, RESERVED_COMMAND_PREFIX)?;

    if request.cached {
        let resolver_cache =
            LocalToolsResolverCache::new(&layout.resolver_cache_dir(), RESOLVER_CACHE_SCHEMA_VERSION);
        let shared_root = layout.shared_cache_dir();

        let package = run("install-cached", |transaction| {
            let package = with_spinner(style, &format!("restoring {id}"), || {
                installer.install_package_to_shared_cache(&location, profile.framework(), verbosity)
            })?;
            screen_command_names(&validator, &package)?;
            let key = CommandListKey::new(
                package.id.clone(),
                package.version.clone(),
                profile.clone(),
            );
            resolver_cache.save(&key, &package.commands, &shared_root, transaction)?;
            Ok(package)
        })?;

        print_status(
            style,
            "cached",
            &format!("{} {}", package.id, package.version),
        );
        return Ok(());
    }

    let shims = ShimRepository::new(layout.bin_dir());
    let package = run("install", |transaction| {
        let package = with_spinner(style, &format!("restoring {id}"), || {
            installer.install_package(&location, profile.framework(), verbosity, transaction)
        })?;
        screen_command_names(&validator, &package)?;
        for command in &package.commands {
            shims.create_shim(
                &command.executable_path,
                &command.name,
                &command.runner,
                &package.packaged_shims,
                transaction,
            )?;
        }
        Ok(package)
    })?;

    let commands = package
        .commands
        .iter()
        .map(|command| command.name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    print_status(
        style,
        "installed",
        &format!("{} {} ({commands})", package.id, package.version),
    );
    Ok(())
}

pub fn uninstall_flow(layout: &StoreLayout, package: &str, version: Option<&str>) -> Result<()> {
    layout.ensure_base_dirs()?;

    let id = PackageId::parse(package)?;
    let version = version
        .map(|raw| Version::parse(raw).with_context(|| format!("invalid version '{raw}'")))
        .transpose()?;

    let store = ToolPackageStore::new(layout.clone());
    let shims = ShimRepository::new(layout.bin_dir());
    let report = run("uninstall", |transaction| {
        uninstall_package(&store, &shims, &id, version.as_ref(), transaction)
    })?;

    print_status(
        current_output_style(),
        "removed",
        &format!("{} {}", report.id, report.version),
    );
    Ok(())
}

pub fn list_flow(layout: &StoreLayout) -> Result<()> {
    let store = ToolPackageStore::new(layout.clone());
    let packages = store.enumerate_packages()?;
    if packages.is_empty() {
        println!("No tool packages installed.");
        return Ok(());
    }

    for (id, versions) in packages {
        for version in versions {
            let Some(package) = store.get_package(&id, &version)? else {
                continue;
            };
            let commands = package
                .commands
                .iter()
                .map(|command| command.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            println!("{id} {version} ({commands})");
        }
    }
    Ok(())
}

pub fn doctor_flow(layout: &StoreLayout) -> Result<()> {
    println!("root: {}", layout.root().display());
    println!("store: {}", layout.pkgs_dir().display());
    println!("bin: {}", layout.bin_dir().display());
    println!("shared cache: {}", layout.shared_cache_dir().display());
    println!("resolver cache: {}", layout.resolver_cache_dir().display());
    Ok(())
}

/// `name` or `name@<version requirement>`.
pub fn parse_spec(spec: &str) -> Result<(PackageId, Option<VersionReq>)> {
    match spec.split_once('@') {
        Some((name, requirement)) => {
            let id = PackageId::parse(name)?;
            let requirement = VersionReq::parse(requirement)
                .with_context(|| format!("invalid version requirement '{requirement}'"))?;
            Ok((id, Some(requirement)))
        }
        None => Ok((PackageId::parse(spec)?, None)),
    }
}

fn screen_command_names(validator: &CommandNameValidator, package: &ToolPackage) -> Result<()> {
    for command in &package.commands {
        let errors = validator.generate_errors(&command.name);
        if !errors.is_empty() {
            return Err(anyhow!(
                "package '{}' exposes a disallowed command: {}",
                package.id,
                errors.join("; ")
            ));
        }
    }
    Ok(())
}
