use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use semver::{Version, VersionReq};
use toolbelt_core::{run, PackageId, Transaction};

use crate::{
    uninstall_package, PackageLocation, PackageRestorer, RestoreDescriptor, RestoreRequest,
    ShimRepository, StoreLayout, ToolPackage, ToolPackageInstaller, ToolPackageStore, Verbosity,
};

static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

fn test_layout() -> StoreLayout {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "toolbelt-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        seq
    ));
    StoreLayout::new(path)
}

fn package_id(raw: &str) -> PackageId {
    PackageId::parse(raw).expect("must parse package id")
}

struct FakeRestorer {
    version: &'static str,
    command_name: &'static str,
    entry_point: &'static str,
    runner: &'static str,
    declared_entry_point: Option<&'static str>,
    omit_manifest: bool,
    fail_after_partial_write: bool,
}

impl FakeRestorer {
    fn new(version: &'static str) -> Self {
        Self {
            version,
            command_name: "demo",
            entry_point: "demo.sh",
            runner: "",
            declared_entry_point: None,
            omit_manifest: false,
            fail_after_partial_write: false,
        }
    }
}

impl PackageRestorer for FakeRestorer {
    fn restore(&self, request: &RestoreRequest<'_>) -> Result<()> {
        let raw = fs::read_to_string(request.descriptor_path)?;
        let descriptor = RestoreDescriptor::from_toml_str(&raw)?;

        let rid_dir = request
            .output_dir
            .join(descriptor.package.to_ascii_lowercase())
            .join(self.version)
            .join("tools")
            .join(&descriptor.target_framework)
            .join("any");
        fs::create_dir_all(&rid_dir)?;

        if self.fail_after_partial_write {
            fs::write(rid_dir.join("partial.bin"), b"half a package")?;
            return Err(anyhow!("simulated restore failure"));
        }

        if !self.omit_manifest {
            let declared = self.declared_entry_point.unwrap_or(self.entry_point);
            fs::write(
                rid_dir.join("tool.toml"),
                format!(
                    "command_name = \"{}\"\nentry_point = \"{}\"\nrunner = \"{}\"\n",
                    self.command_name, declared, self.runner
                ),
            )?;
        }

        let entry_path = rid_dir.join(self.entry_point);
        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(entry_path, b"#!/bin/sh\necho demo\n")?;
        Ok(())
    }
}

fn location(id: &PackageId, version_req: Option<&str>) -> PackageLocation {
    PackageLocation {
        id: id.clone(),
        version_req: version_req.map(|req| VersionReq::parse(req).expect("must parse req")),
        feed_config: None,
        source: None,
    }
}

fn install(
    layout: &StoreLayout,
    restorer: &dyn PackageRestorer,
    id: &PackageId,
    version_req: Option<&str>,
) -> Result<ToolPackage> {
    let store = ToolPackageStore::new(layout.clone());
    let installer = ToolPackageInstaller::new(&store, restorer);
    let location = location(id, version_req);
    run("install", |transaction| {
        installer.install_package(&location, "tool1.0", Verbosity::Quiet, transaction)
    })
}

fn staging_is_empty(layout: &StoreLayout) -> bool {
    match fs::read_dir(layout.staging_dir()) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[test]
fn layout_paths_match_store_shape() {
    let layout = test_layout();
    let id = package_id("demo");
    let version = Version::parse("1.0.0").expect("must parse");

    assert_eq!(layout.pkgs_dir(), layout.root().join("pkgs"));
    assert_eq!(layout.staging_dir(), layout.root().join("pkgs").join(".stage"));
    assert_eq!(layout.bin_dir(), layout.root().join("bin"));
    assert_eq!(
        layout.package_dir(&id, &version),
        layout.root().join("pkgs").join("demo").join("1.0.0")
    );
    assert_eq!(
        layout.shared_cache_dir(),
        layout.root().join("cache").join("packages")
    );
    assert_eq!(
        layout.resolver_cache_dir(),
        layout.root().join("cache").join("resolver")
    );
}

#[test]
fn install_package_commits_into_store() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");

    let package =
        install(&layout, &FakeRestorer::new("1.0.0"), &id, Some("=1.0.0")).expect("must install");

    assert_eq!(package.version, Version::parse("1.0.0").expect("must parse"));
    assert_eq!(package.package_directory, layout.package_dir(&id, &package.version));
    assert!(package.package_directory.exists());
    assert_eq!(package.commands.len(), 1);
    assert_eq!(package.commands[0].name, "demo");
    assert!(package.commands[0].executable_path.exists());
    assert!(staging_is_empty(&layout));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn install_resolves_floating_version_from_staged_output() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");

    let package = install(&layout, &FakeRestorer::new("1.2.3"), &id, None).expect("must install");
    assert_eq!(package.version, Version::parse("1.2.3").expect("must parse"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn installing_same_version_twice_fails_and_preserves_the_first() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");

    let package =
        install(&layout, &FakeRestorer::new("1.0.0"), &id, Some("=1.0.0")).expect("must install");
    let entry_before =
        fs::read(&package.commands[0].executable_path).expect("must read entry point");

    let err = install(&layout, &FakeRestorer::new("1.0.0"), &id, Some("=1.0.0"))
        .expect_err("second install must conflict");
    assert!(
        format!("{err:#}").contains("already installed"),
        "unexpected error: {err:#}"
    );

    let entry_after =
        fs::read(&package.commands[0].executable_path).expect("must read entry point");
    assert_eq!(entry_before, entry_after);
    assert!(staging_is_empty(&layout));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn restore_failure_leaves_no_trace_in_the_store() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");

    let mut restorer = FakeRestorer::new("1.0.0");
    restorer.fail_after_partial_write = true;

    let err = install(&layout, &restorer, &id, Some("=1.0.0")).expect_err("restore must fail");
    assert!(
        format!("{err:#}").contains("failed to obtain tool package 'demo'"),
        "unexpected error: {err:#}"
    );
    assert!(!layout.package_root_dir(&id).exists());
    assert!(staging_is_empty(&layout));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn missing_manifest_fails_before_any_store_mutation() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");

    let mut restorer = FakeRestorer::new("1.0.0");
    restorer.omit_manifest = true;

    let err = install(&layout, &restorer, &id, Some("=1.0.0")).expect_err("install must fail");
    assert!(
        format!("{err:#}").contains("tool.toml"),
        "unexpected error: {err:#}"
    );
    assert!(!layout.package_root_dir(&id).exists());
    assert!(staging_is_empty(&layout));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn missing_entry_point_fails_before_any_store_mutation() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");

    let mut restorer = FakeRestorer::new("1.0.0");
    restorer.declared_entry_point = Some("ghost.sh");

    let err = install(&layout, &restorer, &id, Some("=1.0.0")).expect_err("install must fail");
    assert!(
        format!("{err:#}").contains("does not contain declared entry point 'ghost.sh'"),
        "unexpected error: {err:#}"
    );
    assert!(!layout.package_root_dir(&id).exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn install_rolls_back_when_a_later_participant_fails() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");
    let store = ToolPackageStore::new(layout.clone());
    let restorer = FakeRestorer::new("1.0.0");
    let installer = ToolPackageInstaller::new(&store, &restorer);
    let location = location(&id, Some("=1.0.0"));

    let result: Result<()> = run("install", |transaction| {
        let package =
            installer.install_package(&location, "tool1.0", Verbosity::Quiet, transaction)?;
        assert!(package.package_directory.exists());
        Err(anyhow!("shim conflict later in the transaction"))
    });
    result.expect_err("scope error must propagate");

    assert!(!layout.package_dir(&id, &Version::parse("1.0.0").expect("must parse")).exists());
    assert!(!layout.package_root_dir(&id).exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn staged_package_version_requires_exactly_one_version_directory() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");
    let store = ToolPackageStore::new(layout.clone());

    let staging = store.random_staging_dir();
    fs::create_dir_all(staging.join("demo")).expect("must create staged root");
    let err = store
        .staged_package_version(&staging, &id)
        .expect_err("empty staged root must fail");
    assert!(format!("{err:#}").contains("no staged version"), "unexpected error: {err:#}");

    fs::create_dir_all(staging.join("demo").join("1.0.0")).expect("must create version dir");
    fs::create_dir_all(staging.join("demo").join("2.0.0")).expect("must create version dir");
    let err = store
        .staged_package_version(&staging, &id)
        .expect_err("two staged versions must fail");
    assert!(
        format!("{err:#}").contains("multiple staged versions"),
        "unexpected error: {err:#}"
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn enumerate_packages_skips_staging_and_sorts_versions() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");

    let alpha = package_id("alpha");
    let beta = package_id("beta");
    install(&layout, &FakeRestorer::new("2.0.0"), &alpha, Some("=2.0.0")).expect("must install");
    install(&layout, &FakeRestorer::new("1.0.0"), &alpha, Some("=1.0.0")).expect("must install");
    install(&layout, &FakeRestorer::new("0.3.0"), &beta, Some("=0.3.0")).expect("must install");

    let store = ToolPackageStore::new(layout.clone());
    let packages = store.enumerate_packages().expect("must enumerate");
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].0, alpha);
    assert_eq!(
        packages[0].1,
        vec![
            Version::parse("1.0.0").expect("must parse"),
            Version::parse("2.0.0").expect("must parse"),
        ]
    );
    assert_eq!(packages[1].0, beta);

    assert!(store
        .get_package(&alpha, &Version::parse("9.9.9").expect("must parse"))
        .expect("must query")
        .is_none());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn install_to_shared_cache_resolves_best_matching_version() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");
    let store = ToolPackageStore::new(layout.clone());

    let older = FakeRestorer::new("1.0.0");
    let installer = ToolPackageInstaller::new(&store, &older);
    let package = installer
        .install_package_to_shared_cache(&location(&id, Some("=1.0.0")), "tool1.0", Verbosity::Quiet)
        .expect("must cache");
    assert!(package
        .package_directory
        .starts_with(layout.shared_cache_dir()));

    let newer = FakeRestorer::new("1.5.0");
    let installer = ToolPackageInstaller::new(&store, &newer);
    let package = installer
        .install_package_to_shared_cache(&location(&id, Some("^1.0")), "tool1.0", Verbosity::Quiet)
        .expect("must cache");
    assert_eq!(package.version, Version::parse("1.5.0").expect("must parse"));
    assert_eq!(package.commands.len(), 1);

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn restore_descriptor_round_trips_through_toml() {
    let id = package_id("demo");
    let descriptor = RestoreDescriptor::new(&location(&id, Some("^1.2")), "tool1.0");
    let raw = descriptor.to_toml_string().expect("must serialize");
    let parsed = RestoreDescriptor::from_toml_str(&raw).expect("must parse");
    assert_eq!(parsed, descriptor);
    assert!(parsed
        .version_req()
        .expect("must parse req")
        .matches(&Version::parse("1.3.0").expect("must parse")));

    let floating = RestoreDescriptor::new(&location(&id, None), "tool1.0");
    assert_eq!(floating.version, "*");
    assert!(floating
        .version_req()
        .expect("must parse req")
        .matches(&Version::parse("0.1.0").expect("must parse")));
}

#[test]
fn create_shim_writes_an_executable_launcher() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());
    let target = layout.root().join("pkgs/demo/1.0.0/tools/tool1.0/any/demo.sh");

    run("install", |transaction| {
        shims.create_shim(&target, "demo", "sh", &[], transaction)
    })
    .expect("must create shim");

    let shim_path = shims.shim_path("demo");
    let contents = fs::read_to_string(&shim_path).expect("must read shim");
    assert!(contents.contains("demo.sh"), "unexpected shim: {contents}");
    assert!(contents.contains("sh "), "unexpected shim: {contents}");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&shim_path).expect("must stat shim").permissions().mode();
        assert_ne!(mode & 0o111, 0, "shim must be executable");
    }

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn create_shim_conflict_preserves_the_existing_launcher() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());
    let shim_path = shims.shim_path("demo");
    fs::write(&shim_path, b"pre-existing launcher").expect("must write existing shim");

    let err = run("install", |transaction| {
        shims.create_shim(
            layout.root().join("demo.sh").as_path(),
            "demo",
            "",
            &[],
            transaction,
        )
    })
    .expect_err("conflicting shim must fail");
    assert!(
        format!("{err:#}").contains("already has a shim"),
        "unexpected error: {err:#}"
    );

    let contents = fs::read(&shim_path).expect("must read shim");
    assert_eq!(contents, b"pre-existing launcher");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn failed_sibling_shim_rolls_back_the_created_one() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());
    fs::write(shims.shim_path("second"), b"occupied").expect("must write conflicting shim");
    let target = layout.root().join("demo.sh");

    let err = run("install", |transaction| {
        shims.create_shim(&target, "first", "", &[], transaction)?;
        shims.create_shim(&target, "second", "", &[], transaction)
    })
    .expect_err("second shim must conflict");
    assert!(format!("{err:#}").contains("already has a shim"), "unexpected error: {err:#}");

    assert!(!shims.shim_path("first").exists());
    let contents = fs::read(shims.shim_path("second")).expect("must read shim");
    assert_eq!(contents, b"occupied");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn remove_shim_is_idempotent_for_missing_launchers() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());

    run("uninstall", |transaction| shims.remove_shim("missing", transaction))
        .expect("removing a missing shim must be a no-op");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn remove_shim_deletes_the_launcher_at_commit() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());
    fs::write(shims.shim_path("demo"), b"launcher").expect("must write shim");

    run("uninstall", |transaction| shims.remove_shim("demo", transaction))
        .expect("must remove shim");

    assert!(!shims.shim_path("demo").exists());
    let leftovers = fs::read_dir(layout.bin_dir())
        .expect("must read bin dir")
        .count();
    assert_eq!(leftovers, 0, "no trash files may remain after commit");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn aborted_removal_restores_the_launcher_in_place() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());
    let shim_path = shims.shim_path("demo");
    fs::write(&shim_path, b"original launcher bytes").expect("must write shim");

    let result: Result<()> = run("uninstall", |transaction| {
        shims.remove_shim("demo", transaction)?;
        assert!(!shim_path.exists(), "prepared removal must vacate the name");
        Err(anyhow!("abort before commit"))
    });
    result.expect_err("scope error must propagate");

    let contents = fs::read(&shim_path).expect("must read restored shim");
    assert_eq!(contents, b"original launcher bytes");
    let leftovers = fs::read_dir(layout.bin_dir())
        .expect("must read bin dir")
        .count();
    assert_eq!(leftovers, 1, "only the restored launcher may remain");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn ambiguous_packaged_shims_fail_before_any_mutation() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());

    let first = layout.root().join("shim-a");
    let second = layout.root().join("shim-b");
    fs::write(&first, b"a").expect("must write candidate");
    fs::write(&second, b"b").expect("must write candidate");

    let err = run("install", |transaction| {
        shims.create_shim(
            layout.root().join("demo.sh").as_path(),
            "demo",
            "",
            &[first.clone(), second.clone()],
            transaction,
        )
    })
    .expect_err("two candidates must be ambiguous");
    assert!(
        format!("{err:#}").contains("more than one packaged shim"),
        "unexpected error: {err:#}"
    );
    assert!(!shims.shim_path("demo").exists());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn packaged_shim_candidates_must_exist() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());

    let err = run("install", |transaction| {
        shims.create_shim(
            layout.root().join("demo.sh").as_path(),
            "demo",
            "",
            &[layout.root().join("ghost-shim")],
            transaction,
        )
    })
    .expect_err("a missing candidate must fail");
    assert!(
        format!("{err:#}").contains("no packaged shim exists"),
        "unexpected error: {err:#}"
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn single_packaged_shim_is_copied_verbatim() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let shims = ShimRepository::new(layout.bin_dir());

    let candidate = layout.root().join("packaged-shim");
    fs::write(&candidate, b"#!/bin/sh\nexec packaged\n").expect("must write candidate");

    run("install", |transaction| {
        shims.create_shim(
            layout.root().join("demo.sh").as_path(),
            "demo",
            "",
            &[candidate.clone()],
            transaction,
        )
    })
    .expect("must copy packaged shim");

    let contents = fs::read(shims.shim_path("demo")).expect("must read shim");
    assert_eq!(contents, b"#!/bin/sh\nexec packaged\n");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn uninstall_removes_package_and_shims() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");
    let shims = ShimRepository::new(layout.bin_dir());

    let package =
        install(&layout, &FakeRestorer::new("1.0.0"), &id, Some("=1.0.0")).expect("must install");
    run("install", |transaction| {
        shims.create_shim(
            &package.commands[0].executable_path,
            &package.commands[0].name,
            "",
            &[],
            transaction,
        )
    })
    .expect("must create shim");

    let store = ToolPackageStore::new(layout.clone());
    let report = run("uninstall", |transaction| {
        uninstall_package(&store, &shims, &id, None, transaction)
    })
    .expect("must uninstall");

    assert_eq!(report.version, Version::parse("1.0.0").expect("must parse"));
    assert_eq!(report.removed_commands, vec!["demo"]);
    assert!(!layout.package_root_dir(&id).exists());
    assert!(!shims.shim_path("demo").exists());
    assert!(staging_is_empty(&layout));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn aborted_uninstall_restores_package_and_shims() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");
    let shims = ShimRepository::new(layout.bin_dir());

    let package =
        install(&layout, &FakeRestorer::new("1.0.0"), &id, Some("=1.0.0")).expect("must install");
    run("install", |transaction| {
        shims.create_shim(
            &package.commands[0].executable_path,
            &package.commands[0].name,
            "",
            &[],
            transaction,
        )
    })
    .expect("must create shim");
    let shim_before = fs::read(shims.shim_path("demo")).expect("must read shim");

    let store = ToolPackageStore::new(layout.clone());
    let result: Result<()> = run("uninstall", |transaction| {
        uninstall_package(&store, &shims, &id, None, transaction)?;
        Err(anyhow!("abort before commit"))
    });
    result.expect_err("scope error must propagate");

    assert!(package.package_directory.exists());
    assert!(package.commands[0].executable_path.exists());
    let shim_after = fs::read(shims.shim_path("demo")).expect("must read restored shim");
    assert_eq!(shim_before, shim_after);

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn uninstall_requires_an_installed_package() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let store = ToolPackageStore::new(layout.clone());
    let shims = ShimRepository::new(layout.bin_dir());
    let id = package_id("missing");

    let err = run("uninstall", |transaction| {
        uninstall_package(&store, &shims, &id, None, transaction)
    })
    .expect_err("must fail for missing package");
    assert!(
        format!("{err:#}").contains("is not installed"),
        "unexpected error: {err:#}"
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn uninstall_with_multiple_versions_requires_an_explicit_version() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    let id = package_id("demo");
    let shims = ShimRepository::new(layout.bin_dir());

    install(&layout, &FakeRestorer::new("1.0.0"), &id, Some("=1.0.0")).expect("must install");
    // The second version's shim would conflict; skip shims entirely and
    // exercise only version selection.
    let store = ToolPackageStore::new(layout.clone());
    let staging = store.random_staging_dir();
    let restorer = FakeRestorer::new("2.0.0");
    restorer
        .restore(&RestoreRequest {
            descriptor_path: &write_descriptor(&staging, "demo"),
            output_dir: &staging,
            feed_config: None,
            source: None,
            verbosity: Verbosity::Quiet,
        })
        .expect("must stage");
    fs::rename(
        staging.join("demo").join("2.0.0"),
        layout.package_dir(&id, &Version::parse("2.0.0").expect("must parse")),
    )
    .expect("must move second version into the store");

    let err = run("uninstall", |transaction| {
        uninstall_package(&store, &shims, &id, None, transaction)
    })
    .expect_err("must require an explicit version");
    assert!(
        format!("{err:#}").contains("multiple versions"),
        "unexpected error: {err:#}"
    );

    let report = run("uninstall", |transaction| {
        uninstall_package(
            &store,
            &shims,
            &id,
            Some(&Version::parse("2.0.0").expect("must parse")),
            transaction,
        )
    })
    .expect("must uninstall the explicit version");
    assert_eq!(report.version, Version::parse("2.0.0").expect("must parse"));
    assert!(layout
        .package_dir(&id, &Version::parse("1.0.0").expect("must parse"))
        .exists());

    let _ = fs::remove_dir_all(layout.root());
}

fn write_descriptor(staging: &std::path::Path, package: &str) -> PathBuf {
    fs::create_dir_all(staging).expect("must create staging dir");
    let path = staging.join("restore.toml");
    fs::write(
        &path,
        format!("package = \"{package}\"\nversion = \"*\"\ntarget_framework = \"tool1.0\"\n"),
    )
    .expect("must write descriptor");
    path
}
