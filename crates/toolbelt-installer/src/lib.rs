mod fs_utils;
mod install;
mod layout;
mod package;
mod shims;
mod store;
mod uninstall;

pub use fs_utils::{copy_dir_recursive, remove_file_if_exists};
pub use install::{
    PackageLocation, PackageRestorer, RestoreDescriptor, RestoreRequest, ToolPackageInstaller,
    Verbosity, RESTORE_DESCRIPTOR_FILE,
};
pub use layout::{default_user_root, StoreLayout, STAGING_DIR_NAME};
pub use package::{tool_package_at, ToolPackage};
pub use shims::ShimRepository;
pub use store::ToolPackageStore;
pub use uninstall::{uninstall_package, UninstallReport};

#[cfg(test)]
mod tests;
