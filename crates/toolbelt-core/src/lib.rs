mod commands;
mod entry_point;
mod ids;
mod manifest;
mod name_policy;
mod transaction;

pub use commands::CommandDescriptor;
pub use entry_point::entry_point_matches;
pub use ids::{current_runtime_id, PackageId, RuntimeProfile, ANY_RUNTIME_ID};
pub use manifest::{ToolManifest, TOOL_MANIFEST_FILE};
pub use name_policy::CommandNameValidator;
pub use transaction::{run, run_action, Enlistment, Transaction};
