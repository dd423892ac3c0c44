/// Top-level directory that marks the runnable payload of a tool
/// package: `tools/<framework>/<runtime-or-any>/...`.
pub const TOOLS_SEGMENT: &str = "tools";

/// Decides whether a concrete restored-package file path corresponds to
/// a declared entry-point path, without knowing which framework or
/// runtime segment the restore actually produced.
///
/// The installed path must be `tools/<framework>/<runtime>/<declared>`
/// where the framework and runtime segments are positional placeholders
/// and the remainder equals the declared path segment-for-segment.
pub fn entry_point_matches(installed_path: &str, entry_point: &str) -> bool {
    let installed = split_segments(installed_path);
    let declared = split_segments(entry_point);

    if declared.is_empty() {
        return false;
    }
    if installed.len() != declared.len() + 3 {
        return false;
    }
    if installed[0] != TOOLS_SEGMENT {
        return false;
    }

    installed[3..] == declared[..]
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect()
}
