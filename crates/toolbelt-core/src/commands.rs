use std::path::PathBuf;

/// One exposed command of an installed tool package. `runner` is the
/// host program that executes the entry point; an empty runner means
/// the entry point is executed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub runner: String,
    pub executable_path: PathBuf,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, runner: impl Into<String>, executable_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            runner: runner.into(),
            executable_path: executable_path.into(),
        }
    }
}
