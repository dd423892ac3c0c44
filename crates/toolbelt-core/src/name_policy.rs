use anyhow::{anyhow, Result};

/// Reserved-word policy for proposed command names. Each switch enables
/// one rule against the reserved word; at most one error is reported
/// per candidate, in priority order anywhere > prefix > exact match.
#[derive(Debug, Clone)]
pub struct CommandNameValidator {
    reserved: String,
    block_anywhere: bool,
    block_as_prefix: bool,
    block_exact_match: bool,
}

impl CommandNameValidator {
    pub fn new(
        block_anywhere: bool,
        block_as_prefix: bool,
        block_exact_match: bool,
        reserved: &str,
    ) -> Result<Self> {
        if !block_anywhere && !block_as_prefix && !block_exact_match {
            return Err(anyhow!("command name validator has no rule enabled"));
        }
        if reserved.is_empty() {
            return Err(anyhow!("reserved command name string must not be empty"));
        }
        Ok(Self {
            reserved: reserved.to_string(),
            block_anywhere,
            block_as_prefix,
            block_exact_match,
        })
    }

    /// Returns the policy violations for `command_name`; empty means the
    /// name is allowed. All comparisons are case-insensitive.
    pub fn generate_errors(&self, command_name: &str) -> Vec<String> {
        let folded = command_name.to_ascii_lowercase();
        let reserved = self.reserved.to_ascii_lowercase();

        if self.block_anywhere && folded.contains(&reserved) {
            return vec![format!(
                "command name '{command_name}' contains reserved string '{}'",
                self.reserved
            )];
        } else if self.block_as_prefix && folded.starts_with(&reserved) {
            return vec![format!(
                "command name '{command_name}' starts with reserved string '{}'",
                self.reserved
            )];
        } else if self.block_exact_match && folded == reserved {
            return vec![format!(
                "command name '{command_name}' matches reserved string '{}'",
                self.reserved
            )];
        }

        Vec::new()
    }
}
