//! Interactive yes/no confirmation capability.

use dialoguer::theme::ColorfulTheme;
use tracing::debug;

/// Asks the user to approve a destructive or repeatable action.
pub trait Confirm {
    /// Returns `true` only on an explicit "yes".
    fn confirm(&self, prompt: &str) -> bool;
}

/// Prompts on the terminal. Defaults to "no".
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                debug!(error = %e, "confirmation prompt failed");
                false
            })
    }
}

/// Approves everything (`--yes`).
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything. Used for non-interactive callers.
#[derive(Debug, Default)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}
