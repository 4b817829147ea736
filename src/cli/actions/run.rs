use crate::cli::actions::{Action, check, hash};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub fn execute(action: Action) -> Result<()> {
    match action {
        Action::Hash(args) => hash::execute(&args),
        Action::Check(args) => check::execute(&args),
    }
}
