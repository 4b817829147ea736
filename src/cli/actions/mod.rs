pub mod check;
pub mod hash;

// Internal "interpreter" for `Action`.
// We keep the match in a separate module so `mod.rs` stays small as more actions are added.
mod run;

#[derive(Debug)]
pub enum Action {
    Hash(hash::Args),
    Check(check::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub fn execute(self) -> anyhow::Result<()> {
        run::execute(self)
    }
}
