use anyhow::Result;
use custodian::cli;

fn main() -> Result<()> {
    let action = cli::start()?;

    action.execute()?;

    Ok(())
}
