use crate::authc::Argon2CredentialsMatcher;
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct Args {
    pub password: SecretString,
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

/// Hash the password and print the PHC string.
///
/// # Errors
/// Returns an error if the Argon2 costs are invalid or hashing fails.
pub fn execute(args: &Args) -> Result<()> {
    println!("{}", phc_string(args)?);
    Ok(())
}

fn phc_string(args: &Args) -> Result<String> {
    let matcher =
        Argon2CredentialsMatcher::with_cost(args.memory_cost, args.time_cost, args.parallelism)?;
    matcher.hash_password(args.password.expose_secret())
}
