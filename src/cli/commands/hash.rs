use clap::{Arg, Command};

pub const DEFAULT_MEMORY_COST: &str = "19456";
pub const DEFAULT_TIME_COST: &str = "2";
pub const DEFAULT_PARALLELISM: &str = "1";

#[must_use]
pub fn command() -> Command {
    Command::new("hash")
        .about("Print the Argon2id PHC hash of a password, for account files")
        .arg(
            Arg::new("password")
                .long("password")
                .help("Password to hash")
                .env("CUSTODIAN_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("memory-cost")
                .long("memory-cost")
                .help("Argon2 memory cost in KiB")
                .env("CUSTODIAN_ARGON2_MEMORY_COST")
                .default_value(DEFAULT_MEMORY_COST)
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("time-cost")
                .long("time-cost")
                .help("Argon2 iterations")
                .env("CUSTODIAN_ARGON2_TIME_COST")
                .default_value(DEFAULT_TIME_COST)
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("parallelism")
                .long("parallelism")
                .help("Argon2 lanes")
                .env("CUSTODIAN_ARGON2_PARALLELISM")
                .default_value(DEFAULT_PARALLELISM)
                .value_parser(clap::value_parser!(u32)),
        )
}
