use clap::{Arg, ArgAction, Command, builder::ValueParser};

use crate::authz::LogicalOperator;
use crate::config::AuthenticationPolicy;

#[must_use]
pub fn validator_policy() -> ValueParser {
    ValueParser::from(
        move |policy: &str| -> std::result::Result<AuthenticationPolicy, String> {
            AuthenticationPolicy::from_name(policy).ok_or_else(|| {
                "invalid policy, use first_successful, at_least_one or all_successful".to_string()
            })
        },
    )
}

#[must_use]
pub fn validator_operator() -> ValueParser {
    ValueParser::from(
        move |operator: &str| -> std::result::Result<LogicalOperator, String> {
            LogicalOperator::from_name(operator)
                .ok_or_else(|| "invalid operator, use any or all".to_string())
        },
    )
}

#[must_use]
pub fn command() -> Command {
    let command = Command::new("check")
        .about("Log in against an account file and report permission and role verdicts")
        .arg(
            Arg::new("accounts")
                .short('a')
                .long("accounts")
                .help("JSON file mapping account ids to password_hash, roles and permissions")
                .env("CUSTODIAN_ACCOUNTS")
                .required(true),
        )
        .arg(
            Arg::new("realm")
                .long("realm")
                .help("Name of the realm serving the account file")
                .env("CUSTODIAN_REALM")
                .default_value("AccountStoreRealm"),
        )
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .help("Account to log in as")
                .env("CUSTODIAN_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Password of the account")
                .env("CUSTODIAN_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("permission")
                .short('p')
                .long("permission")
                .help("Permission to evaluate, e.g. courier:transport:rug (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("role")
                .short('r')
                .long("role")
                .help("Role to evaluate (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("operator")
                .long("operator")
                .help("How verdicts combine into the collective outcome: any or all")
                .default_value("all")
                .value_parser(validator_operator()),
        )
        .arg(
            Arg::new("run-as")
                .long("run-as")
                .help("Account id to evaluate as, after logging in"),
        );

    with_config_args(command)
}

fn with_config_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("policy")
                .long("policy")
                .help("Authentication policy across realms")
                .env("CUSTODIAN_AUTHENTICATION_POLICY")
                .default_value("first_successful")
                .value_parser(validator_policy()),
        )
        .arg(
            Arg::new("session-idle-timeout")
                .long("session-idle-timeout")
                .help("Session idle timeout in seconds")
                .env("CUSTODIAN_SESSION_IDLE_TIMEOUT")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("session-absolute-timeout")
                .long("session-absolute-timeout")
                .help("Session absolute timeout in seconds")
                .env("CUSTODIAN_SESSION_ABSOLUTE_TIMEOUT")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("cache-max-capacity")
                .long("cache-max-capacity")
                .help("Maximum entries per cache scope")
                .env("CUSTODIAN_CACHE_MAX_CAPACITY")
                .default_value("10000")
                .value_parser(clap::value_parser!(u64)),
        )
}
