use crate::authz::LogicalOperator;
use crate::cli::actions::{Action, check, hash};
use crate::config::{AuthenticationPolicy, SecurityConfig};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let sub_m = |subcommand| -> Result<&clap::ArgMatches> {
        matches
            .subcommand_matches(subcommand)
            .context("arguments not found")
    };

    match matches.subcommand_name() {
        Some("hash") => hash_args(sub_m("hash")?),
        Some("check") => check_args(sub_m("check")?),
        Some(other) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("missing command, see --help")),
    }
}

fn password(matches: &clap::ArgMatches) -> Result<SecretString> {
    matches
        .get_one::<String>("password")
        .map(|password| SecretString::from(password.clone()))
        .context("missing required argument: --password")
}

fn hash_args(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Hash(hash::Args {
        password: password(matches)?,
        memory_cost: matches.get_one::<u32>("memory-cost").copied().unwrap_or(19_456),
        time_cost: matches.get_one::<u32>("time-cost").copied().unwrap_or(2),
        parallelism: matches.get_one::<u32>("parallelism").copied().unwrap_or(1),
    }))
}

fn check_args(matches: &clap::ArgMatches) -> Result<Action> {
    let accounts = matches
        .get_one::<String>("accounts")
        .map(PathBuf::from)
        .context("missing required argument: --accounts")?;
    let username = matches
        .get_one::<String>("username")
        .cloned()
        .context("missing required argument: --username")?;

    let strings = |id: &str| -> Vec<String> {
        matches
            .get_many::<String>(id)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    let idle = matches
        .get_one::<u64>("session-idle-timeout")
        .copied()
        .unwrap_or(900);
    let absolute = matches
        .get_one::<u64>("session-absolute-timeout")
        .copied()
        .unwrap_or(1800);
    if idle > absolute {
        return Err(anyhow!(
            "--session-idle-timeout ({idle}s) exceeds --session-absolute-timeout ({absolute}s)"
        ));
    }

    let mut config = SecurityConfig::new()
        .with_session_idle_timeout(Duration::from_secs(idle))
        .with_session_absolute_timeout(Duration::from_secs(absolute))
        .with_authentication_policy(
            matches
                .get_one::<AuthenticationPolicy>("policy")
                .copied()
                .unwrap_or_default(),
        );
    if let Some(capacity) = matches.get_one::<u64>("cache-max-capacity").copied() {
        config = config.with_cache_max_capacity(capacity);
    }

    Ok(Action::Check(check::Args {
        accounts,
        realm: matches
            .get_one::<String>("realm")
            .cloned()
            .unwrap_or_else(|| "AccountStoreRealm".to_string()),
        username,
        password: password(matches)?,
        permissions: strings("permission"),
        roles: strings("role"),
        operator: matches
            .get_one::<LogicalOperator>("operator")
            .copied()
            .unwrap_or(LogicalOperator::All),
        run_as: matches.get_one::<String>("run-as").cloned(),
        config,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_handler_check() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "custodian",
            "check",
            "--accounts",
            "accounts.json",
            "--username",
            "thedude",
            "--password",
            "letsgobowling",
            "--role",
            "courier",
            "--run-as",
            "walter",
            "--session-idle-timeout",
            "60",
        ]);

        let Action::Check(args) = handler(&matches)? else {
            return Err(anyhow!("expected a check action"));
        };
        assert_eq!(args.accounts, PathBuf::from("accounts.json"));
        assert_eq!(args.roles, vec!["courier".to_string()]);
        assert!(args.permissions.is_empty());
        assert_eq!(args.run_as.as_deref(), Some("walter"));
        assert_eq!(args.operator, LogicalOperator::All);
        assert_eq!(args.config.session_idle_timeout(), Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn test_handler_rejects_inverted_timeouts() {
        let matches = commands::new().get_matches_from(vec![
            "custodian",
            "check",
            "-a",
            "accounts.json",
            "-u",
            "thedude",
            "--password",
            "letsgobowling",
            "--session-idle-timeout",
            "3600",
        ]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn test_handler_hash() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "custodian",
            "hash",
            "--password",
            "letsgobowling",
            "--time-cost",
            "1",
        ]);

        let Action::Hash(args) = handler(&matches)? else {
            return Err(anyhow!("expected a hash action"));
        };
        assert_eq!(args.time_cost, 1);
        assert_eq!(args.memory_cost, 19_456);
        Ok(())
    }
}
