use crate::authc::UsernamePasswordToken;
use crate::authz::{LogicalOperator, Verdict};
use crate::config::SecurityConfig;
use crate::event::Topic;
use crate::identity::IdentifierCollection;
use crate::manager::SecurityManager;
use crate::realm::MemoryAccountStore;
use crate::subject::SubjectContext;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub accounts: PathBuf,
    pub realm: String,
    pub username: String,
    pub password: SecretString,
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
    pub operator: LogicalOperator,
    pub run_as: Option<String>,
    pub config: SecurityConfig,
}

const TOPICS: [Topic; 8] = [
    Topic::AuthenticationSucceeded,
    Topic::AuthenticationFailed,
    Topic::AuthorizationResults,
    Topic::AuthorizationGranted,
    Topic::AuthorizationDenied,
    Topic::SessionStart,
    Topic::SessionStop,
    Topic::SessionExpire,
];

/// Log in, evaluate, log out and print the JSON report.
///
/// # Errors
/// Returns an error if the account file cannot be loaded, the login is
/// rejected or an evaluation fails.
pub fn execute(args: &Args) -> Result<()> {
    let report = report(args)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn verdicts_json(verdicts: &[Verdict]) -> Value {
    verdicts
        .iter()
        .map(|(item, granted)| json!({ "item": item, "granted": granted }))
        .collect()
}

fn report(args: &Args) -> Result<Value> {
    let store = MemoryAccountStore::from_path(&args.accounts)
        .with_context(|| format!("failed to load accounts from {}", args.accounts.display()))?;
    info!("loaded {} account(s) from {}", store.len(), args.accounts.display());

    let builder = SecurityManager::builder(args.config.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let event_bus = builder.event_bus();
    for topic in TOPICS {
        let sink = Arc::clone(&events);
        event_bus.register(topic, move |event| sink.lock().push(event.topic.as_str()));
    }
    let manager = builder
        .with_account_store_realm(args.realm.clone(), store)
        .build()?;

    let token = UsernamePasswordToken::new(args.username.clone(), args.password.expose_secret());

    let mut report = manager
        .with_subject(SubjectContext::new(), |subject| {
            subject.login(&token)?;

            if let Some(run_as) = &args.run_as {
                subject.run_as(IdentifierCollection::new(args.realm.clone(), run_as.clone()))?;
            }

            let permissions: Vec<&str> = args.permissions.iter().map(String::as_str).collect();
            let roles: Vec<&str> = args.roles.iter().map(String::as_str).collect();

            let report = json!({
                "authenticated_as": subject.authenticated_identifiers(),
                "evaluated_as": subject.identifiers(),
                "session_id": subject.get_session(false)?.map(|session| session.id().to_string()),
                "operator": args.operator,
                "permissions": verdicts_json(&subject.is_permitted(&permissions)?),
                "permitted": subject.is_permitted_collective(&permissions, args.operator)?,
                "roles": verdicts_json(&subject.has_role(&roles)?),
                "has_roles": subject.has_role_collective(&roles, args.operator)?,
            });

            subject.logout();
            Ok(report)
        })
        .with_context(|| format!("check failed for [{}]", args.username))?;

    report["events"] = json!(*events.lock());
    report["agent"] = json!(crate::APP_USER_AGENT);
    Ok(report)
}
