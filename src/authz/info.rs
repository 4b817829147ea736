use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::permission::{PermissionPart, WildcardPermission, WILDCARD_TOKEN};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role {
    identifier: String,
}

impl Role {
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Permissions and roles held by one account.
///
/// Permissions are indexed by domain; a permission with a wildcard domain is
/// indexed under `*` and considered for every requested domain.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationInfo {
    permissions: HashMap<String, Vec<WildcardPermission>>,
    roles: BTreeSet<Role>,
}

impl AuthorizationInfo {
    #[must_use]
    pub fn new(
        permissions: impl IntoIterator<Item = WildcardPermission>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        let mut index: HashMap<String, Vec<WildcardPermission>> = HashMap::new();
        for permission in permissions {
            match permission.domain() {
                PermissionPart::Wildcard => index
                    .entry(WILDCARD_TOKEN.to_string())
                    .or_default()
                    .push(permission),
                PermissionPart::Values(domains) => {
                    for domain in domains {
                        index
                            .entry(domain.clone())
                            .or_default()
                            .push(permission.clone());
                    }
                }
            }
        }

        Self {
            permissions: index,
            roles: roles.into_iter().collect(),
        }
    }

    /// Held permissions that may apply to `domain`, wildcard-domain ones last.
    pub fn permissions_for_domain<'a>(
        &'a self,
        domain: &str,
    ) -> impl Iterator<Item = &'a WildcardPermission> + 'a {
        let specific = if domain == WILDCARD_TOKEN {
            None
        } else {
            self.permissions.get(&domain.to_lowercase())
        };
        specific
            .into_iter()
            .chain(self.permissions.get(WILDCARD_TOKEN))
            .flatten()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held.identifier == role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_by_domain() -> anyhow::Result<()> {
        let info = AuthorizationInfo::new(
            vec![
                WildcardPermission::parse("courier:transport:*")?,
                WildcardPermission::parse("money,bowling:read")?,
                WildcardPermission::parse("*:audit")?,
            ],
            vec![Role::new("courier")],
        );

        let courier: Vec<String> = info
            .permissions_for_domain("Courier")
            .map(ToString::to_string)
            .collect();
        assert_eq!(courier, vec!["courier:transport:*", "*:audit"]);
        assert_eq!(info.permissions_for_domain("bowling").count(), 2);
        assert_eq!(info.permissions_for_domain("unknown").count(), 1);
        assert_eq!(info.permissions_for_domain("*").count(), 1);

        assert!(info.has_role("courier"));
        assert!(!info.has_role("bowler"));
        assert!(!info.is_empty());
        assert!(AuthorizationInfo::default().is_empty());
        Ok(())
    }
}
