//! Wildcard permissions: `domain:action:target`.
//!
//! Each part is `*` or a comma-separated set of values. Missing trailing parts
//! are wildcards, so `courier` is `courier:*:*`. Matching is case-insensitive.

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::SecurityError;

pub const WILDCARD_TOKEN: &str = "*";
const PART_DIVIDER: char = ':';
const SUBPART_DIVIDER: char = ',';
const MAX_PARTS: usize = 3;

static WILDCARD_PART: PermissionPart = PermissionPart::Wildcard;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PermissionPart {
    Wildcard,
    Values(BTreeSet<String>),
}

impl PermissionPart {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == WILDCARD_TOKEN {
            return Some(Self::Wildcard);
        }
        let values: BTreeSet<String> = raw
            .split(SUBPART_DIVIDER)
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .collect();
        if values.is_empty() || values.contains(WILDCARD_TOKEN) {
            return None;
        }
        Some(Self::Values(values))
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// True if this part, as held, covers `requested`.
    #[must_use]
    pub fn implies(&self, requested: &Self) -> bool {
        match (self, requested) {
            (Self::Wildcard, _) => true,
            (Self::Values(_), Self::Wildcard) => false,
            (Self::Values(held), Self::Values(wanted)) => held.is_superset(wanted),
        }
    }
}

impl fmt::Display for PermissionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str(WILDCARD_TOKEN),
            Self::Values(values) => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WildcardPermission {
    parts: Vec<PermissionPart>,
}

impl WildcardPermission {
    /// Parse a permission string.
    ///
    /// # Errors
    /// `InvalidPermission` for an empty string, an empty part, or more than
    /// three parts.
    pub fn parse(raw: &str) -> Result<Self, SecurityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SecurityError::InvalidPermission(raw.to_string()));
        }

        let parts = trimmed
            .split(PART_DIVIDER)
            .map(PermissionPart::parse)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| SecurityError::InvalidPermission(raw.to_string()))?;

        if parts.len() > MAX_PARTS {
            return Err(SecurityError::InvalidPermission(raw.to_string()));
        }

        Ok(Self { parts })
    }

    fn part(&self, index: usize) -> &PermissionPart {
        self.parts.get(index).unwrap_or(&WILDCARD_PART)
    }

    #[must_use]
    pub fn domain(&self) -> &PermissionPart {
        self.part(0)
    }

    #[must_use]
    pub fn action(&self) -> &PermissionPart {
        self.part(1)
    }

    #[must_use]
    pub fn target(&self) -> &PermissionPart {
        self.part(2)
    }

    /// True if holding `self` grants `requested`.
    #[must_use]
    pub fn implies(&self, requested: &Self) -> bool {
        (0..MAX_PARTS).all(|i| self.part(i).implies(requested.part(i)))
    }
}

impl FromStr for WildcardPermission {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(":"))
    }
}

impl Serialize for WildcardPermission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::unwrap_used)]
    fn perm(raw: &str) -> WildcardPermission {
        WildcardPermission::parse(raw).unwrap()
    }

    #[test]
    fn parses_and_normalizes() {
        let p = perm(" Courier:Transport,Deliver:* ");
        assert_eq!(p.to_string(), "courier:deliver,transport:*");
        assert!(p.target().is_wildcard());
        assert!(perm("courier").action().is_wildcard());
    }

    #[test]
    fn rejects_malformed() {
        for raw in ["", "   ", "a:b:c:d", "a::c", "a:,:c", "a:*,read:c"] {
            assert!(
                matches!(
                    WildcardPermission::parse(raw),
                    Err(SecurityError::InvalidPermission(_))
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn implication() {
        let held = perm("courier:transport:*");
        assert!(held.implies(&perm("courier:transport:bowling_ball")));
        assert!(held.implies(&perm("COURIER:Transport:rug")));
        assert!(!held.implies(&perm("courier:deliver:rug")));
        assert!(held.implies(&perm("courier:transport")));
        assert!(!perm("courier:transport:rug").implies(&perm("courier:transport")));

        let specific = perm("leatherduffelbag:transport:theringer");
        assert!(!specific.implies(&perm("leatherduffelbag:transport")));
        assert!(specific.implies(&perm("leatherduffelbag:transport:theringer")));

        let multi = perm("money:write,bankcheck:*");
        assert!(multi.implies(&perm("money:bankcheck:19911109")));
        assert!(multi.implies(&perm("money:write,bankcheck")));
        assert!(!multi.implies(&perm("money:withdrawal")));

        assert!(perm("*").implies(&perm("anything:at:all")));
        assert!(perm("*:read").implies(&perm("docs:read:readme")));
    }
}
