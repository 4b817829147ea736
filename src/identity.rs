//! Identifier collections: "who" a subject is, per realm.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One identifier contributed by a realm.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub source: String,
    pub value: String,
}

/// Ordered, deduplicated identifiers of a principal.
///
/// The first identifier added is the primary one; it keys cache entries and
/// account store lookups unless a realm finds an identifier of its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierCollection {
    entries: Vec<Identifier>,
}

impl IdentifierCollection {
    #[must_use]
    pub fn new(source: impl Into<String>, value: impl Into<String>) -> Self {
        let mut collection = Self::default();
        collection.add(source, value);
        collection
    }

    /// Adds an identifier, returns `false` if it was already present.
    pub fn add(&mut self, source: impl Into<String>, value: impl Into<String>) -> bool {
        let identifier = Identifier {
            source: source.into(),
            value: value.into(),
        };
        if self.entries.contains(&identifier) {
            return false;
        }
        self.entries.push(identifier);
        true
    }

    pub fn add_collection(&mut self, other: &IdentifierCollection) {
        for identifier in &other.entries {
            self.add(identifier.source.clone(), identifier.value.clone());
        }
    }

    #[must_use]
    pub fn primary_identifier(&self) -> Option<&str> {
        self.entries.first().map(|i| i.value.as_str())
    }

    /// First identifier contributed by `source`.
    #[must_use]
    pub fn from_source(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|i| i.source == source)
            .map(|i| i.value.as_str())
    }

    /// Identifier a realm named `source` should use for lookups.
    #[must_use]
    pub fn for_realm(&self, source: &str) -> Option<&str> {
        self.from_source(source).or_else(|| self.primary_identifier())
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        self.entries.iter().filter_map(move |i| {
            if seen.contains(&i.source.as_str()) {
                None
            } else {
                seen.push(i.source.as_str());
                Some(i.source.as_str())
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.entries.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for IdentifierCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.primary_identifier().unwrap_or("<anonymous>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_and_keeps_order() {
        let mut identifiers = IdentifierCollection::new("accounts", "thedude");
        assert!(identifiers.add("ldap", "lebowski"));
        assert!(!identifiers.add("accounts", "thedude"));

        assert_eq!(identifiers.len(), 2);
        assert_eq!(identifiers.primary_identifier(), Some("thedude"));
        assert_eq!(identifiers.from_source("ldap"), Some("lebowski"));
        assert_eq!(identifiers.for_realm("unknown"), Some("thedude"));
        assert_eq!(
            identifiers.source_names().collect::<Vec<_>>(),
            vec!["accounts", "ldap"]
        );
    }

    #[test]
    fn round_trips_through_session_attribute_json() -> anyhow::Result<()> {
        let identifiers = IdentifierCollection::new("accounts", "walter");
        let value = serde_json::to_value(&identifiers)?;
        assert!(value.is_array());
        let back: IdentifierCollection = serde_json::from_value(value)?;
        assert_eq!(back, identifiers);
        assert_eq!(back.to_string(), "walter");
        Ok(())
    }
}
