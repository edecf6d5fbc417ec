//! Namespaced key/value profiles attached to sites, transformations, and jobs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Profile namespaces understood by the Pegasus planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Pegasus,
    Condor,
    Dagman,
    Env,
    Globus,
    Selector,
    Stat,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Namespace::Pegasus => "pegasus",
            Namespace::Condor => "condor",
            Namespace::Dagman => "dagman",
            Namespace::Env => "env",
            Namespace::Globus => "globus",
            Namespace::Selector => "selector",
            Namespace::Stat => "stat",
        };
        f.write_str(s)
    }
}

/// Profiles grouped by namespace.
///
/// Serializes as `{condor: {universe: vanilla}, pegasus: {...}}`. Adding the
/// same key twice within a namespace keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profiles(BTreeMap<Namespace, BTreeMap<String, String>>);

impl Profiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key = value` in `namespace`.
    pub fn add(&mut self, namespace: Namespace, key: impl Into<String>, value: impl Into<String>) {
        self.0
            .entry(namespace)
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<&str> {
        self.0
            .get(&namespace)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Iterate `(namespace, key, value)` triples in namespace order.
    pub fn iter(&self) -> impl Iterator<Item = (Namespace, &str, &str)> {
        self.0.iter().flat_map(|(ns, entries)| {
            entries
                .iter()
                .map(move |(k, v)| (*ns, k.as_str(), v.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut profiles = Profiles::new();
        assert!(profiles.is_empty());

        profiles.add(Namespace::Condor, "universe", "vanilla");
        profiles.add(Namespace::Pegasus, "style", "condor");

        assert!(!profiles.is_empty());
        assert_eq!(profiles.get(Namespace::Condor, "universe"), Some("vanilla"));
        assert_eq!(profiles.get(Namespace::Pegasus, "style"), Some("condor"));
        assert_eq!(profiles.get(Namespace::Env, "PATH"), None);
    }

    #[test]
    fn test_later_value_wins() {
        let mut profiles = Profiles::new();
        profiles.add(Namespace::Pegasus, "data.configuration", "sharedfs");
        profiles.add(Namespace::Pegasus, "data.configuration", "condorio");
        assert_eq!(
            profiles.get(Namespace::Pegasus, "data.configuration"),
            Some("condorio")
        );
        assert_eq!(profiles.iter().count(), 1);
    }

    #[test]
    fn test_iter_in_namespace_order() {
        let mut profiles = Profiles::new();
        profiles.add(Namespace::Condor, "universe", "vanilla");
        profiles.add(Namespace::Pegasus, "style", "condor");
        let rendered: Vec<String> = profiles
            .iter()
            .map(|(ns, k, v)| format!("{ns}.{k}={v}"))
            .collect();
        assert_eq!(rendered, vec!["pegasus.style=condor", "condor.universe=vanilla"]);
    }

    #[test]
    fn test_yaml_shape() {
        let mut profiles = Profiles::new();
        profiles.add(Namespace::Condor, "universe", "vanilla");
        profiles.add(Namespace::Pegasus, "style", "condor");

        let yaml = serde_yaml::to_string(&profiles).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["condor"]["universe"], "vanilla");
        assert_eq!(value["pegasus"]["style"], "condor");
    }
}
