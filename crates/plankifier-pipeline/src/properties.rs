//! Pegasus properties (`pegasus.properties`).
//!
//! Written as Java-style `key = value` lines, sorted by key.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, Result};

/// Default file name the planner reads properties from.
pub const PROPERTIES_FILE: &str = "pegasus.properties";

const HEADER: &str = "# Pegasus properties for the plankifier workflow";

/// Ordered set of Pegasus properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        validate_key(&key)?;
        if value.contains(['\n', '\r']) {
            return Err(PipelineError::InvalidProperty {
                key,
                reason: "value contains a line break".to_string(),
            });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the properties file contents.
    pub fn to_properties_string(&self) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write the properties file to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_properties_string()).map_err(|e| PipelineError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), count = self.len(), "wrote properties");
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key is empty"
    } else if key.contains(['=', ':']) {
        "key contains a separator character"
    } else if key.chars().any(char::is_whitespace) {
        "key contains whitespace"
    } else {
        return Ok(());
    };
    Err(PipelineError::InvalidProperty {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}
