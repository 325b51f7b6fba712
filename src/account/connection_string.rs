//! Connection string parsing
//!
//! `Key=Value` pairs separated by `;`. Keys are case-insensitive, values keep
//! their case and may themselves contain `=` (account keys are base64).

use std::collections::BTreeMap;

use crate::error::{Result, TableError};

/// A parsed connection string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    /// lowercased key -> value
    settings: BTreeMap<String, String>,
}

impl ConnectionString {
    /// Parse a connection string
    ///
    /// Empty segments (`a=1;;b=2;`) are ignored. A segment without `=`, an
    /// empty key, or a repeated key is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let mut settings = BTreeMap::new();

        for segment in input.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                TableError::InvalidConnectionString(format!("segment {:?} has no '='", segment))
            })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(TableError::InvalidConnectionString(format!(
                    "segment {:?} has an empty key",
                    segment
                )));
            }

            let normalized = key.to_ascii_lowercase();
            if settings.contains_key(&normalized) {
                return Err(TableError::InvalidConnectionString(format!(
                    "duplicate setting {:?}",
                    key
                )));
            }
            settings.insert(normalized, value.trim().to_string());
        }

        if settings.is_empty() {
            return Err(TableError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }

        Ok(Self { settings })
    }

    /// Look up a setting (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Look up a boolean setting (`true`/`false`, any case)
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(v) => Err(TableError::InvalidConnectionString(format!(
                "{} must be true or false, got {:?}",
                key, v
            ))),
        }
    }

    /// Number of settings
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}
