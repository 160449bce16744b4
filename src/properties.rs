//! Property sets and `${...}` placeholder resolution.

use std::collections::btree_map::{self, BTreeMap};

use crate::error::{ParseError, ParseResult};
use crate::token::replace_tokens;

/// Variable that turns `${key:default}` support on or off (`"true"`/`"false"`).
pub const ENABLE_DEFAULT_VALUE: &str = "parser.default-value.enabled";

/// Variable that overrides the key/default separator (`":"` when unset).
pub const DEFAULT_VALUE_SEPARATOR: &str = "parser.default-value.separator";

/// An ordered set of string key/value pairs.
///
/// Used both for caller-supplied property overrides and for the variables a
/// configuration document resolves its placeholders against.
///
/// # Example
///
/// ```rust
/// use sqlsession::Properties;
///
/// let base = Properties::new().with("db.user", "sa").with("db.url", "jdbc:h2:mem:");
/// let overrides = Properties::new().with("db.url", "jdbc:h2:mem:test");
///
/// let merged = Properties::merged(&base, &overrides);
/// assert_eq!(merged.get("db.user"), Some("sa"));
/// assert_eq!(merged.get("db.url"), Some("jdbc:h2:mem:test"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property, returning the set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a property, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
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

    /// Iterate over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge another set into this one.
    ///
    /// Values from `other` override values in `self`.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Create a new set by overlaying `overlay` on `base`.
    pub fn merged(base: &Self, overlay: &Self) -> Self {
        let mut result = base.clone();
        result.merge(overlay);
        result
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        properties.extend(iter);
        properties
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl IntoIterator for Properties {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Resolves `${key}` and `${key:default}` placeholders against a property set.
#[derive(Debug, Clone)]
pub struct PlaceholderResolver<'a> {
    variables: &'a Properties,
    separator: Option<String>,
}

impl<'a> PlaceholderResolver<'a> {
    /// Create a resolver, reading the default-value switches from `variables`.
    pub fn new(variables: &'a Properties) -> Self {
        let enabled = variables
            .get(ENABLE_DEFAULT_VALUE)
            .map(|value| !value.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let separator = enabled.then(|| {
            variables
                .get(DEFAULT_VALUE_SEPARATOR)
                .filter(|sep| !sep.is_empty())
                .unwrap_or(":")
                .to_string()
        });
        Self {
            variables,
            separator,
        }
    }

    /// Whether `${key:default}` syntax is honoured.
    pub fn defaults_enabled(&self) -> bool {
        self.separator.is_some()
    }

    /// Substitute every placeholder in `text`.
    ///
    /// Fails with [`ParseError::UnresolvedPlaceholder`] when a key has neither
    /// a value nor a default.
    pub fn resolve(&self, text: &str) -> ParseResult<String> {
        replace_tokens(text, "${", "}", |expression| self.lookup(expression))
    }

    /// Resolve an optional value.
    pub fn resolve_opt(&self, text: Option<&str>) -> ParseResult<Option<String>> {
        text.map(|t| self.resolve(t)).transpose()
    }

    fn lookup(&self, expression: &str) -> ParseResult<String> {
        if let Some(value) = self.variables.get(expression) {
            return Ok(value.to_string());
        }
        if let Some(separator) = &self.separator {
            if let Some((key, default)) = expression.split_once(separator.as_str()) {
                return Ok(self
                    .variables
                    .get(key)
                    .map(str::to_string)
                    .unwrap_or_else(|| default.to_string()));
            }
        }
        Err(ParseError::UnresolvedPlaceholder(expression.to_string()))
    }
}
