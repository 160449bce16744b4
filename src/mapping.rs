//! Mapped statements and the registry a configuration keeps them in.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Deserialize;

use crate::error::MappingError;
use crate::token::replace_tokens;

/// The kind of SQL a statement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    /// Whether running the statement changes data.
    pub fn is_modifying(&self) -> bool {
        !matches!(self, Self::Select)
    }
}

/// One `#{...}` marker bound to a `?` position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMapping {
    property: String,
    attributes: BTreeMap<String, String>,
}

impl ParameterMapping {
    /// The property the parameter reads from.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// An inline attribute such as `jdbcType` from `#{id,jdbcType=INTEGER}`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn parse(expression: &str) -> Option<Self> {
        let mut parts = expression.split(',');
        let property = parts.next()?.trim();
        if property.is_empty() {
            return None;
        }
        let attributes = parts
            .filter_map(|part| part.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Some(Self {
            property: property.to_string(),
            attributes,
        })
    }
}

/// SQL with its parameter markers replaced by `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSql {
    sql: String,
    parameters: Vec<ParameterMapping>,
}

impl BoundSql {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters in `?` order.
    pub fn parameters(&self) -> &[ParameterMapping] {
        &self.parameters
    }
}

/// A statement registered under `namespace.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedStatement {
    id: String,
    namespace: String,
    kind: StatementKind,
    sql: String,
    bound: BoundSql,
    parameter_type: Option<String>,
    result_type: Option<String>,
    timeout: Option<Duration>,
    fetch_size: Option<u32>,
    use_cache: bool,
    flush_cache: bool,
}

impl MappedStatement {
    /// Create a statement, binding its `#{...}` markers.
    ///
    /// Selects use the cache and leave it alone; other kinds skip the cache
    /// and flush it.
    pub fn new(
        namespace: &str,
        id: &str,
        kind: StatementKind,
        sql: impl Into<String>,
    ) -> Result<Self, MappingError> {
        if namespace.trim().is_empty() {
            return Err(MappingError::EmptyNamespace);
        }
        if id.trim().is_empty() {
            return Err(MappingError::EmptyStatementId(namespace.to_string()));
        }
        let full_id = format!("{}.{}", namespace, id);
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(MappingError::EmptySql(full_id));
        }

        let mut parameters = Vec::new();
        let bound_sql = replace_tokens(&sql, "#{", "}", |expression| {
            let mapping = ParameterMapping::parse(expression)
                .ok_or_else(|| MappingError::EmptyParameter(full_id.clone()))?;
            parameters.push(mapping);
            Ok("?".to_string())
        })?;

        Ok(Self {
            id: full_id,
            namespace: namespace.to_string(),
            kind,
            sql,
            bound: BoundSql {
                sql: bound_sql,
                parameters,
            },
            parameter_type: None,
            result_type: None,
            timeout: None,
            fetch_size: None,
            use_cache: !kind.is_modifying(),
            flush_cache: kind.is_modifying(),
        })
    }

    pub fn with_parameter_type(mut self, parameter_type: impl Into<String>) -> Self {
        self.parameter_type = Some(parameter_type.into());
        self
    }

    pub fn with_result_type(mut self, result_type: impl Into<String>) -> Self {
        self.result_type = Some(result_type.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_flush_cache(mut self, flush_cache: bool) -> Self {
        self.flush_cache = flush_cache;
        self
    }

    /// Fully qualified id, `namespace.id`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The id without its namespace.
    pub fn short_id(&self) -> &str {
        &self.id[self.namespace.len() + 1..]
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// The SQL as written in the document.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bound_sql(&self) -> &BoundSql {
        &self.bound
    }

    /// Whether the SQL still contains `${...}` text substitutions.
    pub fn is_dynamic(&self) -> bool {
        self.sql.contains("${")
    }

    pub fn parameter_type(&self) -> Option<&str> {
        self.parameter_type.as_deref()
    }

    pub fn result_type(&self) -> Option<&str> {
        self.result_type.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn fetch_size(&self) -> Option<u32> {
        self.fetch_size
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn flush_cache(&self) -> bool {
        self.flush_cache
    }
}

/// Statements by fully qualified id, with unique short ids as shortcuts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementRegistry {
    statements: BTreeMap<String, MappedStatement>,
    short_ids: HashMap<String, Vec<String>>,
}

impl StatementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement; its full id must be new.
    pub fn add(&mut self, statement: MappedStatement) -> Result<(), MappingError> {
        let id = statement.id().to_string();
        if self.statements.contains_key(&id) {
            return Err(MappingError::DuplicateStatement(id));
        }
        self.short_ids
            .entry(statement.short_id().to_string())
            .or_default()
            .push(id.clone());
        self.statements.insert(id, statement);
        Ok(())
    }

    /// Look up by full id, or by short id when exactly one namespace has it.
    pub fn get(&self, id: &str) -> Result<&MappedStatement, MappingError> {
        if let Some(statement) = self.statements.get(id) {
            return Ok(statement);
        }
        match self.short_ids.get(id).map(Vec::as_slice) {
            Some([full_id]) => self
                .statements
                .get(full_id)
                .ok_or_else(|| MappingError::UnknownStatement(id.to_string())),
            Some(candidates) if candidates.len() > 1 => Err(MappingError::AmbiguousStatement {
                id: id.to_string(),
                candidates: candidates.to_vec(),
            }),
            _ => Err(MappingError::UnknownStatement(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Iterate in full-id order.
    pub fn iter(&self) -> impl Iterator<Item = &MappedStatement> {
        self.statements.values()
    }
}
