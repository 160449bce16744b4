//! Configuration document parser.
//!
//! Reads a TOML document from a resource handle and resolves it into a
//! [`Configuration`]: properties are merged with caller overrides, `${...}`
//! placeholders are substituted, the selected environment is materialised
//! through the [`FactoryRegistry`], and mapped statements are registered.
//!
//! The parser records breadcrumbs in the [`ErrorContext`] as it goes; the
//! build pipeline resets them once the build is over.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::builder::BuildOptions;
use crate::configuration::{Configuration, Environment};
use crate::error::{ParseError, ParseResult};
use crate::error_context::ErrorContext;
use crate::mapping::{MappedStatement, StatementKind};
use crate::properties::{PlaceholderResolver, Properties};
use crate::provider::Provider;
use crate::registry::FactoryRegistry;
use crate::resource::{ByteStream, CharStream};
use crate::settings::Settings;

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    #[serde(default)]
    properties: toml::Table,
    #[serde(default)]
    settings: toml::Table,
    environments: Option<EnvironmentsDocument>,
    #[serde(default)]
    mappers: Vec<MapperDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentsDocument {
    default: Option<String>,
    #[serde(default)]
    environment: Vec<EnvironmentDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentDocument {
    id: String,
    transaction_manager: FactoryDocument,
    data_source: FactoryDocument,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FactoryDocument {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MapperDocument {
    namespace: String,
    #[serde(default)]
    statements: Vec<StatementDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatementDocument {
    id: String,
    kind: StatementKind,
    sql: String,
    parameter_type: Option<String>,
    result_type: Option<String>,
    /// Seconds
    timeout: Option<u64>,
    fetch_size: Option<u32>,
    use_cache: Option<bool>,
    flush_cache: Option<bool>,
}

enum Source<'a> {
    Chars(&'a mut dyn CharStream),
    Bytes(&'a mut dyn ByteStream),
}

/// Parses one configuration document from one resource handle.
///
/// A parser is single-use: [`parse`](Self::parse) consumes it.
///
/// # Example
///
/// ```rust
/// use sqlsession::{BuildOptions, ConfigParser, ErrorContext, TextReader};
///
/// let mut reader = TextReader::from_string(
///     r#"
///     [settings]
///     cache_enabled = false
///     "#,
/// );
/// let configuration = ConfigParser::from_reader(&mut reader, BuildOptions::new())
///     .parse()
///     .unwrap();
/// ErrorContext::reset();
///
/// assert!(!configuration.settings().cache_enabled);
/// assert!(configuration.environment().is_none());
/// ```
pub struct ConfigParser<'a> {
    source: Source<'a>,
    resource: String,
    environment: Option<String>,
    properties: Properties,
    registry: FactoryRegistry,
}

impl<'a> ConfigParser<'a> {
    /// A parser reading a character stream.
    pub fn from_reader<S: CharStream>(source: &'a mut S, options: BuildOptions) -> Self {
        Self::new(Source::Chars(source), "character stream", options)
    }

    /// A parser reading a byte stream as UTF-8.
    pub fn from_stream<S: ByteStream>(source: &'a mut S, options: BuildOptions) -> Self {
        Self::new(Source::Bytes(source), "byte stream", options)
    }

    fn new(source: Source<'a>, fallback_resource: &str, options: BuildOptions) -> Self {
        Self {
            source,
            resource: options
                .resource
                .unwrap_or_else(|| fallback_resource.to_string()),
            environment: options.environment,
            properties: options.properties.unwrap_or_default(),
            registry: FactoryRegistry::default(),
        }
    }

    /// Resolve type aliases against `registry` instead of the built-ins.
    pub fn with_registry(mut self, registry: FactoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Read the handle to the end and resolve the document.
    pub fn parse(self) -> ParseResult<Configuration> {
        let ConfigParser {
            source,
            resource,
            environment,
            properties,
            registry,
        } = self;

        ErrorContext::resource(resource.as_str());
        tracing::debug!(%resource, environment = ?environment, "parsing configuration");

        ErrorContext::activity("reading the configuration resource");
        let text = read_document(source)?;

        ErrorContext::activity("parsing the configuration document");
        let document: ConfigDocument = toml::from_str(&text)?;

        ErrorContext::activity("collecting properties");
        let mut variables = scalar_properties(&document.properties, None)?;
        variables.merge(&properties);
        let resolver = PlaceholderResolver::new(&variables);

        ErrorContext::activity("applying settings");
        let settings = parse_settings(&document.settings, &resolver)?;

        ErrorContext::activity("selecting the environment");
        let active = select_environment(document.environments, environment, &resolver, &registry)?;

        let mut configuration = Configuration::new()
            .with_resource(resource)
            .with_settings(settings);
        if let Some(active) = active {
            configuration = configuration.with_environment(active);
        }

        ErrorContext::activity("registering mapped statements");
        for mapper in document.mappers {
            register_mapper(&mut configuration, mapper, &resolver)?;
        }

        tracing::debug!(
            environment = ?configuration.environment().map(Environment::id),
            statements = configuration.statement_count(),
            "configuration parsed"
        );
        Ok(configuration.with_variables(variables))
    }
}

fn read_document(source: Source<'_>) -> ParseResult<String> {
    match source {
        Source::Chars(reader) => {
            let mut text = String::new();
            reader.read_chars(&mut text)?;
            match text.strip_prefix('\u{feff}') {
                Some(stripped) => Ok(stripped.to_string()),
                None => Ok(text),
            }
        }
        Source::Bytes(stream) => {
            let mut bytes = Vec::new();
            stream.read_bytes(&mut bytes)?;
            if bytes.starts_with(UTF8_BOM) {
                bytes.drain(..UTF8_BOM.len());
            }
            Ok(String::from_utf8(bytes)?)
        }
    }
}

/// Stringify a table of scalars, resolving string values when a resolver is given.
fn scalar_properties(
    table: &toml::Table,
    resolver: Option<&PlaceholderResolver<'_>>,
) -> ParseResult<Properties> {
    let mut properties = Properties::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => match resolver {
                Some(resolver) => resolver.resolve(s)?,
                None => s.clone(),
            },
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(dt) => dt.to_string(),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                return Err(ParseError::NonScalarProperty(key.clone()))
            }
        };
        properties.set(key.as_str(), value);
    }
    Ok(properties)
}

fn parse_settings(table: &toml::Table, resolver: &PlaceholderResolver<'_>) -> ParseResult<Settings> {
    let mut settings = Settings::default();
    for (name, value) in table {
        ErrorContext::object(format!("setting {}", name));
        let value = match value {
            toml::Value::String(s) => toml::Value::String(resolver.resolve(s)?),
            other => other.clone(),
        };
        settings.apply(name, &value)?;
    }
    settings
        .validate()
        .map_err(|reason| ParseError::InvalidSetting {
            name: "settings".to_string(),
            reason,
        })?;
    Ok(settings)
}

fn select_environment(
    document: Option<EnvironmentsDocument>,
    selector: Option<String>,
    resolver: &PlaceholderResolver<'_>,
    registry: &FactoryRegistry,
) -> ParseResult<Option<Environment>> {
    let Some(document) = document else {
        return match selector {
            Some(id) => Err(ParseError::UnknownEnvironment(id)),
            None => Ok(None),
        };
    };

    let mut declared = HashSet::new();
    let mut entries = Vec::with_capacity(document.environment.len());
    for entry in document.environment {
        let id = resolver.resolve(&entry.id)?;
        if !declared.insert(id.clone()) {
            return Err(ParseError::DuplicateEnvironment(id));
        }
        entries.push((id, entry));
    }

    let wanted = match selector {
        Some(id) => id,
        None => resolver
            .resolve_opt(document.default.as_deref())?
            .ok_or(ParseError::NoDefaultEnvironment)?,
    };
    let Some((id, entry)) = entries.into_iter().find(|(id, _)| *id == wanted) else {
        return Err(ParseError::UnknownEnvironment(wanted));
    };
    ErrorContext::object(format!("environment {}", id));

    let transaction_factory = registry
        .transaction_factories()
        .resolve(&resolver.resolve(&entry.transaction_manager.kind)?)?;
    let transaction_properties =
        scalar_properties(&entry.transaction_manager.properties, Some(resolver))?;
    transaction_factory
        .validate(&transaction_properties)
        .map_err(ParseError::TransactionManager)?;

    let data_source_factory = registry
        .data_source_factories()
        .resolve(&resolver.resolve(&entry.data_source.kind)?)?;
    let data_source =
        data_source_factory.create(&scalar_properties(&entry.data_source.properties, Some(resolver))?)?;

    tracing::debug!(
        environment = %id,
        transaction_manager = transaction_factory.name(),
        data_source = %data_source.describe(),
        "environment selected"
    );
    Ok(Some(
        Environment::new(id, transaction_factory, data_source)
            .with_transaction_properties(transaction_properties),
    ))
}

fn register_mapper(
    configuration: &mut Configuration,
    mapper: MapperDocument,
    resolver: &PlaceholderResolver<'_>,
) -> ParseResult<()> {
    let namespace = resolver.resolve(&mapper.namespace)?;
    ErrorContext::object(format!("mapper {}", namespace));
    let settings = configuration.settings().clone();

    for statement in mapper.statements {
        let id = resolver.resolve(&statement.id)?;
        ErrorContext::object(format!("{}.{}", namespace, id));
        ErrorContext::sql(statement.sql.as_str());

        let mut mapped = MappedStatement::new(&namespace, &id, statement.kind, statement.sql)?;
        if let Some(parameter_type) = resolver.resolve_opt(statement.parameter_type.as_deref())? {
            mapped = mapped.with_parameter_type(parameter_type);
        }
        if let Some(result_type) = resolver.resolve_opt(statement.result_type.as_deref())? {
            mapped = mapped.with_result_type(result_type);
        }
        if let Some(timeout) = statement
            .timeout
            .map(Duration::from_secs)
            .or(settings.default_statement_timeout)
        {
            mapped = mapped.with_timeout(timeout);
        }
        if let Some(fetch_size) = statement.fetch_size.or(settings.default_fetch_size) {
            mapped = mapped.with_fetch_size(fetch_size);
        }
        if let Some(use_cache) = statement.use_cache {
            mapped = mapped.with_use_cache(use_cache);
        }
        if let Some(flush_cache) = statement.flush_cache {
            mapped = mapped.with_flush_cache(flush_cache);
        }
        configuration.add_statement(mapped)?;
    }
    Ok(())
}
