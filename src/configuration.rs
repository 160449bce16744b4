//! The resolved runtime configuration a session factory is built from.

use std::sync::Arc;

use crate::datasource::DataSource;
use crate::error::{MappingError, TransactionResult};
use crate::mapping::{MappedStatement, StatementRegistry};
use crate::properties::Properties;
use crate::settings::Settings;
use crate::transaction::{IsolationLevel, Transaction, TransactionFactory};

/// The active environment: a data source plus a transaction strategy.
#[derive(Debug, Clone)]
pub struct Environment {
    id: String,
    transaction_factory: Arc<dyn TransactionFactory>,
    transaction_properties: Properties,
    data_source: DataSource,
}

impl Environment {
    pub fn new(
        id: impl Into<String>,
        transaction_factory: Arc<dyn TransactionFactory>,
        data_source: DataSource,
    ) -> Self {
        Self {
            id: id.into(),
            transaction_factory,
            transaction_properties: Properties::new(),
            data_source,
        }
    }

    /// Properties handed to the transaction factory.
    pub fn with_transaction_properties(mut self, properties: Properties) -> Self {
        self.transaction_properties = properties;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transaction_factory(&self) -> &Arc<dyn TransactionFactory> {
        &self.transaction_factory
    }

    pub fn transaction_properties(&self) -> &Properties {
        &self.transaction_properties
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    /// Start a transaction against this environment's data source.
    pub fn new_transaction(
        &self,
        isolation: Option<IsolationLevel>,
        autocommit: bool,
    ) -> TransactionResult<Box<dyn Transaction>> {
        self.transaction_factory.new_transaction(
            &self.data_source,
            &self.transaction_properties,
            isolation,
            autocommit,
        )
    }
}

/// A fully resolved configuration.
///
/// Produced by [`ConfigParser::parse`](crate::ConfigParser::parse), or built by
/// hand for [`SessionFactoryBuilder::build`](crate::SessionFactoryBuilder::build).
///
/// # Example
///
/// ```rust
/// use sqlsession::{
///     Configuration, DataSource, Environment, JdbcTransactionFactory, MappedStatement,
///     StatementKind,
/// };
/// use std::sync::Arc;
///
/// let environment = Environment::new(
///     "test",
///     Arc::new(JdbcTransactionFactory),
///     DataSource::unpooled("org.h2.Driver", "jdbc:h2:mem:test"),
/// );
/// let mut configuration = Configuration::new().with_environment(environment);
/// configuration
///     .add_statement(
///         MappedStatement::new("blog", "count", StatementKind::Select, "SELECT COUNT(*) FROM blog")
///             .unwrap(),
///     )
///     .unwrap();
///
/// assert_eq!(configuration.environment().unwrap().id(), "test");
/// assert!(configuration.mapped_statement("count").is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    resource: Option<String>,
    variables: Properties,
    settings: Settings,
    environment: Option<Environment>,
    statements: StatementRegistry,
}

impl Configuration {
    /// An empty configuration with default settings and no environment.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_variables(mut self, variables: Properties) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Register a mapped statement.
    pub fn add_statement(&mut self, statement: MappedStatement) -> Result<(), MappingError> {
        self.statements.add(statement)
    }

    /// Where the configuration was read from, when known.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Variables placeholders were resolved against.
    pub fn variables(&self) -> &Properties {
        &self.variables
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    pub fn mapped_statement(&self, id: &str) -> Result<&MappedStatement, MappingError> {
        self.statements.get(id)
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}
