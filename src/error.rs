//! Error types for session factory construction and session use.

use std::io;

use thiserror::Error;

use crate::error_context::ErrorContextSnapshot;

/// Fixed message carried by every [`BuildError`].
pub const BUILD_ERROR_MESSAGE: &str = "Error building session factory.";

/// The uniform error surfaced by every build entry point.
///
/// Carries a fixed message, the diagnostic breadcrumbs captured at the moment
/// of failure, and the original cause as its [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{message}{context}")]
pub struct BuildError {
    message: &'static str,
    context: ErrorContextSnapshot,
    #[source]
    failure: BuildFailure,
}

impl BuildError {
    pub(crate) fn new(
        message: &'static str,
        context: ErrorContextSnapshot,
        failure: BuildFailure,
    ) -> Self {
        Self {
            message,
            context,
            failure,
        }
    }

    /// The fixed human-readable message.
    pub fn message(&self) -> &str {
        self.message
    }

    /// Breadcrumbs recorded while the failing build ran.
    pub fn context(&self) -> &ErrorContextSnapshot {
        &self.context
    }

    /// The stage-specific failure that caused this error.
    pub fn failure(&self) -> &BuildFailure {
        &self.failure
    }

    /// Consume the error, returning the underlying failure.
    pub fn into_failure(self) -> BuildFailure {
        self.failure
    }
}

/// Which build stage failed.
#[derive(Error, Debug)]
pub enum BuildFailure {
    /// Reading, parsing or validating the configuration document failed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Turning a resolved configuration into a factory failed
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

impl BuildFailure {
    /// Returns the parse error, if parsing was the failing stage.
    pub fn as_parse(&self) -> Option<&ParseError> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Assembly(_) => None,
        }
    }

    /// Returns the assembly error, if assembly was the failing stage.
    pub fn as_assembly(&self) -> Option<&AssemblyError> {
        match self {
            Self::Assembly(err) => Some(err),
            Self::Parse(_) => None,
        }
    }
}

/// Errors raised while reading and resolving a configuration document.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The resource handle could not be read
    #[error("failed to read configuration resource: {0}")]
    Io(#[from] io::Error),

    /// A byte stream did not hold UTF-8 text
    #[error("configuration resource is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// The document is not well-formed or has unexpected structure
    #[error("malformed configuration document: {0}")]
    Syntax(#[from] toml::de::Error),

    /// A `${...}` placeholder had no value and no default
    #[error("unresolved placeholder `${{{0}}}`")]
    UnresolvedPlaceholder(String),

    /// A property value was a table or array
    #[error("property `{0}` must be a string, number or boolean")]
    NonScalarProperty(String),

    /// The selected environment is not declared
    #[error("environment `{0}` is not declared")]
    UnknownEnvironment(String),

    /// No environment selector was passed and no default is declared
    #[error("no environment selected and `environments.default` is not set")]
    NoDefaultEnvironment,

    /// Two environments share an id
    #[error("environment `{0}` is declared more than once")]
    DuplicateEnvironment(String),

    /// A `[settings]` key is not recognised
    #[error("the setting `{0}` is not known, make sure it is spelled correctly")]
    UnknownSetting(String),

    /// A setting has a value of the wrong shape
    #[error("invalid value for setting `{name}`: {reason}")]
    InvalidSetting { name: String, reason: String },

    /// A transaction manager or data source type is not registered
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A data source factory rejected its properties
    #[error("invalid data source: {0}")]
    DataSource(#[from] DataSourceError),

    /// A transaction factory rejected its properties
    #[error("invalid transaction manager: {0}")]
    TransactionManager(String),

    /// A mapper or statement is invalid
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Errors raised while assembling a factory from a resolved configuration.
#[derive(Error, Debug, Clone)]
pub enum AssemblyError {
    /// The assembler refused the configuration
    #[error("configuration rejected: {0}")]
    Rejected(String),
}

/// Errors raised by mapper and statement registration or lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A mapper block has no namespace
    #[error("mapper namespace cannot be empty")]
    EmptyNamespace,

    /// A statement has no id
    #[error("statement in namespace `{0}` has an empty id")]
    EmptyStatementId(String),

    /// A statement has no SQL text
    #[error("statement `{0}` has no SQL")]
    EmptySql(String),

    /// A `#{}` marker names no property
    #[error("statement `{0}` contains an empty parameter marker")]
    EmptyParameter(String),

    /// Two statements share a fully qualified id
    #[error("mapped statements already contain `{0}`")]
    DuplicateStatement(String),

    /// No statement matches the id
    #[error("mapped statement `{0}` is not registered")]
    UnknownStatement(String),

    /// A short id matches statements in several namespaces
    #[error("`{id}` is ambiguous, candidates: {}", .candidates.join(", "))]
    AmbiguousStatement { id: String, candidates: Vec<String> },
}

/// Errors raised by data source factories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// A required property is missing
    #[error("{kind} data source requires property `{name}`")]
    MissingProperty { kind: &'static str, name: &'static str },

    /// A property is not recognised by the factory
    #[error("unknown data source property `{0}`")]
    UnknownProperty(String),

    /// A property value cannot be interpreted
    #[error("invalid value `{value}` for data source property `{name}`")]
    InvalidValue { name: String, value: String },
}

/// Errors raised by transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction was already closed
    #[error("transaction is closed")]
    Closed,

    /// The transaction could not be created or completed
    #[error("transaction failed: {0}")]
    Failed(String),
}

/// Errors raised while opening or using a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The configuration has no active environment
    #[error("cannot open a session: the configuration has no environment")]
    NoEnvironment,

    /// The session was already closed
    #[error("session is closed")]
    Closed,

    /// Statement lookup failed
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The underlying transaction failed
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Errors that can occur in registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Provider already registered with this name
    #[error("Provider already registered: {0}")]
    AlreadyRegistered(String),

    /// No provider answers to this alias
    #[error("no {kind} registered for `{alias}`")]
    NotFound { kind: &'static str, alias: String },

    /// Invalid provider name
    #[error("Invalid provider name: {0}")]
    InvalidName(String),
}

/// Result type alias for build entry points.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
