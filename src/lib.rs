//! # sqlsession
//!
//! **sqlsession** bootstraps a SQL mapping runtime: it reads a TOML
//! configuration document from a resource handle and turns it into a
//! [`SessionFactory`] that opens sessions against the configured environment.
//!
//! ## Overview
//!
//! A build runs in four steps:
//! - **Parse**: the document is read and resolved into a [`Configuration`]
//!   (properties, settings, the active environment, mapped statements)
//! - **Assemble**: a [`FactoryAssembler`] turns the configuration into a factory
//! - **Diagnose**: failures become a [`BuildError`] carrying the breadcrumbs
//!   recorded in the thread-local [`ErrorContext`]
//! - **Clean up**: the error context is reset and the handle closed, whatever
//!   the outcome
//!
//! ## Document Layout
//!
//! ```text
//! [properties]            - variables for ${key} / ${key:default} placeholders
//! [settings]              - runtime behaviour (cache, executor, timeouts)
//! [environments]          - default id plus [[environments.environment]] entries
//! [[mappers]]             - namespaces with [[mappers.statements]]
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use sqlsession::prelude::*;
//!
//! let document = r#"
//! [properties]
//! url = "jdbc:h2:mem:blog"
//!
//! [environments]
//! default = "development"
//!
//! [[environments.environment]]
//! id = "development"
//! transaction_manager = { type = "JDBC" }
//! data_source = { type = "POOLED", properties = { driver = "org.h2.Driver", url = "${url}" } }
//!
//! [[mappers]]
//! namespace = "blog"
//!
//! [[mappers.statements]]
//! id = "remove"
//! kind = "delete"
//! sql = "DELETE FROM blog WHERE id = #{id}"
//! "#;
//!
//! let factory = SessionFactoryBuilder::new()
//!     .build_from_reader(TextReader::from_string(document))
//!     .unwrap();
//!
//! let mut session = factory.open_session().unwrap();
//! let bound = session.bind("remove").unwrap();
//! assert_eq!(bound.sql(), "DELETE FROM blog WHERE id = ?");
//! session.commit().unwrap();
//! ```
//!
//! ## Features
//!
//! - Character and byte stream handles, closed exactly once per build
//! - Environment selection with caller property overrides
//! - Pluggable transaction and data source factories via [`FactoryRegistry`]
//! - Error types carrying a rendered diagnostic context

mod builder;
mod configuration;
mod datasource;
mod error;
mod error_context;
mod mapping;
mod parser;
mod properties;
mod provider;
mod registry;
mod resource;
mod session;
mod settings;
mod token;
mod transaction;

pub mod prelude;

// Re-export core types
pub use builder::{wrap_error, BuildOptions, DefaultAssembler, FactoryAssembler, SessionFactoryBuilder};
pub use configuration::{Configuration, Environment};
pub use datasource::{
    DataSource, DataSourceFactory, DataSourceKind, JndiDataSourceFactory, PoolSettings,
    PooledDataSourceFactory, UnpooledDataSourceFactory,
};
pub use error::{
    AssemblyError, BuildError, BuildFailure, BuildResult, DataSourceError, MappingError,
    ParseError, ParseResult, RegistryError, RegistryResult, SessionError, SessionResult,
    TransactionError, TransactionResult, BUILD_ERROR_MESSAGE,
};
pub use error_context::{ErrorContext, ErrorContextSnapshot};
pub use mapping::{BoundSql, MappedStatement, ParameterMapping, StatementKind, StatementRegistry};
pub use parser::ConfigParser;
pub use properties::{PlaceholderResolver, Properties, DEFAULT_VALUE_SEPARATOR, ENABLE_DEFAULT_VALUE};
pub use provider::{Provider, ProviderExt};
pub use registry::{FactoryRegistry, Registry};
pub use resource::{ByteReader, ByteStream, CharStream, TextReader};
pub use session::{DefaultSessionFactory, Session, SessionFactory, SessionOptions};
pub use settings::{ExecutorType, Settings};
pub use transaction::{
    IsolationLevel, JdbcTransactionFactory, LocalTransaction, ManagedTransaction,
    ManagedTransactionFactory, Transaction, TransactionFactory, TransactionState,
};
