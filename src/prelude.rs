//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits
//! from sqlsession for convenient glob imports.
//!
//! # Example
//!
//! ```rust
//! use sqlsession::prelude::*;
//! ```

// Building
pub use crate::builder::{BuildOptions, DefaultAssembler, FactoryAssembler, SessionFactoryBuilder};
pub use crate::configuration::{Configuration, Environment};

// Resource handles
pub use crate::resource::{ByteReader, ByteStream, CharStream, TextReader};

// Sessions
pub use crate::session::{DefaultSessionFactory, Session, SessionFactory, SessionOptions};

// Extension points
pub use crate::datasource::DataSourceFactory;
pub use crate::provider::{Provider, ProviderExt};
pub use crate::transaction::{Transaction, TransactionFactory};

// Diagnostics
pub use crate::error_context::ErrorContext;

// Errors
pub use crate::error::{
    BuildError, BuildFailure, BuildResult, ParseError, SessionError, SessionResult,
};
pub use crate::properties::Properties;
