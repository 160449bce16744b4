//! The session factory builder.
//!
//! Every `build_from_*` entry point funnels into one of two canonical
//! operations, one per resource handle family. Each canonical operation:
//!
//! 1. parses the handle into a [`Configuration`],
//! 2. assembles a factory from it,
//! 3. wraps any failure in a [`BuildError`] carrying the diagnostic context,
//! 4. resets the [`ErrorContext`] and closes the handle, on every path.
//!
//! Close failures are swallowed; they never replace a result or an error.

use std::io;
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::datasource::DataSourceFactory;
use crate::error::{AssemblyError, BuildError, BuildFailure, BuildResult, BUILD_ERROR_MESSAGE};
use crate::error_context::ErrorContext;
use crate::parser::ConfigParser;
use crate::properties::Properties;
use crate::registry::FactoryRegistry;
use crate::resource::{ByteStream, CharStream};
use crate::session::DefaultSessionFactory;
use crate::transaction::TransactionFactory;

/// Optional inputs to a build: environment selector, caller properties, and a
/// resource label for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    /// Environment to activate instead of the document default
    pub environment: Option<String>,
    /// Properties overriding those declared in the document
    pub properties: Option<Properties>,
    /// Label reported as the resource in error context
    pub resource: Option<String>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// Turns a resolved configuration into a session factory.
pub trait FactoryAssembler {
    type Factory;

    fn assemble(&self, configuration: Configuration) -> Result<Self::Factory, AssemblyError>;
}

/// Assembles a [`DefaultSessionFactory`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAssembler;

impl FactoryAssembler for DefaultAssembler {
    type Factory = DefaultSessionFactory;

    fn assemble(&self, configuration: Configuration) -> Result<Self::Factory, AssemblyError> {
        Ok(DefaultSessionFactory::new(configuration))
    }
}

/// Wrap a parse or assembly failure as a [`BuildError`].
///
/// Records the cause in the [`ErrorContext`] and captures a snapshot, so the
/// error carries the breadcrumbs recorded while building.
pub fn wrap_error(message: &'static str, cause: impl Into<BuildFailure>) -> BuildError {
    let failure = cause.into();
    ErrorContext::cause(failure.to_string());
    BuildError::new(message, ErrorContext::snapshot(), failure)
}

/// Owns a resource handle for the length of a build.
///
/// On drop it resets the error context, then closes the handle, ignoring any
/// close failure.
struct ResourceGuard<S> {
    source: S,
    close: fn(&mut S) -> io::Result<()>,
}

impl<S> ResourceGuard<S> {
    fn new(source: S, close: fn(&mut S) -> io::Result<()>) -> Self {
        Self { source, close }
    }

    fn source(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S> Drop for ResourceGuard<S> {
    fn drop(&mut self) {
        ErrorContext::reset();
        if let Err(err) = (self.close)(&mut self.source) {
            tracing::trace!(error = %err, "ignoring failure to close configuration resource");
        }
    }
}

/// Builds session factories from configuration documents.
///
/// The builder holds no per-build state; one builder can serve any number of
/// builds, from any number of threads.
///
/// # Example
///
/// ```rust
/// use sqlsession::{SessionFactory, SessionFactoryBuilder, TextReader};
///
/// let document = r#"
/// [environments]
/// default = "development"
///
/// [[environments.environment]]
/// id = "development"
/// transaction_manager = { type = "JDBC" }
/// data_source = { type = "UNPOOLED", properties = { driver = "org.h2.Driver", url = "jdbc:h2:mem:" } }
/// "#;
///
/// let factory = SessionFactoryBuilder::new()
///     .build_from_reader(TextReader::from_string(document))
///     .unwrap();
/// let session = factory.open_session().unwrap();
/// assert!(!session.is_dirty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionFactoryBuilder<A = DefaultAssembler> {
    assembler: A,
    registry: FactoryRegistry,
}

impl SessionFactoryBuilder {
    /// A builder producing [`DefaultSessionFactory`] instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already resolved configuration.
    ///
    /// No handle is involved, so the error context is left untouched.
    pub fn build(&self, configuration: Configuration) -> DefaultSessionFactory {
        DefaultSessionFactory::new(configuration)
    }
}

impl<A: FactoryAssembler> SessionFactoryBuilder<A> {
    /// A builder using a custom assembler.
    pub fn with_assembler(assembler: A) -> Self {
        Self {
            assembler,
            registry: FactoryRegistry::new(),
        }
    }

    /// Make a transaction factory available to documents by name and aliases.
    pub fn register_transaction_factory(&mut self, factory: Arc<dyn TransactionFactory>) {
        self.registry.register_transaction_factory(factory);
    }

    /// Make a data source factory available to documents by name and aliases.
    pub fn register_data_source_factory(&mut self, factory: Arc<dyn DataSourceFactory>) {
        self.registry.register_data_source_factory(factory);
    }

    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    pub fn build_from_reader<S: CharStream>(&self, reader: S) -> BuildResult<A::Factory> {
        self.build_from_reader_with(reader, BuildOptions::new())
    }

    pub fn build_from_reader_in<S: CharStream>(
        &self,
        reader: S,
        environment: &str,
    ) -> BuildResult<A::Factory> {
        self.build_from_reader_with(reader, BuildOptions::new().with_environment(environment))
    }

    pub fn build_from_reader_with_properties<S: CharStream>(
        &self,
        reader: S,
        properties: Properties,
    ) -> BuildResult<A::Factory> {
        self.build_from_reader_with(reader, BuildOptions::new().with_properties(properties))
    }

    /// Build from a character stream. The handle is closed before returning.
    pub fn build_from_reader_with<S: CharStream>(
        &self,
        reader: S,
        options: BuildOptions,
    ) -> BuildResult<A::Factory> {
        let _span = tracing::debug_span!("build_session_factory", input = "reader").entered();
        let mut guard = ResourceGuard::new(reader, S::close);
        let parser = ConfigParser::from_reader(guard.source(), options);
        self.parse_and_assemble(parser)
    }

    pub fn build_from_stream<S: ByteStream>(&self, stream: S) -> BuildResult<A::Factory> {
        self.build_from_stream_with(stream, BuildOptions::new())
    }

    pub fn build_from_stream_in<S: ByteStream>(
        &self,
        stream: S,
        environment: &str,
    ) -> BuildResult<A::Factory> {
        self.build_from_stream_with(stream, BuildOptions::new().with_environment(environment))
    }

    pub fn build_from_stream_with_properties<S: ByteStream>(
        &self,
        stream: S,
        properties: Properties,
    ) -> BuildResult<A::Factory> {
        self.build_from_stream_with(stream, BuildOptions::new().with_properties(properties))
    }

    /// Build from a byte stream. The handle is closed before returning.
    pub fn build_from_stream_with<S: ByteStream>(
        &self,
        stream: S,
        options: BuildOptions,
    ) -> BuildResult<A::Factory> {
        let _span = tracing::debug_span!("build_session_factory", input = "stream").entered();
        let mut guard = ResourceGuard::new(stream, S::close);
        let parser = ConfigParser::from_stream(guard.source(), options);
        self.parse_and_assemble(parser)
    }

    fn parse_and_assemble(&self, parser: ConfigParser<'_>) -> BuildResult<A::Factory> {
        let configuration = parser
            .with_registry(self.registry.clone())
            .parse()
            .map_err(|err| wrap_error(BUILD_ERROR_MESSAGE, err))?;
        let resource = configuration.resource().map(str::to_string);
        let factory = self
            .assembler
            .assemble(configuration)
            .map_err(|err| wrap_error(BUILD_ERROR_MESSAGE, err))?;
        tracing::debug!(resource = ?resource, "session factory built");
        Ok(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::resource::{ByteReader, TextReader};
    use crate::session::SessionFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DOCUMENT: &str = r#"
[environments]
default = "development"

[[environments.environment]]
id = "development"
transaction_manager = { type = "JDBC" }
data_source = { type = "UNPOOLED", properties = { driver = "org.h2.Driver", url = "jdbc:h2:mem:dev" } }
"#;

    #[derive(Debug, Default)]
    struct CountingReader {
        text: Option<String>,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl CharStream for CountingReader {
        fn read_chars(&mut self, buf: &mut String) -> io::Result<usize> {
            let text = self.text.take().unwrap_or_default();
            buf.push_str(&text);
            Ok(text.len())
        }

        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
            }
            Ok(())
        }
    }

    fn counting(text: &str, fail_close: bool) -> (CountingReader, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader {
            text: Some(text.to_string()),
            closes: Arc::clone(&closes),
            fail_close,
        };
        (reader, closes)
    }

    #[test]
    fn test_build_from_reader() {
        let factory = SessionFactoryBuilder::new()
            .build_from_reader(TextReader::from_string(DOCUMENT))
            .unwrap();
        let environment = factory.configuration().environment().unwrap();
        assert_eq!(environment.id(), "development");
        assert!(ErrorContext::is_empty());
    }

    #[test]
    fn test_build_from_stream() {
        let factory = SessionFactoryBuilder::new()
            .build_from_stream(ByteReader::from_bytes(DOCUMENT.as_bytes().to_vec()))
            .unwrap();
        assert!(factory.configuration().environment().is_some());
    }

    #[test]
    fn test_handle_closed_once_on_success_and_failure() {
        let (reader, closes) = counting(DOCUMENT, false);
        SessionFactoryBuilder::new().build_from_reader(reader).unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let (reader, closes) = counting("not = [valid", false);
        assert!(SessionFactoryBuilder::new().build_from_reader(reader).is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_failure_is_swallowed() {
        let (reader, closes) = counting(DOCUMENT, true);
        assert!(SessionFactoryBuilder::new().build_from_reader(reader).is_ok());
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let (reader, _) = counting("[environments]\ndefault = 3\n", true);
        let err = SessionFactoryBuilder::new()
            .build_from_reader(reader)
            .unwrap_err();
        assert!(matches!(err.failure().as_parse(), Some(ParseError::Syntax(_))));
    }

    #[test]
    fn test_error_carries_context_and_context_is_reset() {
        let err = SessionFactoryBuilder::new()
            .build_from_reader_with(
                TextReader::from_string("[settings]\nbogus = 1\n"),
                BuildOptions::new().with_resource("conf/app.toml"),
            )
            .unwrap_err();

        assert_eq!(err.message(), BUILD_ERROR_MESSAGE);
        assert_eq!(err.context().resource(), Some("conf/app.toml"));
        assert_eq!(err.context().object(), Some("setting bogus"));
        assert!(err.context().cause().is_some());
        assert!(err.to_string().starts_with(BUILD_ERROR_MESSAGE));
        assert!(ErrorContext::is_empty());
    }

    #[test]
    fn test_build_leaves_context_alone() {
        ErrorContext::activity("outer work");
        let factory = SessionFactoryBuilder::new().build(Configuration::new());
        assert_eq!(ErrorContext::snapshot().activity(), Some("outer work"));
        ErrorContext::reset();
        assert!(factory.open_session().is_err());
    }

    #[derive(Debug)]
    struct RejectingAssembler;

    impl FactoryAssembler for RejectingAssembler {
        type Factory = ();

        fn assemble(&self, _configuration: Configuration) -> Result<(), AssemblyError> {
            Err(AssemblyError::Rejected("no thanks".to_string()))
        }
    }

    #[test]
    fn test_assembly_failure_is_wrapped() {
        let (reader, closes) = counting(DOCUMENT, false);
        let err = SessionFactoryBuilder::with_assembler(RejectingAssembler)
            .build_from_reader(reader)
            .unwrap_err();
        assert!(err.failure().as_assembly().is_some());
        assert_eq!(err.context().cause(), Some("configuration rejected: no thanks"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(ErrorContext::is_empty());
    }

    #[test]
    fn test_wrap_error_snapshots_context() {
        ErrorContext::resource("mapper.toml");
        let err = wrap_error(BUILD_ERROR_MESSAGE, AssemblyError::Rejected("boom".to_string()));
        ErrorContext::reset();
        assert_eq!(err.context().resource(), Some("mapper.toml"));
        assert_eq!(err.context().cause(), Some("configuration rejected: boom"));
    }
}
