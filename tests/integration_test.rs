//! Integration tests for sqlsession
//!
//! These tests drive the builder end to end, the way an application
//! bootstrapping its data layer would.

use sqlsession::prelude::*;
use sqlsession::{
    AssemblyError, DataSource, DataSourceKind, ErrorContextSnapshot, IsolationLevel, LocalTransaction,
    MappingError, RegistryError, Settings, BUILD_ERROR_MESSAGE,
};
use std::any::Any;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DOCUMENT: &str = r#"
[properties]
"db.driver" = "org.h2.Driver"
"db.url" = "jdbc:h2:mem:blog"

[settings]
default_executor_type = "REUSE"
default_fetch_size = 100

[environments]
default = "development"

[[environments.environment]]
id = "development"
transaction_manager = { type = "JDBC" }
[environments.environment.data_source]
type = "POOLED"
properties = { driver = "${db.driver}", url = "${db.url}", username = "${db.user:sa}" }

[[environments.environment]]
id = "test"
transaction_manager = { type = "MANAGED", properties = { close_connection = false } }
data_source = { type = "UNPOOLED", properties = { driver = "${db.driver}", url = "jdbc:h2:mem:test" } }

[[mappers]]
namespace = "blog.BlogMapper"

[[mappers.statements]]
id = "selectBlog"
kind = "select"
sql = "SELECT * FROM blog WHERE id = #{id}"
result_type = "Blog"

[[mappers.statements]]
id = "updateTitle"
kind = "update"
sql = "UPDATE blog SET title = #{title} WHERE id = #{id}"
"#;

// =============================================================================
// Test Handles
// =============================================================================

/// A character handle that counts how often it is closed.
#[derive(Debug)]
struct CountingReader {
    text: Option<String>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl CountingReader {
    fn new(text: &str) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let reader = Self {
            text: Some(text.to_string()),
            closes: Arc::clone(&closes),
            fail_close: false,
        };
        (reader, closes)
    }

    fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
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
            return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
        }
        Ok(())
    }
}

/// A byte handle whose reads always fail.
#[derive(Debug, Default)]
struct BrokenStream {
    closes: usize,
}

impl ByteStream for BrokenStream {
    fn read_bytes(&mut self, _buf: &mut Vec<u8>) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream reset"))
    }

    fn close(&mut self) -> io::Result<()> {
        self.closes += 1;
        Ok(())
    }
}

fn summary(factory: &DefaultSessionFactory) -> (Option<String>, usize, Settings) {
    let configuration = factory.configuration();
    (
        configuration.environment().map(|e| e.id().to_string()),
        configuration.statement_count(),
        configuration.settings().clone(),
    )
}

// =============================================================================
// Entry Point Tests
// =============================================================================

#[test]
fn test_convenience_forms_match_canonical_builds() {
    let builder = SessionFactoryBuilder::new();

    let canonical = builder
        .build_from_reader_with(TextReader::from_string(DOCUMENT), BuildOptions::new())
        .unwrap();
    let reader = builder
        .build_from_reader(TextReader::from_string(DOCUMENT))
        .unwrap();
    let stream = builder
        .build_from_stream(ByteReader::from_bytes(DOCUMENT.as_bytes().to_vec()))
        .unwrap();

    assert_eq!(summary(&reader), summary(&canonical));
    assert_eq!(summary(&stream), summary(&canonical));

    let reader_in = builder
        .build_from_reader_in(TextReader::from_string(DOCUMENT), "test")
        .unwrap();
    let stream_in = builder
        .build_from_stream_with(
            ByteReader::from_bytes(DOCUMENT.as_bytes().to_vec()),
            BuildOptions::new().with_environment("test"),
        )
        .unwrap();
    assert_eq!(summary(&reader_in).0.as_deref(), Some("test"));
    assert_eq!(summary(&reader_in), summary(&stream_in));
}

#[test]
fn test_properties_form_overrides_document() {
    let overrides = Properties::new()
        .with("db.url", "jdbc:h2:mem:override")
        .with("db.user", "admin");
    let factory = SessionFactoryBuilder::new()
        .build_from_stream_with_properties(
            ByteReader::from_bytes(DOCUMENT.as_bytes().to_vec()),
            overrides.clone(),
        )
        .unwrap();
    let same = SessionFactoryBuilder::new()
        .build_from_reader_with_properties(TextReader::from_string(DOCUMENT), overrides)
        .unwrap();

    let data_source = factory.configuration().environment().unwrap().data_source();
    assert_eq!(data_source.url.as_deref(), Some("jdbc:h2:mem:override"));
    assert_eq!(data_source.username.as_deref(), Some("admin"));
    assert!(data_source.is_pooled());
    assert_eq!(summary(&factory), summary(&same));
}

#[test]
fn test_default_placeholder_value() {
    let factory = SessionFactoryBuilder::new()
        .build_from_reader(TextReader::from_string(DOCUMENT))
        .unwrap();
    let data_source = factory.configuration().environment().unwrap().data_source();
    assert_eq!(data_source.username.as_deref(), Some("sa"));
}

#[test]
fn test_stream_in_selects_environment() {
    let factory = SessionFactoryBuilder::new()
        .build_from_stream_in(ByteReader::from_bytes(DOCUMENT.as_bytes().to_vec()), "test")
        .unwrap();
    let environment = factory.configuration().environment().unwrap();
    assert_eq!(environment.transaction_factory().name(), "MANAGED");
    assert_eq!(environment.data_source().kind, DataSourceKind::Unpooled);
}

#[test]
fn test_build_from_configuration() {
    let configuration = Configuration::new().with_environment(Environment::new(
        "manual",
        Arc::new(sqlsession::JdbcTransactionFactory),
        DataSource::unpooled("org.h2.Driver", "jdbc:h2:mem:manual"),
    ));

    ErrorContext::resource("caller.toml");
    let factory = SessionFactoryBuilder::new().build(configuration);
    assert_eq!(ErrorContext::snapshot().resource(), Some("caller.toml"));
    ErrorContext::reset();

    assert_eq!(factory.configuration().environment().unwrap().id(), "manual");
}

#[test]
fn test_two_builds_are_independent() {
    let builder = SessionFactoryBuilder::new();
    let first = builder
        .build_from_reader(TextReader::from_string(DOCUMENT))
        .unwrap();
    let second = builder
        .build_from_reader(TextReader::from_string(DOCUMENT))
        .unwrap();

    let a = first.configuration() as *const Configuration;
    let b = second.configuration() as *const Configuration;
    assert_ne!(a, b);
    assert_eq!(summary(&first), summary(&second));
}

#[test]
fn test_file_backed_stream() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DOCUMENT.as_bytes()).unwrap();
    let handle = std::fs::File::open(file.path()).unwrap();

    let factory = SessionFactoryBuilder::new()
        .build_from_stream_with(
            ByteReader::new(handle),
            BuildOptions::new().with_resource(file.path().display().to_string()),
        )
        .unwrap();
    assert_eq!(
        factory.configuration().resource(),
        Some(file.path().display().to_string().as_str())
    );
    assert_eq!(factory.configuration().statement_count(), 2);
}

#[test]
fn test_concurrent_builds() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let environment = if i % 2 == 0 { "development" } else { "test" };
                let factory = SessionFactoryBuilder::new()
                    .build_from_reader_in(TextReader::from_string(DOCUMENT), environment)
                    .unwrap();
                assert!(ErrorContext::is_empty());
                factory.configuration().environment().unwrap().id().to_string()
            })
        })
        .collect();

    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids, vec!["development", "test", "development", "test"]);
}

// =============================================================================
// Cleanup Tests
// =============================================================================

#[test]
fn test_handle_closed_exactly_once() {
    let (reader, closes) = CountingReader::new(DOCUMENT);
    SessionFactoryBuilder::new().build_from_reader(reader).unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let (reader, closes) = CountingReader::new("[[mappers]]\nnamespace = ");
    assert!(SessionFactoryBuilder::new().build_from_reader(reader).is_err());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_borrowed_handle_is_closed() {
    let mut reader = TextReader::from_string(DOCUMENT);
    SessionFactoryBuilder::new()
        .build_from_reader(&mut reader)
        .unwrap();
    assert!(reader.is_closed());

    let mut stream = BrokenStream::default();
    assert!(SessionFactoryBuilder::new()
        .build_from_stream(&mut stream)
        .is_err());
    assert_eq!(stream.closes, 1);
}

#[test]
fn test_close_failure_does_not_replace_result() {
    let (reader, closes) = CountingReader::new(DOCUMENT);
    let factory = SessionFactoryBuilder::new().build_from_reader(reader.failing_close());
    assert!(factory.is_ok());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_failure_does_not_replace_error() {
    let (reader, _) = CountingReader::new("[settings]\nlog_impl = \"SLF4J\"\n");
    let err = SessionFactoryBuilder::new()
        .build_from_reader(reader.failing_close())
        .unwrap_err();
    assert!(matches!(
        err.failure().as_parse(),
        Some(ParseError::UnknownSetting(name)) if name == "log_impl"
    ));
    assert!(!err.to_string().contains("disk went away"));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_parse_failure_is_wrapped_and_context_reset() {
    let err = SessionFactoryBuilder::new()
        .build_from_reader(TextReader::from_string("this is not toml"))
        .unwrap_err();

    assert_eq!(err.message(), BUILD_ERROR_MESSAGE);
    assert!(matches!(err.failure().as_parse(), Some(ParseError::Syntax(_))));
    assert!(std::error::Error::source(&err).is_some());
    assert!(ErrorContext::is_empty());
}

#[test]
fn test_unresolved_placeholder_reports_context() {
    let document = DOCUMENT.replace("\"db.url\" = \"jdbc:h2:mem:blog\"\n", "");
    let err = SessionFactoryBuilder::new()
        .build_from_reader_with(
            TextReader::from_string(document),
            BuildOptions::new().with_resource("config/blog.toml"),
        )
        .unwrap_err();

    assert!(matches!(
        err.failure().as_parse(),
        Some(ParseError::UnresolvedPlaceholder(key)) if key == "db.url"
    ));
    let context: &ErrorContextSnapshot = err.context();
    assert_eq!(context.resource(), Some("config/blog.toml"));
    assert_eq!(context.object(), Some("environment development"));

    let rendered = err.to_string();
    assert!(rendered.starts_with(BUILD_ERROR_MESSAGE));
    assert!(rendered.contains("### The error may exist in config/blog.toml"));
    assert!(rendered.contains("### Cause: "));
    assert!(ErrorContext::is_empty());
}

#[test]
fn test_unknown_environment_is_an_error() {
    let err = SessionFactoryBuilder::new()
        .build_from_reader_in(TextReader::from_string(DOCUMENT), "production")
        .unwrap_err();
    assert!(matches!(
        err.failure().as_parse(),
        Some(ParseError::UnknownEnvironment(id)) if id == "production"
    ));
}

#[test]
fn test_read_failure_is_wrapped() {
    let err = SessionFactoryBuilder::new()
        .build_from_stream(BrokenStream::default())
        .unwrap_err();
    assert!(matches!(err.failure().as_parse(), Some(ParseError::Io(_))));
    assert_eq!(
        err.context().activity(),
        Some("reading the configuration resource")
    );
}

#[test]
fn test_duplicate_statement_reports_sql() {
    let document = format!(
        "{}\n[[mappers]]\nnamespace = \"blog.BlogMapper\"\n[[mappers.statements]]\nid = \"selectBlog\"\nkind = \"select\"\nsql = \"SELECT 1\"\n",
        DOCUMENT
    );
    let err = SessionFactoryBuilder::new()
        .build_from_reader(TextReader::from_string(document))
        .unwrap_err();
    assert!(matches!(
        err.failure().as_parse(),
        Some(ParseError::Mapping(MappingError::DuplicateStatement(_)))
    ));
    assert_eq!(err.context().sql(), Some("SELECT 1"));
}

#[test]
fn test_custom_assembler_failure() {
    #[derive(Debug)]
    struct RequireStatements;

    impl FactoryAssembler for RequireStatements {
        type Factory = DefaultSessionFactory;

        fn assemble(&self, configuration: Configuration) -> Result<Self::Factory, AssemblyError> {
            if configuration.statement_count() == 0 {
                return Err(AssemblyError::Rejected("no mapped statements".to_string()));
            }
            Ok(DefaultSessionFactory::new(configuration))
        }
    }

    let builder = SessionFactoryBuilder::with_assembler(RequireStatements);
    assert!(builder
        .build_from_reader(TextReader::from_string(DOCUMENT))
        .is_ok());

    let (reader, closes) = CountingReader::new("[settings]\ncache_enabled = true\n");
    let err = builder.build_from_reader(reader).unwrap_err();
    assert!(err.failure().as_assembly().is_some());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(ErrorContext::is_empty());
}

// =============================================================================
// Extension Tests
// =============================================================================

/// A transaction manager registered by the application.
#[derive(Debug)]
struct ContainerTransactionFactory;

impl Provider for ContainerTransactionFactory {
    fn name(&self) -> &str {
        "CONTAINER"
    }

    fn aliases(&self) -> &[&str] {
        &["jta"]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TransactionFactory for ContainerTransactionFactory {
    fn new_transaction(
        &self,
        data_source: &DataSource,
        _properties: &Properties,
        isolation: Option<IsolationLevel>,
        autocommit: bool,
    ) -> sqlsession::TransactionResult<Box<dyn Transaction>> {
        Ok(Box::new(LocalTransaction::new(
            data_source.describe(),
            isolation,
            autocommit,
        )))
    }
}

#[test]
fn test_registered_transaction_factory() {
    let document = DOCUMENT.replacen("type = \"JDBC\"", "type = \"jta\"", 1);

    let err = SessionFactoryBuilder::new()
        .build_from_reader(TextReader::from_string(document.clone()))
        .unwrap_err();
    assert!(matches!(
        err.failure().as_parse(),
        Some(ParseError::Registry(RegistryError::NotFound { .. }))
    ));

    let mut builder = SessionFactoryBuilder::new();
    builder.register_transaction_factory(Arc::new(ContainerTransactionFactory));
    let factory = builder
        .build_from_reader(TextReader::from_string(document))
        .unwrap();
    let environment = factory.configuration().environment().unwrap();
    assert!(environment
        .transaction_factory()
        .is::<ContainerTransactionFactory>());
}
