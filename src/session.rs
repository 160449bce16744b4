//! Session factories and the sessions they open.

use std::fmt;
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::error::{SessionError, SessionResult};
use crate::mapping::{BoundSql, MappedStatement};
use crate::settings::ExecutorType;
use crate::transaction::{IsolationLevel, Transaction};

/// Opens sessions against a configuration.
///
/// Implementations must be safe to share between threads.
pub trait SessionFactory: Send + Sync + fmt::Debug {
    /// Open a session with default options.
    fn open_session(&self) -> SessionResult<Session> {
        self.open_session_with(SessionOptions::default())
    }

    /// Open a session with explicit options.
    fn open_session_with(&self, options: SessionOptions) -> SessionResult<Session>;

    /// The configuration sessions are opened against.
    fn configuration(&self) -> &Configuration;
}

/// How a session is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Commit after every statement
    pub autocommit: bool,
    /// Overrides the data source default
    pub isolation: Option<IsolationLevel>,
    /// Overrides the configured default executor
    pub executor_type: Option<ExecutorType>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    pub fn with_executor_type(mut self, executor_type: ExecutorType) -> Self {
        self.executor_type = Some(executor_type);
        self
    }
}

/// The stock [`SessionFactory`], sharing one immutable configuration.
#[derive(Debug, Clone)]
pub struct DefaultSessionFactory {
    configuration: Arc<Configuration>,
}

impl DefaultSessionFactory {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration: Arc::new(configuration),
        }
    }
}

impl SessionFactory for DefaultSessionFactory {
    fn open_session_with(&self, options: SessionOptions) -> SessionResult<Session> {
        let environment = self
            .configuration
            .environment()
            .ok_or(SessionError::NoEnvironment)?;
        let executor_type = options
            .executor_type
            .unwrap_or(self.configuration.settings().default_executor_type);
        let transaction = environment.new_transaction(options.isolation, options.autocommit)?;

        tracing::debug!(
            environment = environment.id(),
            executor = %executor_type,
            autocommit = options.autocommit,
            "opened session"
        );
        Ok(Session {
            configuration: Arc::clone(&self.configuration),
            transaction,
            executor_type,
            autocommit: options.autocommit,
            dirty: false,
            closed: false,
        })
    }

    fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}

/// A unit of work: statement lookup plus transaction control.
///
/// Binding a statement that changes data marks the session dirty. Commit and
/// rollback only reach the transaction when the session is dirty and not in
/// autocommit mode, or when forced. Closing a dirty session rolls it back.
/// Dropping an open session closes it.
#[derive(Debug)]
pub struct Session {
    configuration: Arc<Configuration>,
    transaction: Box<dyn Transaction>,
    executor_type: ExecutorType,
    autocommit: bool,
    dirty: bool,
    closed: bool,
}

impl Session {
    /// Look a statement up by full or unique short id.
    pub fn statement(&self, id: &str) -> SessionResult<&MappedStatement> {
        self.ensure_open()?;
        Ok(self.configuration.mapped_statement(id)?)
    }

    /// Bind a statement for execution.
    pub fn bind(&mut self, id: &str) -> SessionResult<BoundSql> {
        self.ensure_open()?;
        let statement = self.configuration.mapped_statement(id)?;
        let bound = statement.bound_sql().clone();
        if statement.kind().is_modifying() {
            self.dirty = true;
        }
        Ok(bound)
    }

    pub fn commit(&mut self) -> SessionResult<()> {
        self.complete(false, Completion::Commit)
    }

    /// Commit even when the session is clean.
    pub fn commit_forced(&mut self) -> SessionResult<()> {
        self.complete(true, Completion::Commit)
    }

    pub fn rollback(&mut self) -> SessionResult<()> {
        self.complete(false, Completion::Rollback)
    }

    /// Roll back even when the session is clean.
    pub fn rollback_forced(&mut self) -> SessionResult<()> {
        self.complete(true, Completion::Rollback)
    }

    /// Close the session, rolling back uncommitted changes.
    ///
    /// Closing an already closed session does nothing.
    pub fn close(&mut self) -> SessionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let rolled_back = if self.reaches_transaction(false) {
            tracing::debug!("rolling back uncommitted changes on close");
            self.transaction.rollback()
        } else {
            Ok(())
        };
        self.dirty = false;
        let closed = self.transaction.close();
        rolled_back?;
        closed?;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn executor_type(&self) -> ExecutorType {
        self.executor_type
    }

    pub fn transaction(&self) -> &dyn Transaction {
        self.transaction.as_ref()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn reaches_transaction(&self, force: bool) -> bool {
        (!self.autocommit && self.dirty) || force
    }

    fn complete(&mut self, force: bool, completion: Completion) -> SessionResult<()> {
        self.ensure_open()?;
        if self.reaches_transaction(force) {
            match completion {
                Completion::Commit => self.transaction.commit()?,
                Completion::Rollback => self.transaction.rollback()?,
            }
        }
        self.dirty = false;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close session");
        }
    }
}

#[derive(Clone, Copy)]
enum Completion {
    Commit,
    Rollback,
}
