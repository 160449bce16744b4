//! Transactions and the factories that create them.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use crate::datasource::DataSource;
use crate::error::{TransactionError, TransactionResult};
use crate::properties::Properties;
use crate::provider::Provider;

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::ReadUncommitted => "READ_UNCOMMITTED",
            Self::ReadCommitted => "READ_COMMITTED",
            Self::RepeatableRead => "REPEATABLE_READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "READ_UNCOMMITTED" => Ok(Self::ReadUncommitted),
            "READ_COMMITTED" => Ok(Self::ReadCommitted),
            "REPEATABLE_READ" => Ok(Self::RepeatableRead),
            "SERIALIZABLE" => Ok(Self::Serializable),
            other => Err(format!("unknown isolation level `{}`", other)),
        }
    }
}

/// Where a transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Open with no completed unit of work yet
    Active,
    /// The last unit of work was committed
    Committed,
    /// The last unit of work was rolled back
    RolledBack,
    /// Closed; no further use
    Closed,
}

/// A unit of work against a data source.
pub trait Transaction: Send + fmt::Debug {
    fn commit(&mut self) -> TransactionResult<()>;

    fn rollback(&mut self) -> TransactionResult<()>;

    /// Release the transaction. Closing twice is a no-op.
    fn close(&mut self) -> TransactionResult<()>;

    fn state(&self) -> TransactionState;

    fn isolation_level(&self) -> Option<IsolationLevel>;

    fn is_autocommit(&self) -> bool;
}

/// Creates transactions for an environment.
pub trait TransactionFactory: Provider {
    /// Check the properties declared for this transaction manager.
    fn validate(&self, _properties: &Properties) -> Result<(), String> {
        Ok(())
    }

    /// Start a transaction against `data_source`.
    fn new_transaction(
        &self,
        data_source: &DataSource,
        properties: &Properties,
        isolation: Option<IsolationLevel>,
        autocommit: bool,
    ) -> TransactionResult<Box<dyn Transaction>>;
}

/// `JDBC`: commit and rollback are driven by the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct JdbcTransactionFactory;

impl Provider for JdbcTransactionFactory {
    fn name(&self) -> &str {
        "JDBC"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TransactionFactory for JdbcTransactionFactory {
    fn validate(&self, properties: &Properties) -> Result<(), String> {
        for (key, value) in properties.iter() {
            match key {
                "skip_set_autocommit_on_close" => {
                    value
                        .trim()
                        .parse::<bool>()
                        .map_err(|_| format!("`{}` must be true or false, got `{}`", key, value))?;
                }
                _ => return Err(format!("unknown property `{}`", key)),
            }
        }
        Ok(())
    }

    fn new_transaction(
        &self,
        data_source: &DataSource,
        _properties: &Properties,
        isolation: Option<IsolationLevel>,
        autocommit: bool,
    ) -> TransactionResult<Box<dyn Transaction>> {
        let isolation = isolation.or(data_source.default_isolation_level);
        Ok(Box::new(LocalTransaction::new(
            data_source.describe(),
            isolation,
            autocommit,
        )))
    }
}

/// A transaction committed and rolled back by its owner.
///
/// In autocommit mode commit and rollback have nothing to do.
#[derive(Debug)]
pub struct LocalTransaction {
    target: String,
    isolation: Option<IsolationLevel>,
    autocommit: bool,
    state: TransactionState,
    commits: usize,
    rollbacks: usize,
}

impl LocalTransaction {
    pub fn new(target: impl Into<String>, isolation: Option<IsolationLevel>, autocommit: bool) -> Self {
        Self {
            target: target.into(),
            isolation,
            autocommit,
            state: TransactionState::Active,
            commits: 0,
            rollbacks: 0,
        }
    }

    /// How many commits reached the data source.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// How many rollbacks reached the data source.
    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    fn ensure_open(&self) -> TransactionResult<()> {
        if self.state == TransactionState::Closed {
            return Err(TransactionError::Closed);
        }
        Ok(())
    }
}

impl Transaction for LocalTransaction {
    fn commit(&mut self) -> TransactionResult<()> {
        self.ensure_open()?;
        if !self.autocommit {
            tracing::debug!(data_source = %self.target, "committing transaction");
            self.commits += 1;
            self.state = TransactionState::Committed;
        }
        Ok(())
    }

    fn rollback(&mut self) -> TransactionResult<()> {
        self.ensure_open()?;
        if !self.autocommit {
            tracing::debug!(data_source = %self.target, "rolling back transaction");
            self.rollbacks += 1;
            self.state = TransactionState::RolledBack;
        }
        Ok(())
    }

    fn close(&mut self) -> TransactionResult<()> {
        if self.state != TransactionState::Closed {
            tracing::debug!(data_source = %self.target, "closing transaction");
            self.state = TransactionState::Closed;
        }
        Ok(())
    }

    fn state(&self) -> TransactionState {
        self.state
    }

    fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    fn is_autocommit(&self) -> bool {
        self.autocommit
    }
}

/// `MANAGED`: a container owns the transaction lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagedTransactionFactory;

impl Provider for ManagedTransactionFactory {
    fn name(&self) -> &str {
        "MANAGED"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TransactionFactory for ManagedTransactionFactory {
    fn validate(&self, properties: &Properties) -> Result<(), String> {
        close_connection(properties).map(|_| ())
    }

    fn new_transaction(
        &self,
        _data_source: &DataSource,
        properties: &Properties,
        isolation: Option<IsolationLevel>,
        _autocommit: bool,
    ) -> TransactionResult<Box<dyn Transaction>> {
        let close_connection = close_connection(properties).map_err(TransactionError::Failed)?;
        Ok(Box::new(ManagedTransaction {
            isolation,
            close_connection,
            state: TransactionState::Active,
        }))
    }
}

fn close_connection(properties: &Properties) -> Result<bool, String> {
    for (key, _) in properties.iter() {
        if key != "close_connection" {
            return Err(format!("unknown property `{}`", key));
        }
    }
    match properties.get("close_connection") {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("`close_connection` must be true or false, got `{}`", value)),
        None => Ok(true),
    }
}

/// A transaction whose commit and rollback belong to a container.
#[derive(Debug)]
pub struct ManagedTransaction {
    isolation: Option<IsolationLevel>,
    close_connection: bool,
    state: TransactionState,
}

impl ManagedTransaction {
    /// Whether closing the transaction releases the connection.
    pub fn closes_connection(&self) -> bool {
        self.close_connection
    }
}

impl Transaction for ManagedTransaction {
    fn commit(&mut self) -> TransactionResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> TransactionResult<()> {
        Ok(())
    }

    fn close(&mut self) -> TransactionResult<()> {
        self.state = TransactionState::Closed;
        Ok(())
    }

    fn state(&self) -> TransactionState {
        self.state
    }

    fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    fn is_autocommit(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_source() -> DataSource {
        DataSource::unpooled("org.h2.Driver", "jdbc:h2:mem:test")
    }

    #[test]
    fn test_isolation_level_from_str() {
        assert_eq!(
            "repeatable_read".parse::<IsolationLevel>(),
            Ok(IsolationLevel::RepeatableRead)
        );
        assert!("SNAPSHOT".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_local_transaction_commit_and_close() {
        let mut tx = LocalTransaction::new("test", None, false);
        tx.commit().unwrap();
        tx.rollback().unwrap();
        assert_eq!(tx.commits(), 1);
        assert_eq!(tx.rollbacks(), 1);
        assert_eq!(tx.state(), TransactionState::RolledBack);

        tx.close().unwrap();
        tx.close().unwrap();
        assert_eq!(tx.commit(), Err(TransactionError::Closed));
    }

    #[test]
    fn test_local_transaction_autocommit_skips_commit() {
        let mut tx = LocalTransaction::new("test", None, true);
        tx.commit().unwrap();
        assert_eq!(tx.commits(), 0);
        assert_eq!(tx.state(), TransactionState::Active);
    }

    #[test]
    fn test_jdbc_factory_uses_data_source_isolation() {
        let mut source = data_source();
        source.default_isolation_level = Some(IsolationLevel::Serializable);

        let tx = JdbcTransactionFactory
            .new_transaction(&source, &Properties::new(), None, false)
            .unwrap();
        assert_eq!(tx.isolation_level(), Some(IsolationLevel::Serializable));

        let tx = JdbcTransactionFactory
            .new_transaction(
                &source,
                &Properties::new(),
                Some(IsolationLevel::ReadCommitted),
                false,
            )
            .unwrap();
        assert_eq!(tx.isolation_level(), Some(IsolationLevel::ReadCommitted));
    }

    #[test]
    fn test_jdbc_factory_validation() {
        let factory = JdbcTransactionFactory;
        assert!(factory
            .validate(&Properties::new().with("skip_set_autocommit_on_close", "true"))
            .is_ok());
        assert!(factory
            .validate(&Properties::new().with("close_connection", "false"))
            .is_err());
    }

    #[test]
    fn test_managed_factory_close_connection() {
        let factory = ManagedTransactionFactory;
        assert!(factory
            .validate(&Properties::new().with("close_connection", "nope"))
            .is_err());

        let tx = factory
            .new_transaction(
                &data_source(),
                &Properties::new().with("close_connection", "false"),
                None,
                false,
            )
            .unwrap();
        assert_eq!(tx.state(), TransactionState::Active);
    }
}
