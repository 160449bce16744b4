//! Registry of providers, looked up by case-insensitive alias.

use std::collections::HashMap;
use std::sync::Arc;

use crate::datasource::{
    DataSourceFactory, JndiDataSourceFactory, PooledDataSourceFactory, UnpooledDataSourceFactory,
};
use crate::error::{RegistryError, RegistryResult};
use crate::provider::Provider;
use crate::transaction::{JdbcTransactionFactory, ManagedTransactionFactory, TransactionFactory};

/// A registry of providers.
///
/// Providers are stored behind `Arc` so a parsed configuration can hold on to
/// the provider it resolved while the registry stays usable. Lookups match the
/// provider name or any of its aliases, ignoring ASCII case.
///
/// # Example
///
/// ```rust
/// use sqlsession::{JdbcTransactionFactory, Registry, TransactionFactory};
/// use std::sync::Arc;
///
/// let mut registry: Registry<dyn TransactionFactory> = Registry::new("transaction manager");
/// registry.register(Arc::new(JdbcTransactionFactory));
///
/// assert!(registry.get("jdbc").is_some());
/// assert!(registry.resolve("MANAGED").is_err());
/// ```
#[derive(Debug)]
pub struct Registry<P: ?Sized> {
    kind: &'static str,
    providers: HashMap<String, Arc<P>>,
    ordered: Vec<String>,
}

impl<P: Provider + ?Sized> Registry<P> {
    /// Create a new empty registry; `kind` names its entries in errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            providers: HashMap::new(),
            ordered: Vec::new(),
        }
    }

    /// Register a provider.
    ///
    /// The provider is registered under its name. If a provider with the same
    /// name already exists, it will be replaced.
    pub fn register(&mut self, provider: Arc<P>) {
        let key = provider.name().to_ascii_uppercase();
        if !self.providers.contains_key(&key) {
            self.ordered.push(key.clone());
        }
        self.providers.insert(key, provider);
    }

    /// Register a provider, returning an error if already registered.
    pub fn register_unique(&mut self, provider: Arc<P>) -> RegistryResult<()> {
        let name = provider.name();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let key = name.to_ascii_uppercase();
        if self.providers.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        self.ordered.push(key.clone());
        self.providers.insert(key, provider);
        Ok(())
    }

    /// Get a provider by name or alias.
    ///
    /// Exact names win; otherwise providers are checked in registration order.
    pub fn get(&self, alias: &str) -> Option<&Arc<P>> {
        self.providers
            .get(&alias.to_ascii_uppercase())
            .or_else(|| self.iter().find(|p| p.supports(alias)))
    }

    /// Get a shared handle to the provider for `alias`, or a `NotFound` error.
    pub fn resolve(&self, alias: &str) -> RegistryResult<Arc<P>> {
        self.get(alias)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                kind: self.kind,
                alias: alias.to_string(),
            })
    }

    /// Check if a provider answers to the given alias.
    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    /// Remove a provider by name.
    pub fn remove(&mut self, name: &str) -> Option<Arc<P>> {
        let key = name.to_ascii_uppercase();
        self.ordered.retain(|n| *n != key);
        self.providers.remove(&key)
    }

    /// Get the names of all registered providers.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|p| p.name()).collect()
    }

    /// Get the number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Iterate over all providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<P>> {
        self.ordered
            .iter()
            .filter_map(move |name| self.providers.get(name))
    }
}

impl<P: ?Sized> Clone for Registry<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            providers: self.providers.clone(),
            ordered: self.ordered.clone(),
        }
    }
}

/// The registries a parser resolves document type aliases against.
#[derive(Debug, Clone)]
pub struct FactoryRegistry {
    transactions: Registry<dyn TransactionFactory>,
    data_sources: Registry<dyn DataSourceFactory>,
}

impl FactoryRegistry {
    /// Create registries holding only the built-in factories.
    pub fn new() -> Self {
        let mut transactions: Registry<dyn TransactionFactory> =
            Registry::new("transaction manager");
        transactions.register(Arc::new(JdbcTransactionFactory));
        transactions.register(Arc::new(ManagedTransactionFactory));

        let mut data_sources: Registry<dyn DataSourceFactory> = Registry::new("data source");
        data_sources.register(Arc::new(UnpooledDataSourceFactory));
        data_sources.register(Arc::new(PooledDataSourceFactory));
        data_sources.register(Arc::new(JndiDataSourceFactory));

        Self {
            transactions,
            data_sources,
        }
    }

    /// Add or replace a transaction factory.
    pub fn register_transaction_factory(&mut self, factory: Arc<dyn TransactionFactory>) {
        self.transactions.register(factory);
    }

    /// Add or replace a data source factory.
    pub fn register_data_source_factory(&mut self, factory: Arc<dyn DataSourceFactory>) {
        self.data_sources.register(factory);
    }

    pub fn transaction_factories(&self) -> &Registry<dyn TransactionFactory> {
        &self.transactions
    }

    pub fn data_source_factories(&self) -> &Registry<dyn DataSourceFactory> {
        &self.data_sources
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
