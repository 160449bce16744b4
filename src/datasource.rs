//! Data source descriptions and the factories that build them.
//!
//! A data source here is a validated description of how to reach a database:
//! driver, URL, credentials, pool limits. Opening connections belongs to the
//! execution layer and is not done by this crate.

use std::any::Any;
use std::time::Duration;

use crate::error::DataSourceError;
use crate::properties::Properties;
use crate::provider::Provider;
use crate::transaction::IsolationLevel;

const DRIVER_PREFIX: &str = "driver.";

/// Pool limits for a pooled data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub maximum_active_connections: u32,
    pub maximum_idle_connections: u32,
    pub maximum_checkout_time: Duration,
    pub time_to_wait: Duration,
    pub ping_enabled: bool,
    pub ping_query: Option<String>,
    pub ping_connections_not_used_for: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            maximum_active_connections: 10,
            maximum_idle_connections: 5,
            maximum_checkout_time: Duration::from_millis(20_000),
            time_to_wait: Duration::from_millis(20_000),
            ping_enabled: false,
            ping_query: None,
            ping_connections_not_used_for: Duration::ZERO,
        }
    }
}

/// How connections are obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceKind {
    /// A new connection per request
    Unpooled,
    /// Connections are pooled
    Pooled(PoolSettings),
    /// Connections come from a container-managed data source
    Jndi {
        data_source: String,
        initial_context: Option<String>,
    },
}

/// A resolved data source description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub kind: DataSourceKind,
    pub driver: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auto_commit: Option<bool>,
    pub default_isolation_level: Option<IsolationLevel>,
    pub default_network_timeout: Option<Duration>,
    /// Properties passed through to the driver (`driver.*` keys, prefix removed)
    pub driver_properties: Properties,
}

impl DataSource {
    /// An unpooled data source for `driver` at `url`.
    pub fn unpooled(driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Unpooled,
            driver: Some(driver.into()),
            url: Some(url.into()),
            username: None,
            password: None,
            auto_commit: None,
            default_isolation_level: None,
            default_network_timeout: None,
            driver_properties: Properties::new(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self.kind, DataSourceKind::Pooled(_))
    }

    /// A short description for logs, never including credentials.
    pub fn describe(&self) -> String {
        match &self.kind {
            DataSourceKind::Jndi { data_source, .. } => format!("jndi:{}", data_source),
            _ => self.url.clone().unwrap_or_default(),
        }
    }
}

/// Builds [`DataSource`] descriptions from document properties.
pub trait DataSourceFactory: Provider {
    /// Validate `properties` and build the data source.
    fn create(&self, properties: &Properties) -> Result<DataSource, DataSourceError>;
}

/// `UNPOOLED`: a fresh connection per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpooledDataSourceFactory;

impl Provider for UnpooledDataSourceFactory {
    fn name(&self) -> &str {
        "UNPOOLED"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DataSourceFactory for UnpooledDataSourceFactory {
    fn create(&self, properties: &Properties) -> Result<DataSource, DataSourceError> {
        let mut source = driver_source("UNPOOLED", properties)?;
        for (key, value) in properties.iter() {
            if !apply_driver_key(&mut source, key, value)? {
                return Err(DataSourceError::UnknownProperty(key.to_string()));
            }
        }
        Ok(source)
    }
}

/// `POOLED`: connections are pooled with the limits in [`PoolSettings`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PooledDataSourceFactory;

impl Provider for PooledDataSourceFactory {
    fn name(&self) -> &str {
        "POOLED"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DataSourceFactory for PooledDataSourceFactory {
    fn create(&self, properties: &Properties) -> Result<DataSource, DataSourceError> {
        let mut source = driver_source("POOLED", properties)?;
        let mut pool = PoolSettings::default();
        for (key, value) in properties.iter() {
            if apply_driver_key(&mut source, key, value)? {
                continue;
            }
            match key {
                "pool_maximum_active_connections" => {
                    pool.maximum_active_connections = parse_value(key, value)?
                }
                "pool_maximum_idle_connections" => {
                    pool.maximum_idle_connections = parse_value(key, value)?
                }
                "pool_maximum_checkout_time" => {
                    pool.maximum_checkout_time = Duration::from_millis(parse_value(key, value)?)
                }
                "pool_time_to_wait" => {
                    pool.time_to_wait = Duration::from_millis(parse_value(key, value)?)
                }
                "pool_ping_enabled" => pool.ping_enabled = parse_value(key, value)?,
                "pool_ping_query" => pool.ping_query = Some(value.to_string()),
                "pool_ping_connections_not_used_for" => {
                    pool.ping_connections_not_used_for =
                        Duration::from_millis(parse_value(key, value)?)
                }
                _ => return Err(DataSourceError::UnknownProperty(key.to_string())),
            }
        }
        if pool.maximum_active_connections == 0 {
            return Err(DataSourceError::InvalidValue {
                name: "pool_maximum_active_connections".to_string(),
                value: "0".to_string(),
            });
        }
        source.kind = DataSourceKind::Pooled(pool);
        Ok(source)
    }
}

/// `JNDI`: look the data source up by name in a naming context.
#[derive(Debug, Clone, Copy, Default)]
pub struct JndiDataSourceFactory;

impl Provider for JndiDataSourceFactory {
    fn name(&self) -> &str {
        "JNDI"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DataSourceFactory for JndiDataSourceFactory {
    fn create(&self, properties: &Properties) -> Result<DataSource, DataSourceError> {
        let data_source = properties
            .get("data_source")
            .ok_or(DataSourceError::MissingProperty {
                kind: "JNDI",
                name: "data_source",
            })?
            .to_string();
        let mut driver_properties = Properties::new();
        for (key, value) in properties.iter() {
            match key {
                "data_source" | "initial_context" => {}
                _ => match key.strip_prefix(DRIVER_PREFIX) {
                    Some(name) => {
                        driver_properties.set(name, value);
                    }
                    None => return Err(DataSourceError::UnknownProperty(key.to_string())),
                },
            }
        }
        Ok(DataSource {
            kind: DataSourceKind::Jndi {
                data_source,
                initial_context: properties.get("initial_context").map(str::to_string),
            },
            driver: None,
            url: None,
            username: None,
            password: None,
            auto_commit: None,
            default_isolation_level: None,
            default_network_timeout: None,
            driver_properties,
        })
    }
}

fn driver_source(kind: &'static str, properties: &Properties) -> Result<DataSource, DataSourceError> {
    let required = |name: &'static str| {
        properties
            .get(name)
            .map(str::to_string)
            .ok_or(DataSourceError::MissingProperty { kind, name })
    };
    Ok(DataSource::unpooled(required("driver")?, required("url")?))
}

/// Apply a key shared by unpooled and pooled sources; `false` if not one.
fn apply_driver_key(
    source: &mut DataSource,
    key: &str,
    value: &str,
) -> Result<bool, DataSourceError> {
    match key {
        "driver" | "url" => {}
        "username" => source.username = Some(value.to_string()),
        "password" => source.password = Some(value.to_string()),
        "auto_commit" => source.auto_commit = Some(parse_value(key, value)?),
        "default_transaction_isolation_level" => {
            source.default_isolation_level = Some(parse_value(key, value)?)
        }
        "default_network_timeout" => {
            source.default_network_timeout = Some(Duration::from_millis(parse_value(key, value)?))
        }
        _ => match key.strip_prefix(DRIVER_PREFIX) {
            Some(name) => {
                source.driver_properties.set(name, value);
            }
            None => return Ok(false),
        },
    }
    Ok(true)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DataSourceError> {
    value
        .trim()
        .parse()
        .map_err(|_| DataSourceError::InvalidValue {
            name: key.to_string(),
            value: value.to_string(),
        })
}
