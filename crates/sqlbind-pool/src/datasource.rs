//! Named datasources.
//!
//! A datasource is a name plus the driver settings needed to reach one
//! database. [`DataSources`] keeps one [`Pool`] per configured name and picks
//! the right pool for a statement from the statement's catalog entry.
//!
//! Configuration uses the properties format of older deployments:
//!
//! ```text
//! jdbc.pools=main, audit
//! jdbc.driver.main=postgres
//! jdbc.url.main=postgres://db1/app
//! jdbc.username.main=app
//! jdbc.password.main=secret
//! pool.max.main=20
//! pool.timeout.main=5
//! jdbc.url.audit=postgres://db2/audit
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlbind_client::{BoundStatement, DriverError};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::pool::{Pool, PooledConnection};

/// Opens driver connections for a datasource.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Connection type produced by this factory.
    type Connection: sqlbind_client::Connection + 'static;

    /// Open a new connection. Each connection must report a fresh
    /// [`ConnectionId`](sqlbind_client::ConnectionId).
    async fn connect(&self, datasource: &DataSourceConfig)
    -> Result<Self::Connection, DriverError>;
}

/// Settings for one datasource.
#[derive(Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Datasource name.
    pub name: String,
    /// Driver identifier, interpreted by the factory.
    pub driver: Option<String>,
    /// Connection URL.
    pub url: String,
    /// User name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Pool settings.
    pub pool: PoolConfig,
}

impl DataSourceConfig {
    /// Create a datasource with default pool settings.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: None,
            url: url.into(),
            username: None,
            password: None,
            pool: PoolConfig::default(),
        }
    }

    /// Set the driver identifier.
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the pool settings.
    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("pool", &self.pool)
            .finish()
    }
}

/// All configured datasources, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSourcesConfig {
    /// Datasources. The first one is the default.
    pub datasources: Vec<DataSourceConfig>,
}

impl DataSourcesConfig {
    /// Parse the properties format.
    pub fn from_properties(text: &str) -> Result<Self, PoolError> {
        let props = parse_properties(text);

        let pools = props
            .get("jdbc.pools")
            .ok_or_else(|| PoolError::Config("missing property 'jdbc.pools'".into()))?;

        let mut datasources = Vec::new();
        for name in pools.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let url = props
                .get(format!("jdbc.url.{name}").as_str())
                .ok_or_else(|| PoolError::Config(format!("missing property 'jdbc.url.{name}'")))?;

            let mut pool = PoolConfig::default();
            if let Some(min) = parse_number::<u32>(&props, "pool.min", name)? {
                pool.min_connections = min;
            }
            if let Some(max) = parse_number::<u32>(&props, "pool.max", name)? {
                pool.max_connections = max;
            }
            if let Some(secs) = parse_number::<u64>(&props, "pool.timeout", name)? {
                pool.connection_timeout = Duration::from_secs(secs);
            }
            pool.validate()
                .map_err(|e| PoolError::Config(format!("datasource '{name}': {e}")))?;

            let lookup = |prefix: &str| props.get(format!("{prefix}.{name}").as_str()).map(|v| v.to_string());
            datasources.push(DataSourceConfig {
                name: name.to_string(),
                driver: lookup("jdbc.driver"),
                url: url.to_string(),
                username: lookup("jdbc.username"),
                password: lookup("jdbc.password"),
                pool,
            });
        }

        if datasources.is_empty() {
            return Err(PoolError::Config("'jdbc.pools' names no datasource".into()));
        }

        tracing::debug!(count = datasources.len(), "datasources configured");
        Ok(Self { datasources })
    }

    /// Read and parse a properties file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PoolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_properties(&text)
    }

    /// The datasource with this name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataSourceConfig> {
        self.datasources.iter().find(|ds| ds.name == name)
    }
}

/// `key=value` / `key: value` lines; `#` and `!` start comments.
fn parse_properties(text: &str) -> HashMap<&str, &str> {
    let mut props = HashMap::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(at) => (&line[..at], &line[at + 1..]),
            None => (line, ""),
        };
        props.insert(key.trim(), value.trim());
    }
    props
}

fn parse_number<T: std::str::FromStr>(
    props: &HashMap<&str, &str>,
    prefix: &str,
    name: &str,
) -> Result<Option<T>, PoolError> {
    let key = format!("{prefix}.{name}");
    props
        .get(key.as_str())
        .map(|v| {
            v.parse()
                .map_err(|_| PoolError::Config(format!("property '{key}' is not a number: '{v}'")))
        })
        .transpose()
}

/// One pool per datasource.
pub struct DataSources<F: ConnectionFactory> {
    pools: HashMap<String, Pool<F>>,
    default: Option<String>,
}

impl<F: ConnectionFactory> DataSources<F> {
    /// Create a pool for every configured datasource.
    pub async fn new(config: DataSourcesConfig, factory: F) -> Result<Self, PoolError> {
        let factory = Arc::new(factory);
        let default = config.datasources.first().map(|ds| ds.name.clone());

        let mut pools = HashMap::with_capacity(config.datasources.len());
        for datasource in config.datasources {
            let pool = Pool::new(datasource.pool.clone(), Arc::clone(&factory), datasource).await?;
            pools.insert(pool.datasource().name.clone(), pool);
        }

        Ok(Self { pools, default })
    }

    /// Check out a connection from the named datasource.
    pub async fn acquire(&self, name: &str) -> Result<PooledConnection<F::Connection>, PoolError> {
        self.pool(name)
            .ok_or_else(|| PoolError::UnknownDataSource(name.to_string()))?
            .get()
            .await
    }

    /// Check out a connection from the datasource a statement belongs to,
    /// falling back to the default datasource.
    pub async fn acquire_for(
        &self,
        statement: &BoundStatement,
    ) -> Result<PooledConnection<F::Connection>, PoolError> {
        let name = statement
            .datasource()
            .or(self.default.as_deref())
            .ok_or_else(|| PoolError::UnknownDataSource(String::new()))?;
        self.acquire(name).await
    }

    /// The pool for a datasource.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<&Pool<F>> {
        self.pools.get(name)
    }

    /// Name of the default datasource.
    #[must_use]
    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Configured datasource names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Close every pool.
    pub async fn close_all(&self) {
        for pool in self.pools.values() {
            pool.close().await;
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for DataSources<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSources")
            .field("names", &self.names())
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPS: &str = "\
# datasources
jdbc.pools = main, audit
jdbc.driver.main=postgres
jdbc.url.main=postgres://db1:5432/app
jdbc.username.main=app
jdbc.password.main=s3cret
pool.max.main=20
pool.timeout.main: 5

! audit keeps defaults
jdbc.url.audit=postgres://db2/audit
";

    #[test]
    fn test_from_properties() {
        let config = DataSourcesConfig::from_properties(PROPS).unwrap();
        assert_eq!(config.datasources.len(), 2);

        let main = config.get("main").unwrap();
        assert_eq!(main.driver.as_deref(), Some("postgres"));
        assert_eq!(main.url, "postgres://db1:5432/app");
        assert_eq!(main.username.as_deref(), Some("app"));
        assert_eq!(main.pool.max_connections, 20);
        assert_eq!(main.pool.connection_timeout, Duration::from_secs(5));

        let audit = config.get("audit").unwrap();
        assert_eq!(audit.driver, None);
        assert_eq!(audit.pool, PoolConfig::default());
        assert_eq!(config.datasources[0].name, "main");
    }

    #[test]
    fn test_missing_pools_and_urls() {
        let err = DataSourcesConfig::from_properties("jdbc.url.main=x").unwrap_err();
        assert!(matches!(err, PoolError::Config(ref m) if m.contains("jdbc.pools")));

        let err = DataSourcesConfig::from_properties("jdbc.pools=main").unwrap_err();
        assert!(matches!(err, PoolError::Config(ref m) if m.contains("jdbc.url.main")));

        assert!(DataSourcesConfig::from_properties("jdbc.pools= , ").is_err());
    }

    #[test]
    fn test_invalid_pool_numbers() {
        let err =
            DataSourcesConfig::from_properties("jdbc.pools=a\njdbc.url.a=x\npool.max.a=many")
                .unwrap_err();
        assert!(matches!(err, PoolError::Config(ref m) if m.contains("pool.max.a")));

        let err = DataSourcesConfig::from_properties(
            "jdbc.pools=a\njdbc.url.a=x\npool.min.a=5\npool.max.a=2",
        )
        .unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_password_redacted() {
        let config = DataSourcesConfig::from_properties(PROPS).unwrap();
        let debug = format!("{:?}", config.get("main").unwrap());
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jdbc.properties");
        std::fs::write(&path, PROPS).unwrap();
        assert_eq!(
            DataSourcesConfig::from_file(&path).unwrap(),
            DataSourcesConfig::from_properties(PROPS).unwrap()
        );

        let err = DataSourcesConfig::from_file(dir.path().join("missing.properties")).unwrap_err();
        assert!(matches!(err, PoolError::Io { .. }));
    }
}
