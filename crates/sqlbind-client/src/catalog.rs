//! Statement catalogs.
//!
//! Each caller type owns one catalog document holding its SQL statements by
//! id. Documents are JSON:
//!
//! ```json
//! {
//!   "datasource": "main",
//!   "statements": [
//!     { "name": "findUser", "sql": "select * from users where id = :id" },
//!     { "name": "audit", "datasource": "audit", "sql": [
//!         "insert into audit (who, what)",
//!         "values (:who, :what)"
//!     ] }
//!   ]
//! }
//! ```
//!
//! A [`StatementRegistry`] loads each caller's document at most once, on the
//! first lookup, and hands out a fresh [`BoundStatement`] per lookup.
//!
//! Only JSON is read by the bundled sources. XML catalogs of the form
//! `<statement name=".." datasource="..">sql</statement>` are not understood;
//! convert them, or implement [`CatalogSource`] to build the
//! [`CatalogDocument`] from them. Statement text from any source goes through
//! the same whitespace normalisation.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::statement::BoundStatement;

/// An immutable SQL template shared by every statement created from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: String,
    sql: String,
    datasource: Option<String>,
}

impl Template {
    /// Create a template with no datasource.
    pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sql: sql.into(),
            datasource: None,
        }
    }

    /// Set the datasource.
    #[must_use]
    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    /// Statement id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Template text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Datasource the statement runs against, if named.
    #[must_use]
    pub fn datasource(&self) -> Option<&str> {
        self.datasource.as_deref()
    }
}

/// Errors that can occur while loading a catalog document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// The document could not be read.
    #[error("cannot read catalog file {}: {source}", path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid catalog.
    #[error("invalid catalog document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The source has no document for this caller.
    #[error("no catalog document for '{0}'")]
    NotFound(String),
}

/// On-disk catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// Datasource used by statements that do not name their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
    /// Statement entries.
    #[serde(default)]
    pub statements: Vec<StatementEntry>,
}

/// One statement in a catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementEntry {
    /// Statement id. Entries without one are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Statement text.
    pub sql: SqlText,
    /// Datasource override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
}

/// Statement text, either one string or a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlText {
    /// Single string.
    Text(String),
    /// Lines joined with a space.
    Lines(Vec<String>),
}

impl SqlText {
    /// The text with surrounding whitespace trimmed and inner runs of
    /// whitespace collapsed to one space.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Text(text) => normalize_whitespace(text),
            Self::Lines(lines) => normalize_whitespace(&lines.join(" ")),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The statements of one caller.
#[derive(Debug, Clone, Default)]
pub struct StatementCatalog {
    name: String,
    datasource: Option<String>,
    statements: HashMap<String, Arc<Template>>,
}

impl StatementCatalog {
    /// Build a catalog from a parsed document.
    pub fn from_document(name: impl Into<String>, document: CatalogDocument) -> Self {
        let name = name.into();
        if document.datasource.is_none() {
            tracing::info!(catalog = %name, "catalog has no default datasource");
        }

        let mut statements = HashMap::with_capacity(document.statements.len());
        for (position, entry) in document.statements.into_iter().enumerate() {
            let Some(id) = entry.name else {
                tracing::error!(catalog = %name, position, "statement without a name skipped");
                continue;
            };

            let mut template = Template::new(id.clone(), entry.sql.normalized());
            template.datasource = entry.datasource.or_else(|| document.datasource.clone());

            if statements.insert(id.clone(), Arc::new(template)).is_some() {
                tracing::warn!(catalog = %name, statement = %id, "duplicate statement id, last one wins");
            }
        }

        tracing::debug!(catalog = %name, statements = statements.len(), "catalog loaded");
        Self {
            name,
            datasource: document.datasource,
            statements,
        }
    }

    /// Parse and build a catalog from JSON text.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(name, document))
    }

    /// A catalog with no statements.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Catalog (caller) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default datasource of the catalog.
    #[must_use]
    pub fn datasource(&self) -> Option<&str> {
        self.datasource.as_deref()
    }

    /// The template with this id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Template>> {
        self.statements.get(id)
    }

    /// A fresh statement over the template with this id.
    pub fn statement(&self, id: &str) -> Result<BoundStatement> {
        self.get(id)
            .map(|template| BoundStatement::new(Arc::clone(template)))
            .ok_or_else(|| Error::UnknownStatement {
                catalog: self.name.clone(),
                statement: id.to_string(),
            })
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the catalog has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statement ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.statements.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Where catalog documents come from.
pub trait CatalogSource: Send + Sync {
    /// Load the document for a caller.
    fn load(&self, caller: &str) -> Result<CatalogDocument, CatalogError>;
}

/// Reads `<dir>/<caller>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    /// Create a source rooted at a directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory documents are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a caller's document is read from.
    #[must_use]
    pub fn path_for(&self, caller: &str) -> PathBuf {
        self.dir.join(format!("{caller}.json"))
    }
}

impl CatalogSource for DirectorySource {
    fn load(&self, caller: &str) -> Result<CatalogDocument, CatalogError> {
        let path = self.path_for(caller);
        let text = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CatalogError::NotFound(caller.to_string())
            } else {
                CatalogError::Io { path, source }
            }
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Documents held in memory, keyed by caller name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a JSON document for a caller.
    #[must_use]
    pub fn with_json(mut self, caller: impl Into<String>, json: impl Into<String>) -> Self {
        self.documents.insert(caller.into(), json.into());
        self
    }

    /// Add a parsed document for a caller.
    pub fn with_document(
        self,
        caller: impl Into<String>,
        document: &CatalogDocument,
    ) -> Result<Self, CatalogError> {
        let json = serde_json::to_string(document)?;
        Ok(self.with_json(caller, json))
    }
}

impl CatalogSource for MemorySource {
    fn load(&self, caller: &str) -> Result<CatalogDocument, CatalogError> {
        let json = self
            .documents
            .get(caller)
            .ok_or_else(|| CatalogError::NotFound(caller.to_string()))?;
        Ok(serde_json::from_str(json)?)
    }
}

/// Registry behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Fail lookups when a catalog cannot be loaded instead of treating it as
    /// empty. Failed loads are retried on the next lookup.
    pub strict: bool,
}

impl RegistryConfig {
    /// Set strict loading.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

type CatalogCell = Arc<OnceCell<Arc<StatementCatalog>>>;

/// Lazily loaded catalogs, one per caller, never evicted.
///
/// Create one per application and share it behind an `Arc`.
pub struct StatementRegistry {
    source: Box<dyn CatalogSource>,
    config: RegistryConfig,
    catalogs: Mutex<HashMap<String, CatalogCell>>,
}

impl StatementRegistry {
    /// Create a registry with the default configuration.
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self::with_config(source, RegistryConfig::default())
    }

    /// Create a registry with an explicit configuration.
    pub fn with_config(source: impl CatalogSource + 'static, config: RegistryConfig) -> Self {
        Self {
            source: Box::new(source),
            config,
            catalogs: Mutex::new(HashMap::new()),
        }
    }

    /// The registry configuration.
    #[must_use]
    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// A fresh statement from the catalog of caller type `T`.
    pub fn lookup<T: ?Sized>(&self, id: &str) -> Result<BoundStatement> {
        self.lookup_named(caller_name::<T>(), id)
    }

    /// A fresh statement from the catalog of a named caller.
    pub fn lookup_named(&self, caller: &str, id: &str) -> Result<BoundStatement> {
        self.catalog_named(caller)?.statement(id)
    }

    /// The catalog of caller type `T`, loading it on first use.
    pub fn catalog<T: ?Sized>(&self) -> Result<Arc<StatementCatalog>> {
        self.catalog_named(caller_name::<T>())
    }

    /// The catalog of a named caller, loading it on first use.
    ///
    /// Concurrent first calls for the same caller block on one load and all
    /// observe its result.
    pub fn catalog_named(&self, caller: &str) -> Result<Arc<StatementCatalog>> {
        let cell = {
            let mut catalogs = self.catalogs.lock();
            Arc::clone(catalogs.entry(caller.to_string()).or_default())
        };
        cell.get_or_try_init(|| self.load(caller)).cloned()
    }

    /// Names of the catalogs loaded so far, sorted.
    #[must_use]
    pub fn loaded(&self) -> Vec<String> {
        let catalogs = self.catalogs.lock();
        let mut names: Vec<String> = catalogs
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    fn load(&self, caller: &str) -> Result<Arc<StatementCatalog>> {
        match self.source.load(caller) {
            Ok(document) => Ok(Arc::new(StatementCatalog::from_document(caller, document))),
            Err(source) if self.config.strict => Err(Error::Catalog {
                catalog: caller.to_string(),
                source,
            }),
            Err(error) => {
                tracing::warn!(catalog = %caller, %error, "catalog not loaded, using an empty catalog");
                Ok(Arc::new(StatementCatalog::empty(caller)))
            }
        }
    }
}

impl fmt::Debug for StatementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementRegistry")
            .field("config", &self.config)
            .field("loaded", &self.loaded())
            .finish_non_exhaustive()
    }
}

/// Short name of a caller type: the last path segment, without generics.
#[must_use]
pub fn caller_name<T: ?Sized>() -> &'static str {
    short_type_name(type_name::<T>())
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
