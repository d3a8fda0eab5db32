//! Resource names, identifiers and row values

use crate::error::{Result, Status};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Resource names
// ============================================================================

/// `projects/{project}/instances/{instance}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstancePath {
    /// Project id
    pub project: String,
    /// Instance id
    pub instance: String,
}

impl InstancePath {
    /// Build an instance path
    pub fn new(project: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
        }
    }

    /// `projects/{project}`
    pub fn parent(&self) -> String {
        format!("projects/{}", self.project)
    }

    /// Database inside this instance
    pub fn database(&self, database: impl Into<String>) -> DatabasePath {
        DatabasePath {
            instance: self.clone(),
            database: database.into(),
        }
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/instances/{}", self.project, self.instance)
    }
}

/// `projects/{project}/instances/{instance}/databases/{database}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabasePath {
    /// Owning instance
    pub instance: InstancePath,
    /// Database id
    pub database: String,
}

impl DatabasePath {
    /// Build a database path
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        InstancePath::new(project, instance).database(database)
    }

    /// Parse a fully-qualified database name
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "instances", instance, "databases", database]
                if !project.is_empty() && !instance.is_empty() && !database.is_empty() =>
            {
                Ok(DatabasePath::new(*project, *instance, *database))
            }
            _ => Err(Status::invalid_argument(format!(
                "invalid database name: {}",
                name
            ))),
        }
    }
}

impl fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/databases/{}", self.instance, self.database)
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Backend session name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Fresh session name under `database`
    pub fn generate(database: &DatabasePath) -> Self {
        SessionId(format!("{}/sessions/{}", database, uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend transaction id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

// ============================================================================
// Values and rows
// ============================================================================

/// Column value (the schema only has INT64 columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// INT64
    Int64(i64),
}

impl Value {
    /// Integer payload, `None` for NULL
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int64(v) => write!(f, "{}", v),
        }
    }
}

/// Single-column primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub i64);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

/// A row returned by a read or query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column/value lists
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in order
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Decode column `index` as a non-null INT64
    pub fn column_i64(&self, index: usize) -> Result<i64> {
        match self.values.get(index) {
            Some(Value::Int64(v)) => Ok(*v),
            Some(Value::Null) => Err(Status::invalid_argument(format!(
                "column {} is NULL, cannot decode into i64",
                index
            ))),
            None => Err(Status::invalid_argument(format!(
                "column index {} out of range (row has {} columns)",
                index,
                self.values.len()
            ))),
        }
    }

    /// Decode column `index` as a nullable INT64
    pub fn column_opt_i64(&self, index: usize) -> Result<Option<i64>> {
        self.values
            .get(index)
            .map(Value::as_i64)
            .ok_or_else(|| Status::invalid_argument(format!("column index {} out of range", index)))
    }
}
