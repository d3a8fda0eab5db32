//! File-backed catalog
//!
//! The whole backend state (instances, databases, tables, rows and the
//! global commit version) lives in one MessagePack file inside the data
//! directory. Every mutation is a read-modify-write under an exclusive
//! `fs2` lock, written to a temporary file and renamed into place, so a
//! runner process killed mid-commit never leaves a torn catalog behind.
//!
//! ```text
//! <data_dir>/
//!   catalog.msgpack   # Catalog, rmp-serde
//!   catalog.lock      # advisory lock file
//!   emulator.toml     # EmulatorConfig (see config.rs)
//! ```

use crate::error::{Result, Status};
use crate::types::{Key, Row, Value};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Catalog file name inside the data directory
pub const CATALOG_FILE_NAME: &str = "catalog.msgpack";

/// Lock file name inside the data directory
pub const LOCK_FILE_NAME: &str = "catalog.lock";

const CATALOG_TMP_FILE_NAME: &str = "catalog.msgpack.tmp";

/// Whether `name` is a file the backend keeps in its data directory
pub fn is_data_file(name: &str) -> bool {
    matches!(
        name,
        CATALOG_FILE_NAME | LOCK_FILE_NAME | CATALOG_TMP_FILE_NAME | crate::config::CONFIG_FILE_NAME
    )
}

// ============================================================================
// Schema
// ============================================================================

/// One INT64 column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Whether NULL is allowed
    pub nullable: bool,
}

/// Table definition with a single-column primary key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDef>,
    /// Primary key column name
    pub primary_key: String,
}

impl TableSchema {
    /// Validate and build a schema
    pub fn new(name: String, columns: Vec<ColumnDef>, primary_key: String) -> Result<Self> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&col.name))
            {
                return Err(Status::invalid_argument(format!(
                    "duplicate column {} in table {}",
                    col.name, name
                )));
            }
        }
        if !columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&primary_key))
        {
            return Err(Status::invalid_argument(format!(
                "primary key column {} is not defined in table {}",
                primary_key, name
            )));
        }
        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    /// Index of `column`, case-insensitive
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                Status::invalid_argument(format!(
                    "column not found in table {}: {}",
                    self.name, column
                ))
            })
    }

    /// Index of the primary key column
    pub fn key_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&self.primary_key))
            .unwrap_or(0)
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Table contents keyed by primary key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Definition
    pub schema: TableSchema,
    /// Rows, each a full value vector in column order
    pub rows: BTreeMap<i64, Vec<Value>>,
}

impl Table {
    /// Empty table
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    /// Insert a row, failing if the key already exists
    ///
    /// Omitted nullable columns are stored as NULL.
    pub fn insert(&mut self, columns: &[String], values: &[Value]) -> Result<i64> {
        if columns.len() != values.len() {
            return Err(Status::invalid_argument(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        let mut row = vec![Value::Null; self.schema.columns.len()];
        let mut provided = vec![false; self.schema.columns.len()];
        for (column, value) in columns.iter().zip(values) {
            let idx = self.schema.column_index(column)?;
            if provided[idx] {
                return Err(Status::invalid_argument(format!(
                    "column {} specified more than once",
                    column
                )));
            }
            provided[idx] = true;
            row[idx] = *value;
        }
        for (idx, col) in self.schema.columns.iter().enumerate() {
            if !col.nullable && row[idx] == Value::Null {
                return Err(Status::failed_precondition(format!(
                    "{}.{} must not be NULL",
                    self.schema.name, col.name
                )));
            }
        }
        let key = row[self.schema.key_index()].as_i64().ok_or_else(|| {
            Status::failed_precondition(format!(
                "primary key {} must not be NULL",
                self.schema.primary_key
            ))
        })?;
        if self.rows.contains_key(&key) {
            return Err(Status::already_exists(format!(
                "row {{{}}} in table {} already exists",
                key, self.schema.name
            )));
        }
        self.rows.insert(key, row);
        Ok(key)
    }

    /// Remove a row; returns whether it existed
    pub fn delete(&mut self, key: Key) -> bool {
        self.rows.remove(&key.0).is_some()
    }

    /// Apply assignments to an existing row; returns whether it existed
    pub fn update(&mut self, key: Key, assignments: &[(String, Value)]) -> Result<bool> {
        let key_index = self.schema.key_index();
        let mut resolved = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let idx = self.schema.column_index(column)?;
            if idx == key_index {
                return Err(Status::invalid_argument(format!(
                    "cannot update primary key column {}",
                    column
                )));
            }
            if !self.schema.columns[idx].nullable && *value == Value::Null {
                return Err(Status::failed_precondition(format!(
                    "{}.{} must not be NULL",
                    self.schema.name, column
                )));
            }
            resolved.push((idx, *value));
        }
        match self.rows.get_mut(&key.0) {
            Some(row) => {
                for (idx, value) in resolved {
                    row[idx] = value;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a row with this key exists
    pub fn contains(&self, key: Key) -> bool {
        self.rows.contains_key(&key.0)
    }

    /// Project the requested columns of one row
    pub fn read(&self, key: Key, columns: &[&str]) -> Result<Option<Row>> {
        let indexes = columns
            .iter()
            .map(|c| self.schema.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.rows.get(&key.0).map(|row| {
            Row::new(
                indexes
                    .iter()
                    .map(|&i| self.schema.columns[i].name.clone())
                    .collect(),
                indexes.iter().map(|&i| row[i]).collect(),
            )
        }))
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Instance metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMeta {
    /// Instance config name
    pub config: String,
    /// Display name
    pub display_name: String,
    /// Node count
    pub node_count: u32,
}

/// One database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Tables keyed by declared name
    pub tables: BTreeMap<String, Table>,
}

impl DatabaseState {
    /// Look up a table, case-insensitive
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .values()
            .find(|t| t.schema.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Status::not_found(format!("table not found: {}", name)))
    }

    /// Look up a table for writing, case-insensitive
    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .values_mut()
            .find(|t| t.schema.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Status::not_found(format!("table not found: {}", name)))
    }

    /// Add a table, failing if one with the same name exists
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        if self.table(&schema.name).is_ok() {
            return Err(Status::already_exists(format!(
                "table {} already exists",
                schema.name
            )));
        }
        self.tables.insert(schema.name.clone(), Table::new(schema));
        Ok(())
    }
}

/// Entire persisted backend state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Last allocated commit version
    pub commit_version: u64,
    /// Instances keyed by `projects/p/instances/i`
    pub instances: BTreeMap<String, InstanceMeta>,
    /// Databases keyed by full database name
    pub databases: BTreeMap<String, DatabaseState>,
}

impl Catalog {
    /// Look up a database by full name
    pub fn database(&self, name: &str) -> Result<&DatabaseState> {
        self.databases
            .get(name)
            .ok_or_else(|| Status::not_found(format!("database not found: {}", name)))
    }

    /// Look up a database for writing by full name
    pub fn database_mut(&mut self, name: &str) -> Result<&mut DatabaseState> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("database not found: {}", name)))
    }

    /// Allocate the next commit version
    pub fn allocate_version(&mut self) -> u64 {
        self.commit_version += 1;
        self.commit_version
    }
}

// ============================================================================
// Store
// ============================================================================

/// Handle on a data directory holding a [`Catalog`]
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

/// Holds an advisory lock until dropped
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl Store {
    /// Attach to an existing data directory
    ///
    /// A missing directory means the backend is not running.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Status::unavailable(format!(
                "backend is not running: no data directory at {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `f` against a consistent snapshot of the catalog
    pub fn read<T>(&self, f: impl FnOnce(&Catalog) -> Result<T>) -> Result<T> {
        let _guard = self.lock(false)?;
        let catalog = self.load()?;
        f(&catalog)
    }

    /// Read-modify-write the catalog atomically
    ///
    /// Nothing is written if `f` fails.
    pub fn update<T>(&self, f: impl FnOnce(&mut Catalog) -> Result<T>) -> Result<T> {
        let _guard = self.lock(true)?;
        let mut catalog = self.load()?;
        let out = f(&mut catalog)?;
        self.save(&catalog)?;
        Ok(out)
    }

    fn lock(&self, exclusive: bool) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.dir.join(LOCK_FILE_NAME))?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(LockGuard { file })
    }

    fn load(&self) -> Result<Catalog> {
        match fs::read(self.dir.join(CATALOG_FILE_NAME)) {
            Ok(bytes) => Ok(rmp_serde::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Catalog::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(catalog)?;
        let tmp = self.dir.join(CATALOG_TMP_FILE_NAME);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.dir.join(CATALOG_FILE_NAME))?;
        Ok(())
    }
}
