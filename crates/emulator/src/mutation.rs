//! Structured (non-SQL) writes
//!
//! Mutations are buffered client-side and shipped to the backend with the
//! commit request. They are applied after any DML the transaction executed.

use crate::types::{Key, Value};
use serde::{Deserialize, Serialize};

/// A buffered write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert a new row, failing if the key exists
    Insert {
        /// Target table
        table: String,
        /// Column names, must include the primary key
        columns: Vec<String>,
        /// Values parallel to `columns`
        values: Vec<Value>,
    },
    /// Delete the row with this primary key, no-op if absent
    Delete {
        /// Target table
        table: String,
        /// Primary key
        key: Key,
    },
}

impl Mutation {
    /// Delete-by-key mutation
    pub fn delete(table: impl Into<String>, key: Key) -> Self {
        Mutation::Delete {
            table: table.into(),
            key,
        }
    }

    /// Insert mutation
    pub fn insert(table: impl Into<String>, columns: &[&str], values: Vec<Value>) -> Self {
        Mutation::Insert {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    /// Table this mutation writes to
    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. } | Mutation::Delete { table, .. } => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let m = Mutation::delete("T", Key(1));
        assert_eq!(m.table(), "T");
        assert!(matches!(m, Mutation::Delete { key: Key(1), .. }));

        let m = Mutation::insert("T", &["PK", "Val"], vec![Value::Int64(1), Value::Int64(2)]);
        match m {
            Mutation::Insert { columns, values, .. } => {
                assert_eq!(columns, vec!["PK".to_string(), "Val".to_string()]);
                assert_eq!(values.len(), 2);
            }
            _ => panic!("expected insert"),
        }
    }
}
