//! Backend RPC surface
//!
//! The client library only talks to the backend through these two traits.
//! [`Backend`] covers sessions, transactions, statements, commit and point
//! reads; [`AdminBackend`] covers instance and database creation, which
//! complete as long-running [`Operation`]s.

use crate::error::Result;
use crate::mutation::Mutation;
use crate::store::InstanceMeta;
use crate::types::{DatabasePath, InstancePath, Key, Row, SessionId, TransactionId};

/// Which transaction a statement or commit runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSelector {
    /// Start a read-write transaction as part of this request
    Begin,
    /// Use an already-started transaction
    Id(TransactionId),
    /// Run in a fresh transaction that ends with this request
    SingleUse,
}

/// Result of `execute_sql`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Transaction started by this request, when the selector was `Begin`
    pub transaction: Option<TransactionId>,
    /// Returned rows (DML returns none)
    pub rows: Vec<Row>,
    /// Rows inserted, updated or deleted
    pub rows_affected: i64,
}

/// Result of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResponse {
    /// Commit version assigned by the backend
    pub commit_version: u64,
}

/// Session and transaction RPCs
pub trait Backend: Send + Sync {
    /// Create a session on `database`
    fn create_session(&self, database: &DatabasePath, multiplexed: bool) -> Result<SessionId>;

    /// Delete a session and abandon its open transactions
    fn delete_session(&self, session: &SessionId) -> Result<()>;

    /// Standalone BeginTransaction RPC
    ///
    /// `mutation_key` identifies one of the mutations the transaction will
    /// commit. Callers that begin before knowing their writes pass `None`.
    fn begin_transaction(
        &self,
        session: &SessionId,
        mutation_key: Option<&Mutation>,
    ) -> Result<TransactionId>;

    /// Execute one SQL statement
    fn execute_sql(
        &self,
        session: &SessionId,
        selector: TransactionSelector,
        sql: &str,
    ) -> Result<ResultSet>;

    /// Commit a transaction together with its buffered mutations
    ///
    /// The selector must be `Id` or `SingleUse`.
    fn commit(
        &self,
        session: &SessionId,
        selector: TransactionSelector,
        mutations: Vec<Mutation>,
    ) -> Result<CommitResponse>;

    /// Abandon a transaction
    fn rollback(&self, session: &SessionId, transaction: TransactionId) -> Result<()>;

    /// Strongly-consistent point read, `None` when the row is absent
    fn read(
        &self,
        session: &SessionId,
        table: &str,
        key: Key,
        columns: &[&str],
    ) -> Result<Option<Row>>;
}

/// A long-running administrative operation
///
/// The work has been submitted; its outcome is only observed through
/// [`Operation::wait`], which may block while the backend finishes it.
#[must_use = "operations must be awaited to observe failures"]
pub struct Operation<T> {
    name: String,
    wait: Box<dyn FnOnce() -> Result<T> + Send>,
}

impl<T: Send + 'static> Operation<T> {
    /// Wrap a finished outcome
    pub fn new(name: impl Into<String>, outcome: Result<T>) -> Self {
        Self::pending(name, move || outcome)
    }

    /// Operation whose outcome is produced by `wait`
    pub fn pending(
        name: impl Into<String>,
        wait: impl FnOnce() -> Result<T> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            wait: Box::new(wait),
        }
    }
}

impl<T> Operation<T> {
    /// Operation resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the operation completes
    pub fn wait(self) -> Result<T> {
        (self.wait)()
    }
}

impl<T> std::fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").field("name", &self.name).finish()
    }
}

/// Instance and database administration
pub trait AdminBackend: Send + Sync {
    /// Create an instance
    fn create_instance(
        &self,
        instance: &InstancePath,
        meta: InstanceMeta,
    ) -> Result<Operation<InstancePath>>;

    /// Create a database from a `CREATE DATABASE` statement plus DDL
    fn create_database(
        &self,
        instance: &InstancePath,
        create_statement: &str,
        extra_statements: &[String],
    ) -> Result<Operation<DatabasePath>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;

    #[test]
    fn test_operation_wait_surfaces_outcome() {
        let op = Operation::new("operations/1", Ok(7));
        assert_eq!(op.name(), "operations/1");
        assert_eq!(op.wait().unwrap(), 7);

        let op: Operation<()> = Operation::new("operations/2", Err(Status::already_exists("x")));
        assert!(op.wait().is_err());
    }

    #[test]
    fn test_pending_operation_runs_on_wait() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let polled = Arc::new(AtomicBool::new(false));
        let flag = polled.clone();
        let op = Operation::pending("operations/3", move || {
            flag.store(true, Ordering::SeqCst);
            Ok("done")
        });
        assert!(!polled.load(Ordering::SeqCst));
        assert_eq!(format!("{:?}", op), "Operation { name: \"operations/3\" }");
        assert_eq!(op.wait().unwrap(), "done");
        assert!(polled.load(Ordering::SeqCst));
    }
}
