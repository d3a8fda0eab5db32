//! Client library
//!
//! [`Client`] is the surface scenario code programs against. It owns a
//! [`SessionPool`] and, when session multiplexing is enabled for read-write
//! transactions, one multiplexed session shared by all of them.
//!
//! ```text
//! read_write_transaction ──┐
//! begin_statement_txn ─────┼── RW session: multiplexed | pooled
//! apply ───────────────────┘
//! single().read_row ──────────  pooled session
//! ```

mod pool;
mod retry;
mod transaction;

pub use pool::{PooledSession, SessionPool};
pub use retry::RetryConfig;
pub use transaction::{
    BeginTransactionOption, ReadWriteTransaction, RowIterator, StatementTransaction,
    TransactionOptions,
};

use crate::error::{Code, Result, Status};
use crate::mutation::Mutation;
use crate::rpc::{Backend, CommitResponse, TransactionSelector};
use crate::types::{DatabasePath, Key, Row, SessionId};
use std::sync::Arc;
use tracing::{debug, info};
use transaction::RwSession;

/// Client construction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Use a multiplexed session for read-write transactions.
    /// `None` takes the library default, which is enabled.
    pub multiplexed_rw: Option<bool>,
    /// Sessions opened when the client is created
    pub min_sessions: usize,
    /// Upper bound on pooled sessions
    pub max_sessions: usize,
    /// Retry policy for aborted read-write transactions
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            multiplexed_rw: None,
            min_sessions: 1,
            max_sessions: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Effective multiplexing setting for read-write transactions
    pub fn multiplexed_for_rw(&self) -> bool {
        self.multiplexed_rw.unwrap_or(true)
    }
}

/// Connection to one database
pub struct Client {
    backend: Arc<dyn Backend>,
    database: DatabasePath,
    config: ClientConfig,
    pool: SessionPool,
    multiplexed: Option<SessionId>,
}

impl Client {
    /// Connect to `database`
    pub fn new(
        backend: Arc<dyn Backend>,
        database: DatabasePath,
        config: ClientConfig,
    ) -> Result<Self> {
        let pool = SessionPool::new(
            backend.as_ref(),
            database.clone(),
            config.min_sessions,
            config.max_sessions,
        )?;
        let multiplexed = if config.multiplexed_for_rw() {
            Some(backend.create_session(&database, true)?)
        } else {
            None
        };
        info!(
            database = %database,
            multiplexed_rw = config.multiplexed_for_rw(),
            "client connected"
        );
        Ok(Self {
            backend,
            database,
            config,
            pool,
            multiplexed,
        })
    }

    /// Database this client is bound to
    pub fn database(&self) -> &DatabasePath {
        &self.database
    }

    /// Construction options
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn rw_session(&self) -> Result<RwSession<'_>> {
        match &self.multiplexed {
            Some(id) => Ok(RwSession::Multiplexed(id)),
            None => Ok(RwSession::Pooled(self.pool.take(self.backend.as_ref())?)),
        }
    }

    /// Run `f` in a managed read-write transaction with default options
    pub fn read_write_transaction<T, F>(&self, f: F) -> Result<(CommitResponse, T)>
    where
        F: FnMut(&mut ReadWriteTransaction<'_>) -> Result<T>,
    {
        self.read_write_transaction_with_options(f, TransactionOptions::default())
    }

    /// Run `f` in a managed read-write transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    /// The whole attempt is retried when `f` or the commit fails with
    /// `Aborted`, up to `retry.max_retries` times.
    pub fn read_write_transaction_with_options<T, F>(
        &self,
        mut f: F,
        options: TransactionOptions,
    ) -> Result<(CommitResponse, T)>
    where
        F: FnMut(&mut ReadWriteTransaction<'_>) -> Result<T>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            let mut txn =
                ReadWriteTransaction::new(self.backend.as_ref(), self.rw_session()?, options);
            let outcome = match f(&mut txn) {
                Ok(value) => txn.commit().map(|resp| (resp, value)),
                Err(e) => {
                    if let Err(rollback_err) = txn.rollback() {
                        debug!(error = %rollback_err, "rollback after failed attempt");
                    }
                    Err(e)
                }
            };
            match outcome {
                Err(e) if e.code == Code::Aborted && attempt < retry.max_retries => {
                    debug!(attempt, error = %e, "read-write transaction aborted, retrying");
                    std::thread::sleep(retry.calculate_delay(attempt));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Start a transaction whose commit and rollback the caller issues
    pub fn begin_statement_transaction(
        &self,
        options: TransactionOptions,
    ) -> Result<StatementTransaction<'_>> {
        StatementTransaction::begin(self.backend.as_ref(), self.rw_session()?, options)
    }

    /// Commit `mutations` in a single-use transaction
    pub fn apply(&self, mutations: Vec<Mutation>) -> Result<CommitResponse> {
        let session = self.rw_session()?;
        self.backend
            .commit(session.id(), TransactionSelector::SingleUse, mutations)
    }

    /// Strongly-consistent single-use read context
    pub fn single(&self) -> ReadOnly<'_> {
        ReadOnly { client: self }
    }

    /// Release every session the client holds
    pub fn close(self) -> Result<()> {
        let mut result = self.pool.close(self.backend.as_ref());
        if let Some(id) = &self.multiplexed {
            if let Err(e) = self.backend.delete_session(id) {
                result = result.and(Err(e));
            }
        }
        debug!(database = %self.database, "client closed");
        result
    }
}

/// Single-use read-only context
pub struct ReadOnly<'a> {
    client: &'a Client,
}

impl ReadOnly<'_> {
    /// Read one row by primary key
    ///
    /// A missing row is a `NotFound` status.
    pub fn read_row(&self, table: &str, key: Key, columns: &[&str]) -> Result<Row> {
        let session = self.client.pool.take(self.client.backend.as_ref())?;
        self.client
            .backend
            .read(session.id(), table, key, columns)?
            .ok_or_else(|| {
                Status::not_found(format!("row not found(Table: {}, PrimaryKey: {})", table, key))
            })
    }
}
