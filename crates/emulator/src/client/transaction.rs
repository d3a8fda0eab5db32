//! Read-write transactions
//!
//! Both transaction flavours share one state machine: the transaction id is
//! unknown until something begins it. That is either an explicit
//! BeginTransaction RPC, the first statement (inline begin), or commit
//! itself, which begins a mutation-only transaction with its first mutation
//! as the mutation key.
//!
//! A statement-based transaction with an explicit begin sends the RPC when
//! it is created, before any of its writes are known. A managed transaction
//! with an explicit begin defers the RPC to its first statement, or to
//! commit when it only buffers mutations.

use super::pool::PooledSession;
use crate::error::{Result, Status};
use crate::mutation::Mutation;
use crate::rpc::{Backend, CommitResponse, ResultSet, TransactionSelector};
use crate::types::{Row, SessionId, TransactionId};
use tracing::debug;

/// How a statement-based transaction is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BeginTransactionOption {
    /// Library default, currently the same as `Inlined`
    #[default]
    Default,
    /// Begin with the first statement, or at commit for mutation-only work
    Inlined,
    /// Send a BeginTransaction RPC before any work
    Explicit,
}

/// Options for [`super::Client::begin_statement_transaction`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Begin strategy
    pub begin: BeginTransactionOption,
}

/// Session a read-write transaction runs on
pub(crate) enum RwSession<'a> {
    Multiplexed(&'a SessionId),
    Pooled(PooledSession<'a>),
}

impl RwSession<'_> {
    pub(crate) fn id(&self) -> &SessionId {
        match self {
            RwSession::Multiplexed(id) => *id,
            RwSession::Pooled(session) => session.id(),
        }
    }
}

struct TxnCore<'a> {
    backend: &'a dyn Backend,
    session: RwSession<'a>,
    id: Option<TransactionId>,
    mutations: Vec<Mutation>,
    explicit: bool,
}

impl<'a> TxnCore<'a> {
    fn new(backend: &'a dyn Backend, session: RwSession<'a>, options: TransactionOptions) -> Self {
        Self {
            backend,
            session,
            id: None,
            mutations: Vec::new(),
            explicit: options.begin == BeginTransactionOption::Explicit,
        }
    }

    fn begin_explicit(&mut self) -> Result<()> {
        let id = self.backend.begin_transaction(self.session.id(), None)?;
        debug!(txn = %id, "explicit begin");
        self.id = Some(id);
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        if self.id.is_none() && self.explicit {
            self.begin_explicit()?;
        }
        let selector = match self.id {
            Some(id) => TransactionSelector::Id(id),
            None => TransactionSelector::Begin,
        };
        let rs = self.backend.execute_sql(self.session.id(), selector, sql)?;
        if self.id.is_none() {
            let id = rs.transaction.ok_or_else(|| {
                Status::internal("backend did not return a transaction for an inline begin")
            })?;
            debug!(txn = %id, "inline begin");
            self.id = Some(id);
        }
        Ok(rs)
    }

    fn buffer(&mut self, mutations: Vec<Mutation>) {
        self.mutations.extend(mutations);
    }

    fn commit(&mut self) -> Result<CommitResponse> {
        let id = match self.id.take() {
            Some(id) => id,
            None => {
                let id = self
                    .backend
                    .begin_transaction(self.session.id(), self.mutations.first())?;
                debug!(txn = %id, "begin at commit");
                id
            }
        };
        let mutations = std::mem::take(&mut self.mutations);
        self.backend
            .commit(self.session.id(), TransactionSelector::Id(id), mutations)
    }

    fn rollback(&mut self) -> Result<()> {
        self.mutations.clear();
        match self.id.take() {
            Some(id) => self.backend.rollback(self.session.id(), id),
            None => Ok(()),
        }
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        self.id
    }
}

/// Transaction handed to the closure of
/// [`super::Client::read_write_transaction`]
///
/// Commit and rollback are managed by the client.
pub struct ReadWriteTransaction<'a> {
    core: TxnCore<'a>,
}

impl<'a> ReadWriteTransaction<'a> {
    pub(crate) fn new(
        backend: &'a dyn Backend,
        session: RwSession<'a>,
        options: TransactionOptions,
    ) -> Self {
        Self {
            core: TxnCore::new(backend, session, options),
        }
    }

    /// Execute a DML statement, returning the affected row count
    pub fn update(&mut self, sql: &str) -> Result<i64> {
        Ok(self.core.execute(sql)?.rows_affected)
    }

    /// Buffer mutations to be applied at commit
    pub fn buffer_write(&mut self, mutations: Vec<Mutation>) {
        self.core.buffer(mutations);
    }

    pub(crate) fn commit(&mut self) -> Result<CommitResponse> {
        self.core.commit()
    }

    pub(crate) fn rollback(&mut self) -> Result<()> {
        self.core.rollback()
    }
}

/// Rows returned by [`StatementTransaction::query`]
#[derive(Debug)]
pub struct RowIterator {
    rows: std::vec::IntoIter<Row>,
    rows_affected: i64,
}

impl RowIterator {
    /// Rows inserted, updated or deleted by the statement
    pub fn rows_affected(&self) -> i64 {
        self.rows_affected
    }
}

impl Iterator for RowIterator {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }
}

/// Transaction whose commit and rollback are issued by the caller
///
/// Dropping an uncommitted transaction rolls it back.
pub struct StatementTransaction<'a> {
    core: TxnCore<'a>,
    finished: bool,
}

impl<'a> StatementTransaction<'a> {
    pub(crate) fn begin(
        backend: &'a dyn Backend,
        session: RwSession<'a>,
        options: TransactionOptions,
    ) -> Result<Self> {
        let mut core = TxnCore::new(backend, session, options);
        if core.explicit {
            core.begin_explicit()?;
        }
        Ok(Self {
            core,
            finished: false,
        })
    }

    /// Execute a statement through the query path
    pub fn query(&mut self, sql: &str) -> Result<RowIterator> {
        let rs = self.core.execute(sql)?;
        Ok(RowIterator {
            rows: rs.rows.into_iter(),
            rows_affected: rs.rows_affected,
        })
    }

    /// Execute a DML statement, returning the affected row count
    pub fn update(&mut self, sql: &str) -> Result<i64> {
        Ok(self.core.execute(sql)?.rows_affected)
    }

    /// Buffer mutations to be applied at commit
    pub fn buffer_write(&mut self, mutations: Vec<Mutation>) {
        self.core.buffer(mutations);
    }

    /// Id of the backend transaction, once begun
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.core.transaction_id()
    }

    /// Commit the transaction
    pub fn commit(mut self) -> Result<CommitResponse> {
        self.finished = true;
        self.core.commit()
    }

    /// Roll the transaction back
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.core.rollback()
    }
}

impl Drop for StatementTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.core.rollback();
        }
    }
}
