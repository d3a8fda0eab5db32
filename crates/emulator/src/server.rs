//! File-backed backend
//!
//! [`Emulator`] implements [`Backend`] and [`AdminBackend`] over a
//! [`Store`]. Session and transaction tables live in memory and belong to
//! the process that opened the emulator; table data lives in the catalog
//! and is shared by every process attached to the same data directory.
//!
//! DML inside a transaction is recorded and replayed over a fresh snapshot
//! on every statement, which gives read-your-writes without a private copy
//! of the database. Commit replays the recorded DML and then applies the
//! buffered mutations under the catalog's exclusive lock.

use crate::config::EmulatorConfig;
use crate::error::{Result, Status};
use crate::mutation::Mutation;
use crate::rpc::{
    AdminBackend, Backend, CommitResponse, Operation, ResultSet, TransactionSelector,
};
use crate::sql::{self, KeyFilter, Statement};
use crate::store::{DatabaseState, InstanceMeta, Store, Table};
use crate::types::{DatabasePath, InstancePath, Key, Row, SessionId, TransactionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct SessionState {
    database: DatabasePath,
    multiplexed: bool,
}

/// How a transaction was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BeginKind {
    /// Standalone BeginTransaction RPC
    Rpc,
    /// Folded into the first statement
    Inline,
}

#[derive(Debug, Clone)]
struct TransactionState {
    session: SessionId,
    begin: BeginKind,
    mutation_key: Option<Mutation>,
    dml: Vec<Statement>,
}

/// In-process backend over a data directory
pub struct Emulator {
    store: Store,
    config: EmulatorConfig,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
    transactions: Mutex<HashMap<TransactionId, TransactionState>>,
    next_txn_id: AtomicU64,
}

impl Emulator {
    /// Attach to a running backend
    ///
    /// Fails with `Unavailable` when the data directory does not exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let store = Store::open(dir)?;
        let config = EmulatorConfig::load(store.dir())?;
        Ok(Self::with_config(store, config))
    }

    /// Attach with an explicit configuration
    pub fn with_config(store: Store, config: EmulatorConfig) -> Self {
        debug!(
            dir = %store.dir().display(),
            multiplexed_mutation_loss = config.multiplexed_mutation_loss,
            "emulator attached"
        );
        Self {
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            next_txn_id: AtomicU64::new(1),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Check that the catalog is readable
    pub fn ping(&self) -> Result<()> {
        self.store.read(|_| Ok(()))
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Number of open transactions
    pub fn transaction_count(&self) -> usize {
        self.transactions.lock().len()
    }

    fn session(&self, session: &SessionId) -> Result<SessionState> {
        self.sessions
            .lock()
            .get(session)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("session not found: {}", session)))
    }

    fn transaction(&self, session: &SessionId, id: TransactionId) -> Result<TransactionState> {
        let txns = self.transactions.lock();
        let txn = txns
            .get(&id)
            .ok_or_else(|| Status::not_found(format!("transaction not found: {}", id)))?;
        if &txn.session != session {
            return Err(Status::failed_precondition(format!(
                "transaction {} does not belong to session {}",
                id, session
            )));
        }
        Ok(txn.clone())
    }

    fn start_transaction(
        &self,
        session: &SessionId,
        begin: BeginKind,
        mutation_key: Option<Mutation>,
        dml: Vec<Statement>,
    ) -> TransactionId {
        let id = TransactionId(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        self.transactions.lock().insert(
            id,
            TransactionState {
                session: session.clone(),
                begin,
                mutation_key,
                dml,
            },
        );
        id
    }

    /// Whether the fault profile discards this commit's mutations
    fn loses_mutations(&self, session: &SessionState, txn: &TransactionState) -> bool {
        self.config.multiplexed_mutation_loss
            && session.multiplexed
            && txn.begin == BeginKind::Rpc
            && txn.mutation_key.is_none()
            && txn.dml.is_empty()
    }
}

fn check_key_filter(table: &Table, filter: &KeyFilter) -> Result<Key> {
    if !filter.column.eq_ignore_ascii_case(&table.schema.primary_key) {
        return Err(Status::invalid_argument(format!(
            "WHERE clause must compare the primary key {}, found {}",
            table.schema.primary_key, filter.column
        )));
    }
    Ok(Key(filter.value))
}

fn apply_statement(db: &mut DatabaseState, stmt: &Statement) -> Result<i64> {
    match stmt {
        Statement::Insert {
            table,
            columns,
            rows,
        } => {
            let table = db.table_mut(table)?;
            for values in rows {
                table.insert(columns, values)?;
            }
            Ok(rows.len() as i64)
        }
        Statement::Delete { table, filter } => {
            let table = db.table_mut(table)?;
            let key = check_key_filter(table, filter)?;
            Ok(table.delete(key) as i64)
        }
        Statement::Update {
            table,
            assignments,
            filter,
        } => {
            let table = db.table_mut(table)?;
            let key = check_key_filter(table, filter)?;
            Ok(table.update(key, assignments)? as i64)
        }
        Statement::CreateDatabase { .. } | Statement::CreateTable(_) => Err(
            Status::invalid_argument("DDL statements must be sent through the admin API"),
        ),
    }
}

fn apply_mutation(db: &mut DatabaseState, mutation: &Mutation) -> Result<()> {
    match mutation {
        Mutation::Insert {
            table,
            columns,
            values,
        } => {
            db.table_mut(table)?.insert(columns, values)?;
        }
        Mutation::Delete { table, key } => {
            db.table_mut(table)?.delete(*key);
        }
    }
    Ok(())
}

impl Backend for Emulator {
    fn create_session(&self, database: &DatabasePath, multiplexed: bool) -> Result<SessionId> {
        let name = database.to_string();
        self.store.read(|catalog| catalog.database(&name).map(|_| ()))?;
        let id = SessionId::generate(database);
        self.sessions.lock().insert(
            id.clone(),
            SessionState {
                database: database.clone(),
                multiplexed,
            },
        );
        debug!(session = %id, multiplexed, "session created");
        Ok(id)
    }

    fn delete_session(&self, session: &SessionId) -> Result<()> {
        if self.sessions.lock().remove(session).is_none() {
            return Err(Status::not_found(format!("session not found: {}", session)));
        }
        self.transactions
            .lock()
            .retain(|_, txn| &txn.session != session);
        debug!(session = %session, "session deleted");
        Ok(())
    }

    fn begin_transaction(
        &self,
        session: &SessionId,
        mutation_key: Option<&Mutation>,
    ) -> Result<TransactionId> {
        self.session(session)?;
        let id = self.start_transaction(session, BeginKind::Rpc, mutation_key.cloned(), Vec::new());
        debug!(
            session = %session,
            txn = %id,
            has_mutation_key = mutation_key.is_some(),
            "transaction begun"
        );
        Ok(id)
    }

    fn execute_sql(
        &self,
        session: &SessionId,
        selector: TransactionSelector,
        sql_text: &str,
    ) -> Result<ResultSet> {
        let state = self.session(session)?;
        let stmt = sql::parse(sql_text)?;
        if stmt.is_ddl() {
            return Err(Status::invalid_argument(
                "DDL statements must be sent through the admin API",
            ));
        }

        let prior = match selector {
            TransactionSelector::Begin => Vec::new(),
            TransactionSelector::Id(id) => self.transaction(session, id)?.dml,
            TransactionSelector::SingleUse => {
                return Err(Status::invalid_argument(
                    "DML requires a read-write transaction",
                ))
            }
        };

        let name = state.database.to_string();
        let rows_affected = self.store.read(|catalog| {
            let mut db = catalog.database(&name)?.clone();
            for earlier in &prior {
                apply_statement(&mut db, earlier)?;
            }
            apply_statement(&mut db, &stmt)
        })?;

        let transaction = match selector {
            TransactionSelector::Begin => {
                Some(self.start_transaction(session, BeginKind::Inline, None, vec![stmt]))
            }
            TransactionSelector::Id(id) => {
                if let Some(txn) = self.transactions.lock().get_mut(&id) {
                    txn.dml.push(stmt);
                }
                None
            }
            TransactionSelector::SingleUse => None,
        };
        debug!(session = %session, rows_affected, "statement executed");

        Ok(ResultSet {
            transaction,
            rows: Vec::new(),
            rows_affected,
        })
    }

    fn commit(
        &self,
        session: &SessionId,
        selector: TransactionSelector,
        mutations: Vec<Mutation>,
    ) -> Result<CommitResponse> {
        let state = self.session(session)?;
        let txn = match selector {
            TransactionSelector::Id(id) => {
                let txn = self.transaction(session, id)?;
                self.transactions.lock().remove(&id);
                Some((id, txn))
            }
            TransactionSelector::SingleUse => None,
            TransactionSelector::Begin => {
                return Err(Status::invalid_argument(
                    "commit requires a transaction id or a single-use transaction",
                ))
            }
        };

        let dml = txn.as_ref().map(|(_, t)| t.dml.clone()).unwrap_or_default();
        let mutations = match &txn {
            Some((id, t)) if self.loses_mutations(&state, t) => {
                warn!(
                    session = %session,
                    txn = %id,
                    dropped = mutations.len(),
                    "commit of explicitly begun multiplexed transaction discarded its mutations"
                );
                Vec::new()
            }
            _ => mutations,
        };

        let name = state.database.to_string();
        let commit_version = self.store.update(|catalog| {
            let db = catalog.database_mut(&name)?;
            for stmt in &dml {
                apply_statement(db, stmt)?;
            }
            for mutation in &mutations {
                apply_mutation(db, mutation)?;
            }
            Ok(catalog.allocate_version())
        })?;
        debug!(session = %session, commit_version, "committed");

        Ok(CommitResponse { commit_version })
    }

    fn rollback(&self, session: &SessionId, transaction: TransactionId) -> Result<()> {
        self.transaction(session, transaction)?;
        self.transactions.lock().remove(&transaction);
        debug!(session = %session, txn = %transaction, "rolled back");
        Ok(())
    }

    fn read(
        &self,
        session: &SessionId,
        table: &str,
        key: Key,
        columns: &[&str],
    ) -> Result<Option<Row>> {
        let state = self.session(session)?;
        let name = state.database.to_string();
        self.store
            .read(|catalog| catalog.database(&name)?.table(table)?.read(key, columns))
    }
}

impl AdminBackend for Emulator {
    fn create_instance(
        &self,
        instance: &InstancePath,
        meta: InstanceMeta,
    ) -> Result<Operation<InstancePath>> {
        if meta.node_count == 0 {
            return Err(Status::invalid_argument("node_count must be at least 1"));
        }
        let name = instance.to_string();
        let outcome = self.store.update(|catalog| {
            if catalog.instances.contains_key(&name) {
                return Err(Status::already_exists(format!(
                    "instance already exists: {}",
                    name
                )));
            }
            catalog.instances.insert(name.clone(), meta);
            Ok(instance.clone())
        });
        Ok(Operation::new(
            format!("{}/operations/{}", instance, uuid::Uuid::new_v4()),
            outcome,
        ))
    }

    fn create_database(
        &self,
        instance: &InstancePath,
        create_statement: &str,
        extra_statements: &[String],
    ) -> Result<Operation<DatabasePath>> {
        let database_id = match sql::parse(create_statement)? {
            Statement::CreateDatabase { name } => name,
            _ => {
                return Err(Status::invalid_argument(format!(
                    "expected CREATE DATABASE, got: {}",
                    create_statement
                )))
            }
        };
        let path = instance.database(database_id);

        let outcome = extra_statements
            .iter()
            .map(|ddl| match sql::parse(ddl)? {
                Statement::CreateTable(schema) => Ok(schema),
                _ => Err(Status::invalid_argument(format!(
                    "only CREATE TABLE is accepted as database DDL: {}",
                    ddl
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .and_then(|schemas| {
                let instance_name = instance.to_string();
                let name = path.to_string();
                self.store.update(|catalog| {
                    if !catalog.instances.contains_key(&instance_name) {
                        return Err(Status::not_found(format!(
                            "instance not found: {}",
                            instance_name
                        )));
                    }
                    if catalog.databases.contains_key(&name) {
                        return Err(Status::already_exists(format!(
                            "database already exists: {}",
                            name
                        )));
                    }
                    let mut db = DatabaseState::default();
                    for schema in schemas {
                        db.create_table(schema)?;
                    }
                    catalog.databases.insert(name, db);
                    Ok(path.clone())
                })
            });

        Ok(Operation::new(
            format!("{}/operations/{}", path, uuid::Uuid::new_v4()),
            outcome,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use tempfile::TempDir;

    const DDL: &str = "CREATE TABLE T (PK INT64 NOT NULL, Val INT64) PRIMARY KEY(PK)";

    fn setup(mutation_loss: bool) -> (TempDir, Emulator, DatabasePath) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let emu = Emulator::with_config(
            store,
            EmulatorConfig {
                multiplexed_mutation_loss: mutation_loss,
            },
        );
        let instance = InstancePath::new("p", "i");
        emu.create_instance(
            &instance,
            InstanceMeta {
                config: "emulator-config".into(),
                display_name: "Test Instance".into(),
                node_count: 1,
            },
        )
        .unwrap()
        .wait()
        .unwrap();
        let db = emu
            .create_database(&instance, "CREATE DATABASE `d`", &[DDL.to_string()])
            .unwrap()
            .wait()
            .unwrap();
        (dir, emu, db)
    }

    fn insert_row(emu: &Emulator, session: &SessionId) {
        emu.commit(
            session,
            TransactionSelector::SingleUse,
            vec![Mutation::insert(
                "T",
                &["PK", "Val"],
                vec![crate::types::Value::Int64(1), crate::types::Value::Int64(1)],
            )],
        )
        .unwrap();
    }

    fn row_exists(emu: &Emulator, session: &SessionId) -> bool {
        emu.read(session, "T", Key(1), &["PK"]).unwrap().is_some()
    }

    #[test]
    fn test_admin_already_exists() {
        let (_dir, emu, db) = setup(true);
        let err = emu
            .create_database(&db.instance, "CREATE DATABASE `d`", &[])
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.code, Code::AlreadyExists);
    }

    #[test]
    fn test_admin_missing_instance() {
        let (_dir, emu, _db) = setup(true);
        let other = InstancePath::new("p", "other");
        let err = emu
            .create_database(&other, "CREATE DATABASE `d`", &[])
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.code, Code::NotFound);
    }

    #[test]
    fn test_session_requires_database() {
        let (_dir, emu, db) = setup(true);
        let missing = db.instance.database("nope");
        assert!(emu.create_session(&missing, false).is_err());
    }

    #[test]
    fn test_inline_begin_dml_and_commit() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, true).unwrap();
        let rs = emu
            .execute_sql(
                &s,
                TransactionSelector::Begin,
                "INSERT INTO T (PK, Val) VALUES (1, 1)",
            )
            .unwrap();
        assert_eq!(rs.rows_affected, 1);
        let txn = rs.transaction.unwrap();
        assert!(!row_exists(&emu, &s));

        emu.commit(&s, TransactionSelector::Id(txn), vec![]).unwrap();
        assert!(row_exists(&emu, &s));
        assert_eq!(emu.transaction_count(), 0);
    }

    #[test]
    fn test_dml_reads_own_writes() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        let txn = emu
            .execute_sql(
                &s,
                TransactionSelector::Begin,
                "INSERT INTO T (PK, Val) VALUES (1, 1)",
            )
            .unwrap()
            .transaction
            .unwrap();
        let rs = emu
            .execute_sql(&s, TransactionSelector::Id(txn), "DELETE FROM T WHERE PK = 1")
            .unwrap();
        assert_eq!(rs.rows_affected, 1);
        emu.commit(&s, TransactionSelector::Id(txn), vec![]).unwrap();
        assert!(!row_exists(&emu, &s));
    }

    #[test]
    fn test_failed_dml_does_not_start_transaction() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        insert_row(&emu, &s);
        let err = emu
            .execute_sql(
                &s,
                TransactionSelector::Begin,
                "INSERT INTO T (PK, Val) VALUES (1, 2)",
            )
            .unwrap_err();
        assert_eq!(err.code, Code::AlreadyExists);
        assert_eq!(emu.transaction_count(), 0);
    }

    #[test]
    fn test_ddl_rejected_on_data_path() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        let err = emu
            .execute_sql(&s, TransactionSelector::Begin, DDL)
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }

    #[test]
    fn test_explicit_begin_on_multiplexed_loses_mutations() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, true).unwrap();
        insert_row(&emu, &s);

        let txn = emu.begin_transaction(&s, None).unwrap();
        emu.commit(
            &s,
            TransactionSelector::Id(txn),
            vec![Mutation::delete("T", Key(1))],
        )
        .unwrap();
        assert!(row_exists(&emu, &s));
    }

    #[test]
    fn test_mutation_key_avoids_loss() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, true).unwrap();
        insert_row(&emu, &s);

        let delete = Mutation::delete("T", Key(1));
        let txn = emu.begin_transaction(&s, Some(&delete)).unwrap();
        emu.commit(&s, TransactionSelector::Id(txn), vec![delete])
            .unwrap();
        assert!(!row_exists(&emu, &s));
    }

    #[test]
    fn test_pooled_session_never_loses_mutations() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        insert_row(&emu, &s);

        let txn = emu.begin_transaction(&s, None).unwrap();
        emu.commit(
            &s,
            TransactionSelector::Id(txn),
            vec![Mutation::delete("T", Key(1))],
        )
        .unwrap();
        assert!(!row_exists(&emu, &s));
    }

    #[test]
    fn test_fault_profile_disabled() {
        let (_dir, emu, db) = setup(false);
        let s = emu.create_session(&db, true).unwrap();
        insert_row(&emu, &s);

        let txn = emu.begin_transaction(&s, None).unwrap();
        emu.commit(
            &s,
            TransactionSelector::Id(txn),
            vec![Mutation::delete("T", Key(1))],
        )
        .unwrap();
        assert!(!row_exists(&emu, &s));
    }

    #[test]
    fn test_commit_versions_increase() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        let a = emu
            .commit(&s, TransactionSelector::SingleUse, vec![])
            .unwrap();
        let b = emu
            .commit(&s, TransactionSelector::SingleUse, vec![])
            .unwrap();
        assert!(b.commit_version > a.commit_version);
    }

    #[test]
    fn test_rollback_discards_dml() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        let txn = emu
            .execute_sql(
                &s,
                TransactionSelector::Begin,
                "INSERT INTO T (PK, Val) VALUES (1, 1)",
            )
            .unwrap()
            .transaction
            .unwrap();
        emu.rollback(&s, txn).unwrap();
        assert!(emu
            .commit(&s, TransactionSelector::Id(txn), vec![])
            .is_err());
        assert!(!row_exists(&emu, &s));
    }

    #[test]
    fn test_delete_session_drops_transactions() {
        let (_dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        emu.begin_transaction(&s, None).unwrap();
        assert_eq!(emu.transaction_count(), 1);
        emu.delete_session(&s).unwrap();
        assert_eq!(emu.transaction_count(), 0);
        assert_eq!(emu.session_count(), 0);
        assert!(emu.read(&s, "T", Key(1), &["PK"]).is_err());
    }

    #[test]
    fn test_state_shared_across_attachments() {
        let (dir, emu, db) = setup(true);
        let s = emu.create_session(&db, false).unwrap();
        insert_row(&emu, &s);

        let other = Emulator::open(dir.path()).unwrap();
        let s2 = other.create_session(&db, false).unwrap();
        assert!(row_exists(&other, &s2));
    }
}
