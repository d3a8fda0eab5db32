//! Scenario runner
//!
//! One run inserts the scenario row, deletes it with the point's method
//! and begin strategy, then reads it back:
//!
//! ```text
//! insert(PK=1, Val=1) ──► delete(PK=1) ──► read PK=1
//!                                            ├─ NotFound    → Pass
//!                                            ├─ row present → DataLoss
//!                                            └─ other error → Inconclusive
//! ```
//!
//! Any insert or delete failure ends the run as `StepFailed`.

use crate::bootstrap::bootstrap;
use crate::config::HarnessConfig;
use crate::error::StepError;
use crate::target::BackendTarget;
use tracing::{info, warn};
use txmatrix_core::{
    BeginStrategy, DeleteMethod, InsertMethod, ScenarioOutcome, ScenarioPoint, Step,
    SCENARIO_KEY, SCENARIO_VALUE,
};
use txmatrix_emulator::client::{
    BeginTransactionOption, Client, StatementTransaction, TransactionOptions,
};
use txmatrix_emulator::{Code, Key, Mutation, Status};

fn transaction_options(begin: BeginStrategy) -> TransactionOptions {
    TransactionOptions {
        begin: match begin {
            BeginStrategy::Default => BeginTransactionOption::Default,
            BeginStrategy::Inlined => BeginTransactionOption::Inlined,
            BeginStrategy::Explicit => BeginTransactionOption::Explicit,
        },
    }
}

/// Prefix a status message with the operation that failed
fn during(action: &'static str) -> impl FnOnce(Status) -> Status {
    move |s| Status::new(s.code, format!("{}: {}", action, s.message))
}

/// Commit a statement-based transaction, rolling it back if `work` fails
fn run_statement_transaction(
    mut txn: StatementTransaction<'_>,
    work: impl FnOnce(&mut StatementTransaction<'_>) -> Result<(), Status>,
) -> Result<(), Status> {
    if let Err(e) = work(&mut txn) {
        if let Err(rollback) = txn.rollback() {
            warn!(error = %rollback, "rollback failed");
        }
        return Err(e);
    }
    txn.commit().map(|_| ()).map_err(during("commit"))
}

/// Drives one point against a connected client
pub struct ScenarioRunner<'a> {
    client: &'a Client,
    table: &'a str,
}

impl<'a> ScenarioRunner<'a> {
    /// Runner writing to `table`
    pub fn new(client: &'a Client, table: &'a str) -> Self {
        Self { client, table }
    }

    /// Insert, delete, verify
    pub fn run(&self, point: &ScenarioPoint) -> ScenarioOutcome {
        let steps = self
            .insert(point)
            .map_err(StepError::at(Step::Insert))
            .and_then(|()| self.delete(point).map_err(StepError::at(Step::Delete)));
        if let Err(e) = steps {
            warn!(step = %e.step, error = %e.status, "scenario step failed");
            return ScenarioOutcome::StepFailed {
                step: e.step,
                message: e.status.to_string(),
            };
        }
        self.verify()
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (PK, Val) VALUES ({}, {})",
            self.table, SCENARIO_KEY, SCENARIO_VALUE
        )
    }

    fn delete_mutation(&self) -> Mutation {
        Mutation::delete(self.table, Key(SCENARIO_KEY))
    }

    /// Step 1
    pub fn insert(&self, point: &ScenarioPoint) -> Result<(), Status> {
        info!("INSERT: {}", point.insert.describe());
        let sql = self.insert_sql();
        match point.insert {
            InsertMethod::RwDml => self
                .client
                .read_write_transaction(|txn| txn.update(&sql))
                .map(|_| ()),
            InsertMethod::StmtDml => {
                let txn = self
                    .client
                    .begin_statement_transaction(transaction_options(point.begin))
                    .map_err(during("begin"))?;
                run_statement_transaction(txn, |txn| {
                    txn.query(&sql).map(|rows| rows.for_each(drop)).map_err(during("query"))
                })
            }
        }
    }

    /// Step 2
    pub fn delete(&self, point: &ScenarioPoint) -> Result<(), Status> {
        if point.delete.accepts_begin_strategy() {
            info!("DELETE: {} (begin={})", point.delete.describe(), point.begin);
        } else {
            info!("DELETE: {} (begin option N/A)", point.delete.describe());
        }
        let options = transaction_options(point.begin);
        match point.delete {
            DeleteMethod::StmtMutation => {
                let txn = self
                    .client
                    .begin_statement_transaction(options)
                    .map_err(during("begin"))?;
                run_statement_transaction(txn, |txn| {
                    txn.buffer_write(vec![self.delete_mutation()]);
                    Ok(())
                })
            }
            DeleteMethod::RwMutation => self
                .client
                .read_write_transaction_with_options(
                    |txn| {
                        txn.buffer_write(vec![self.delete_mutation()]);
                        Ok(())
                    },
                    options,
                )
                .map(|_| ()),
            DeleteMethod::Apply => self.client.apply(vec![self.delete_mutation()]).map(|_| ()),
            DeleteMethod::StmtDml => {
                let sql = format!("DELETE FROM {} WHERE PK = {}", self.table, SCENARIO_KEY);
                let txn = self
                    .client
                    .begin_statement_transaction(options)
                    .map_err(during("begin"))?;
                run_statement_transaction(txn, |txn| {
                    txn.query(&sql).map(|rows| rows.for_each(drop)).map_err(during("query"))
                })
            }
            DeleteMethod::StmtMixed => {
                let sql = format!(
                    "UPDATE {} SET Val = {} WHERE PK = {}",
                    self.table,
                    SCENARIO_VALUE + 1,
                    SCENARIO_KEY
                );
                let txn = self
                    .client
                    .begin_statement_transaction(options)
                    .map_err(during("begin"))?;
                run_statement_transaction(txn, |txn| {
                    txn.update(&sql).map_err(during("update"))?;
                    txn.buffer_write(vec![self.delete_mutation()]);
                    Ok(())
                })
            }
        }
    }

    /// Step 3
    pub fn verify(&self) -> ScenarioOutcome {
        let row = match self
            .client
            .single()
            .read_row(self.table, Key(SCENARIO_KEY), &["PK"])
        {
            Ok(row) => row,
            Err(e) if e.code == Code::NotFound => return ScenarioOutcome::Pass,
            Err(e) => {
                warn!(error = %e, "verification read failed");
                return ScenarioOutcome::Inconclusive {
                    step: Step::Read,
                    message: e.to_string(),
                };
            }
        };
        match row.column_i64(0) {
            Ok(key) => {
                warn!(key, "row still present after a successful delete");
                ScenarioOutcome::DataLoss { key }
            }
            Err(e) => ScenarioOutcome::Inconclusive {
                step: Step::Scan,
                message: e.to_string(),
            },
        }
    }
}

fn setup_failed(status: impl ToString) -> ScenarioOutcome {
    ScenarioOutcome::StepFailed {
        step: Step::Setup,
        message: status.to_string(),
    }
}

/// Run `point` against the backend `config` resolves to
///
/// Attaches to the backend, optionally bootstraps the schema, connects a
/// client configured for the point's session mode, runs the scenario and
/// closes the client. Failures before the insert are `Setup` failures.
pub fn run_point(config: &HarnessConfig, point: &ScenarioPoint, skip_setup: bool) -> ScenarioOutcome {
    let target = match BackendTarget::resolve(&config.backend) {
        Ok(target) => target,
        Err(e) => return setup_failed(e),
    };
    let connection = match target.connect(&config.backend) {
        Ok(connection) => connection,
        Err(e) => return setup_failed(e),
    };
    if !skip_setup {
        if let Err(e) = bootstrap(connection.admin(), &config.schema) {
            return setup_failed(e);
        }
    }
    let client = match Client::new(
        connection.backend(),
        config.schema.database_path(),
        config.client_config(point.session),
    ) {
        Ok(client) => client,
        Err(e) => return setup_failed(e),
    };

    let outcome = ScenarioRunner::new(&client, &config.schema.table).run(point);

    if let Err(e) = client.close() {
        warn!(error = %e, "client close failed");
    }
    outcome
}
