//! Cloud Spanner emulator over its REST gateway
//!
//! The emulator serves the `v1` REST surface next to gRPC, on port 9020 by
//! default (gRPC listens on 9010, the address `SPANNER_EMULATOR_HOST`
//! names). [`SpannerRest`] implements [`Backend`] and [`AdminBackend`] with
//! blocking `ureq` calls, so the client library drives the real backend the
//! same way it drives the file-backed one.
//!
//! Transaction ids on the wire are opaque strings. They are mapped to local
//! [`TransactionId`] handles, which the client library copies freely.

use crate::error::{Code, Result, Status};
use crate::mutation::Mutation;
use crate::rpc::{
    AdminBackend, Backend, CommitResponse, Operation, ResultSet, TransactionSelector,
};
use crate::store::InstanceMeta;
use crate::types::{DatabasePath, InstancePath, Key, Row, SessionId, TransactionId, Value};
use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Environment variable naming the emulator's gRPC address (`host:port`)
pub const EMULATOR_HOST_ENV: &str = "SPANNER_EMULATOR_HOST";

/// Port the emulator's REST gateway listens on
pub const DEFAULT_REST_PORT: u16 = 9020;

const OPERATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// REST base URL of the emulator whose gRPC address is `emulator_host`
///
/// `localhost:9010` becomes `http://localhost:9020`. Returns `None` for an
/// empty address.
pub fn rest_endpoint(emulator_host: &str, rest_port: u16) -> Option<String> {
    let host = emulator_host.trim();
    let host = host.strip_prefix("http://").unwrap_or(host);
    let host = host.trim_end_matches('/');
    if host.is_empty() {
        return None;
    }
    let name = match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    };
    Some(format!("http://{}:{}", name, rest_port))
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Clone)]
struct Http {
    agent: ureq::Agent,
    base: String,
}

impl Http {
    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base, path)
    }

    fn post(&self, path: &str, body: &Json) -> Result<Json> {
        let url = self.url(path);
        let bytes = serde_json::to_vec(body)
            .map_err(|e| Status::internal(format!("failed to encode request: {}", e)))?;
        debug!(%url, "POST");
        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(&bytes[..])
            .map_err(transport(&url))?;
        read_response(&url, response)
    }

    fn get(&self, path: &str) -> Result<Json> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.agent.get(&url).call().map_err(transport(&url))?;
        read_response(&url, response)
    }

    fn delete(&self, path: &str) -> Result<Json> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        let response = self.agent.delete(&url).call().map_err(transport(&url))?;
        read_response(&url, response)
    }
}

fn transport(url: &str) -> impl FnOnce(ureq::Error) -> Status + '_ {
    move |e| Status::unavailable(format!("{}: {}", url, e))
}

fn read_response(url: &str, mut response: ureq::http::Response<ureq::Body>) -> Result<Json> {
    let code = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(transport(url))?;
    if !(200..300).contains(&code) {
        return Err(error_status(code, &text));
    }
    if text.trim().is_empty() {
        return Ok(Json::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| Status::internal(format!("invalid JSON from {}: {}", url, e)))
}

// ============================================================================
// Status mapping
// ============================================================================

fn code_from_name(name: &str) -> Option<Code> {
    Some(match name {
        "NOT_FOUND" => Code::NotFound,
        "ALREADY_EXISTS" => Code::AlreadyExists,
        "INVALID_ARGUMENT" | "OUT_OF_RANGE" => Code::InvalidArgument,
        "FAILED_PRECONDITION" => Code::FailedPrecondition,
        "ABORTED" => Code::Aborted,
        "UNAVAILABLE" | "DEADLINE_EXCEEDED" => Code::Unavailable,
        "INTERNAL" | "UNKNOWN" | "DATA_LOSS" => Code::Internal,
        _ => return None,
    })
}

fn code_from_grpc(code: u64) -> Option<Code> {
    Some(match code {
        3 | 11 => Code::InvalidArgument,
        4 | 14 => Code::Unavailable,
        5 => Code::NotFound,
        6 => Code::AlreadyExists,
        9 => Code::FailedPrecondition,
        10 => Code::Aborted,
        2 | 13 | 15 => Code::Internal,
        _ => return None,
    })
}

fn code_from_http(code: u64) -> Option<Code> {
    Some(match code {
        400 => Code::InvalidArgument,
        404 => Code::NotFound,
        409 => Code::AlreadyExists,
        412 => Code::FailedPrecondition,
        500 => Code::Internal,
        503 | 504 => Code::Unavailable,
        _ => return None,
    })
}

/// Status of a failed HTTP call
///
/// Accepts the Google API envelope (`{"error": {"status": ..}}`) and the
/// bare gateway form (`{"code": <grpc code>, "message": ..}`), falling back
/// to the HTTP status.
fn error_status(http: u16, body: &str) -> Status {
    let parsed: Option<Json> = serde_json::from_str(body).ok();
    let (code, message) = match &parsed {
        Some(json) => match json.get("error") {
            Some(Json::Object(err)) => (
                err.get("status")
                    .and_then(Json::as_str)
                    .and_then(code_from_name)
                    .or_else(|| err.get("code").and_then(Json::as_u64).and_then(code_from_http)),
                err.get("message").and_then(Json::as_str),
            ),
            _ => (
                json.get("code").and_then(Json::as_u64).and_then(code_from_grpc),
                json.get("message").and_then(Json::as_str),
            ),
        },
        None => (None, None),
    };
    let code = code
        .or_else(|| code_from_http(u64::from(http)))
        .unwrap_or(Code::Internal);
    let message = match message {
        Some(message) => message.to_string(),
        None => format!("HTTP {}: {}", http, body.trim()),
    };
    Status::new(code, message)
}

/// Status carried by a finished long-running operation
fn rpc_status(err: &Json) -> Status {
    let code = err
        .get("code")
        .and_then(Json::as_u64)
        .and_then(code_from_grpc)
        .unwrap_or(Code::Internal);
    let message = err
        .get("message")
        .and_then(Json::as_str)
        .unwrap_or("operation failed");
    Status::new(code, message)
}

// ============================================================================
// Encoding
// ============================================================================

fn value_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        // INT64 travels as a decimal string
        Value::Int64(v) => Json::String(v.to_string()),
    }
}

fn key_set(key: Key) -> Json {
    json!({ "keys": [[key.0.to_string()]] })
}

fn mutation_json(mutation: &Mutation) -> Json {
    match mutation {
        Mutation::Insert {
            table,
            columns,
            values,
        } => json!({
            "insert": {
                "table": table,
                "columns": columns,
                "values": [values.iter().map(value_json).collect::<Vec<_>>()],
            }
        }),
        Mutation::Delete { table, key } => json!({
            "delete": { "table": table, "keySet": key_set(*key) }
        }),
    }
}

fn decode_value(cell: &Json) -> Result<Value> {
    match cell {
        Json::Null => Ok(Value::Null),
        Json::String(s) => s
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|_| Status::invalid_argument(format!("not an INT64 value: {:?}", s))),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int64)
            .ok_or_else(|| Status::invalid_argument(format!("not an INT64 value: {}", n))),
        other => Err(Status::invalid_argument(format!(
            "not an INT64 value: {}",
            other
        ))),
    }
}

fn decode_rows(result: &Json) -> Result<Vec<Row>> {
    let columns: Vec<String> = result
        .pointer("/metadata/rowType/fields")
        .and_then(Json::as_array)
        .map(|fields| {
            fields
                .iter()
                .map(|f| f.get("name").and_then(Json::as_str).unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();
    let Some(rows) = result.get("rows").and_then(Json::as_array) else {
        return Ok(Vec::new());
    };
    rows.iter()
        .map(|row| {
            let cells = row
                .as_array()
                .ok_or_else(|| Status::internal(format!("row is not an array: {}", row)))?;
            let values = cells.iter().map(decode_value).collect::<Result<Vec<_>>>()?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

fn int64_field(field: Option<&Json>) -> Option<i64> {
    match field? {
        Json::String(s) => s.parse().ok(),
        Json::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Commit timestamp in nanoseconds since the epoch
fn commit_version(response: &Json) -> Result<u64> {
    let ts = response
        .get("commitTimestamp")
        .and_then(Json::as_str)
        .ok_or_else(|| Status::internal("commit response has no commitTimestamp"))?;
    let parsed = chrono::DateTime::parse_from_rfc3339(ts)
        .map_err(|e| Status::internal(format!("invalid commitTimestamp {}: {}", ts, e)))?;
    parsed
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .ok_or_else(|| Status::internal(format!("commitTimestamp out of range: {}", ts)))
}

fn string_field<'a>(json: &'a Json, field: &str, what: &str) -> Result<&'a str> {
    json.get(field)
        .and_then(Json::as_str)
        .ok_or_else(|| Status::internal(format!("{} response has no {}", what, field)))
}

// ============================================================================
// Backend
// ============================================================================

/// Backend reached through the emulator's REST gateway
pub struct SpannerRest {
    http: Http,
    timeout: Duration,
    transactions: Mutex<HashMap<TransactionId, (SessionId, String)>>,
    next_handle: AtomicU64,
    seqno: AtomicI64,
}

impl SpannerRest {
    /// Connect to the gateway at `endpoint` (`http://host:port`)
    ///
    /// `timeout` bounds every request and every wait on a long-running
    /// operation.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        let base = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http: Http {
                agent: ureq::Agent::new_with_config(config),
                base,
            },
            timeout,
            transactions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            seqno: AtomicI64::new(1),
        }
    }

    /// Gateway base URL
    pub fn endpoint(&self) -> &str {
        &self.http.base
    }

    /// Check that the gateway answers admin calls for `project`
    pub fn ping(&self, project: &str) -> Result<()> {
        self.http
            .get(&format!("projects/{}/instanceConfigs", project))
            .map(|_| ())
    }

    /// Delete an instance together with its databases
    pub fn delete_instance(&self, instance: &InstancePath) -> Result<()> {
        self.http.delete(&instance.to_string()).map(|_| ())
    }

    fn register(&self, session: &SessionId, remote: String) -> TransactionId {
        let id = TransactionId(self.next_handle.fetch_add(1, Ordering::SeqCst));
        debug!(txn = %id, remote = %remote, "transaction begun");
        self.transactions
            .lock()
            .insert(id, (session.clone(), remote));
        id
    }

    fn remote_id(&self, session: &SessionId, id: TransactionId, release: bool) -> Result<String> {
        let mut txns = self.transactions.lock();
        match txns.get(&id) {
            None => Err(Status::not_found(format!("transaction not found: {}", id))),
            Some((owner, _)) if owner != session => Err(Status::failed_precondition(format!(
                "transaction {} does not belong to session {}",
                id, session
            ))),
            Some((_, remote)) if !release => Ok(remote.clone()),
            Some(_) => txns
                .remove(&id)
                .map(|(_, remote)| remote)
                .ok_or_else(|| Status::not_found(format!("transaction not found: {}", id))),
        }
    }

    fn selector_json(&self, session: &SessionId, selector: TransactionSelector) -> Result<Json> {
        Ok(match selector {
            TransactionSelector::Begin => json!({ "begin": { "readWrite": {} } }),
            TransactionSelector::Id(id) => json!({ "id": self.remote_id(session, id, false)? }),
            TransactionSelector::SingleUse => {
                json!({ "singleUse": { "readOnly": { "strong": true } } })
            }
        })
    }

    /// Wrap a long-running operation; `wait` polls it until done
    fn operation<T, F>(&self, op: Json, finish: F) -> Result<Operation<T>>
    where
        T: Send + 'static,
        F: FnOnce(Json) -> Result<T> + Send + 'static,
    {
        let name = string_field(&op, "name", "operation")?.to_string();
        let http = self.http.clone();
        let timeout = self.timeout;
        let polled = name.clone();
        Ok(Operation::pending(name, move || {
            let started = Instant::now();
            let mut op = op;
            loop {
                if op.get("done").and_then(Json::as_bool).unwrap_or(false) {
                    if let Some(err) = op.get("error") {
                        return Err(rpc_status(err));
                    }
                    return finish(op.get("response").cloned().unwrap_or(Json::Null));
                }
                if started.elapsed() >= timeout {
                    return Err(Status::unavailable(format!(
                        "operation {} not done after {:?}",
                        polled, timeout
                    )));
                }
                std::thread::sleep(OPERATION_POLL_INTERVAL);
                op = http.get(&polled)?;
            }
        }))
    }
}

impl Backend for SpannerRest {
    fn create_session(&self, database: &DatabasePath, multiplexed: bool) -> Result<SessionId> {
        let body = json!({ "session": { "multiplexed": multiplexed } });
        let session = self.http.post(&format!("{}/sessions", database), &body)?;
        let name = string_field(&session, "name", "create session")?;
        debug!(session = name, multiplexed, "session created");
        Ok(SessionId(name.to_string()))
    }

    fn delete_session(&self, session: &SessionId) -> Result<()> {
        self.transactions
            .lock()
            .retain(|_, (owner, _)| owner != session);
        self.http.delete(&session.0).map(|_| ())
    }

    fn begin_transaction(
        &self,
        session: &SessionId,
        mutation_key: Option<&Mutation>,
    ) -> Result<TransactionId> {
        let mut body = json!({ "options": { "readWrite": {} } });
        if let Some(key) = mutation_key {
            body["mutationKey"] = mutation_json(key);
        }
        let txn = self
            .http
            .post(&format!("{}:beginTransaction", session), &body)?;
        let remote = string_field(&txn, "id", "begin transaction")?;
        Ok(self.register(session, remote.to_string()))
    }

    fn execute_sql(
        &self,
        session: &SessionId,
        selector: TransactionSelector,
        sql: &str,
    ) -> Result<ResultSet> {
        let body = json!({
            "transaction": self.selector_json(session, selector)?,
            "sql": sql,
            "seqno": self.seqno.fetch_add(1, Ordering::SeqCst).to_string(),
        });
        let result = self.http.post(&format!("{}:executeSql", session), &body)?;
        let transaction = match selector {
            TransactionSelector::Begin => result
                .pointer("/metadata/transaction/id")
                .and_then(Json::as_str)
                .map(|remote| self.register(session, remote.to_string())),
            _ => None,
        };
        Ok(ResultSet {
            transaction,
            rows: decode_rows(&result)?,
            rows_affected: int64_field(result.pointer("/stats/rowCountExact")).unwrap_or(0),
        })
    }

    fn commit(
        &self,
        session: &SessionId,
        selector: TransactionSelector,
        mutations: Vec<Mutation>,
    ) -> Result<CommitResponse> {
        let mutations: Vec<Json> = mutations.iter().map(mutation_json).collect();
        let body = match selector {
            TransactionSelector::Id(id) => json!({
                "transactionId": self.remote_id(session, id, true)?,
                "mutations": mutations,
            }),
            TransactionSelector::SingleUse => json!({
                "singleUseTransaction": { "readWrite": {} },
                "mutations": mutations,
            }),
            TransactionSelector::Begin => {
                return Err(Status::invalid_argument(
                    "commit needs a begun or single-use transaction",
                ))
            }
        };
        let response = self.http.post(&format!("{}:commit", session), &body)?;
        Ok(CommitResponse {
            commit_version: commit_version(&response)?,
        })
    }

    fn rollback(&self, session: &SessionId, transaction: TransactionId) -> Result<()> {
        let remote = self.remote_id(session, transaction, true)?;
        self.http
            .post(
                &format!("{}:rollback", session),
                &json!({ "transactionId": remote }),
            )
            .map(|_| ())
    }

    fn read(
        &self,
        session: &SessionId,
        table: &str,
        key: Key,
        columns: &[&str],
    ) -> Result<Option<Row>> {
        let body = json!({
            "transaction": { "singleUse": { "readOnly": { "strong": true } } },
            "table": table,
            "columns": columns,
            "keySet": key_set(key),
        });
        let result = self.http.post(&format!("{}:read", session), &body)?;
        Ok(decode_rows(&result)?.into_iter().next())
    }
}

impl AdminBackend for SpannerRest {
    fn create_instance(
        &self,
        instance: &InstancePath,
        meta: InstanceMeta,
    ) -> Result<Operation<InstancePath>> {
        let body = json!({
            "instanceId": instance.instance,
            "instance": {
                "config": meta.config,
                "displayName": meta.display_name,
                "nodeCount": meta.node_count,
            },
        });
        let op = self
            .http
            .post(&format!("{}/instances", instance.parent()), &body)?;
        let path = instance.clone();
        self.operation(op, move |_| Ok(path))
    }

    fn create_database(
        &self,
        instance: &InstancePath,
        create_statement: &str,
        extra_statements: &[String],
    ) -> Result<Operation<DatabasePath>> {
        let body = json!({
            "createStatement": create_statement,
            "extraStatements": extra_statements,
        });
        let op = self.http.post(&format!("{}/databases", instance), &body)?;
        self.operation(op, |response| {
            DatabasePath::parse(string_field(&response, "name", "create database")?)
        })
    }
}
