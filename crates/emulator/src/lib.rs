//! Transactional backend and client library
//!
//! This crate is the subject the harness exercises:
//! - `rpc`: the narrow RPC surface (`Backend`, `AdminBackend`)
//! - `spanner_rest`: the Cloud Spanner emulator reached through its REST
//!   gateway (`SpannerRest`)
//! - `server`: a file-backed backend implementing the same surface
//!   (`Emulator`), used when no emulator is running and by the tests
//! - `client`: the client library (`Client`) with declarative transactions,
//!   statement-based transactions, single-shot apply and point reads
//!
//! Several processes may attach to the same data directory; the catalog is
//! shared through the file system while sessions stay process-local.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod mutation;
pub mod rpc;
pub mod server;
pub mod spanner_rest;
pub mod sql;
pub mod store;
pub mod types;

pub use client::{
    BeginTransactionOption, Client, ClientConfig, ReadWriteTransaction, RetryConfig,
    StatementTransaction, TransactionOptions,
};
pub use config::EmulatorConfig;
pub use error::{error_code, Code, Result, Status};
pub use mutation::Mutation;
pub use rpc::{AdminBackend, Backend, CommitResponse, Operation};
pub use server::Emulator;
pub use spanner_rest::SpannerRest;
pub use store::InstanceMeta;
pub use types::{DatabasePath, InstancePath, Key, Row, Value};
