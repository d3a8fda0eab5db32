//! txmatrix - matrix-driven verification of transactional delete durability
//!
//! Enumerates combinations of session multiplexing, insert method, delete
//! method and begin strategy, runs one insert/delete/verify scenario per
//! combination against a freshly reset backend, and reports which
//! combinations lose a delete that was reported successful.
//!
//! Scenarios run against the Cloud Spanner emulator when
//! `SPANNER_EMULATOR_HOST` is set, and against a file-backed local backend
//! otherwise.
//!
//! # Quick Start
//!
//! ```no_run
//! use txmatrix::prelude::*;
//!
//! let config = HarnessConfig::load(None)?;
//! let lifecycle = lifecycle_for(&config)?;
//! let executor = InProcessExecutor::new(config);
//!
//! let report = Orchestrator::new(&*lifecycle, &executor)
//!     .run(&MatrixSpec::for_variant(Variant::DeleteBegin))?;
//! print!("{}", report.render_table());
//! # Ok::<(), txmatrix::harness::HarnessError>(())
//! ```
//!
//! # Crates
//!
//! - `txmatrix-core` (re-exported at the root): axes, points, verdicts
//! - [`emulator`]: backend RPC surface, client library, emulator REST
//!   backend and the file-backed local backend
//! - [`harness`]: enumeration, reset, scenario runner, orchestration, report

pub mod prelude;

pub use txmatrix_core::*;
pub use txmatrix_emulator as emulator;
pub use txmatrix_harness as harness;
