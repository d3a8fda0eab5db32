//! Core types for txmatrix
//!
//! This crate defines the vocabulary shared by the harness, the emulator and
//! the CLI:
//! - Axes: SessionMode, BeginStrategy, InsertMethod, DeleteMethod
//! - ScenarioPoint: one value drawn from each axis
//! - Verdict / ScenarioOutcome / ScenarioResult: what a run produced
//! - Error: axis parse errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod error;
pub mod point;
pub mod verdict;

pub use axis::{AxisKind, BeginStrategy, DeleteMethod, InsertMethod, SessionMode};
pub use error::{ParseAxisError, Result};
pub use point::ScenarioPoint;
pub use verdict::{
    classify_line, final_line, setup_failure, ScenarioOutcome, ScenarioResult, Step, Verdict,
    PASS_LINE, SETUP_PREFIX,
};

/// Primary key of the row every scenario inserts and then deletes.
pub const SCENARIO_KEY: i64 = 1;

/// Value stored alongside [`SCENARIO_KEY`] by the insert step.
pub const SCENARIO_VALUE: i64 = 1;
