//! End-to-end matrix runs against a file-backed emulator.

#[path = "../common/mod.rs"]
mod common;

mod end_to_end;
mod isolation;
mod report;
