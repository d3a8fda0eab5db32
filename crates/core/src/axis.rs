//! Configuration axes of the test matrix
//!
//! Each axis is a closed, ordered set of mutually exclusive values. The
//! declaration order of `ALL` is the enumeration order used by the matrix.
//!
//! | Axis | Values |
//! |------|--------|
//! | sessions | enabled, disabled, unset |
//! | insert | rw-dml, stmt-dml |
//! | delete | stmt-mutation, rw-mutation, apply, stmt-dml (+ stmt-mixed) |
//! | begin | default, inlined, explicit |

use crate::error::ParseAxisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names one dimension of the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisKind {
    /// Session multiplexing for read-write transactions
    Session,
    /// How the row is inserted
    Insert,
    /// How the row is deleted
    Delete,
    /// How the delete transaction is begun
    Begin,
}

impl AxisKind {
    /// Name used for flags and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            AxisKind::Session => "sessions",
            AxisKind::Insert => "insert",
            AxisKind::Delete => "delete",
            AxisKind::Begin => "begin",
        }
    }

    /// Fixed column header used by the report
    pub fn header(&self) -> &'static str {
        match self {
            AxisKind::Session => "SESSIONS",
            AxisKind::Insert => "INSERT",
            AxisKind::Delete => "DELETE",
            AxisKind::Begin => "BEGIN",
        }
    }
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implements `ALL`, `as_str`, `Display` and `FromStr` for an axis enum.
macro_rules! axis_values {
    ($ty:ident, $kind:expr, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every value of this axis, in enumeration order
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Axis this type belongs to
            pub const AXIS: AxisKind = $kind;

            /// Flag/label spelling of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseAxisError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ParseAxisError::new($kind, other, &[$($name),+])),
                }
            }
        }
    };
}

// ============================================================================
// SessionMode
// ============================================================================

/// Whether read-write transactions share one multiplexed session
///
/// This is a process-level toggle of the client library rather than a
/// per-transaction choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Read-write transactions use the multiplexed session
    Enabled,
    /// Read-write transactions take a pooled session each
    Disabled,
    /// Leave the choice to the client library default
    Unset,
}

axis_values!(SessionMode, AxisKind::Session, {
    Enabled => "enabled",
    Disabled => "disabled",
    Unset => "unset",
});

impl SessionMode {
    /// Explicit multiplexing choice, `None` for the client default
    pub fn multiplexed(&self) -> Option<bool> {
        match self {
            SessionMode::Enabled => Some(true),
            SessionMode::Disabled => Some(false),
            SessionMode::Unset => None,
        }
    }

    /// Value to export in the environment toggle, `None` means remove it
    pub fn env_value(&self) -> Option<&'static str> {
        self.multiplexed().map(|on| if on { "true" } else { "false" })
    }

    /// Parse the environment toggle
    ///
    /// Absent or empty means [`SessionMode::Unset`]. Accepts `true`/`false`
    /// as well as `enabled`/`disabled`, case-insensitively.
    pub fn from_env_value(value: Option<&str>) -> Result<Self, ParseAxisError> {
        let Some(raw) = value else {
            return Ok(SessionMode::Unset);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(SessionMode::Unset),
            "true" | "enabled" => Ok(SessionMode::Enabled),
            "false" | "disabled" => Ok(SessionMode::Disabled),
            _ => Err(ParseAxisError::new(
                AxisKind::Session,
                raw,
                &["true", "false", "enabled", "disabled"],
            )),
        }
    }
}

// ============================================================================
// BeginStrategy
// ============================================================================

/// How a read-write transaction's start is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BeginStrategy {
    /// Client decides
    Default,
    /// Begin folded into the first statement (or commit)
    Inlined,
    /// Separate BeginTransaction RPC before any work
    Explicit,
}

axis_values!(BeginStrategy, AxisKind::Begin, {
    Default => "default",
    Inlined => "inlined",
    Explicit => "explicit",
});

// ============================================================================
// InsertMethod
// ============================================================================

/// How the scenario row is inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertMethod {
    /// DML inside a managed (declarative) read-write transaction
    RwDml,
    /// DML through a query inside a statement-based transaction
    StmtDml,
}

axis_values!(InsertMethod, AxisKind::Insert, {
    RwDml => "rw-dml",
    StmtDml => "stmt-dml",
});

impl InsertMethod {
    /// Human description used in progress logs
    pub fn describe(&self) -> &'static str {
        match self {
            InsertMethod::RwDml => "ReadWriteTransaction (DML)",
            InsertMethod::StmtDml => "StmtBasedTransaction (DML)",
        }
    }
}

// ============================================================================
// DeleteMethod
// ============================================================================

/// How the scenario row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteMethod {
    /// Delete-by-key mutation in a statement-based transaction
    StmtMutation,
    /// Delete-by-key mutation in a declarative read-write transaction
    RwMutation,
    /// Delete-by-key mutation through single-shot apply
    Apply,
    /// SQL DELETE in a statement-based transaction
    StmtDml,
    /// SQL UPDATE plus delete-by-key mutation in one statement-based transaction
    StmtMixed,
}

axis_values!(DeleteMethod, AxisKind::Delete, {
    StmtMutation => "stmt-mutation",
    RwMutation => "rw-mutation",
    Apply => "apply",
    StmtDml => "stmt-dml",
    StmtMixed => "stmt-mixed",
});

impl DeleteMethod {
    /// The four methods covered by the standard variants
    pub const STANDARD: &'static [DeleteMethod] = &[
        DeleteMethod::StmtMutation,
        DeleteMethod::RwMutation,
        DeleteMethod::Apply,
        DeleteMethod::StmtDml,
    ];

    /// Single-shot apply manages its own transaction and has no begin option
    pub fn accepts_begin_strategy(&self) -> bool {
        !matches!(self, DeleteMethod::Apply)
    }

    /// Results for this method have no confirmed expectation yet
    pub fn is_unverified(&self) -> bool {
        matches!(self, DeleteMethod::StmtMixed)
    }

    /// Human description used in progress logs
    pub fn describe(&self) -> &'static str {
        match self {
            DeleteMethod::StmtMutation => "StmtBasedTransaction (BufferWrite)",
            DeleteMethod::RwMutation => "ReadWriteTransaction (BufferWrite)",
            DeleteMethod::Apply => "client.Apply",
            DeleteMethod::StmtDml => "StmtBasedTransaction (DML)",
            DeleteMethod::StmtMixed => "StmtBasedTransaction (DML + BufferWrite)",
        }
    }
}
