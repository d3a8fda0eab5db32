//! Scenario outcomes and PASS/BUG classification
//!
//! A scenario run ends in exactly one [`ScenarioOutcome`]. When the runner is
//! an isolated process, the outcome is flattened into a single final output
//! line and the orchestrator classifies from that line alone:
//!
//! ```text
//! final line == "PASS"  -> Verdict::Pass
//! anything else         -> Verdict::Bug
//! ```

use crate::point::ScenarioPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The exact line a passing scenario emits last
pub const PASS_LINE: &str = "PASS";

/// Prefix of the final line of a runner that never reached the backend
pub const SETUP_PREFIX: &str = "Setup: ";

/// Classification of one scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Row confirmed gone after the delete
    Pass,
    /// Anything else
    Bug,
}

impl Verdict {
    /// Report spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Bug => "BUG",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a run from its final output line
pub fn classify_line(line: &str) -> Verdict {
    if line == PASS_LINE {
        Verdict::Pass
    } else {
        Verdict::Bug
    }
}

/// Message of a runner's setup failure line, `None` for any other line
pub fn setup_failure(line: &str) -> Option<&str> {
    line.strip_prefix(SETUP_PREFIX)
}

/// Last line of `output`, or `""` when there is none
///
/// A trailing newline terminates the last line rather than starting an
/// empty one; a trailing `\r` is part of the line terminator.
pub fn final_line(output: &str) -> &str {
    output.lines().last().unwrap_or("")
}

/// Scenario step an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Instance/database creation inside the runner
    Setup,
    /// Insert of the scenario row
    Insert,
    /// Delete of the scenario row
    Delete,
    /// Verification point read
    Read,
    /// Decoding the row returned by the verification read
    Scan,
}

impl Step {
    /// Label prefixed to errors from this step
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Setup => "setup",
            Step::Insert => "insert",
            Step::Delete => "delete",
            Step::Read => "read",
            Step::Scan => "scan",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one scenario run
///
/// Keeps the three non-PASS classes apart: a generic step failure, an
/// inconclusive verification read, and the data-loss defect itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// Verification read reported "not found"
    Pass,
    /// Delete reported success but the row is still readable
    DataLoss {
        /// Primary key that survived the delete
        key: i64,
    },
    /// Setup, insert or delete failed
    StepFailed {
        /// Failing step
        step: Step,
        /// Underlying error text
        message: String,
    },
    /// Verification read failed with something other than "not found"
    Inconclusive {
        /// Read or scan
        step: Step,
        /// Underlying error text
        message: String,
    },
}

impl ScenarioOutcome {
    /// PASS iff the row was confirmed gone
    pub fn verdict(&self) -> Verdict {
        match self {
            ScenarioOutcome::Pass => Verdict::Pass,
            _ => Verdict::Bug,
        }
    }

    /// Whether this is the defect the harness hunts for
    pub fn is_data_loss(&self) -> bool {
        matches!(self, ScenarioOutcome::DataLoss { .. })
    }

    /// Error text when the runner failed before the scenario started
    pub fn setup_failure(&self) -> Option<&str> {
        match self {
            ScenarioOutcome::StepFailed {
                step: Step::Setup,
                message,
            } => Some(message),
            _ => None,
        }
    }

    /// Single line a runner process prints last for this outcome
    pub fn final_line(&self) -> String {
        match self {
            ScenarioOutcome::Pass => PASS_LINE.to_string(),
            ScenarioOutcome::DataLoss { key } => format!(
                "FAIL: BUG: row PK={} still exists after DELETE succeeded without error",
                key
            ),
            ScenarioOutcome::StepFailed {
                step: Step::Setup,
                message,
            } => format!("{}{}", SETUP_PREFIX, message),
            ScenarioOutcome::StepFailed { step, message }
            | ScenarioOutcome::Inconclusive { step, message } => {
                format!("FAIL: {}: {}", step, message)
            }
        }
    }
}

/// Classified result for one enumerated point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// The point that was run
    pub point: ScenarioPoint,
    /// PASS or BUG
    pub verdict: Verdict,
    /// Final line (or outcome line) the classification was derived from
    pub raw_label: String,
    /// Result has no confirmed expectation
    pub unverified: bool,
}

impl ScenarioResult {
    /// Build a result for `point` classified from `raw_label`
    pub fn from_line(point: ScenarioPoint, raw_label: impl Into<String>) -> Self {
        let raw_label = raw_label.into();
        Self {
            point,
            verdict: classify_line(&raw_label),
            unverified: point.is_unverified(),
            raw_label,
        }
    }

    /// Build a result for `point` from a structured outcome
    pub fn from_outcome(point: ScenarioPoint, outcome: &ScenarioOutcome) -> Self {
        Self {
            point,
            verdict: outcome.verdict(),
            raw_label: outcome.final_line(),
            unverified: point.is_unverified(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::DeleteMethod;
    use proptest::prelude::*;

    #[test]
    fn test_only_exact_pass_line_passes() {
        assert_eq!(classify_line("PASS"), Verdict::Pass);
        assert_eq!(classify_line(""), Verdict::Bug);
        assert_eq!(classify_line("PASS "), Verdict::Bug);
        assert_eq!(classify_line(" PASS"), Verdict::Bug);
        assert_eq!(classify_line("pass"), Verdict::Bug);
        assert_eq!(classify_line("PASS PASS"), Verdict::Bug);
        assert_eq!(classify_line("FAIL: delete: aborted"), Verdict::Bug);
    }

    #[test]
    fn test_final_line() {
        assert_eq!(final_line("INSERT\nDELETE\nPASS\n"), "PASS");
        assert_eq!(final_line("PASS\r\n"), "PASS");
        assert_eq!(final_line("PASS"), "PASS");
        assert_eq!(final_line(""), "");
        assert_eq!(final_line("PASS\n\n"), "");
        assert_eq!(final_line("PASS\nFAIL: read: boom\n"), "FAIL: read: boom");
    }

    #[test]
    fn test_outcome_lines_classify_consistently() {
        let outcomes = vec![
            ScenarioOutcome::Pass,
            ScenarioOutcome::DataLoss { key: 1 },
            ScenarioOutcome::StepFailed {
                step: Step::Delete,
                message: "commit: aborted".into(),
            },
            ScenarioOutcome::StepFailed {
                step: Step::Setup,
                message: "instance exists".into(),
            },
            ScenarioOutcome::Inconclusive {
                step: Step::Read,
                message: "unavailable".into(),
            },
        ];
        for outcome in outcomes {
            assert_eq!(classify_line(&outcome.final_line()), outcome.verdict());
        }
    }

    #[test]
    fn test_setup_failure_round_trips_through_line() {
        let outcome = ScenarioOutcome::StepFailed {
            step: Step::Setup,
            message: "code = Unavailable desc = backend is not running".into(),
        };
        let line = outcome.final_line();
        assert_eq!(setup_failure(&line), outcome.setup_failure());
        assert_eq!(
            setup_failure(&line),
            Some("code = Unavailable desc = backend is not running")
        );

        assert_eq!(setup_failure("PASS"), None);
        assert_eq!(setup_failure("FAIL: insert: boom"), None);
        assert_eq!(ScenarioOutcome::DataLoss { key: 1 }.setup_failure(), None);
    }

    #[test]
    fn test_data_loss_line_is_distinguishable() {
        let line = ScenarioOutcome::DataLoss { key: 1 }.final_line();
        assert!(line.contains("BUG: row PK=1 still exists"));
        let generic = ScenarioOutcome::Inconclusive {
            step: Step::Read,
            message: "deadline exceeded".into(),
        }
        .final_line();
        assert!(!generic.contains("BUG"));
        assert_eq!(generic, "FAIL: read: deadline exceeded");
    }

    #[test]
    fn test_result_flags_unverified_points() {
        let point = ScenarioPoint {
            delete: DeleteMethod::StmtMixed,
            ..ScenarioPoint::default()
        };
        let result = ScenarioResult::from_line(point, "PASS");
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.unverified);

        let result = ScenarioResult::from_outcome(ScenarioPoint::default(), &ScenarioOutcome::Pass);
        assert!(!result.unverified);
        assert_eq!(result.raw_label, "PASS");
    }

    proptest! {
        #[test]
        fn prop_any_other_line_is_bug(line in "\\PC*") {
            prop_assume!(line != PASS_LINE);
            prop_assert_eq!(classify_line(&line), Verdict::Bug);
        }
    }
}
