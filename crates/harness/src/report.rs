//! Matrix report
//!
//! Renders results as a fixed-width table:
//!
//! ```text
//! SESSIONS  DELETE         BEGIN     RESULT
//! -----------------------------------------
//! enabled   stmt-mutation  default   PASS
//! enabled   stmt-mutation  explicit  BUG
//!
//! 30 points: 28 pass, 2 bug
//! ```
//!
//! or as JSON with `{ variant, generated_at, axes, results, summary }`.

use crate::matrix::Variant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use txmatrix_core::{AxisKind, ScenarioResult, Verdict};

const RESULT_HEADER: &str = "RESULT";
const COLUMN_GAP: &str = "  ";

/// Pass/bug counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Points run
    pub total: usize,
    /// PASS results
    pub pass: usize,
    /// BUG results
    pub bug: usize,
    /// Results flagged unverified
    pub unverified: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} points: {} pass, {} bug",
            self.total, self.pass, self.bug
        )?;
        if self.unverified > 0 {
            write!(f, " ({} unverified)", self.unverified)?;
        }
        Ok(())
    }
}

/// Ordered results of one matrix run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixReport {
    /// Variant that was enumerated
    pub variant: Variant,
    /// When the run finished
    pub generated_at: DateTime<Utc>,
    /// Active axes, in column order
    pub axes: Vec<AxisKind>,
    /// One result per point, in enumeration order
    pub results: Vec<ScenarioResult>,
    /// Counts
    pub summary: Summary,
}

impl MatrixReport {
    /// Build a report stamped with the current time
    pub fn new(variant: Variant, axes: Vec<AxisKind>, results: Vec<ScenarioResult>) -> Self {
        let summary = Summary {
            total: results.len(),
            pass: results.iter().filter(|r| r.verdict == Verdict::Pass).count(),
            bug: results.iter().filter(|r| r.verdict == Verdict::Bug).count(),
            unverified: results.iter().filter(|r| r.unverified).count(),
        };
        Self {
            variant,
            generated_at: Utc::now(),
            axes,
            results,
            summary,
        }
    }

    /// Whether any point classified as BUG
    pub fn has_bugs(&self) -> bool {
        self.summary.bug > 0
    }

    fn result_cell(result: &ScenarioResult) -> String {
        if result.unverified {
            format!("{} (unverified)", result.verdict)
        } else {
            result.verdict.to_string()
        }
    }

    /// Fixed-width table followed by the summary line
    pub fn render_table(&self) -> String {
        let mut headers: Vec<&str> = self.axes.iter().map(AxisKind::header).collect();
        headers.push(RESULT_HEADER);

        let rows: Vec<Vec<String>> = self
            .results
            .iter()
            .map(|r| {
                let mut cells: Vec<String> = self
                    .axes
                    .iter()
                    .map(|axis| r.point.value(*axis).to_string())
                    .collect();
                cells.push(Self::result_cell(r));
                cells
            })
            .collect();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                rows.iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(h.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let format_line = |cells: &[&str]| -> String {
            let mut line = String::new();
            for (i, cell) in cells.iter().enumerate() {
                if i + 1 == cells.len() {
                    line.push_str(cell);
                } else {
                    let _ = write!(line, "{:<width$}{}", cell, COLUMN_GAP, width = widths[i]);
                }
            }
            line
        };

        let header_line = format_line(&headers);
        let mut out = String::new();
        out.push_str(&header_line);
        out.push('\n');
        out.push_str(&"-".repeat(header_line.len()));
        out.push('\n');
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            out.push_str(&format_line(&cells));
            out.push('\n');
        }
        out.push('\n');
        let _ = writeln!(out, "{}", self.summary);
        out
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
