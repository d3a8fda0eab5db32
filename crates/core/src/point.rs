//! A single point of the test matrix

use crate::axis::{AxisKind, BeginStrategy, DeleteMethod, InsertMethod, SessionMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One value drawn from each axis
///
/// Axes that are not active in a variant hold their canonical value
/// (see [`ScenarioPoint::default`]). Points are created by enumeration,
/// consumed by exactly one scenario run and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioPoint {
    /// Session multiplexing toggle
    pub session: SessionMode,
    /// Insert method
    pub insert: InsertMethod,
    /// Delete method
    pub delete: DeleteMethod,
    /// Begin strategy for statement-based and declarative transactions
    pub begin: BeginStrategy,
}

impl Default for ScenarioPoint {
    fn default() -> Self {
        Self {
            session: SessionMode::Unset,
            insert: InsertMethod::RwDml,
            delete: DeleteMethod::StmtMutation,
            begin: BeginStrategy::Default,
        }
    }
}

impl ScenarioPoint {
    /// Label of this point's value on `axis`
    pub fn value(&self, axis: AxisKind) -> &'static str {
        match axis {
            AxisKind::Session => self.session.as_str(),
            AxisKind::Insert => self.insert.as_str(),
            AxisKind::Delete => self.delete.as_str(),
            AxisKind::Begin => self.begin.as_str(),
        }
    }

    /// Whether the report must flag this point's result as unverified
    pub fn is_unverified(&self) -> bool {
        self.delete.is_unverified()
    }
}

impl fmt::Display for ScenarioPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sessions={} insert={} delete={} begin={}",
            self.session, self.insert, self.delete, self.begin
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_per_axis() {
        let point = ScenarioPoint {
            session: SessionMode::Enabled,
            insert: InsertMethod::StmtDml,
            delete: DeleteMethod::Apply,
            begin: BeginStrategy::Explicit,
        };
        assert_eq!(point.value(AxisKind::Session), "enabled");
        assert_eq!(point.value(AxisKind::Insert), "stmt-dml");
        assert_eq!(point.value(AxisKind::Delete), "apply");
        assert_eq!(point.value(AxisKind::Begin), "explicit");
    }

    #[test]
    fn test_display_lists_every_axis() {
        let point = ScenarioPoint::default();
        assert_eq!(
            point.to_string(),
            "sessions=unset insert=rw-dml delete=stmt-mutation begin=default"
        );
    }
}
