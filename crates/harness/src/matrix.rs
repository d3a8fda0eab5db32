//! Matrix enumeration
//!
//! A [`MatrixSpec`] is an ordered list of active axes, each with its value
//! list, plus a base point supplying the values of inactive axes and a set
//! of declarative exclusions. [`MatrixSpec::points`] walks the cartesian
//! product lazily with the first axis iterating slowest.
//!
//! | Variant | Axes | Fixed | Points |
//! |---|---|---|---|
//! | `insert-delete` | sessions × insert × delete | begin = default | 24 |
//! | `delete-begin` | sessions × delete × begin | insert = rw-dml | 30 |
//! | `mixed-write` | sessions × begin | delete = stmt-mixed | 9 |

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use txmatrix_core::{
    AxisKind, BeginStrategy, DeleteMethod, InsertMethod, ScenarioPoint, SessionMode,
};

// ============================================================================
// Variants
// ============================================================================

/// Which matrix a run enumerates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Session mode × insert method × delete method
    InsertDelete,
    /// Session mode × delete method × begin strategy
    DeleteBegin,
    /// Session mode × begin strategy for the mixed statement/mutation delete
    MixedWrite,
}

impl Variant {
    /// All variants
    pub const ALL: &'static [Variant] = &[
        Variant::InsertDelete,
        Variant::DeleteBegin,
        Variant::MixedWrite,
    ];

    /// Flag spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::InsertDelete => "insert-delete",
            Variant::DeleteBegin => "delete-begin",
            Variant::MixedWrite => "mixed-write",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                HarnessError::config(format!(
                    "unknown variant '{}' (expected one of: insert-delete, delete-begin, mixed-write)",
                    s
                ))
            })
    }
}

// ============================================================================
// Axes and exclusions
// ============================================================================

/// One active axis and the values it ranges over, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSpec {
    /// Session multiplexing values
    Session(&'static [SessionMode]),
    /// Insert method values
    Insert(&'static [InsertMethod]),
    /// Delete method values
    Delete(&'static [DeleteMethod]),
    /// Begin strategy values
    Begin(&'static [BeginStrategy]),
}

impl AxisSpec {
    /// Axis this spec ranges over
    pub fn kind(&self) -> AxisKind {
        match self {
            AxisSpec::Session(_) => AxisKind::Session,
            AxisSpec::Insert(_) => AxisKind::Insert,
            AxisSpec::Delete(_) => AxisKind::Delete,
            AxisSpec::Begin(_) => AxisKind::Begin,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            AxisSpec::Session(v) => v.len(),
            AxisSpec::Insert(v) => v.len(),
            AxisSpec::Delete(v) => v.len(),
            AxisSpec::Begin(v) => v.len(),
        }
    }

    /// Whether the axis has no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn assign(&self, point: &mut ScenarioPoint, index: usize) {
        match self {
            AxisSpec::Session(v) => point.session = v[index],
            AxisSpec::Insert(v) => point.insert = v[index],
            AxisSpec::Delete(v) => point.delete = v[index],
            AxisSpec::Begin(v) => point.begin = v[index],
        }
    }
}

/// A named rule removing candidate points from the product
#[derive(Debug, Clone, Copy)]
pub struct Exclusion {
    /// Short description for logs
    pub name: &'static str,
    /// Returns true for points to skip
    pub excludes: fn(&ScenarioPoint) -> bool,
}

/// Single-shot apply has no begin option; keep only its `default` point.
pub const APPLY_FIXES_BEGIN: Exclusion = Exclusion {
    name: "apply runs only with begin=default",
    excludes: |p| !p.delete.accepts_begin_strategy() && p.begin != BeginStrategy::Default,
};

// ============================================================================
// MatrixSpec
// ============================================================================

/// Declarative description of a matrix
#[derive(Debug, Clone)]
pub struct MatrixSpec {
    variant: Variant,
    axes: Vec<AxisSpec>,
    base: ScenarioPoint,
    exclusions: Vec<Exclusion>,
}

impl MatrixSpec {
    /// Build a custom matrix
    pub fn new(
        variant: Variant,
        axes: Vec<AxisSpec>,
        base: ScenarioPoint,
        exclusions: Vec<Exclusion>,
    ) -> Self {
        Self {
            variant,
            axes,
            base,
            exclusions,
        }
    }

    /// The standard matrix of `variant`
    pub fn for_variant(variant: Variant) -> Self {
        let base = ScenarioPoint::default();
        match variant {
            Variant::InsertDelete => Self::new(
                variant,
                vec![
                    AxisSpec::Session(SessionMode::ALL),
                    AxisSpec::Insert(InsertMethod::ALL),
                    AxisSpec::Delete(DeleteMethod::STANDARD),
                ],
                base,
                vec![APPLY_FIXES_BEGIN],
            ),
            Variant::DeleteBegin => Self::new(
                variant,
                vec![
                    AxisSpec::Session(SessionMode::ALL),
                    AxisSpec::Delete(DeleteMethod::STANDARD),
                    AxisSpec::Begin(BeginStrategy::ALL),
                ],
                base,
                vec![APPLY_FIXES_BEGIN],
            ),
            Variant::MixedWrite => Self::new(
                variant,
                vec![
                    AxisSpec::Session(SessionMode::ALL),
                    AxisSpec::Begin(BeginStrategy::ALL),
                ],
                ScenarioPoint {
                    delete: DeleteMethod::StmtMixed,
                    ..base
                },
                vec![],
            ),
        }
    }

    /// Variant this spec belongs to
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Active axes in declared order
    pub fn axes(&self) -> Vec<AxisKind> {
        self.axes.iter().map(AxisSpec::kind).collect()
    }

    /// Lazy, ordered enumeration of the points
    pub fn points(&self) -> Points<'_> {
        Points {
            spec: self,
            indices: vec![0; self.axes.len()],
            done: self.axes.iter().any(AxisSpec::is_empty),
        }
    }

    /// Number of points after exclusions
    pub fn len(&self) -> usize {
        self.points().count()
    }

    /// Whether no point survives
    pub fn is_empty(&self) -> bool {
        self.points().next().is_none()
    }

    fn is_excluded(&self, point: &ScenarioPoint) -> bool {
        self.exclusions.iter().any(|e| (e.excludes)(point))
    }
}

/// Iterator over a [`MatrixSpec`]'s points
///
/// Walks an odometer over the axis indices; the last axis turns fastest.
pub struct Points<'a> {
    spec: &'a MatrixSpec,
    indices: Vec<usize>,
    done: bool,
}

impl Points<'_> {
    fn current(&self) -> ScenarioPoint {
        let mut point = self.spec.base;
        for (axis, &i) in self.spec.axes.iter().zip(&self.indices) {
            axis.assign(&mut point, i);
        }
        point
    }

    fn advance(&mut self) {
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.spec.axes[pos].len() {
                return;
            }
            self.indices[pos] = 0;
        }
        self.done = true;
    }
}

impl Iterator for Points<'_> {
    type Item = ScenarioPoint;

    fn next(&mut self) -> Option<ScenarioPoint> {
        while !self.done {
            let point = self.current();
            self.advance();
            if !self.spec.is_excluded(&point) {
                return Some(point);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_variant_counts() {
        assert_eq!(MatrixSpec::for_variant(Variant::InsertDelete).len(), 24);
        assert_eq!(MatrixSpec::for_variant(Variant::DeleteBegin).len(), 3 * (4 * 3 - 2));
        assert_eq!(MatrixSpec::for_variant(Variant::MixedWrite).len(), 9);
    }

    #[test]
    fn test_first_axis_iterates_slowest() {
        let points: Vec<_> = MatrixSpec::for_variant(Variant::DeleteBegin)
            .points()
            .collect();
        assert_eq!(
            points[0],
            ScenarioPoint {
                session: SessionMode::Enabled,
                delete: DeleteMethod::StmtMutation,
                begin: BeginStrategy::Default,
                ..ScenarioPoint::default()
            }
        );
        assert_eq!(points[1].begin, BeginStrategy::Inlined);
        assert_eq!(points[2].begin, BeginStrategy::Explicit);
        assert_eq!(points[3].delete, DeleteMethod::RwMutation);
        // stmt-mutation(3) + rw-mutation(3) + apply(1) + stmt-dml(3)
        assert_eq!(points[10].session, SessionMode::Disabled);
    }

    #[test]
    fn test_apply_has_one_point_per_session() {
        let spec = MatrixSpec::for_variant(Variant::DeleteBegin);
        let apply: Vec<_> = spec
            .points()
            .filter(|p| p.delete == DeleteMethod::Apply)
            .collect();
        assert_eq!(apply.len(), 3);
        assert!(apply.iter().all(|p| p.begin == BeginStrategy::Default));
    }

    #[test]
    fn test_inactive_axes_hold_base_values() {
        for p in MatrixSpec::for_variant(Variant::InsertDelete).points() {
            assert_eq!(p.begin, BeginStrategy::Default);
            assert!(!p.is_unverified());
        }
        for p in MatrixSpec::for_variant(Variant::DeleteBegin).points() {
            assert_eq!(p.insert, InsertMethod::RwDml);
        }
        for p in MatrixSpec::for_variant(Variant::MixedWrite).points() {
            assert_eq!(p.delete, DeleteMethod::StmtMixed);
            assert!(p.is_unverified());
        }
    }

    #[test]
    fn test_points_are_distinct() {
        for v in Variant::ALL {
            let spec = MatrixSpec::for_variant(*v);
            let unique: HashSet<_> = spec.points().collect();
            assert_eq!(unique.len(), spec.len());
        }
    }

    #[test]
    fn test_axes_order() {
        assert_eq!(
            MatrixSpec::for_variant(Variant::InsertDelete).axes(),
            vec![AxisKind::Session, AxisKind::Insert, AxisKind::Delete]
        );
        assert_eq!(
            MatrixSpec::for_variant(Variant::MixedWrite).axes(),
            vec![AxisKind::Session, AxisKind::Begin]
        );
    }

    #[test]
    fn test_empty_axis_yields_nothing() {
        let spec = MatrixSpec::new(
            Variant::DeleteBegin,
            vec![AxisSpec::Session(SessionMode::ALL), AxisSpec::Begin(&[])],
            ScenarioPoint::default(),
            vec![],
        );
        assert!(spec.is_empty());
    }

    #[test]
    fn test_variant_parse() {
        for v in Variant::ALL {
            assert_eq!(v.as_str().parse::<Variant>().unwrap(), *v);
        }
        assert!("everything".parse::<Variant>().is_err());
    }

    proptest! {
        #[test]
        fn prop_count_is_product_minus_exclusions(
            sessions in 1usize..=3,
            deletes in 1usize..=4,
            begins in 1usize..=3,
        ) {
            let delete_values = &DeleteMethod::STANDARD[..deletes];
            let spec = MatrixSpec::new(
                Variant::DeleteBegin,
                vec![
                    AxisSpec::Session(&SessionMode::ALL[..sessions]),
                    AxisSpec::Delete(delete_values),
                    AxisSpec::Begin(&BeginStrategy::ALL[..begins]),
                ],
                ScenarioPoint::default(),
                vec![APPLY_FIXES_BEGIN],
            );
            let has_apply = delete_values.contains(&DeleteMethod::Apply);
            let excluded = if has_apply { sessions * (begins - 1) } else { 0 };
            prop_assert_eq!(spec.len(), sessions * deletes * begins - excluded);
        }
    }
}
