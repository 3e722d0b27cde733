//! Satisfiability of primitive constraints.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
};

use tracing::trace;

use crate::vm::value::{Operator, Primitive, PrimitiveType, SymbolId};

/// Decides conjunctions of boolean primitives.
///
/// Implementations may over-approximate: answering `true` for an
/// unsatisfiable conjunction only costs exploring a dead branch, while
/// answering `false` for a satisfiable one loses behaviour.
pub trait Solver
where
    Self: Debug + Send + Sync,
{
    /// Checks whether all of `clauses` can hold at once.
    fn is_satisfiable(&self, clauses: &[&Primitive]) -> bool;

    /// Rewrites `term` into an equivalent and no larger term.
    fn simplify(&self, term: Primitive) -> Primitive {
        term
    }
}

/// A solver that tracks an interval of possible values for each integral
/// symbol.
///
/// It understands comparisons between a symbol (possibly widened) and a
/// constant, conjunctions and disjunctions. Anything else is assumed to be
/// satisfiable.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntervalSolver;

impl IntervalSolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Solver for IntervalSolver {
    fn is_satisfiable(&self, clauses: &[&Primitive]) -> bool {
        let pending: Vec<Primitive> = clauses.iter().map(|c| (*c).clone()).collect();
        let result = solve(pending, Bounds::default());
        trace!(target: "lazy_symex::decision::solver", clauses = clauses.len(), result, "checked");
        result
    }

    fn simplify(&self, term: Primitive) -> Primitive {
        match term {
            Primitive::Binary {
                op, left, right, ..
            } => {
                let left = self.simplify(*left);
                let right = self.simplify(*right);
                match (op, left.as_const(), right.as_const()) {
                    (Operator::And, Some(0), _) | (Operator::And, _, Some(0)) => {
                        Primitive::boolean(false)
                    }
                    (Operator::And, Some(_), _) => right,
                    (Operator::And, _, Some(_)) => left,
                    (Operator::Or, Some(l), _) if l != 0 => Primitive::boolean(true),
                    (Operator::Or, _, Some(r)) if r != 0 => Primitive::boolean(true),
                    (Operator::Or, Some(_), _) => right,
                    (Operator::Or, _, Some(_)) => left,
                    _ => Primitive::binary(op, left, right),
                }
            }
            Primitive::Widen { operand, .. } => self.simplify(*operand).widen(),
            other => other,
        }
    }
}

/// The values a symbol may still take.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Interval {
    low:      i64,
    high:     i64,
    excluded: BTreeSet<i64>,
}

impl Interval {
    fn of_type(ty: PrimitiveType) -> Option<Self> {
        let (low, high) = match ty {
            PrimitiveType::Boolean => (0, 1),
            PrimitiveType::Byte => (i64::from(i8::MIN), i64::from(i8::MAX)),
            PrimitiveType::Char => (0, i64::from(u16::MAX)),
            PrimitiveType::Short => (i64::from(i16::MIN), i64::from(i16::MAX)),
            PrimitiveType::Int => (i64::from(i32::MIN), i64::from(i32::MAX)),
            PrimitiveType::Long => (i64::MIN, i64::MAX),
            PrimitiveType::Float | PrimitiveType::Double => return None,
        };
        Some(Self {
            low,
            high,
            excluded: BTreeSet::new(),
        })
    }

    fn constrain(&mut self, op: Operator, value: i64) {
        match op {
            Operator::Eq => {
                self.low = self.low.max(value);
                self.high = self.high.min(value);
            }
            Operator::Ne => {
                self.excluded.insert(value);
            }
            Operator::Lt => self.high = self.high.min(value.saturating_sub(1)),
            Operator::Le => self.high = self.high.min(value),
            Operator::Gt => self.low = self.low.max(value.saturating_add(1)),
            Operator::Ge => self.low = self.low.max(value),
            Operator::Add | Operator::Sub | Operator::Mul | Operator::And | Operator::Or => {}
        }
    }

    fn is_empty(&self) -> bool {
        if self.low > self.high {
            return true;
        }
        let width = (i128::from(self.high) - i128::from(self.low) + 1) as u128;
        let excluded = self.excluded.range(self.low..=self.high).count() as u128;
        excluded >= width
    }
}

type Bounds = BTreeMap<SymbolId, Interval>;

/// Gets the symbol a term stands for, looking through widening.
fn symbol_of(term: &Primitive) -> Option<(SymbolId, PrimitiveType)> {
    match term {
        Primitive::Symbol { id, ty, .. } => Some((*id, *ty)),
        Primitive::Widen { operand, .. } => symbol_of(operand),
        _ => None,
    }
}

fn solve(mut pending: Vec<Primitive>, mut bounds: Bounds) -> bool {
    while let Some(clause) = pending.pop() {
        match clause {
            Primitive::Const { value, .. } => {
                if value == 0 {
                    return false;
                }
            }
            Primitive::Binary {
                op: Operator::And,
                left,
                right,
                ..
            } => {
                pending.push(*left);
                pending.push(*right);
            }
            Primitive::Binary {
                op: Operator::Or,
                left,
                right,
                ..
            } => {
                let mut with_left = pending.clone();
                with_left.push(*left);
                if solve(with_left, bounds.clone()) {
                    return true;
                }
                pending.push(*right);
            }
            Primitive::Binary {
                op, left, right, ..
            } if op.is_comparison() => {
                let (symbol, op, value) = match (symbol_of(&left), right.as_const()) {
                    (Some(symbol), Some(value)) => (symbol, op, value),
                    _ => match (left.as_const(), symbol_of(&right)) {
                        (Some(value), Some(symbol)) => (symbol, op.flipped(), value),
                        _ => continue,
                    },
                };
                if !narrow(&mut bounds, symbol, op, value) {
                    return false;
                }
            }
            ref term @ (Primitive::Symbol { .. } | Primitive::Widen { .. }) => {
                // A bare boolean symbol holds when it is not zero.
                if let Some(symbol) = symbol_of(term) {
                    if !narrow(&mut bounds, symbol, Operator::Ne, 0) {
                        return false;
                    }
                }
            }
            Primitive::Binary { .. } => {}
        }
    }
    true
}

fn narrow(
    bounds: &mut Bounds,
    (symbol, ty): (SymbolId, PrimitiveType),
    op: Operator,
    value: i64,
) -> bool {
    if !bounds.contains_key(&symbol) {
        let Some(interval) = Interval::of_type(ty) else {
            return true;
        };
        bounds.insert(symbol, interval);
    }
    let Some(interval) = bounds.get_mut(&symbol) else {
        return true;
    };
    interval.constrain(op, value);
    !interval.is_empty()
}
