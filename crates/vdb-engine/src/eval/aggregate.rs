//! Aggregate accumulators: the five built-ins plus user-defined
//! aggregates registered on the database.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::error::{EngineError, Result};
use crate::value::{Value, ValueKey};

/// The step callback of a user-defined aggregate: receives the mutable
/// accumulator context and the argument values for one row.
pub type AggregateStepFn = Rc<dyn Fn(&mut Value, &[Value])>;

/// The finalize callback of a user-defined aggregate: consumes the
/// accumulator context and produces the aggregate result.
pub type AggregateFinalFn = Rc<dyn Fn(Value) -> Value>;

/// A user-defined aggregate registration.
#[derive(Clone)]
pub struct UserAggregate {
    /// Number of arguments the aggregate takes.
    pub arity: usize,
    /// Per-row accumulation callback.
    pub step: AggregateStepFn,
    /// Result extraction callback.
    pub finalize: AggregateFinalFn,
}

/// The registry of user-defined aggregates for one database.
#[derive(Clone, Default)]
pub struct AggregateRegistry {
    user: HashMap<String, UserAggregate>,
}

impl AggregateRegistry {
    /// Registers (or replaces) a user-defined aggregate.
    pub fn register(&mut self, name: &str, aggregate: UserAggregate) {
        self.user.insert(name.to_ascii_uppercase(), aggregate);
    }

    /// Looks up a user-defined aggregate.
    #[must_use]
    pub fn user(&self, name: &str) -> Option<&UserAggregate> {
        self.user.get(&name.to_ascii_uppercase())
    }

    /// Returns true when `name` names a built-in or user aggregate.
    #[must_use]
    pub fn is_aggregate(&self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        matches!(upper.as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX")
            || self.user.contains_key(&upper)
    }
}

enum AccumulatorKind {
    CountStar { count: i64 },
    Count { count: i64 },
    Sum { sum: Option<Value> },
    Avg { sum: f64, count: i64 },
    Min { best: Option<Value> },
    Max { best: Option<Value> },
    User { state: Value, spec: UserAggregate },
}

/// Accumulates one aggregate call over the rows of a group.
pub(crate) struct Accumulator {
    kind: AccumulatorKind,
    /// Seen argument tuples, for DISTINCT aggregates.
    seen: Option<BTreeSet<ValueKey>>,
}

impl Accumulator {
    /// Creates the accumulator for an aggregate call with `argc`
    /// arguments.
    ///
    /// # Errors
    ///
    /// Fails for unknown aggregate names and user-aggregate arity
    /// mismatches.
    pub(crate) fn new(
        name: &str,
        star: bool,
        distinct: bool,
        argc: usize,
        registry: &AggregateRegistry,
    ) -> Result<Self> {
        let kind = match name.to_ascii_uppercase().as_str() {
            "COUNT" if star => AccumulatorKind::CountStar { count: 0 },
            "COUNT" => AccumulatorKind::Count { count: 0 },
            "SUM" => AccumulatorKind::Sum { sum: None },
            "AVG" => AccumulatorKind::Avg { sum: 0.0, count: 0 },
            "MIN" => AccumulatorKind::Min { best: None },
            "MAX" => AccumulatorKind::Max { best: None },
            other => {
                let spec = registry.user(other).ok_or_else(|| {
                    EngineError::Resolution(format!("unknown aggregate: {other}"))
                })?;
                if argc != spec.arity {
                    return Err(EngineError::Type(format!(
                        "{other} expects {} argument(s), got {argc}",
                        spec.arity
                    )));
                }
                AccumulatorKind::User {
                    state: Value::Null,
                    spec: spec.clone(),
                }
            }
        };
        Ok(Self {
            kind,
            seen: distinct.then(BTreeSet::new),
        })
    }

    /// Feeds one row's argument values.
    pub(crate) fn step(&mut self, args: &[Value]) {
        if let AccumulatorKind::CountStar { count } = &mut self.kind {
            *count += 1;
            return;
        }

        // All other aggregates skip rows where the argument is NULL.
        if args.first().is_none_or(Value::is_null) {
            if let AccumulatorKind::User { state, spec } = &mut self.kind {
                // User aggregates decide their own NULL handling.
                (spec.step)(state, args);
            }
            return;
        }

        if let Some(seen) = &mut self.seen {
            let key = ValueKey(args.to_vec());
            if !seen.insert(key) {
                return;
            }
        }

        match &mut self.kind {
            AccumulatorKind::CountStar { .. } => unreachable!("handled above"),
            AccumulatorKind::Count { count } => *count += 1,
            AccumulatorKind::Sum { sum } => {
                let next = match sum.take() {
                    Some(acc) => acc.add(&args[0]),
                    None => args[0].clone(),
                };
                *sum = Some(next);
            }
            AccumulatorKind::Avg { sum, count } => {
                if let Value::Integer(i) = &args[0] {
                    *sum += *i as f64;
                    *count += 1;
                } else if let Value::Float(f) = &args[0] {
                    *sum += f;
                    *count += 1;
                }
            }
            AccumulatorKind::Min { best } => {
                let replace = best
                    .as_ref()
                    .is_none_or(|b| args[0].total_cmp(b) == core::cmp::Ordering::Less);
                if replace {
                    *best = Some(args[0].clone());
                }
            }
            AccumulatorKind::Max { best } => {
                let replace = best
                    .as_ref()
                    .is_none_or(|b| args[0].total_cmp(b) == core::cmp::Ordering::Greater);
                if replace {
                    *best = Some(args[0].clone());
                }
            }
            AccumulatorKind::User { state, spec } => (spec.step)(state, args),
        }
    }

    /// Produces the aggregate result. `COUNT` yields 0 over empty input;
    /// the others yield NULL.
    pub(crate) fn finish(self) -> Value {
        match self.kind {
            AccumulatorKind::CountStar { count } | AccumulatorKind::Count { count } => {
                Value::Integer(count)
            }
            AccumulatorKind::Sum { sum } => sum.unwrap_or(Value::Null),
            AccumulatorKind::Avg { sum, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Float(sum / count as f64)
                }
            }
            AccumulatorKind::Min { best } | AccumulatorKind::Max { best } => {
                best.unwrap_or(Value::Null)
            }
            AccumulatorKind::User { state, spec } => (spec.finalize)(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AggregateRegistry {
        AggregateRegistry::default()
    }

    fn run(name: &str, star: bool, distinct: bool, rows: &[Value]) -> Value {
        let mut acc = Accumulator::new(name, star, distinct, 1, &registry()).unwrap();
        for v in rows {
            acc.step(std::slice::from_ref(v));
        }
        acc.finish()
    }

    #[test]
    fn test_count_star_vs_count_expr() {
        let rows = [Value::Integer(1), Value::Null, Value::Integer(3)];
        assert_eq!(run("COUNT", true, false, &rows), Value::Integer(3));
        assert_eq!(run("COUNT", false, false, &rows), Value::Integer(2));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(run("COUNT", true, false, &[]), Value::Integer(0));
        assert_eq!(run("SUM", false, false, &[]), Value::Null);
        assert_eq!(run("AVG", false, false, &[]), Value::Null);
        assert_eq!(run("MIN", false, false, &[]), Value::Null);
    }

    #[test]
    fn test_sum_and_avg() {
        let rows = [Value::Integer(1), Value::Integer(2), Value::Null];
        assert_eq!(run("SUM", false, false, &rows), Value::Integer(3));
        assert_eq!(run("AVG", false, false, &rows), Value::Float(1.5));
    }

    #[test]
    fn test_distinct() {
        let rows = [Value::Integer(2), Value::Integer(2), Value::Integer(3)];
        assert_eq!(run("COUNT", false, true, &rows), Value::Integer(2));
        assert_eq!(run("SUM", false, true, &rows), Value::Integer(5));
    }

    #[test]
    fn test_min_max() {
        let rows = [Value::Integer(5), Value::Integer(2), Value::Integer(9)];
        assert_eq!(run("MIN", false, false, &rows), Value::Integer(2));
        assert_eq!(run("MAX", false, false, &rows), Value::Integer(9));
    }

    #[test]
    fn test_user_aggregate() {
        let mut reg = registry();
        reg.register(
            "PRODUCT",
            UserAggregate {
                arity: 1,
                step: Rc::new(|state, args| {
                    let current = state.as_integer().unwrap_or(1);
                    if let Some(v) = args[0].as_integer() {
                        *state = Value::Integer(current * v);
                    }
                }),
                finalize: Rc::new(|state| state),
            },
        );
        assert!(reg.is_aggregate("product"));

        let mut acc = Accumulator::new("PRODUCT", false, false, 1, &reg).unwrap();
        for v in [Value::Integer(2), Value::Integer(3), Value::Integer(4)] {
            acc.step(&[v]);
        }
        assert_eq!(acc.finish(), Value::Integer(24));
    }
}
