//! The interval pass: fills `clause.interval` for every clause and, for
//! `MIN`/`MAX`, classifies which operand can be pruned (spec.md §4.4
//! "Classification").

use crate::error::EvalError;
use crate::interval::Interval;
use crate::opcode::Opcode;

use super::clause::{Clause, PruneState};

/// Evaluate one clause's interval from its (already-evaluated) operands,
/// and classify its prune state if it is a `MIN`/`MAX`.
pub(crate) fn eval_clause_interval(clauses: &mut [Clause], idx: usize) -> Result<(), EvalError> {
    let (op, a, b) = {
        let c = &clauses[idx];
        (c.op, c.a, c.b)
    };
    match op.arity() {
        crate::opcode::Arity::Nullary => {
            if op == Opcode::Const {
                clauses[idx].interval = Interval::point(clauses[idx].const_value);
            }
            // VAR_X/Y/Z are seeded by the caller.
        }
        crate::opcode::Arity::Unary => {
            let ai = clauses[a].interval;
            clauses[idx].interval = unary_interval(op, ai)?;
        }
        crate::opcode::Arity::Binary => {
            let ai = clauses[a].interval;
            let bi = clauses[b].interval;
            clauses[idx].interval = binary_interval(op, ai, bi)?;
            clauses[idx].prune = classify(op, ai, bi);
        }
    }
    Ok(())
}

fn unary_interval(op: Opcode, a: Interval) -> Result<Interval, EvalError> {
    Ok(match op {
        Opcode::Square => a.square(),
        Opcode::Sqrt => a.sqrt(),
        Opcode::Neg => a.neg(),
        Opcode::Abs => a.abs(),
        Opcode::Sin => a.sin(),
        Opcode::Cos => a.cos(),
        Opcode::Tan => a.tan(),
        Opcode::Asin => a.asin(),
        Opcode::Acos => a.acos(),
        Opcode::Atan => a.atan(),
        Opcode::Exp => a.exp(),
        other => unreachable!("unary_interval called with non-unary opcode {other}"),
    })
}

fn binary_interval(op: Opcode, a: Interval, b: Interval) -> Result<Interval, EvalError> {
    Ok(match op {
        Opcode::Add => a.add(b),
        Opcode::Sub => a.sub(b),
        Opcode::Mul => a.mul(b),
        Opcode::Div => a.div(b),
        Opcode::Min => a.min(b),
        Opcode::Max => a.max(b),
        Opcode::Atan2 => a.atan2(b),
        Opcode::Pow => a.pow(b)?,
        Opcode::NthRoot => a.nth_root(b)?,
        Opcode::Mod => a.rem_euclid_envelope(b),
        Opcode::Nanfill => a.nanfill(b),
        Opcode::DummyA => a,
        Opcode::DummyB => b,
        other => unreachable!("binary_interval called with non-binary opcode {other}"),
    })
}

fn classify(op: Opcode, a: Interval, b: Interval) -> PruneState {
    if a.is_nan() || b.is_nan() {
        return PruneState::None;
    }
    match op {
        Opcode::Min => {
            if a.upper < b.lower {
                PruneState::IgnoreB
            } else if b.upper < a.lower {
                PruneState::IgnoreA
            } else {
                PruneState::None
            }
        }
        Opcode::Max => {
            if a.lower > b.upper {
                PruneState::IgnoreB
            } else if b.lower > a.upper {
                PruneState::IgnoreA
            } else {
                PruneState::None
            }
        }
        _ => PruneState::None,
    }
}
