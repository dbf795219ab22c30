//! Scalar reference semantics for every opcode, shared by constant folding
//! (`cache::simplify`) and the evaluator's scalar kernel
//! (`evaluator::scalar`) so the two never drift apart.

use crate::opcode::Opcode;

/// Evaluate a unary opcode at a single point. `op` must be a unary
/// opcode; anything else is a contract violation.
#[must_use]
pub(crate) fn unary_f32(op: Opcode, a: f32) -> f32 {
    match op {
        Opcode::Square => a * a,
        Opcode::Sqrt => a.sqrt(),
        Opcode::Neg => -a,
        Opcode::Abs => a.abs(),
        Opcode::Sin => a.sin(),
        Opcode::Cos => a.cos(),
        Opcode::Tan => a.tan(),
        Opcode::Asin => a.asin(),
        Opcode::Acos => a.acos(),
        Opcode::Atan => a.atan(),
        Opcode::Exp => a.exp(),
        other => unreachable!("unary_f32 called with non-unary opcode {other}"),
    }
}

/// Evaluate a binary opcode at a single point. `op` must be a binary
/// opcode; anything else is a contract violation. `NTH_ROOT`/`POW`
/// degenerate gracefully to `NaN`/standard `powf` semantics at the scalar
/// level — the interval-only "must be constant" restriction
/// (spec.md §4.1) does not apply to point evaluation.
#[must_use]
pub(crate) fn binary_f32(op: Opcode, a: f32, b: f32) -> f32 {
    match op {
        Opcode::Add => a + b,
        Opcode::Mul => a * b,
        Opcode::Min => a.min(b),
        Opcode::Max => a.max(b),
        Opcode::Sub => a - b,
        Opcode::Div => a / b,
        Opcode::Atan2 => a.atan2(b),
        Opcode::Pow => a.powf(b),
        Opcode::NthRoot => nth_root(a, b),
        Opcode::Mod => a % b,
        Opcode::Nanfill => {
            if a.is_nan() {
                b
            } else {
                a
            }
        }
        other => unreachable!("binary_f32 called with non-binary opcode {other}"),
    }
}

/// The `n`-th root of `a`, matching the sign convention used by
/// [`crate::interval::Interval::nth_root`]: odd roots of negative numbers
/// are negative real numbers, even roots of negative numbers are `NaN`.
fn nth_root(a: f32, n: f32) -> f32 {
    if n == 0.0 {
        return f32::NAN;
    }
    if a < 0.0 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "root degrees are small integers in practice"
        )]
        let is_even = (n as i64) % 2 == 0;
        if is_even {
            f32::NAN
        } else {
            -(-a).powf(1.0 / n)
        }
    } else {
        a.powf(1.0 / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_root_odd_of_negative_is_negative() {
        assert!((nth_root(-8.0, 3.0) - (-2.0)).abs() < 1e-5);
    }

    #[test]
    fn nth_root_even_of_negative_is_nan() {
        assert!(nth_root(-4.0, 2.0).is_nan());
    }

    #[test]
    fn nanfill_passes_through_non_nan() {
        assert_eq!(binary_f32(Opcode::Nanfill, 3.0, 5.0), 3.0);
        assert!(binary_f32(Opcode::Nanfill, f32::NAN, 5.0) == 5.0);
    }
}
