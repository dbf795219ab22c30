//! The scalar reference kernel: one clause, one lane, no SIMD.
//!
//! Also the fallback used by [`super::simd`] for opcodes `wide` has no
//! vectorized transcendental for.

use crate::opcode::Opcode;

use super::clause::{effective_op, Clause};

/// Compute `clauses[idx].f[0..n]` from already-evaluated operands.
/// Operands are guaranteed evaluated first by rank ordering.
pub(crate) fn eval_value(clauses: &mut [Clause], idx: usize, n: usize) {
    let (op, a, b) = {
        let c = &clauses[idx];
        (c.op, c.a, c.b)
    };
    match op.arity() {
        crate::opcode::Arity::Nullary => {
            if op == Opcode::Const {
                let v = clauses[idx].const_value;
                clauses[idx].f[..n].fill(v);
            }
            // VAR_X/Y/Z are seeded by the caller; nothing to do.
        }
        crate::opcode::Arity::Unary => {
            for i in 0..n {
                let av = clauses[a].f[i];
                clauses[idx].f[i] = crate::ops::unary_f32(op, av);
            }
        }
        crate::opcode::Arity::Binary => {
            let eff = effective_op(op, clauses[a].disabled, clauses[b].disabled);
            for i in 0..n {
                let av = clauses[a].f[i];
                let bv = clauses[b].f[i];
                clauses[idx].f[i] = eval_binary_value(eff, av, bv);
            }
        }
    }
}

#[must_use]
fn eval_binary_value(eff: Opcode, av: f32, bv: f32) -> f32 {
    match eff {
        Opcode::DummyA => av,
        Opcode::DummyB => bv,
        other => crate::ops::binary_f32(other, av, bv),
    }
}

/// Compute value and gradient for `clauses[idx]` over `0..n`, applying
/// the chain/product/quotient rules documented in spec.md §4.4.
pub(crate) fn eval_value_and_grad(clauses: &mut [Clause], idx: usize, n: usize) {
    let (op, a, b) = {
        let c = &clauses[idx];
        (c.op, c.a, c.b)
    };
    match op.arity() {
        crate::opcode::Arity::Nullary => {
            if op == Opcode::Const {
                let v = clauses[idx].const_value;
                clauses[idx].f[..n].fill(v);
                clauses[idx].dx[..n].fill(0.0);
                clauses[idx].dy[..n].fill(0.0);
                clauses[idx].dz[..n].fill(0.0);
            }
            // VAR_X/Y/Z: value and the unit-basis gradient are seeded by
            // the caller/`Evaluator::seed_leaf_gradients`.
        }
        crate::opcode::Arity::Unary => {
            for i in 0..n {
                let av = clauses[a].f[i];
                let (adx, ady, adz) = (clauses[a].dx[i], clauses[a].dy[i], clauses[a].dz[i]);
                let fv = crate::ops::unary_f32(op, av);
                let factor = unary_derivative_factor(op, av);
                clauses[idx].f[i] = fv;
                clauses[idx].dx[i] = factor * adx;
                clauses[idx].dy[i] = factor * ady;
                clauses[idx].dz[i] = factor * adz;
            }
        }
        crate::opcode::Arity::Binary => {
            let eff = effective_op(op, clauses[a].disabled, clauses[b].disabled);
            for i in 0..n {
                let av = clauses[a].f[i];
                let bv = clauses[b].f[i];
                let (adx, ady, adz) = (clauses[a].dx[i], clauses[a].dy[i], clauses[a].dz[i]);
                let (bdx, bdy, bdz) = (clauses[b].dx[i], clauses[b].dy[i], clauses[b].dz[i]);
                let (fv, (gdx, gdy, gdz)) = match eff {
                    Opcode::DummyA => (av, (adx, ady, adz)),
                    Opcode::DummyB => (bv, (bdx, bdy, bdz)),
                    other => {
                        let fv = crate::ops::binary_f32(other, av, bv);
                        let g = binary_grad(other, av, bv, (adx, ady, adz), (bdx, bdy, bdz));
                        (fv, g)
                    }
                };
                clauses[idx].f[i] = fv;
                clauses[idx].dx[i] = gdx;
                clauses[idx].dy[i] = gdy;
                clauses[idx].dz[i] = gdz;
            }
        }
    }
}

/// `f'(a)` for a unary opcode, to be multiplied by `da/dx` (chain rule).
///
/// `pub(crate)` so [`super::simd`]'s gradient kernel can share the exact
/// same formulas for its own scalar tail (`n % LANES != 0`) instead of
/// duplicating them.
#[must_use]
pub(crate) fn unary_derivative_factor(op: Opcode, a: f32) -> f32 {
    match op {
        Opcode::Square => 2.0 * a,
        Opcode::Sqrt => {
            if a > 0.0 {
                0.5 / a.sqrt()
            } else {
                0.0
            }
        }
        Opcode::Neg => -1.0,
        Opcode::Abs => {
            if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        Opcode::Sin => a.cos(),
        Opcode::Cos => -a.sin(),
        Opcode::Tan => {
            let t = a.tan();
            1.0 + t * t
        }
        Opcode::Asin => 1.0 / (1.0 - a * a).sqrt(),
        Opcode::Acos => -1.0 / (1.0 - a * a).sqrt(),
        Opcode::Atan => 1.0 / (1.0 + a * a),
        Opcode::Exp => a.exp(),
        other => unreachable!("unary_derivative_factor called with non-unary opcode {other}"),
    }
}

pub(crate) type Grad = (f32, f32, f32);

/// `(d/dx, d/dy, d/dz)` of a binary opcode's result, given both operands'
/// values and gradients. `pub(crate)` for the same reason as
/// [`unary_derivative_factor`].
#[must_use]
pub(crate) fn binary_grad(op: Opcode, a: f32, b: f32, da: Grad, db: Grad) -> Grad {
    match op {
        Opcode::Add => (da.0 + db.0, da.1 + db.1, da.2 + db.2),
        Opcode::Sub => (da.0 - db.0, da.1 - db.1, da.2 - db.2),
        Opcode::Mul => (
            da.0 * b + a * db.0,
            da.1 * b + a * db.1,
            da.2 * b + a * db.2,
        ),
        Opcode::Div => {
            let denom = b * b;
            (
                (da.0 * b - a * db.0) / denom,
                (da.1 * b - a * db.1) / denom,
                (da.2 * b - a * db.2) / denom,
            )
        }
        Opcode::Min => {
            if a < b {
                da
            } else {
                db
            }
        }
        Opcode::Max => {
            if a > b {
                da
            } else {
                db
            }
        }
        Opcode::Pow => {
            let factor = b * a.powf(b - 1.0);
            (factor * da.0, factor * da.1, factor * da.2)
        }
        Opcode::NthRoot => {
            let inv_n = 1.0 / b;
            let factor = if a < 0.0 {
                0.0
            } else {
                inv_n * a.powf(inv_n - 1.0)
            };
            (factor * da.0, factor * da.1, factor * da.2)
        }
        Opcode::Atan2 => {
            let denom = a * a + b * b;
            (
                (b * da.0 - a * db.0) / denom,
                (b * da.1 - a * db.1) / denom,
                (b * da.2 - a * db.2) / denom,
            )
        }
        Opcode::Mod => da,
        Opcode::Nanfill => {
            if a.is_nan() {
                db
            } else {
                da
            }
        }
        other => unreachable!("binary_grad called with non-binary opcode {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::clause::Clause;

    #[test]
    fn square_value_and_grad_matches_2x() {
        let mut clauses = vec![Clause::leaf(Opcode::VarX), Clause::unary(Opcode::Square, 0, 1)];
        clauses[0].f = vec![3.0];
        clauses[0].dx = vec![1.0];
        clauses[0].dy = vec![0.0];
        clauses[0].dz = vec![0.0];
        clauses[1].f = vec![0.0];
        clauses[1].dx = vec![0.0];
        clauses[1].dy = vec![0.0];
        clauses[1].dz = vec![0.0];
        eval_value_and_grad(&mut clauses, 1, 1);
        assert_eq!(clauses[1].f[0], 9.0);
        assert_eq!(clauses[1].dx[0], 6.0);
    }

    #[test]
    fn min_gradient_ties_toward_b() {
        let grad = binary_grad(Opcode::Min, 1.0, 1.0, (1.0, 0.0, 0.0), (0.0, 1.0, 0.0));
        assert_eq!(grad, (0.0, 1.0, 0.0));
    }
}
