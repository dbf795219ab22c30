//! 8-lane `f32` batch kernel, gated behind the `simd` feature.
//!
//! Only the arithmetic fast path (no transcendentals) is vectorized —
//! `wide` has no vectorized `sin`/`cos`/`exp`/etc, so those opcodes fall
//! back to [`super::scalar::eval_value`] one clause at a time, exactly as
//! spec.md §4.4 describes ("non-vectorizable transcendentals fall back to
//! the scalar kernel").

use wide::f32x8;

use crate::opcode::Opcode;

use super::clause::{effective_op, Clause};
use super::scalar;

const LANES: usize = 8;

fn is_vectorizable(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Min
            | Opcode::Max
            | Opcode::Neg
            | Opcode::Abs
            | Opcode::Square
            | Opcode::Sqrt
            | Opcode::DummyA
            | Opcode::DummyB
    )
}

/// Compute `clauses[idx].f[0..n]`, vectorizing 8 lanes at a time where the
/// opcode supports it and falling back to the scalar kernel otherwise.
pub(crate) fn eval_value(clauses: &mut [Clause], idx: usize, n: usize) {
    let (op, a, b) = {
        let c = &clauses[idx];
        (c.op, c.a, c.b)
    };
    let eff = match op.arity() {
        crate::opcode::Arity::Binary => effective_op(op, clauses[a].disabled, clauses[b].disabled),
        _ => op,
    };
    if !is_vectorizable(eff) {
        scalar::eval_value(clauses, idx, n);
        return;
    }

    let chunks = n / LANES;
    match op.arity() {
        crate::opcode::Arity::Unary => {
            for chunk in 0..chunks {
                let base = chunk * LANES;
                let av = load(&clauses[a].f, base);
                let fv = unary_simd(eff, av);
                store(&mut clauses[idx].f, base, fv);
            }
        }
        crate::opcode::Arity::Binary => {
            for chunk in 0..chunks {
                let base = chunk * LANES;
                let av = load(&clauses[a].f, base);
                let bv = load(&clauses[b].f, base);
                let fv = binary_simd(eff, av, bv);
                store(&mut clauses[idx].f, base, fv);
            }
        }
        crate::opcode::Arity::Nullary => {}
    }

    // Scalar remainder.
    let done = chunks * LANES;
    if done < n {
        for i in done..n {
            eval_tail_scalar(clauses, idx, op, a, b, i);
        }
    }
}

fn eval_tail_scalar(clauses: &mut [Clause], idx: usize, op: Opcode, a: usize, b: usize, i: usize) {
    match op.arity() {
        crate::opcode::Arity::Unary => {
            let av = clauses[a].f[i];
            clauses[idx].f[i] = crate::ops::unary_f32(op, av);
        }
        crate::opcode::Arity::Binary => {
            let eff = effective_op(op, clauses[a].disabled, clauses[b].disabled);
            let av = clauses[a].f[i];
            let bv = clauses[b].f[i];
            clauses[idx].f[i] = match eff {
                Opcode::DummyA => av,
                Opcode::DummyB => bv,
                other => crate::ops::binary_f32(other, av, bv),
            };
        }
        crate::opcode::Arity::Nullary => {}
    }
}

/// Compute `clauses[idx]`'s value and `(dx, dy, dz)` over `0..n`,
/// vectorizing the same opcodes [`eval_value`] does and falling back to
/// [`scalar::eval_value_and_grad`] for everything else.
pub(crate) fn eval_value_and_grad(clauses: &mut [Clause], idx: usize, n: usize) {
    let (op, a, b) = {
        let c = &clauses[idx];
        (c.op, c.a, c.b)
    };
    let eff = match op.arity() {
        crate::opcode::Arity::Binary => effective_op(op, clauses[a].disabled, clauses[b].disabled),
        _ => op,
    };
    if op.arity() == crate::opcode::Arity::Nullary || !is_vectorizable(eff) {
        scalar::eval_value_and_grad(clauses, idx, n);
        return;
    }

    let chunks = n / LANES;
    match op.arity() {
        crate::opcode::Arity::Unary => {
            for chunk in 0..chunks {
                let base = chunk * LANES;
                let av = load(&clauses[a].f, base);
                let adx = load(&clauses[a].dx, base);
                let ady = load(&clauses[a].dy, base);
                let adz = load(&clauses[a].dz, base);
                let fv = unary_simd(eff, av);
                let factor = unary_derivative_factor_simd(eff, av);
                store(&mut clauses[idx].f, base, fv);
                store(&mut clauses[idx].dx, base, factor * adx);
                store(&mut clauses[idx].dy, base, factor * ady);
                store(&mut clauses[idx].dz, base, factor * adz);
            }
        }
        crate::opcode::Arity::Binary => {
            for chunk in 0..chunks {
                let base = chunk * LANES;
                let av = load(&clauses[a].f, base);
                let bv = load(&clauses[b].f, base);
                let adx = load(&clauses[a].dx, base);
                let ady = load(&clauses[a].dy, base);
                let adz = load(&clauses[a].dz, base);
                let bdx = load(&clauses[b].dx, base);
                let bdy = load(&clauses[b].dy, base);
                let bdz = load(&clauses[b].dz, base);
                let fv = binary_simd(eff, av, bv);
                let (gdx, gdy, gdz) = binary_grad_simd(eff, av, bv, (adx, ady, adz), (bdx, bdy, bdz));
                store(&mut clauses[idx].f, base, fv);
                store(&mut clauses[idx].dx, base, gdx);
                store(&mut clauses[idx].dy, base, gdy);
                store(&mut clauses[idx].dz, base, gdz);
            }
        }
        crate::opcode::Arity::Nullary => {}
    }

    let done = chunks * LANES;
    if done < n {
        for i in done..n {
            eval_grad_tail_scalar(clauses, idx, op, a, b, i);
        }
    }
}

fn eval_grad_tail_scalar(clauses: &mut [Clause], idx: usize, op: Opcode, a: usize, b: usize, i: usize) {
    match op.arity() {
        crate::opcode::Arity::Unary => {
            let av = clauses[a].f[i];
            let (adx, ady, adz) = (clauses[a].dx[i], clauses[a].dy[i], clauses[a].dz[i]);
            let fv = crate::ops::unary_f32(op, av);
            let factor = scalar::unary_derivative_factor(op, av);
            clauses[idx].f[i] = fv;
            clauses[idx].dx[i] = factor * adx;
            clauses[idx].dy[i] = factor * ady;
            clauses[idx].dz[i] = factor * adz;
        }
        crate::opcode::Arity::Binary => {
            let eff = effective_op(op, clauses[a].disabled, clauses[b].disabled);
            let av = clauses[a].f[i];
            let bv = clauses[b].f[i];
            let (adx, ady, adz) = (clauses[a].dx[i], clauses[a].dy[i], clauses[a].dz[i]);
            let (bdx, bdy, bdz) = (clauses[b].dx[i], clauses[b].dy[i], clauses[b].dz[i]);
            let (fv, (gdx, gdy, gdz)) = match eff {
                Opcode::DummyA => (av, (adx, ady, adz)),
                Opcode::DummyB => (bv, (bdx, bdy, bdz)),
                other => {
                    let fv = crate::ops::binary_f32(other, av, bv);
                    let g = scalar::binary_grad(other, av, bv, (adx, ady, adz), (bdx, bdy, bdz));
                    (fv, g)
                }
            };
            clauses[idx].f[i] = fv;
            clauses[idx].dx[i] = gdx;
            clauses[idx].dy[i] = gdy;
            clauses[idx].dz[i] = gdz;
        }
        crate::opcode::Arity::Nullary => {}
    }
}

fn load(buf: &[f32], base: usize) -> f32x8 {
    f32x8::from(<[f32; LANES]>::try_from(&buf[base..base + LANES]).expect("chunk is exactly LANES wide"))
}

fn store(buf: &mut [f32], base: usize, v: f32x8) {
    buf[base..base + LANES].copy_from_slice(&v.to_array());
}

/// `f'(a)` for a vectorizable unary opcode, mirroring
/// [`scalar::unary_derivative_factor`] lane-wise.
fn unary_derivative_factor_simd(op: Opcode, a: f32x8) -> f32x8 {
    match op {
        Opcode::Neg => f32x8::splat(-1.0),
        Opcode::Abs => {
            let positive = a.cmp_gt(f32x8::splat(0.0));
            let negative = a.cmp_lt(f32x8::splat(0.0));
            positive.blend(f32x8::splat(1.0), negative.blend(f32x8::splat(-1.0), f32x8::splat(0.0)))
        }
        Opcode::Square => a + a,
        Opcode::Sqrt => {
            let positive = a.cmp_gt(f32x8::splat(0.0));
            positive.blend(f32x8::splat(0.5) / a.sqrt(), f32x8::splat(0.0))
        }
        other => unreachable!("unary_derivative_factor_simd called with non-vectorizable opcode {other}"),
    }
}

type GradLanes = (f32x8, f32x8, f32x8);

/// `(d/dx, d/dy, d/dz)` of a vectorizable binary opcode, mirroring
/// [`scalar::binary_grad`] lane-wise — including the `MIN`/`MAX`
/// tie-break toward `b`.
fn binary_grad_simd(op: Opcode, a: f32x8, b: f32x8, da: GradLanes, db: GradLanes) -> GradLanes {
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
            let a_wins = a.cmp_lt(b);
            (
                a_wins.blend(da.0, db.0),
                a_wins.blend(da.1, db.1),
                a_wins.blend(da.2, db.2),
            )
        }
        Opcode::Max => {
            let a_wins = a.cmp_gt(b);
            (
                a_wins.blend(da.0, db.0),
                a_wins.blend(da.1, db.1),
                a_wins.blend(da.2, db.2),
            )
        }
        Opcode::DummyA => da,
        Opcode::DummyB => db,
        other => unreachable!("binary_grad_simd called with non-vectorizable opcode {other}"),
    }
}

fn unary_simd(op: Opcode, a: f32x8) -> f32x8 {
    match op {
        Opcode::Neg => -a,
        Opcode::Abs => a.abs(),
        Opcode::Square => a * a,
        Opcode::Sqrt => a.sqrt(),
        other => unreachable!("unary_simd called with non-vectorizable opcode {other}"),
    }
}

fn binary_simd(op: Opcode, a: f32x8, b: f32x8) -> f32x8 {
    match op {
        Opcode::Add => a + b,
        Opcode::Sub => a - b,
        Opcode::Mul => a * b,
        Opcode::Div => a / b,
        Opcode::Min => a.min(b),
        Opcode::Max => a.max(b),
        Opcode::DummyA => a,
        Opcode::DummyB => b,
        other => unreachable!("binary_simd called with non-vectorizable opcode {other}"),
    }
}
