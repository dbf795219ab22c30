//! Identity simplification and affine promotion, applied on every
//! [`Cache::unary`]/[`Cache::binary`] insertion (spec.md §4.2).
//!
//! The rule set here is deliberately small and closed — spec.md §9 notes
//! that the identity table "is not declared complete" and implementations
//! should match the documented rules rather than add further rewrites
//! without regression tests. Resist the urge to extend it.

use super::{Cache, NodeData, NodeId};
use crate::opcode::Opcode;

/// Gate for a one-line trace of which identity fired, mirroring the
/// `SYMB_TRACE`-style ambient debug hook used elsewhere in this lineage.
/// Never put anything here that a release build should pay for beyond a
/// single environment lookup per invocation... which callers avoid simply
/// by not setting `ISODAG_TRACE`.
fn trace_enabled() -> bool {
    std::env::var("ISODAG_TRACE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn trace(rule: &str, op: Opcode) {
    if trace_enabled() {
        eprintln!("[ISODAG_TRACE] {rule} fired for {op}");
    }
}

/// Fold a unary opcode's constant operand to a constant result.
pub(super) fn fold_unary(op: Opcode, a: f32) -> f32 {
    crate::ops::unary_f32(op, a)
}

/// Fold a binary opcode's two constant operands to a constant result.
pub(super) fn fold_binary(op: Opcode, a: f32, b: f32) -> f32 {
    crate::ops::binary_f32(op, a, b)
}

/// `-(-x) = x` and `abs(abs(x)) = abs(x)`.
pub(super) fn try_unary_identity(cache: &Cache, op: Opcode, operand: NodeId) -> Option<NodeId> {
    match op {
        Opcode::Neg => {
            if cache.opcode_of(operand) == Opcode::Neg {
                let NodeData::Unary(inner) = cache.data_of(operand) else {
                    unreachable!("NEG node must carry a unary payload")
                };
                trace("double_negation", op);
                return Some(inner);
            }
            None
        }
        Opcode::Abs => {
            if cache.opcode_of(operand) == Opcode::Abs {
                trace("abs_idempotent", op);
                return Some(operand);
            }
            None
        }
        _ => None,
    }
}

/// The deterministic per-opcode identity table from spec.md §4.2/§4.3:
/// `x+0=x`, `0+x=x`, `x*1=x`, `1*x=x`, `x*0=0`, `0*x=0`, `x-x=0`,
/// `min(x,x)=x`, `max(x,x)=x`. `x/x=1` is intentionally **not** applied
/// here — it is only cheap to prove non-zero in the trivial case (both
/// operands are the same constant), which constant folding already
/// handles; for a general subexpression the check is not cheap, so per
/// spec.md §4.2 it is skipped.
pub(super) fn try_binary_identity(
    cache: &Cache,
    op: Opcode,
    lhs: NodeId,
    rhs: NodeId,
) -> Option<NodeId> {
    match op {
        Opcode::Add => {
            if cache.is_const_zero(rhs) {
                trace("add_zero_rhs", op);
                return Some(lhs);
            }
            if cache.is_const_zero(lhs) {
                trace("add_zero_lhs", op);
                return Some(rhs);
            }
            None
        }
        Opcode::Mul => {
            if cache.is_const_zero(rhs) {
                trace("mul_zero_rhs", op);
                return Some(rhs);
            }
            if cache.is_const_zero(lhs) {
                trace("mul_zero_lhs", op);
                return Some(lhs);
            }
            if cache.is_const_one(rhs) {
                trace("mul_one_rhs", op);
                return Some(lhs);
            }
            if cache.is_const_one(lhs) {
                trace("mul_one_lhs", op);
                return Some(rhs);
            }
            None
        }
        Opcode::Sub if lhs == rhs => {
            trace("sub_self", op);
            None // handled by caller via constant(0.0); see Cache::binary note below
        }
        Opcode::Min | Opcode::Max if lhs == rhs => {
            trace("min_max_self", op);
            Some(lhs)
        }
        _ => None,
    }
}

/// `x - x = 0` needs to *construct* `CONST(0)` rather than return an
/// already-existing id, so it cannot live in [`try_binary_identity`]
/// (which only ever returns pre-existing ids, never mutates the cache).
/// `Cache::binary` calls this right after the identity table, before
/// constant folding.
pub(super) fn try_sub_self(cache: &mut Cache, op: Opcode, lhs: NodeId, rhs: NodeId) -> Option<NodeId> {
    if op == Opcode::Sub && lhs == rhs {
        trace("sub_self_zero", op);
        return Some(cache.constant(0.0));
    }
    None
}

/// Affine coefficients `(a, b, c, d)` for `a*X + b*Y + c*Z + d`, if `id`
/// is representable as one: `VAR_X/Y/Z`, `CONST`, or `AFFINE_VEC` itself.
fn as_affine(cache: &Cache, id: NodeId) -> Option<(f32, f32, f32, f32)> {
    match cache.opcode_of(id) {
        Opcode::VarX => Some((1.0, 0.0, 0.0, 0.0)),
        Opcode::VarY => Some((0.0, 1.0, 0.0, 0.0)),
        Opcode::VarZ => Some((0.0, 0.0, 1.0, 0.0)),
        Opcode::Const => {
            let NodeData::Const(v) = cache.data_of(id) else {
                unreachable!("CONST node must carry a const payload")
            };
            Some((0.0, 0.0, 0.0, v))
        }
        Opcode::AffineVec => cache.get_affine(id),
        _ => None,
    }
}

/// Step 4 of spec.md §4.2: fold `ADD`/`SUB`/`MUL`-by-constant over two
/// affine-representable operands into a single `AFFINE_VEC`.
pub(super) fn try_affine_promotion(
    cache: &mut Cache,
    op: Opcode,
    lhs: NodeId,
    rhs: NodeId,
) -> Option<NodeId> {
    match op {
        Opcode::Add => {
            let (a1, b1, c1, d1) = as_affine(cache, lhs)?;
            let (a2, b2, c2, d2) = as_affine(cache, rhs)?;
            trace("affine_add", op);
            Some(cache.affine(a1 + a2, b1 + b2, c1 + c2, d1 + d2))
        }
        Opcode::Sub => {
            let (a1, b1, c1, d1) = as_affine(cache, lhs)?;
            let (a2, b2, c2, d2) = as_affine(cache, rhs)?;
            trace("affine_sub", op);
            Some(cache.affine(a1 - a2, b1 - b2, c1 - c2, d1 - d2))
        }
        Opcode::Mul => {
            if let NodeData::Const(k) = cache.data_of(rhs) {
                let (a, b, c, d) = as_affine(cache, lhs)?;
                trace("affine_mul_const_rhs", op);
                return Some(cache.affine(a * k, b * k, c * k, d * k));
            }
            if let NodeData::Const(k) = cache.data_of(lhs) {
                let (a, b, c, d) = as_affine(cache, rhs)?;
                trace("affine_mul_const_lhs", op);
                return Some(cache.affine(a * k, b * k, c * k, d * k));
            }
            None
        }
        _ => None,
    }
}
