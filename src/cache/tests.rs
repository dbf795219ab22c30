use super::*;
use crate::opcode::Opcode;

#[test]
fn constants_coalesce_bitwise() {
    let mut c = Cache::new();
    let a = c.constant(1.0);
    let b = c.constant(1.0);
    assert_eq!(a, b);
    let neg_zero = c.constant(-0.0);
    let pos_zero = c.constant(0.0);
    assert_ne!(neg_zero, pos_zero, "bitwise coalescing keeps -0.0 and 0.0 distinct");
}

#[test]
fn nan_constants_all_share_one_id() {
    let mut c = Cache::new();
    let a = c.constant(f32::NAN);
    let b = c.constant(f32::from_bits(0x7fc0_0001));
    assert_eq!(a, b);
}

#[test]
fn hash_cons_is_idempotent() {
    let mut c = Cache::new();
    let x = c.x();
    let y = c.y();
    let a = c.binary(Opcode::Add, x, y);
    let b = c.binary(Opcode::Add, x, y);
    assert_eq!(a, b);
}

#[test]
fn commutative_ops_share_id_regardless_of_operand_order() {
    let mut c = Cache::new();
    let x = c.x();
    let y = c.y();
    let a = c.binary(Opcode::Add, x, y);
    let b = c.binary(Opcode::Add, y, x);
    assert_eq!(a, b);
}

#[test]
fn add_zero_identity() {
    let mut c = Cache::new();
    let x = c.x();
    let zero = c.constant(0.0);
    assert_eq!(c.binary(Opcode::Add, x, zero), x);
    assert_eq!(c.binary(Opcode::Add, zero, x), x);
}

#[test]
fn mul_zero_and_one_identities() {
    let mut c = Cache::new();
    let x = c.x();
    let zero = c.constant(0.0);
    let one = c.constant(1.0);
    assert_eq!(c.binary(Opcode::Mul, x, zero), zero);
    assert_eq!(c.binary(Opcode::Mul, x, one), x);
    assert_eq!(c.binary(Opcode::Mul, one, x), x);
}

#[test]
fn sub_self_is_zero() {
    let mut c = Cache::new();
    let x = c.x();
    let result = c.binary(Opcode::Sub, x, x);
    assert_eq!(result, c.constant(0.0));
}

#[test]
fn min_max_self_identity() {
    let mut c = Cache::new();
    let x = c.x();
    assert_eq!(c.binary(Opcode::Min, x, x), x);
    assert_eq!(c.binary(Opcode::Max, x, x), x);
}

#[test]
fn double_negation_and_abs_idempotence() {
    let mut c = Cache::new();
    let x = c.x();
    let neg_x = c.unary(Opcode::Neg, x);
    assert_eq!(c.unary(Opcode::Neg, neg_x), x);

    let abs_x = c.unary(Opcode::Abs, x);
    assert_eq!(c.unary(Opcode::Abs, abs_x), abs_x);
}

#[test]
fn constant_folding_both_operands() {
    let mut c = Cache::new();
    let two = c.constant(2.0);
    let three = c.constant(3.0);
    let sum = c.binary(Opcode::Add, two, three);
    assert_eq!(c.get_affine(sum), None);
    assert_eq!(c.const_value(sum), Some(5.0));
}

#[test]
fn affine_fold_at_point() {
    let mut c = Cache::new();
    let id = c.affine(2.0, 0.0, 0.0, 1.0);
    assert_eq!(c.get_affine(id), Some((2.0, 0.0, 0.0, 1.0)));
}

#[test]
fn affine_collapses_to_const_when_coefficients_are_zero() {
    let mut c = Cache::new();
    let id = c.affine(0.0, 0.0, 0.0, 7.0);
    assert_eq!(c.opcode_of(id), Opcode::Const);
    assert_eq!(c.const_value(id), Some(7.0));
}

#[test]
fn affine_promotion_from_sum_of_variables_and_constants() {
    let mut c = Cache::new();
    let x = c.x();
    let y = c.y();
    let two = c.constant(2.0);
    let scaled_x = c.binary(Opcode::Mul, x, two);
    let combined = c.binary(Opcode::Add, scaled_x, y);
    assert_eq!(c.get_affine(combined), Some((2.0, 1.0, 0.0, 0.0)));
}

#[test]
fn find_connected_reaches_every_operand() {
    let mut c = Cache::new();
    let x = c.x();
    let y = c.y();
    let sum = c.binary(Opcode::Add, x, y);
    let sq = c.unary(Opcode::Square, sum);
    let connected = c.find_connected(sq).expect("root is present");
    assert!(connected.contains(&x));
    assert!(connected.contains(&y));
    assert!(connected.contains(&sum));
    assert!(connected.contains(&sq));
    assert_eq!(connected.len(), 4);
}

#[test]
fn reset_invalidates_old_ids() {
    let mut c = Cache::new();
    let x = c.x();
    c.reset();
    let err = c.find_connected(x).unwrap_err();
    assert_eq!(err, crate::error::EvalError::CacheInvalidated { id: x });
}

#[test]
fn x_y_z_are_memoized() {
    let mut c = Cache::new();
    let x1 = c.x();
    let x2 = c.x();
    assert_eq!(x1, x2);
}
