//! Property tests against the public surface, run over inputs quickcheck
//! shrinks on failure. Expression trees are built from `quickcheck`-
//! supplied scalars rather than arbitrary random DAG shapes, so every
//! generated case is one we can actually reason about.

use std::cell::RefCell;
use std::rc::Rc;

use quickcheck::{quickcheck, TestResult};
use rand::Rng;

use crate::{Cache, Evaluator, Interval, Opcode, Transform, Tree};

fn finite(v: f32) -> bool {
    v.is_finite()
}

quickcheck! {
    /// Building the same constant twice always returns the same id.
    fn constant_hash_cons_is_idempotent(v: f32) -> TestResult {
        if !finite(v) {
            return TestResult::discard();
        }
        let mut cache = Cache::new();
        let a = cache.constant(v);
        let b = cache.constant(v);
        TestResult::from_bool(a == b)
    }

    /// `a + b` and `b + a` hash-cons to the same node for a commutative op.
    fn commutative_operand_order_is_irrelevant(a: f32, b: f32) -> TestResult {
        if !finite(a) || !finite(b) {
            return TestResult::discard();
        }
        let mut cache = Cache::new();
        let ca = cache.constant(a);
        let cb = cache.constant(b);
        let lhs = cache.binary(Opcode::Add, ca, cb);
        let rhs = cache.binary(Opcode::Add, cb, ca);
        TestResult::from_bool(lhs == rhs)
    }

    /// `AFFINE_VEC(a, b, c, d)` round-trips through `get_affine`, and the
    /// collapsed tree evaluates the affine combination pointwise.
    fn affine_round_trips_and_evaluates(a: f32, b: f32, c: f32, d: f32, x: f32, y: f32, z: f32) -> TestResult {
        if ![a, b, c, d, x, y, z].into_iter().all(finite) {
            return TestResult::discard();
        }
        if a == 0.0 && b == 0.0 && c == 0.0 {
            return TestResult::discard(); // degenerates to a bare CONST(d)
        }
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = cache.borrow_mut().affine(a, b, c, d);
        let Some(got) = cache.borrow().get_affine(root) else {
            return TestResult::failed();
        };
        if got != (a, b, c, d) {
            return TestResult::failed();
        }

        let tree = Tree::new(Rc::clone(&cache), root);
        let Ok(mut eval) = Evaluator::new(&tree, Transform::IDENTITY) else {
            return TestResult::failed();
        };
        let expected = a * x + b * y + c * z + d;
        let got_val = eval.eval_point(x, y, z);
        if !got_val.is_finite() || !expected.is_finite() {
            return TestResult::discard();
        }
        TestResult::from_bool((got_val - expected).abs() < 1e-2 * expected.abs().max(1.0))
    }

    /// For any point sampled inside a random box, the point evaluation
    /// lies within the interval evaluation of that box (soundness).
    fn interval_contains_point_sample(cx: f32, cy: f32, cz: f32, hw: f32) -> TestResult {
        if ![cx, cy, cz, hw].into_iter().all(finite) || hw <= 0.0 || hw > 1e3 {
            return TestResult::discard();
        }
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = {
            let mut c = cache.borrow_mut();
            let x = c.x();
            let y = c.y();
            let z = c.z();
            let sum = c.operation(
                Opcode::Add,
                c.operation(Opcode::Add, c.operation(Opcode::Square, x, None), c.operation(Opcode::Square, y, None)),
                c.operation(Opcode::Square, z, None),
            );
            c.operation(Opcode::Sqrt, sum, None)
        };
        let tree = Tree::new(cache, root);
        let Ok(mut eval) = Evaluator::new(&tree, Transform::IDENTITY) else {
            return TestResult::failed();
        };

        let x_box = Interval::new(cx - hw, cx + hw);
        let y_box = Interval::new(cy - hw, cy + hw);
        let z_box = Interval::new(cz - hw, cz + hw);
        let Ok(boxed) = eval.eval_interval(x_box, y_box, z_box) else {
            return TestResult::failed();
        };
        if boxed.is_nan() {
            return TestResult::discard();
        }

        let mut rng = rand::rng();
        let px = rng.random_range(x_box.lower..=x_box.upper);
        let py = rng.random_range(y_box.lower..=y_box.upper);
        let pz = rng.random_range(z_box.lower..=z_box.upper);
        let point_val = eval.eval_point(px, py, pz);
        if !point_val.is_finite() {
            return TestResult::discard();
        }
        let slack = 1e-3 * boxed.width().max(1.0);
        TestResult::from_bool(point_val >= boxed.lower - slack && point_val <= boxed.upper + slack)
    }

    /// A push immediately followed by a pop leaves every subsequent
    /// evaluation identical to never having pushed at all.
    fn push_pop_is_transparent(x: f32, y: f32, z: f32) -> TestResult {
        if ![x, y, z].into_iter().all(finite) {
            return TestResult::discard();
        }
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = {
            let mut c = cache.borrow_mut();
            let vx = c.x();
            let vy = c.y();
            let ten = c.constant(10.0);
            let left = c.operation(Opcode::Sub, vx, Some(ten));
            c.operation(Opcode::Min, left, Some(vy))
        };
        let tree = Tree::new(cache, root);
        let Ok(mut eval) = Evaluator::new(&tree, Transform::IDENTITY) else {
            return TestResult::failed();
        };

        let before = eval.eval_point(x, y, z);
        let bx = Interval::point(x);
        let by = Interval::point(y);
        let bz = Interval::point(z);
        if eval.eval_interval(bx, by, bz).is_err() {
            return TestResult::discard();
        }
        eval.push();
        let during = eval.eval_point(x, y, z);
        if eval.pop().is_err() {
            return TestResult::failed();
        }
        let after = eval.eval_point(x, y, z);

        if !before.is_finite() || !during.is_finite() || !after.is_finite() {
            return TestResult::discard();
        }
        TestResult::from_bool((before - during).abs() < 1e-4 && (before - after).abs() < 1e-4)
    }

    /// Scalar and SIMD batch kernels agree within floating-point tolerance.
    fn simd_matches_scalar_over_random_batch(seed: u8) -> TestResult {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = {
            let mut c = cache.borrow_mut();
            let x = c.x();
            let y = c.y();
            let z = c.z();
            let sum = c.operation(
                Opcode::Add,
                c.operation(Opcode::Add, c.operation(Opcode::Square, x, None), c.operation(Opcode::Square, y, None)),
                c.operation(Opcode::Square, z, None),
            );
            c.operation(Opcode::Sqrt, sum, None)
        };
        let tree = Tree::new(cache, root);
        let Ok(mut eval) = Evaluator::new(&tree, Transform::IDENTITY) else {
            return TestResult::failed();
        };

        let n = 11 + (seed as usize % 20);
        let mut rng = rand::rng();
        for i in 0..n {
            eval.set_point(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                i,
            );
        }
        let scalar: Vec<f32> = eval.values_batch(n, false).to_vec();
        let simd: Vec<f32> = eval.values_batch(n, true).to_vec();
        TestResult::from_bool(
            scalar
                .iter()
                .zip(simd.iter())
                .all(|(a, b)| (a - b).abs() < 1e-3 * a.abs().max(1.0)),
        )
    }

    /// Scalar and SIMD derivative kernels agree on value and gradient.
    fn simd_derivs_match_scalar_over_random_batch(seed: u8) -> TestResult {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = {
            let mut c = cache.borrow_mut();
            let x = c.x();
            let y = c.y();
            let z = c.z();
            let xy = c.operation(Opcode::Min, x, Some(y));
            c.operation(Opcode::Max, xy, Some(z))
        };
        let tree = Tree::new(cache, root);
        let Ok(mut eval) = Evaluator::new(&tree, Transform::IDENTITY) else {
            return TestResult::failed();
        };

        let n = 11 + (seed as usize % 20);
        let mut rng = rand::rng();
        for i in 0..n {
            eval.set_point(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                i,
            );
        }
        let (sf, sdx, sdy, sdz) = eval.derivs_batch(n, false);
        let (scalar_f, scalar_dx, scalar_dy, scalar_dz) =
            (sf.to_vec(), sdx.to_vec(), sdy.to_vec(), sdz.to_vec());
        let (vf, vdx, vdy, vdz) = eval.derivs_batch(n, true);
        let close = |a: f32, b: f32| (a - b).abs() < 1e-3 * a.abs().max(1.0);
        TestResult::from_bool(
            (0..n).all(|i| {
                close(scalar_f[i], vf[i])
                    && close(scalar_dx[i], vdx[i])
                    && close(scalar_dy[i], vdy[i])
                    && close(scalar_dz[i], vdz[i])
            }),
        )
    }
}
