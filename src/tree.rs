//! A lightweight owning reference to a root node inside a [`Cache`],
//! plus [`Tree::collapse`] to rewrite away `AFFINE_VEC` before evaluator
//! compilation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cache::{Cache, NodeId};
use crate::opcode::Opcode;

/// A root id paired with the cache it lives in.
///
/// `Tree` is a cheap value type (`Clone` just bumps a refcount) — the
/// cache itself is shared via `Rc<RefCell<_>>` so that several trees can
/// be built against the same arena without the caller threading a `&mut
/// Cache` through every call site. Per spec.md §9 ("Design Notes"), this
/// is the documented single-threaded convenience context: a `Tree` must
/// not be shared across threads (`Rc`/`RefCell` are neither `Send` nor
/// `Sync`), matching the single-threaded evaluator model of §5.
#[derive(Clone)]
pub struct Tree {
    cache: Rc<RefCell<Cache>>,
    root: NodeId,
}

impl Tree {
    /// Wrap an existing `(cache, root)` pair as a tree handle.
    #[must_use]
    pub fn new(cache: Rc<RefCell<Cache>>, root: NodeId) -> Self {
        Self { cache, root }
    }

    /// The root id this handle points at.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// A clone of the shared cache handle (for evaluator compilation).
    #[must_use]
    pub fn cache(&self) -> Rc<RefCell<Cache>> {
        Rc::clone(&self.cache)
    }

    /// Size of `findConnected(root)` — the number of distinct nodes an
    /// evaluator would have to compile this tree into. Lets callers budget
    /// against [`crate::MAX_CONNECTED_NODES`] before constructing one.
    ///
    /// # Errors
    /// Returns [`crate::error::EvalError::CacheInvalidated`] if the cache
    /// was reset while this handle was still live.
    pub fn node_count(&self) -> Result<usize, crate::error::EvalError> {
        Ok(self.cache.borrow().find_connected(self.root)?.len())
    }

    /// Rewrite the root so that no `AFFINE_VEC` remains anywhere in its
    /// subDAG: each one expands to the explicit tree
    /// `((a*X) + (b*Y)) + (c*Z)) + d)`, built through the ordinary cache
    /// operations (which re-simplify away zero-coefficient terms, per
    /// spec.md §4.3). This guarantees the evaluator only ever sees
    /// opcodes it knows how to execute numerically.
    #[must_use]
    pub fn collapse(&self) -> Self {
        let mut cache = self.cache.borrow_mut();
        let mut memo = rustc_hash::FxHashMap::default();
        let new_root = collapse_node(&mut cache, self.root, &mut memo);
        drop(cache);
        Self {
            cache: Rc::clone(&self.cache),
            root: new_root,
        }
    }
}

fn collapse_node(
    cache: &mut Cache,
    id: NodeId,
    memo: &mut rustc_hash::FxHashMap<NodeId, NodeId>,
) -> NodeId {
    if let Some(&done) = memo.get(&id) {
        return done;
    }
    use crate::cache::NodeData;
    let result = match cache.data_of(id) {
        NodeData::Const(_) | NodeData::Var => id,
        NodeData::Affine(a, b, c, d) => {
            // `cache.binary()` would immediately re-promote this exact
            // Mul/Add chain straight back into an AFFINE_VEC (every
            // operand here is affine-representable) — use the
            // non-promoting constructor so the expansion actually sticks.
            let x = cache.x();
            let y = cache.y();
            let z = cache.z();
            let const_a = cache.constant(a);
            let const_b = cache.constant(b);
            let const_c = cache.constant(c);
            let const_d = cache.constant(d);
            let ax = cache.binary_no_affine_promotion(Opcode::Mul, const_a, x);
            let by = cache.binary_no_affine_promotion(Opcode::Mul, const_b, y);
            let cz = cache.binary_no_affine_promotion(Opcode::Mul, const_c, z);
            let sum_xy = cache.binary_no_affine_promotion(Opcode::Add, ax, by);
            let sum_xyz = cache.binary_no_affine_promotion(Opcode::Add, sum_xy, cz);
            cache.binary_no_affine_promotion(Opcode::Add, sum_xyz, const_d)
        }
        NodeData::Unary(a) => {
            let op = cache.opcode_of(id);
            let new_a = collapse_node(cache, a, memo);
            if new_a == a {
                id
            } else {
                cache.unary(op, new_a)
            }
        }
        NodeData::Binary(a, b) => {
            let op = cache.opcode_of(id);
            let new_a = collapse_node(cache, a, memo);
            let new_b = collapse_node(cache, b, memo);
            if new_a == a && new_b == b {
                id
            } else {
                cache.binary(op, new_a, new_b)
            }
        }
    };
    memo.insert(id, result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    #[test]
    fn collapse_removes_affine_nodes() {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = {
            let mut c = cache.borrow_mut();
            c.affine(2.0, 3.0, 0.0, 1.0)
        };
        let tree = Tree::new(Rc::clone(&cache), root);
        let collapsed = tree.collapse();
        let c = cache.borrow();
        assert_eq!(c.get_affine(collapsed.root()), None);
        assert_eq!(c.opcode_of(collapsed.root()), Opcode::Add);
    }

    #[test]
    fn collapse_evaluates_to_same_affine_value() {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let root = {
            let mut c = cache.borrow_mut();
            c.affine(2.0, 0.0, 0.0, 1.0)
        };
        let tree = Tree::new(Rc::clone(&cache), root);
        let collapsed = tree.collapse();
        // 2*X + 1 at X=3 should be 7 once compiled; spot-checked here via
        // direct cache structure rather than a full evaluator round trip
        // (covered in evaluator integration tests).
        let c = cache.borrow();
        assert_eq!(c.opcode_of(collapsed.root()), Opcode::Add);
    }
}
