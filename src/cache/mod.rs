//! Hash-consed DAG builder: structural deduplication, affine
//! canonicalization, and algebraic identity simplification.
//!
//! A [`Cache`] is a thread-local (or single-owner) arena mapping a
//! structural key `(opcode, value/coefficients, operand ids)` to a unique,
//! non-zero [`NodeId`]. Insertion is deduplicating: building the same
//! subexpression twice always returns the same id. See spec.md §3/§4.2.

mod simplify;

#[cfg(test)]
mod tests;

use std::num::NonZeroU32;

use rustc_hash::FxHashMap;

use crate::opcode::{Arity, Opcode};

/// A unique, non-zero reference to a node inside a particular [`Cache`].
///
/// `NodeId` is only meaningful relative to the cache that produced it; id
/// `0` never exists (it is the implicit "null" used to represent a
/// missing operand before a [`Cache::reset`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    fn new(index: usize) -> Self {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "cache sizes are bounded well under u32::MAX in practice"
        )]
        let raw = (index as u32) + 1;
        Self(NonZeroU32::new(raw).expect("index + 1 is never zero"))
    }

    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// The data stored for one node, beyond its opcode and rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NodeData {
    /// `CONST` payload.
    Const(f32),
    /// `VAR_X`/`VAR_Y`/`VAR_Z` carry no payload; the opcode says which.
    Var,
    /// `AFFINE_VEC(a, b, c, d)`.
    Affine(f32, f32, f32, f32),
    /// A unary op's single operand.
    Unary(NodeId),
    /// A binary op's two operands.
    Binary(NodeId, NodeId),
}

#[derive(Debug, Clone)]
struct Node {
    op: Opcode,
    rank: u32,
    data: NodeData,
}

/// Structural key used for hash-consing. Two insertions with an equal key
/// are guaranteed to produce the same [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Const(u32),
    Var(Opcode),
    Affine([u32; 4]),
    Op {
        op: Opcode,
        lhs: NodeId,
        rhs: Option<NodeId>,
    },
}

/// Canonical bit pattern used to coalesce all `NaN` constants into one id
/// (spec.md §3: "`CONST(v1)` and `CONST(v2)` share an id iff `v1 == v2`
/// bitwise (or both NaN)").
fn const_key_bits(v: f32) -> u32 {
    if v.is_nan() { f32::NAN.to_bits() } else { v.to_bits() }
}

/// A hash-consed arena of expression-DAG nodes.
///
/// Grows monotonically during tree construction; [`Cache::reset`] discards
/// every id at once. Tree handles (`crate::tree::Tree`) hold `(cache,
/// root_id)` pairs and stay valid for as long as the cache they point into
/// is not reset.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    nodes: Vec<Node>,
    index: FxHashMap<NodeKey, NodeId>,
    x: Option<NodeId>,
    y: Option<NodeId>,
    z: Option<NodeId>,
}

impl Cache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard every id. Any `Tree`/`NodeId` built before this call is
    /// invalidated: dereferencing it is a [`crate::error::EvalError::CacheInvalidated`].
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.x = None;
        self.y = None;
        self.z = None;
    }

    /// Number of distinct nodes currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if the cache holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node, crate::error::EvalError> {
        self.nodes
            .get(id.index())
            .ok_or(crate::error::EvalError::CacheInvalidated { id })
    }

    pub(crate) fn opcode_of(&self, id: NodeId) -> Opcode {
        self.nodes[id.index()].op
    }

    pub(crate) fn rank_of(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].rank
    }

    pub(crate) fn data_of(&self, id: NodeId) -> NodeData {
        self.nodes[id.index()].data
    }

    fn push_node(&mut self, op: Opcode, rank: u32, data: NodeData, key: NodeKey) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node { op, rank, data });
        self.index.insert(key, id);
        id
    }

    /// The `X` axis variable, constructed on first use and memoized.
    pub fn x(&mut self) -> NodeId {
        if let Some(id) = self.x {
            return id;
        }
        let id = self.push_node(Opcode::VarX, 0, NodeData::Var, NodeKey::Var(Opcode::VarX));
        self.x = Some(id);
        id
    }

    /// The `Y` axis variable, constructed on first use and memoized.
    pub fn y(&mut self) -> NodeId {
        if let Some(id) = self.y {
            return id;
        }
        let id = self.push_node(Opcode::VarY, 0, NodeData::Var, NodeKey::Var(Opcode::VarY));
        self.y = Some(id);
        id
    }

    /// The `Z` axis variable, constructed on first use and memoized.
    pub fn z(&mut self) -> NodeId {
        if let Some(id) = self.z {
            return id;
        }
        let id = self.push_node(Opcode::VarZ, 0, NodeData::Var, NodeKey::Var(Opcode::VarZ));
        self.z = Some(id);
        id
    }

    /// A numeric constant. Constants are coalesced bitwise; all NaNs share
    /// one id.
    pub fn constant(&mut self, value: f32) -> NodeId {
        let key = NodeKey::Const(const_key_bits(value));
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        self.push_node(Opcode::Const, 0, NodeData::Const(value), key)
    }

    /// `a*X + b*Y + c*Z + d` as a single node. Collapses to `CONST(d)` if
    /// `a == b == c == 0.0`.
    pub fn affine(&mut self, a: f32, b: f32, c: f32, d: f32) -> NodeId {
        if a == 0.0 && b == 0.0 && c == 0.0 {
            return self.constant(d);
        }
        let key = NodeKey::Affine([a.to_bits(), b.to_bits(), c.to_bits(), d.to_bits()]);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        self.push_node(Opcode::AffineVec, 0, NodeData::Affine(a, b, c, d), key)
    }

    /// Returns `Some((a, b, c, d))` iff `id` refers to an `AFFINE_VEC`
    /// node.
    #[must_use]
    pub fn get_affine(&self, id: NodeId) -> Option<(f32, f32, f32, f32)> {
        match self.nodes.get(id.index())?.data {
            NodeData::Affine(a, b, c, d) => Some((a, b, c, d)),
            _ => None,
        }
    }

    /// Build or fetch a unary-opcode node.
    ///
    /// # Panics
    /// Panics (a contract violation, not a caller-recoverable error) if
    /// `op` is not a unary opcode.
    pub fn unary(&mut self, op: Opcode, operand: NodeId) -> NodeId {
        assert!(
            matches!(op.arity(), Arity::Unary),
            "unary() called with non-unary opcode {op}"
        );
        if let Some(id) = simplify::try_unary_identity(self, op, operand) {
            return id;
        }
        if let Some(v) = self.const_value(operand) {
            return self.constant(simplify::fold_unary(op, v));
        }
        let key = NodeKey::Op {
            op,
            lhs: operand,
            rhs: None,
        };
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let rank = self.rank_of(operand) + 1;
        self.push_node(op, rank, NodeData::Unary(operand), key)
    }

    /// Build or fetch a binary-opcode node, applying the full
    /// spec.md §4.2 procedure: commutative normalization, identity
    /// simplification, constant folding, affine promotion, and finally
    /// hash-consing.
    ///
    /// # Panics
    /// Panics (a contract violation) if `op` is not a binary opcode.
    pub fn binary(&mut self, op: Opcode, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary_impl(op, lhs, rhs, true)
    }

    /// Same procedure as [`Cache::binary`] but without the affine
    /// promotion step (spec.md §4.2 step 4).
    ///
    /// Exists solely for [`crate::tree::Tree::collapse`]: expanding an
    /// `AFFINE_VEC` back into explicit `Mul`/`Add` nodes through the
    /// ordinary, promoting [`Cache::binary`] would immediately re-fold
    /// that same `Mul`/`Add` chain straight back into an `AFFINE_VEC`,
    /// since every operand involved (`VAR_*`, `CONST`) is
    /// affine-representable — defeating the expansion before it starts.
    /// Identity simplification and constant folding still run, so
    /// zero-coefficient terms are stripped exactly as spec.md §4.3
    /// already guarantees; only the affine re-promotion is skipped.
    ///
    /// # Panics
    /// Panics (a contract violation) if `op` is not a binary opcode.
    pub(crate) fn binary_no_affine_promotion(&mut self, op: Opcode, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary_impl(op, lhs, rhs, false)
    }

    fn binary_impl(&mut self, op: Opcode, lhs: NodeId, rhs: NodeId, allow_affine_promotion: bool) -> NodeId {
        assert!(
            matches!(op.arity(), Arity::Binary),
            "binary() called with non-binary opcode {op}"
        );
        let (lhs, rhs) = if op.is_commutative() && lhs > rhs {
            (rhs, lhs)
        } else {
            (lhs, rhs)
        };

        if let Some(id) = simplify::try_binary_identity(self, op, lhs, rhs) {
            return id;
        }
        if let Some(id) = simplify::try_sub_self(self, op, lhs, rhs) {
            return id;
        }
        if let (Some(a), Some(b)) = (self.const_value(lhs), self.const_value(rhs)) {
            return self.constant(simplify::fold_binary(op, a, b));
        }
        if allow_affine_promotion {
            if let Some(id) = simplify::try_affine_promotion(self, op, lhs, rhs) {
                return id;
            }
        }

        let key = NodeKey::Op {
            op,
            lhs,
            rhs: Some(rhs),
        };
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let rank = self.rank_of(lhs).max(self.rank_of(rhs)) + 1;
        self.push_node(op, rank, NodeData::Binary(lhs, rhs), key)
    }

    /// Generic entry point mirroring the external interface in spec.md
    /// §6: dispatches to [`Cache::unary`] or [`Cache::binary`] by arity.
    /// `rhs` is ignored for unary opcodes.
    pub fn operation(&mut self, op: Opcode, lhs: NodeId, rhs: Option<NodeId>) -> NodeId {
        match op.arity() {
            Arity::Unary => self.unary(op, lhs),
            Arity::Binary => {
                self.binary(op, lhs, rhs.expect("binary opcode requires an rhs operand"))
            }
            Arity::Nullary => unreachable!("operation() does not construct nullary opcodes"),
        }
    }

    fn const_value(&self, id: NodeId) -> Option<f32> {
        match self.nodes[id.index()].data {
            NodeData::Const(v) => Some(v),
            _ => None,
        }
    }

    /// `true` if `id` is the constant `0.0` (not `-0.0`; bitwise-distinct
    /// per spec.md §3).
    pub(crate) fn is_const_zero(&self, id: NodeId) -> bool {
        self.const_value(id) == Some(0.0)
    }

    /// `true` if `id` is the constant `1.0`.
    pub(crate) fn is_const_one(&self, id: NodeId) -> bool {
        self.const_value(id) == Some(1.0)
    }

    /// All ids reachable from `root` (the transitive closure of operands,
    /// including `root` itself).
    ///
    /// # Errors
    /// Returns [`crate::error::EvalError::CacheInvalidated`] if `root` (or
    /// a node it transitively references) is not present — this can only
    /// happen after a [`Cache::reset`].
    pub fn find_connected(
        &self,
        root: NodeId,
    ) -> Result<Vec<NodeId>, crate::error::EvalError> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut stack = vec![root];
        let mut out = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.node(id)?;
            out.push(id);
            match node.data {
                NodeData::Const(_) | NodeData::Var => {}
                NodeData::Affine(..) => {}
                NodeData::Unary(a) => stack.push(a),
                NodeData::Binary(a, b) => {
                    stack.push(a);
                    stack.push(b);
                }
            }
        }
        Ok(out)
    }
}
