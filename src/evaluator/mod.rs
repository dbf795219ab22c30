//! Compiles a [`crate::tree::Tree`] into a flat, rank-ordered clause tape
//! and evaluates it — scalar batch, SIMD batch with derivatives, and
//! interval, plus the push/pop pruning protocol (spec.md §4.4).

mod clause;
mod interval_eval;
mod scalar;
#[cfg(feature = "simd")]
mod simd;
mod transform;


use rustc_hash::FxHashMap;

use crate::cache::NodeData;
use crate::error::EvalError;
use crate::interval::Interval;
use crate::opcode::Opcode;
use crate::tree::Tree;

use clause::{Clause, PruneState, NO_OPERAND};
pub use transform::Transform;

#[cfg(feature = "simd")]
fn dispatch_value(clauses: &mut [Clause], idx: usize, n: usize, vectorize: bool) {
    if vectorize {
        simd::eval_value(clauses, idx, n);
    } else {
        scalar::eval_value(clauses, idx, n);
    }
}

#[cfg(not(feature = "simd"))]
fn dispatch_value(clauses: &mut [Clause], idx: usize, n: usize, _vectorize: bool) {
    scalar::eval_value(clauses, idx, n);
}

#[cfg(feature = "simd")]
fn dispatch_grad(clauses: &mut [Clause], idx: usize, n: usize, vectorize: bool) {
    if vectorize {
        simd::eval_value_and_grad(clauses, idx, n);
    } else {
        scalar::eval_value_and_grad(clauses, idx, n);
    }
}

#[cfg(not(feature = "simd"))]
fn dispatch_grad(clauses: &mut [Clause], idx: usize, n: usize, _vectorize: bool) {
    scalar::eval_value_and_grad(clauses, idx, n);
}

fn trace_utilization(phase: &str, depth: u32, utilization: f64) {
    let enabled = std::env::var("ISODAG_TRACE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if enabled {
        eprintln!("[ISODAG_TRACE] {phase} depth={depth} utilization={utilization:.3}");
    }
}

/// All clauses sharing one rank, plus the push/pop bookkeeping needed to
/// cluster enabled clauses at the front without ever moving a clause to a
/// different tape slot (operand pointers are absolute tape indices and
/// must stay valid forever).
struct Row {
    /// Tape indices belonging to this row; reordered in place by `push`.
    order: Vec<usize>,
    /// Number of entries at the front of `order` currently enabled.
    active: usize,
    /// Saved `active` values, one per outstanding `push`.
    stack: Vec<usize>,
}

/// A compiled, directly evaluable form of a DAG rooted at some node.
///
/// Construction allocates a flat tape with `X`, `Y`, `Z` at positions 0,
/// 1, 2, followed by one clause per reachable node, grouped into rows by
/// rank. Every call into an `Evaluator` mutates its tape in place
/// (batch buffers, `disabled` flags, row ordering) — callers must not
/// share one `Evaluator` across threads without external synchronization
/// (spec.md §5).
pub struct Evaluator {
    clauses: Vec<Clause>,
    rows: Vec<Row>,
    root: usize,
    transform: Transform,
    push_depth: u32,
}

impl Evaluator {
    /// Compile `tree` into a tape. `transform` maps caller-supplied world
    /// coordinates into the space the tape evaluates in; pass
    /// [`Transform::IDENTITY`] if the caller's coordinates already match.
    ///
    /// # Errors
    /// Returns [`EvalError::CacheInvalidated`] if the tree's cache was
    /// reset out from under it, or [`EvalError::MalformedTree`] if the
    /// connected set exceeds [`crate::MAX_CONNECTED_NODES`] or otherwise
    /// fails to resolve a root clause.
    pub fn new(tree: &Tree, transform: Transform) -> Result<Self, EvalError> {
        let collapsed = tree.collapse();
        let cache = collapsed.cache();
        let cache = cache.borrow();
        let root_id = collapsed.root();
        let connected = cache.find_connected(root_id)?;
        if connected.len() > crate::MAX_CONNECTED_NODES {
            return Err(EvalError::MalformedTree { root: root_id });
        }

        let mut clauses = Vec::with_capacity(3 + connected.len());
        let mut id_map = FxHashMap::default();
        clauses.push(Clause::leaf(Opcode::VarX));
        clauses.push(Clause::leaf(Opcode::VarY));
        clauses.push(Clause::leaf(Opcode::VarZ));

        let mut rest: Vec<_> = connected
            .iter()
            .copied()
            .filter(|&id| !cache.opcode_of(id).is_var())
            .collect();
        rest.sort_by_key(|&id| {
            let is_const = u8::from(cache.opcode_of(id) != Opcode::Const);
            (is_const, cache.rank_of(id))
        });

        let mut rows: Vec<Row> = Vec::new();
        for id in rest {
            let op = cache.opcode_of(id);
            let idx = clauses.len();
            let clause = match cache.data_of(id) {
                NodeData::Const(v) => Clause::constant(v),
                NodeData::Var => unreachable!("VAR_X/Y/Z already filtered out"),
                NodeData::Affine(..) => {
                    unreachable!("collapse() removes every AFFINE_VEC before this point")
                }
                NodeData::Unary(a) => {
                    let &a_idx = id_map
                        .get(&a)
                        .expect("operand rank is strictly lower, so already placed");
                    Clause::unary(op, a_idx, cache.rank_of(id))
                }
                NodeData::Binary(a, b) => {
                    let &a_idx = id_map.get(&a).expect("operand already placed");
                    let &b_idx = id_map.get(&b).expect("operand already placed");
                    Clause::binary(op, a_idx, b_idx, cache.rank_of(id))
                }
            };
            let is_row_member = !matches!(cache.data_of(id), NodeData::Const(_));
            clauses.push(clause);
            id_map.insert(id, idx);
            if is_row_member {
                let rank = cache.rank_of(id) as usize;
                if rows.len() < rank {
                    rows.resize_with(rank, || Row {
                        order: Vec::new(),
                        active: 0,
                        stack: Vec::new(),
                    });
                }
                rows[rank - 1].order.push(idx);
            }
        }
        for row in &mut rows {
            row.active = row.order.len();
        }

        let root = if cache.opcode_of(root_id).is_var() {
            match cache.opcode_of(root_id) {
                Opcode::VarX => 0,
                Opcode::VarY => 1,
                Opcode::VarZ => 2,
                _ => unreachable!(),
            }
        } else {
            *id_map
                .get(&root_id)
                .ok_or(EvalError::MalformedTree { root: root_id })?
        };

        Ok(Self {
            clauses,
            rows,
            root,
            transform,
            push_depth: 0,
        })
    }

    /// Total number of clauses in the tape (`3 + connected node count`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// `true` if the tape holds no clauses beyond `X`/`Y`/`Z` (a constant
    /// root with no references to the inputs collapses to this).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.len() <= 3
    }

    /// Number of rank rows (excludes the leaf slots and constants).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn ensure_capacity(&mut self, n: usize, want_derivs: bool) {
        for c in &mut self.clauses {
            c.ensure_capacity(n, want_derivs);
        }
    }

    /// Write one lane of a batch's input point.
    pub fn set_point(&mut self, x: f32, y: f32, z: f32, index: usize) {
        self.ensure_capacity(index + 1, false);
        self.clauses[0].f[index] = x;
        self.clauses[1].f[index] = y;
        self.clauses[2].f[index] = z;
    }

    /// Write the input interval box for [`Evaluator::eval_interval`].
    pub fn set_interval(&mut self, x: Interval, y: Interval, z: Interval) {
        let transformed = self.transform.apply_interval([x, y, z]);
        self.clauses[0].interval = transformed[0];
        self.clauses[1].interval = transformed[1];
        self.clauses[2].interval = transformed[2];
    }

    /// Apply the world-to-evaluator transform in place to the first `n`
    /// lanes of the `X`/`Y`/`Z` value buffers.
    ///
    /// Inputs must be (re)supplied via [`Evaluator::set_point`] before
    /// every call that needs fresh transformed coordinates — calling this
    /// twice without resetting the raw inputs in between reapplies `M`.
    fn apply_transform(&mut self, n: usize) {
        if self.transform.is_identity() {
            return;
        }
        for i in 0..n {
            let p = self.transform.apply_point([
                self.clauses[0].f[i],
                self.clauses[1].f[i],
                self.clauses[2].f[i],
            ]);
            self.clauses[0].f[i] = p[0];
            self.clauses[1].f[i] = p[1];
            self.clauses[2].f[i] = p[2];
        }
    }

    fn seed_leaf_gradients(&mut self, n: usize) {
        self.clauses[0].dx[..n].fill(1.0);
        self.clauses[0].dy[..n].fill(0.0);
        self.clauses[0].dz[..n].fill(0.0);
        self.clauses[1].dx[..n].fill(0.0);
        self.clauses[1].dy[..n].fill(1.0);
        self.clauses[1].dz[..n].fill(0.0);
        self.clauses[2].dx[..n].fill(0.0);
        self.clauses[2].dy[..n].fill(0.0);
        self.clauses[2].dz[..n].fill(1.0);
    }

    fn for_each_active_clause(&mut self, mut f: impl FnMut(&mut [Clause], usize)) {
        for row in 0..self.rows.len() {
            let active = self.rows[row].active;
            for k in 0..active {
                let idx = self.rows[row].order[k];
                f(&mut self.clauses, idx);
            }
        }
    }

    /// Evaluate `n` points' worth of value-only output. Returns the
    /// root's result buffer.
    pub fn values_batch(&mut self, n: usize, vectorize: bool) -> &[f32] {
        self.ensure_capacity(n, false);
        self.apply_transform(n);
        self.for_each_active_clause(|clauses, idx| dispatch_value(clauses, idx, n, vectorize));
        &self.clauses[self.root].f[..n]
    }

    /// Evaluate `n` points' worth of value and world-space gradient.
    /// Returns `(value, dx, dy, dz)`.
    pub fn derivs_batch(&mut self, n: usize, vectorize: bool) -> (&[f32], &[f32], &[f32], &[f32]) {
        self.ensure_capacity(n, true);
        self.apply_transform(n);
        self.seed_leaf_gradients(n);
        self.for_each_active_clause(|clauses, idx| dispatch_grad(clauses, idx, n, vectorize));

        if !self.transform.is_identity() {
            for i in 0..n {
                let root = &self.clauses[self.root];
                let g = self
                    .transform
                    .unapply_gradient([root.dx[i], root.dy[i], root.dz[i]]);
                self.clauses[self.root].dx[i] = g[0];
                self.clauses[self.root].dy[i] = g[1];
                self.clauses[self.root].dz[i] = g[2];
            }
        }

        let root = &self.clauses[self.root];
        (&root.f[..n], &root.dx[..n], &root.dy[..n], &root.dz[..n])
    }

    /// Single-point convenience over [`Evaluator::values_batch`].
    pub fn eval_point(&mut self, x: f32, y: f32, z: f32) -> f32 {
        self.set_point(x, y, z, 0);
        self.values_batch(1, false)[0]
    }

    /// Evaluate the interval result for an input box, classifying each
    /// `MIN`/`MAX` clause's prune state along the way.
    ///
    /// # Errors
    /// Returns [`EvalError::InvalidOperand`] if a `POW`/`NTH_ROOT` clause's
    /// second operand does not degenerate to a point interval.
    pub fn eval_interval(&mut self, x: Interval, y: Interval, z: Interval) -> Result<Interval, EvalError> {
        self.set_interval(x, y, z);
        for row in 0..self.rows.len() {
            let active_len = self.rows[row].order.len();
            for k in 0..active_len {
                let idx = self.rows[row].order[k];
                interval_eval::eval_clause_interval(&mut self.clauses, idx)?;
            }
        }
        Ok(self.clauses[self.root].interval)
    }

    /// Disable every clause not on a live path from the root, per the
    /// prune classification computed by the most recent
    /// [`Evaluator::eval_interval`] call. Must be balanced by a matching
    /// [`Evaluator::pop`].
    pub fn push(&mut self) {
        for c in &mut self.clauses {
            c.disabled = true;
        }
        self.clauses[self.root].disabled = false;

        for row in self.rows.iter().rev() {
            for &idx in &row.order {
                if self.clauses[idx].disabled {
                    continue;
                }
                let (a, b, prune) = {
                    let c = &self.clauses[idx];
                    (c.a, c.b, c.prune)
                };
                match prune {
                    PruneState::None => {
                        if a != NO_OPERAND {
                            self.clauses[a].disabled = false;
                        }
                        if b != NO_OPERAND {
                            self.clauses[b].disabled = false;
                        }
                    }
                    PruneState::IgnoreA => {
                        if b != NO_OPERAND {
                            self.clauses[b].disabled = false;
                        }
                    }
                    PruneState::IgnoreB => {
                        if a != NO_OPERAND {
                            self.clauses[a].disabled = false;
                        }
                    }
                }
            }
        }

        for row in &mut self.rows {
            let mut active = 0;
            for i in 0..row.order.len() {
                if !self.clauses[row.order[i]].disabled {
                    row.order.swap(i, active);
                    active += 1;
                }
            }
            row.stack.push(row.active);
            row.active = active;
        }
        self.push_depth += 1;
        trace_utilization("push", self.push_depth, self.utilization());
    }

    /// Undo the most recent [`Evaluator::push`].
    ///
    /// # Errors
    /// Returns [`EvalError::UnbalancedStack`] if called with no matching
    /// `push` outstanding.
    pub fn pop(&mut self) -> Result<(), EvalError> {
        if self.push_depth == 0 {
            return Err(EvalError::UnbalancedStack);
        }
        for row in &mut self.rows {
            row.active = row
                .stack
                .pop()
                .expect("row stacks stay balanced with push_depth");
        }
        self.push_depth -= 1;
        trace_utilization("pop", self.push_depth, self.utilization());
        Ok(())
    }

    /// Mean `active / size` across rows; 1.0 if there are no rows (a bare
    /// `X`/`Y`/`Z`/`CONST` root) or nothing has ever been pushed.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.rows.is_empty() {
            return 1.0;
        }
        let sum: f64 = self
            .rows
            .iter()
            .map(|r| r.active as f64 / r.order.len() as f64)
            .sum();
        sum / self.rows.len() as f64
    }
}
