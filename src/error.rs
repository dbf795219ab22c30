//! Error types for cache construction, evaluator compilation, and the
//! push/pop pruning protocol.
//!
//! Mirrors the hand-rolled `DiffError` style used elsewhere in this
//! codebase's lineage: a plain `#[non_exhaustive]` enum with manual
//! `Display`/`Error` impls, no `thiserror` dependency. Per-clause numeric
//! edge cases (NaN, divide-by-zero, domain errors) are *not* represented
//! here — spec.md §7 routes those through the tape as NaN/∞, never as a
//! `Result`.

use crate::cache::NodeId;
use crate::opcode::Opcode;

/// Errors raised by cache, tree, and evaluator construction, and by the
/// push/pop pruning protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvalError {
    /// `POW`/`NTH_ROOT` was given a non-constant exponent/root-degree
    /// interval, or an opcode was evaluated as `INVALID`.
    InvalidOperand {
        /// The opcode that rejected its operand.
        op: Opcode,
        /// Human-readable detail.
        reason: &'static str,
    },
    /// Evaluator construction could not locate the tree's root among the
    /// nodes reachable from it (or the DAG exceeded
    /// [`crate::MAX_CONNECTED_NODES`]).
    MalformedTree {
        /// The root id that could not be located (or whose connected set
        /// overflowed the size guard).
        root: NodeId,
    },
    /// `pop()` was called with no matching `push()` outstanding.
    UnbalancedStack,
    /// A tree handle referenced an id that no longer exists in the cache
    /// (the cache was reset while the handle was still live).
    CacheInvalidated {
        /// The id that could not be resolved.
        id: NodeId,
    },
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOperand { op, reason } => {
                write!(f, "invalid operand for {op}: {reason}")
            }
            Self::MalformedTree { root } => {
                write!(f, "malformed tree: root {root:?} not found in connected set")
            }
            Self::UnbalancedStack => {
                write!(f, "pop() called with no matching push()")
            }
            Self::CacheInvalidated { id } => {
                write!(f, "node {id:?} no longer present in cache (was it reset?)")
            }
        }
    }
}

impl std::error::Error for EvalError {}
