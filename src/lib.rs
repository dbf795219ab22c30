//! Compiled, SIMD-accelerated evaluation of implicit-surface expression
//! DAGs rooted in `X`, `Y`, `Z`.
//!
//! ```text
//!   Cache            Tree                Evaluator
//!  ┌────────┐  root  ┌──────┐  collapse  ┌─────────────────────────┐
//!  │ hash-   │◀──────▶│ id + │───────────▶│ flat, rank-ordered tape │
//!  │ consed  │        │ cache│            │ scalar / SIMD / interval│
//!  │ node    │        └──────┘            │ kernels + push/pop      │
//!  │ arena   │                            └─────────────────────────┘
//!  └────────┘
//! ```
//!
//! Client code builds a DAG through a [`cache::Cache`], wraps a root node
//! as a [`tree::Tree`], and compiles that into an [`evaluator::Evaluator`]
//! — one per worker thread for parallel rendering (see the module docs for
//! the concurrency discipline each piece expects).
//!
//! Renderers, mesh/file-format writers, the UI layer, and OpenGL draw code
//! are explicitly out of scope: this crate's surface is the cache, the
//! tree handle, and the evaluator.

#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod evaluator;
pub mod interval;
mod ops;
pub mod opcode;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod tree;

#[cfg(test)]
mod tests;

pub use cache::{Cache, NodeId};
pub use error::EvalError;
pub use evaluator::{Evaluator, Transform};
pub use interval::Interval;
pub use opcode::{Arity, Opcode};
pub use tree::Tree;

/// Ceiling on the number of nodes an [`Evaluator`] will compile in one
/// tape, guarding against pathological DAGs. Exceeding it during
/// [`Evaluator::new`] is an [`EvalError::MalformedTree`].
pub const MAX_CONNECTED_NODES: usize = 1_000_000;
