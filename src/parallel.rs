//! Rayon-backed parallel batch evaluation.
//!
//! spec.md §5's concurrency model is "one `Evaluator` per worker thread,
//! never shared" rather than one tape guarded by a lock — this module is
//! a thin sharding helper over that discipline, mirroring the teacher's
//! `eval_batch_parallel` (chunked `par_chunks_mut` writing directly into
//! the output slice, no per-chunk Vec allocation beyond the chunk views
//! themselves).

use rayon::prelude::*;

use crate::evaluator::Evaluator;

/// Evaluate `points` by sharding them across `evaluators`, one shard per
/// evaluator, each running on its own Rayon worker thread.
///
/// Callers build `evaluators` once (e.g. one per thread in a pool, each
/// compiled from the same [`crate::tree::Tree`] via repeated
/// [`Evaluator::new`] calls) and can reuse the slice across many calls.
/// This function never constructs or shares a single `Evaluator` across
/// threads.
///
/// # Panics
/// Panics if `evaluators` is empty.
#[must_use]
pub fn eval_points_parallel(evaluators: &mut [Evaluator], points: &[[f32; 3]]) -> Vec<f32> {
    assert!(
        !evaluators.is_empty(),
        "eval_points_parallel requires at least one evaluator"
    );

    let chunk_size = points.len().div_ceil(evaluators.len()).max(1);

    let mut output = vec![0.0_f32; points.len()];
    let out_chunks: Vec<&mut [f32]> = output.chunks_mut(chunk_size).collect();
    let point_chunks: Vec<&[[f32; 3]]> = points.chunks(chunk_size).collect();

    evaluators
        .par_iter_mut()
        .zip(out_chunks.into_par_iter())
        .zip(point_chunks.into_par_iter())
        .for_each(|((eval, out), pts)| {
            for (i, p) in pts.iter().enumerate() {
                eval.set_point(p[0], p[1], p[2], i);
            }
            let values = eval.values_batch(pts.len(), true);
            out.copy_from_slice(values);
        });

    output
}
