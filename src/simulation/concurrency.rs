//! Parallel-for over the per-cell arrays.
//!
//! Every helper returns only after all cells are processed, so consecutive calls
//! are separated by a full barrier.

use rayon::prelude::*;

pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
    arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
        f(idx, v1);
    });
}

pub fn par_iter_mut2<T1: Send + Sync, T2: Send + Sync, F: Fn(usize, &mut T1, &mut T2) + Send + Sync>(
    arr1: &mut [T1],
    arr2: &mut [T2],
    f: F,
) {
    assert_eq!(arr1.len(), arr2.len());
    arr1.into_par_iter()
        .zip(arr2.into_par_iter())
        .enumerate()
        .for_each(|(idx, (v1, v2))| {
            f(idx, v1, v2);
        });
}

/// Maps every cell to a value and folds the results, e.g. for per-frame statistics.
pub fn par_map_reduce<
    T1: Send + Sync,
    X: Send,
    F: Fn(usize, &T1) -> X + Send + Sync,
    C: Fn(X, X) -> X + Send + Sync,
    I: Fn() -> X + Send + Sync,
>(
    arr1: &[T1],
    identity: I,
    combine: C,
    f: F,
) -> X {
    arr1.par_iter()
        .enumerate()
        .map(|(i, a)| f(i, a))
        .reduce(identity, combine)
}
