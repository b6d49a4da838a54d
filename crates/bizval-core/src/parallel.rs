//! Order-preserving fan-out for independent calculator invocations.
//!
//! With the `parallel` feature the work runs on the rayon pool; without it
//! the same closures run sequentially. Either way results come back in input
//! order, and the first failure (by input position) wins.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::BizValResult;

pub fn parallel_map<T, R, F>(items: &[T], mapper: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        items.par_iter().map(mapper).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.iter().map(mapper).collect()
    }
}

/// Like [`parallel_map`], short-circuiting to the earliest error.
pub fn try_parallel_map<T, R, F>(items: &[T], mapper: F) -> BizValResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> BizValResult<R> + Sync + Send,
{
    parallel_map(items, mapper).into_iter().collect()
}
