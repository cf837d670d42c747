//! Row-range parallel execution of raster kernels.
//!
//! A kernel receives one destination row at a time and may read any number of
//! shared source buffers. The destination is split into contiguous row ranges
//! and every call returns only after all rows are written.

use rayon::prelude::*;

use crate::error::BlendResult;

/// Row ranges handed to each worker, relative to the number of workers.
const CHUNKS_PER_THREAD: usize = 3;

/// Runs a per-row kernel over a row-major destination buffer.
pub trait RowExecutor: Sync {
    /// Call `f(y, row)` for every row of `data`, where rows are `width` elements long.
    fn for_each_row<T, F>(&self, data: &mut [T], width: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send;
}

/// Executes every row on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl RowExecutor for SequentialExecutor {
    fn for_each_row<T, F>(&self, data: &mut [T], width: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if width == 0 {
            return;
        }
        for (y, row) in data.chunks_mut(width).enumerate() {
            f(y, row);
        }
    }
}

/// Executes row ranges on a rayon pool.
#[derive(Debug, Default)]
pub struct RayonExecutor {
    pool: Option<rayon::ThreadPool>,
}

impl RayonExecutor {
    /// Use a dedicated pool with `threads` workers, or the global pool for `None`.
    pub fn new(threads: Option<usize>) -> BlendResult<Self> {
        let pool = match threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads.max(1))
                    .build()?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    fn workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl RowExecutor for RayonExecutor {
    fn for_each_row<T, F>(&self, data: &mut [T], width: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if width == 0 || data.is_empty() {
            return;
        }
        let height = data.len() / width;
        let chunk_rows = (height / (self.workers() * CHUNKS_PER_THREAD)).max(1);
        let mut run = move || {
            data.par_chunks_mut(width * chunk_rows)
                .enumerate()
                .for_each(|(chunk, rows)| {
                    for (offset, row) in rows.chunks_mut(width).enumerate() {
                        f(chunk * chunk_rows + offset, row);
                    }
                });
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
