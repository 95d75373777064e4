//! Chunked fan-out with a join barrier per chunk
//!
//! Every helper here launches one task per item of the current chunk, waits
//! for the whole chunk, and only then starts the next one. Peak concurrency is
//! therefore bounded by the chunk width. A failed task does not cancel its
//! siblings; the chunk still runs to completion and the first failure in input
//! order is returned once the barrier is reached. Later chunks never start.

use crate::chunking::{chunk_count, chunks};
use cdp_common::{CdpError, Result};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Run blocking `task` once per item, `width` items at a time
///
/// Tasks run on tokio's blocking pool, so file and compression work never
/// stalls the async workers. Results come back in input order.
pub async fn blocking_waves<T, R, F>(
    stage: &str,
    items: Vec<T>,
    width: usize,
    task: F,
) -> Result<Vec<R>>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Result<R> + Send + Sync + 'static,
{
    let task = Arc::new(task);
    let waves = chunk_count(items.len(), width);
    let mut results = Vec::with_capacity(items.len());

    for (wave, chunk) in chunks(&items, width)?.enumerate() {
        let handles: Vec<_> = chunk
            .iter()
            .cloned()
            .map(|item| {
                let task = Arc::clone(&task);
                tokio::task::spawn_blocking(move || task(item))
            })
            .collect();

        let outcomes = join_all(handles).await;
        settle_wave(stage, wave, waves, outcomes, &mut results)?;
    }

    Ok(results)
}

/// Run async `task` once per item on the runtime, `width` items at a time
pub async fn async_waves<T, R, F, Fut>(
    stage: &str,
    items: Vec<T>,
    width: usize,
    task: F,
) -> Result<Vec<R>>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let waves = chunk_count(items.len(), width);
    let mut results = Vec::with_capacity(items.len());

    for (wave, chunk) in chunks(&items, width)?.enumerate() {
        let handles: Vec<_> = chunk
            .iter()
            .cloned()
            .map(|item| tokio::spawn(task(item)))
            .collect();

        let outcomes = join_all(handles).await;
        settle_wave(stage, wave, waves, outcomes, &mut results)?;
    }

    Ok(results)
}

fn settle_wave<R>(
    stage: &str,
    wave: usize,
    waves: usize,
    outcomes: Vec<std::result::Result<Result<R>, JoinError>>,
    results: &mut Vec<R>,
) -> Result<()> {
    let size = outcomes.len();
    let mut first_error: Option<CdpError> = None;

    for outcome in outcomes {
        match outcome.map_err(CdpError::from).and_then(|result| result) {
            Ok(value) => results.push(value),
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(e) => warn!(stage, wave, error = %e, "Additional task failure in wave"),
        }
    }

    if let Some(e) = first_error {
        warn!(stage, wave = wave + 1, waves, error = %e, "Wave failed");
        return Err(e);
    }

    debug!(stage, wave = wave + 1, waves, tasks = size, "Wave complete");
    Ok(())
}
